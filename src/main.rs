use std::{
    fs::OpenOptions,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use clap::{Args, Parser, Subcommand};
use time::Date;
use tracing_subscriber::{EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use expense_client::{
    App, ClientConfig, Error,
    auth::{SignupForm, ValidatedPassword},
    expense::{Expense, ExpenseId, ExpenseKind, FilterCriteria, category_breakdown, parse_date},
    navigation::Route,
    storage::SqliteStorage,
};

/// Manage your expenses and income from the command line.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the base URL of the API, e.g. "http://localhost:3000".
    #[arg(long)]
    api_url: Option<String>,

    /// File path to the SQLite database that keeps you logged in between runs.
    #[arg(long, default_value = "expense_state.db")]
    state_path: PathBuf,

    /// Where to write the debug log.
    #[arg(long, default_value = "debug.log")]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in to an existing account.
    Login {
        /// Prompted for when omitted.
        #[arg(long)]
        username: Option<String>,
    },
    /// Create an account and log in.
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
    },
    /// Log out.
    Logout,
    /// Show who is logged in.
    Status,
    /// List expenses and income.
    List(ListArgs),
    /// Record a new expense or income.
    Add(AddArgs),
    /// Change an existing expense or income.
    Edit(EditArgs),
    /// Delete an expense or income.
    Delete { id: ExpenseId },
    /// Show totals per category.
    Report,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// "expense" or "income".
    #[arg(long)]
    kind: Option<ExpenseKind>,
    #[arg(long)]
    category: Option<String>,
    /// Text the category must contain.
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    min_amount: Option<f64>,
    #[arg(long)]
    max_amount: Option<f64>,
    /// The earliest date, formatted as YYYY-MM-DD.
    #[arg(long, value_parser = parse_date)]
    from: Option<Date>,
    /// The latest date, formatted as YYYY-MM-DD.
    #[arg(long, value_parser = parse_date)]
    to: Option<Date>,
}

impl ListArgs {
    fn criteria(self) -> FilterCriteria {
        FilterCriteria {
            kind: self.kind,
            search_term: self.search,
            category: self.category,
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            start_date: self.from,
            end_date: self.to,
        }
    }
}

#[derive(Args, Debug)]
struct AddArgs {
    /// "expense" or "income".
    #[arg(long)]
    kind: ExpenseKind,
    #[arg(long)]
    category: String,
    #[arg(long)]
    amount: f64,
    /// Formatted as YYYY-MM-DD.
    #[arg(long, value_parser = parse_date)]
    date: Date,
    #[arg(long)]
    account: String,
    #[arg(long, default_value = "")]
    note: String,
}

#[derive(Args, Debug)]
struct EditArgs {
    id: ExpenseId,
    #[arg(long)]
    kind: Option<ExpenseKind>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    amount: Option<f64>,
    #[arg(long, value_parser = parse_date)]
    date: Option<Date>,
    #[arg(long)]
    account: Option<String>,
    #[arg(long)]
    note: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(&cli.log_file);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            print_error(error.user_message());
            ExitCode::FAILURE
        }
    }
}

fn setup_logging(log_file: &Path) {
    let stderr_log = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")));

    let debug_log = match OpenOptions::new().create(true).append(true).open(log_file) {
        Ok(file) => Some(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .with_filter(filter::LevelFilter::DEBUG),
        ),
        Err(error) => {
            print_error(format!("Could not open the log file {log_file:?}: {error}"));
            None
        }
    };

    tracing_subscriber::registry()
        .with(stderr_log)
        .with(debug_log)
        .init();
}

fn load_config(cli: &Cli) -> Result<ClientConfig, Error> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };

    if let Some(api_url) = &cli.api_url {
        config.api_base_url = api_url.clone();
        config.validate()?;
    }

    Ok(config)
}

async fn run(cli: Cli) -> Result<(), Error> {
    let config = load_config(&cli)?;
    let storage = SqliteStorage::open(&cli.state_path)?;
    let app = App::new(config, Arc::new(storage))?;

    match cli.command {
        Command::Login { username } => login(&app, username).await,
        Command::Signup {
            username,
            first_name,
            last_name,
        } => signup(&app, username, first_name, last_name).await,
        Command::Logout => {
            app.logout();
            println!("Logged out");
            Ok(())
        }
        Command::Status => {
            status(&app);
            Ok(())
        }
        Command::List(args) => list(&app, args.criteria()).await,
        Command::Add(args) => add(&app, args).await,
        Command::Edit(args) => edit(&app, args).await,
        Command::Delete { id } => delete(&app, id).await,
        Command::Report => report(&app).await,
    }
}

async fn login(app: &App, username: Option<String>) -> Result<(), Error> {
    let username = match username {
        Some(username) => username,
        None => prompt("Username: ")?,
    };
    let password = prompt_password("Password: ")?;

    app.auth().login(&username, &password)?;
    app.idle().await;
    check(app.auth().state().error_message)?;

    println!(
        "Logged in as {}",
        app.auth().username().unwrap_or(username)
    );
    Ok(())
}

async fn signup(
    app: &App,
    username: String,
    first_name: String,
    last_name: String,
) -> Result<(), Error> {
    let password = loop {
        let password = prompt_password("Choose a password: ")?;
        if let Err(error) = ValidatedPassword::new(&password, &[username.trim()]) {
            print_error(error);
            continue;
        }

        if prompt_password("Enter the same password again: ")? != password {
            print_error("Passwords must match, try again.");
            continue;
        }

        break password;
    };

    let form = SignupForm {
        first_name,
        last_name,
        username,
        confirm_password: password.clone(),
        password,
    };

    app.auth().signup(&form)?;
    app.idle().await;
    check(app.auth().state().error_message)?;

    println!("Account created, logged in as {}", form.username.trim());
    Ok(())
}

fn status(app: &App) {
    if !app.auth().is_authenticated() {
        println!("Not logged in");
        return;
    }

    let remaining = app.session().remaining_lifetime();
    println!(
        "Logged in as {}, session expires in {}h {}m",
        app.auth().username().unwrap_or_default(),
        remaining / 3600,
        remaining % 3600 / 60
    );
}

/// Open the expense list and wait for the expenses to load.
async fn loaded(app: &App) -> Result<(), Error> {
    if app.navigate(Route::Expenses) != Route::Expenses {
        return Err(Error::NotAuthenticated);
    }

    app.idle().await;
    check(app.expenses().state().error)
}

async fn list(app: &App, criteria: FilterCriteria) -> Result<(), Error> {
    loaded(app).await?;

    app.expenses().apply_filter(criteria);
    app.idle().await;
    let state = app.expenses().state();
    check(state.error.clone())?;

    for expense in state.filtered() {
        print_expense(&expense);
    }
    println!(
        "{} transactions, total {:.2}",
        state.count(),
        state.total_amount()
    );

    Ok(())
}

async fn add(app: &App, args: AddArgs) -> Result<(), Error> {
    let expense = Expense::build(args.kind, &args.category, args.amount, args.date, &args.account)
        .note(&args.note)
        .finalize()?;

    loaded(app).await?;
    save(app, expense).await
}

async fn edit(app: &App, args: EditArgs) -> Result<(), Error> {
    loaded(app).await?;

    let existing = app
        .expenses()
        .state()
        .expenses
        .into_iter()
        .find(|expense| expense.id == Some(args.id))
        .ok_or(Error::ExpenseNotFound(args.id))?;

    let mut builder = existing.edit();
    if let Some(kind) = args.kind {
        builder = builder.kind(kind);
    }
    if let Some(category) = &args.category {
        builder = builder.category(category);
    }
    if let Some(amount) = args.amount {
        builder = builder.amount(amount);
    }
    if let Some(date) = args.date {
        builder = builder.date(date);
    }
    if let Some(account) = &args.account {
        builder = builder.account(account);
    }
    if let Some(note) = &args.note {
        builder = builder.note(note);
    }

    save(app, builder.finalize()?).await
}

async fn save(app: &App, expense: Expense) -> Result<(), Error> {
    let existing_id = expense.id;
    let known: Vec<_> = app
        .expenses()
        .state()
        .expenses
        .iter()
        .filter_map(|expense| expense.id)
        .collect();

    app.expenses().upsert(expense);
    app.idle().await;
    let state = app.expenses().state();
    check(state.error)?;

    if let Some(id) = existing_id {
        println!("Updated expense {id}");
        return Ok(());
    }

    let created = state
        .expenses
        .iter()
        .filter_map(|expense| expense.id)
        .find(|id| !known.contains(id));
    match created {
        Some(id) => println!("Created expense {id}"),
        None => println!("Created expense"),
    }

    Ok(())
}

async fn delete(app: &App, id: ExpenseId) -> Result<(), Error> {
    loaded(app).await?;

    app.expenses().delete(id);
    app.idle().await;
    check(app.expenses().state().error)?;

    println!("Deleted expense {id}");
    Ok(())
}

async fn report(app: &App) -> Result<(), Error> {
    loaded(app).await?;

    let state = app.expenses().state();
    let summary = state.summary();

    println!("Income:   {:>12.2}", summary.total_income);
    println!("Expenses: {:>12.2}", summary.total_expenses);
    println!("Balance:  {:>12.2}", summary.balance);

    for kind in [ExpenseKind::Expense, ExpenseKind::Income] {
        let breakdown = category_breakdown(&state.expenses, kind);
        if breakdown.is_empty() {
            continue;
        }

        println!();
        println!("By {kind} category:");
        for total in breakdown {
            println!(
                "  {:<16} {:>12.2} {:>4}%",
                total.category, total.amount, total.percentage
            );
        }
    }

    Ok(())
}

fn print_expense(expense: &Expense) {
    println!(
        "{:>6}  {}  {:<7}  {:<16} {:>12.2}  {:<10} {}",
        expense.id.map(|id| id.to_string()).unwrap_or_default(),
        expense.date,
        expense.kind,
        expense.category,
        expense.amount,
        expense.account,
        expense.note
    );
}

fn check(error: Option<String>) -> Result<(), Error> {
    match error {
        Some(message) => Err(Error::Api(message)),
        None => Ok(()),
    }
}

fn prompt(message: &str) -> Result<String, Error> {
    print!("{message}");
    io::stdout()
        .flush()
        .map_err(|error| Error::Prompt(error.to_string()))?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|error| Error::Prompt(error.to_string()))?;

    Ok(line.trim().to_owned())
}

fn prompt_password(message: &str) -> Result<String, Error> {
    rpassword::prompt_password(message).map_err(|error| Error::Prompt(error.to_string()))
}

fn print_error(error: impl ToString) {
    eprintln!(
        "\x1b[31;1m{}\x1b[0m",
        capitalise_first_char(&error.to_string())
    )
}

fn capitalise_first_char(string: &str) -> String {
    let mut chars = string.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    first.to_uppercase().chain(chars).collect()
}
