//! A small framework for funnelling user actions into shared state.
//!
//! Actions are sent down a single ordered channel. A dispatcher task takes
//! them off the channel one at a time, lets the handler react to the
//! submission synchronously, and then runs the handler's asynchronous part
//! on its own task. Handlers therefore overlap, and their results land in
//! the [StateStore] in the order the handlers finish.
//!
//! Actions sent with [ActionStream::dispatch_debounced] pass through a
//! debounce stage first: a burst of actions sent in quick succession is
//! collapsed into the last one.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

/// An observable container holding an immutable snapshot of some state.
///
/// Readers always get a complete copy, writers replace the state through
/// [StateStore::patch].
#[derive(Debug)]
pub struct StateStore<S> {
    sender: Arc<watch::Sender<S>>,
}

impl<S> Clone for StateStore<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<S: Clone> StateStore<S> {
    /// Create a store holding `initial`.
    pub fn new(initial: S) -> Self {
        let (sender, _) = watch::channel(initial);

        Self {
            sender: Arc::new(sender),
        }
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> S {
        self.sender.borrow().clone()
    }

    /// Read the current state without copying it.
    pub fn with<R>(&self, read: impl FnOnce(&S) -> R) -> R {
        read(&self.sender.borrow())
    }

    /// Modify the state in place and notify subscribers.
    pub fn patch(&self, update: impl FnOnce(&mut S)) {
        self.sender.send_modify(update);
    }

    /// Get notified of every change to the state.
    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.sender.subscribe()
    }
}

/// Reacts to the actions taken off an [ActionStream].
#[async_trait]
pub trait ActionHandler<A: Send + 'static>: Send + Sync + 'static {
    /// Called by the dispatcher for each action in submission order, before
    /// [ActionHandler::handle] is spawned.
    fn submitted(&self, _action: &A) {}

    /// Carry out the action.
    ///
    /// Implementations must record their own failures, the dispatcher does
    /// not look at the outcome.
    async fn handle(&self, action: A);
}

/// Counts the actions that have been dispatched but not finished.
struct Pending {
    count: watch::Sender<usize>,
    observer: Box<dyn Fn(usize) + Send + Sync>,
}

impl Pending {
    fn start(&self) {
        self.count.send_modify(|count| {
            *count += 1;
            (self.observer)(*count);
        });
    }

    fn finish(&self) {
        self.count.send_modify(|count| {
            *count = count.saturating_sub(1);
            (self.observer)(*count);
        });
    }
}

impl std::fmt::Debug for Pending {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pending")
            .field("count", &*self.count.borrow())
            .finish_non_exhaustive()
    }
}

/// The sending half of an action stream.
///
/// Cloning gives another handle onto the same stream.
#[derive(Debug)]
pub struct ActionStream<A> {
    actions: mpsc::UnboundedSender<A>,
    debounced: mpsc::UnboundedSender<A>,
    pending: Arc<Pending>,
}

impl<A> Clone for ActionStream<A> {
    fn clone(&self) -> Self {
        Self {
            actions: self.actions.clone(),
            debounced: self.debounced.clone(),
            pending: self.pending.clone(),
        }
    }
}

/// The receiving half of an action stream, consumed by [ActionQueue::run].
#[derive(Debug)]
pub struct ActionQueue<A> {
    actions: mpsc::UnboundedReceiver<A>,
    pending: Arc<Pending>,
}

/// Create an action stream whose debounced actions wait for `debounce`
/// without a newer action before they are dispatched.
///
/// Must be called from within a Tokio runtime because the debounce stage
/// runs on its own task.
pub fn channel<A: Send + 'static>(debounce: Duration) -> (ActionStream<A>, ActionQueue<A>) {
    channel_with_observer(debounce, |_| {})
}

/// Like [channel], but `observer` is called with the number of unfinished
/// actions every time it changes.
///
/// The observer runs synchronously, so a debounced action counts as pending
/// from the moment it is sent.
pub fn channel_with_observer<A, F>(debounce: Duration, observer: F) -> (ActionStream<A>, ActionQueue<A>)
where
    A: Send + 'static,
    F: Fn(usize) + Send + Sync + 'static,
{
    let (actions, queue) = mpsc::unbounded_channel();
    let (debounced, debounce_input) = mpsc::unbounded_channel();
    let (count, _) = watch::channel(0usize);
    let pending = Arc::new(Pending {
        count,
        observer: Box::new(observer),
    });

    let superseded = pending.clone();
    spawn_debounce(debounce_input, actions.clone(), debounce, move |_| {
        superseded.finish();
    });

    (
        ActionStream {
            actions,
            debounced,
            pending: pending.clone(),
        },
        ActionQueue {
            actions: queue,
            pending,
        },
    )
}

impl<A: Send + 'static> ActionStream<A> {
    /// Send `action` straight to the dispatcher.
    pub fn dispatch(&self, action: A) {
        self.pending.start();

        if self.actions.send(action).is_err() {
            tracing::warn!("Action dropped, the dispatcher has stopped");
            self.pending.finish();
        }
    }

    /// Send `action` through the debounce stage.
    pub fn dispatch_debounced(&self, action: A) {
        self.pending.start();

        if self.debounced.send(action).is_err() {
            tracing::warn!("Action dropped, the debounce stage has stopped");
            self.pending.finish();
        }
    }

    /// The number of actions that have been dispatched but not finished.
    ///
    /// Actions collapsed by the debounce stage count as finished.
    pub fn pending(&self) -> usize {
        *self.pending.count.borrow()
    }

    /// Wait until every dispatched action has finished, including actions
    /// dispatched by handlers while waiting.
    pub async fn idle(&self) {
        let mut receiver = self.pending.count.subscribe();

        // The sender lives in `self`, so the channel cannot close here.
        let _ = receiver.wait_for(|count| *count == 0).await;
    }
}

impl<A: Send + 'static> ActionQueue<A> {
    /// Spawn the dispatcher that feeds every action to `handler`.
    ///
    /// The dispatcher stops once every [ActionStream] handle is dropped.
    pub fn run<H: ActionHandler<A>>(self, handler: Arc<H>) -> JoinHandle<()> {
        let ActionQueue {
            mut actions,
            pending,
        } = self;

        tokio::spawn(async move {
            while let Some(action) = actions.recv().await {
                handler.submitted(&action);

                let handler = handler.clone();
                let pending = pending.clone();
                tokio::spawn(async move {
                    handler.handle(action).await;
                    pending.finish();
                });
            }

            tracing::debug!("Action stream closed");
        })
    }
}

/// Forward items from `input` to `output` once no newer item has arrived
/// for `delay`. Items replaced by a newer one are passed to `superseded`.
pub fn spawn_debounce<T, F>(
    mut input: mpsc::UnboundedReceiver<T>,
    output: mpsc::UnboundedSender<T>,
    delay: Duration,
    superseded: F,
) -> JoinHandle<()>
where
    T: Send + 'static,
    F: Fn(T) + Send + 'static,
{
    tokio::spawn(async move {
        let mut waiting: Option<T> = None;

        loop {
            let Some(item) = waiting.take() else {
                match input.recv().await {
                    Some(item) => {
                        waiting = Some(item);
                        continue;
                    }
                    None => break,
                }
            };

            let newer = tokio::select! {
                newer = input.recv() => Some(newer),
                _ = tokio::time::sleep(delay) => None,
            };

            match newer {
                Some(Some(newer)) => {
                    superseded(item);
                    waiting = Some(newer);
                }
                Some(None) => {
                    let _ = output.send(item);
                    break;
                }
                None => {
                    if output.send(item).is_err() {
                        break;
                    }
                }
            }
        }
    })
}
