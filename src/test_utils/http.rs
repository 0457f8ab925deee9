use axum::Router;
use tokio::net::TcpListener;

/// Serve `router` on a random loopback port and return its base URL.
pub(crate) async fn spawn_mock_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Could not bind mock server");
    let address = listener
        .local_addr()
        .expect("Could not get mock server address");

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("Mock server stopped unexpectedly");
    });

    format!("http://{address}")
}
