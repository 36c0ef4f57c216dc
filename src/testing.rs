//! In-process HTTP server used as a stand-in for Vault and the federation endpoint.

use axum::Router;
use reqwest::Url;
use tokio::net::TcpListener;

/// Serves `router` on an ephemeral localhost port and returns its base URL
/// (with a trailing slash, so `Url::join` appends).
pub async fn serve(router: Router) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{}/", addr).parse().unwrap()
}
