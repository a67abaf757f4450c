use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;

    let db = mock_server::MockState::new();
    if let Some(n) = std::env::var("MOCK_FAIL_FIRST").ok().and_then(|s| s.parse().ok()) {
        db.fail_next(n);
    }
    tracing::info!(%addr, "mock tour backend listening");
    mock_server::run_with(listener, db).await
}
