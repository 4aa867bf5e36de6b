use twosome::{auth::Tokens, logging, store::Store, AppState, Config};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let config = Config::from_env()?;
    logging::init(&config.log_level)?;

    let store = Store::connect(&config.database_url, config.db_max_connections).await?;
    let tokens = Tokens::new(config.jwt_secret.as_bytes(), config.token_ttl);
    let app_state = AppState::new(store, tokens, config.room_code_digits);

    let app = twosome::router(app_state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
