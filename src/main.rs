use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use streamswap::allowlist::MerkleAllowList;
use streamswap::orchestration::{Collaborators, SystemClock};
use streamswap::permit::{DepositAuthorizer, SharedSecretAuthorizer};
use streamswap::settlement::{SettlementHook, WebhookSettlementHook};
use streamswap::{api, config::Config, db::init_db, Orchestrator, Repository};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("Configuration error")?;
    let port = config.port;

    let pool = init_db(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    let repo = Arc::new(Repository::new(pool));

    let authorizer = config.permit_secret.as_ref().map(|secret| {
        Arc::new(SharedSecretAuthorizer::new(secret.clone())) as Arc<dyn DepositAuthorizer>
    });
    let settlement_hook = config.settlement_webhook_url.as_ref().map(|url| {
        Arc::new(WebhookSettlementHook::new(url.clone())) as Arc<dyn SettlementHook>
    });

    // The creator's out supply is minted once; restarts replay the same reference.
    let stream = &config.stream;
    repo.credit(
        &format!("genesis:{}", stream.out_asset),
        &stream.out_asset,
        &stream.creator,
        stream.out_supply,
    )
    .await
    .context("Failed to credit the out supply")?;

    let collaborators = Collaborators {
        store: repo.clone(),
        allowlist: Arc::new(MerkleAllowList),
        authorizer,
        clock: Arc::new(SystemClock),
    };
    let orchestrator = Orchestrator::start(config.stream.clone(), collaborators, settlement_hook)
        .await
        .context("Failed to start stream")?;

    let app = api::create_router(api::AppState::new(repo, config, Arc::new(orchestrator)));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
