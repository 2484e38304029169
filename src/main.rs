use inkwell::models::ListQuery;
use inkwell::{Portal, Settings};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds to reduce manual setup overhead.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let settings = Settings::from_env();
    info!(data_dir = %settings.data_dir.display(), "bootstrapping inkwell");

    let portal = Portal::from_settings(&settings);
    let boot = portal.initialize().await;
    info!(?boot, articles = portal.articles().len(), "article store ready");

    let session = portal.session();
    match session.username.as_deref() {
        Some(name) => info!(username = name, "resumed session"),
        None => info!("browsing anonymously"),
    }

    let feed = portal.home(&ListQuery::default());
    for (i, entry) in feed.article_rank.iter().enumerate() {
        info!(rank = i + 1, title = %entry.name, views = entry.score, "top article");
    }
    for (i, entry) in feed.author_rank.iter().enumerate() {
        info!(rank = i + 1, author = %entry.name, views = entry.score, "top author");
    }
    Ok(())
}
