use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Where the initial article dataset comes from.
///
/// Records come back as raw JSON so one bad record cannot sink the whole
/// document; the article store normalizes them one by one.
#[async_trait]
pub trait SeedSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Value>, SeedError>;
    fn describe(&self) -> String;
}

/// Seed document served over HTTP (the static `/json/articles.json` resource).
pub struct HttpSeed {
    client: reqwest::Client,
    url: String,
}

impl HttpSeed {
    pub fn new(url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), url: url.into() }
    }
}

#[async_trait]
impl SeedSource for HttpSeed {
    async fn fetch(&self) -> Result<Vec<Value>, SeedError> {
        let articles = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Value>>()
            .await?;
        Ok(articles)
    }
    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Seed document read from disk.
pub struct FileSeed {
    path: PathBuf,
}

impl FileSeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SeedSource for FileSeed {
    async fn fetch(&self) -> Result<Vec<Value>, SeedError> {
        let bytes = tokio::fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
