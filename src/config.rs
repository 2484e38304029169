use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SEED_PATH: &str = "public/json/articles.json";

/// Runtime settings derived from the environment.
#[derive(Clone, Debug)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub seed_url: Option<String>,
    pub seed_path: PathBuf,
    pub publish_delay: Duration,
}

impl Settings {
    pub fn from_env() -> Self {
        fn path_env(name: &str, default: &str) -> PathBuf { PathBuf::from(std::env::var(name).unwrap_or_else(|_| default.to_string())) }
        fn ms_env(name: &str, default: u64) -> Duration { Duration::from_millis(std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)) }
        Self {
            data_dir: path_env("INKWELL_DATA_DIR", "data"),
            seed_url: std::env::var("INKWELL_SEED_URL").ok().filter(|u| !u.is_empty()),
            seed_path: path_env("INKWELL_SEED_PATH", DEFAULT_SEED_PATH),
            publish_delay: ms_env("INKWELL_PUBLISH_DELAY_MS", 1000),
        }
    }
}
