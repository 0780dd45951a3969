use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration, loaded from the environment (with `.env` support).
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,

    /// Directory holding `follow.json` and `record.json`.
    pub data_dir: PathBuf,

    /// Fixed interval between poll cycles.
    pub poll_interval: Duration,

    /// Per-request timeout for upstream fetches. The container API is
    /// unbounded-latency I/O, so every request carries a deadline.
    pub fetch_timeout: Duration,

    /// Base URL of the upstream container API.
    pub weibo_api_base: String,
}

const DEFAULT_POLL_INTERVAL_SECS: u64 = 600;
const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_API_BASE: &str = "https://m.weibo.cn";

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let data_dir = env_path("WTB_DATA_DIR").unwrap_or_else(|| PathBuf::from("./data"));
        fs::create_dir_all(&data_dir)?;

        let poll_interval = Duration::from_secs(
            env_u64("POLL_INTERVAL_SECS").unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        );
        let fetch_timeout =
            Duration::from_millis(env_u64("FETCH_TIMEOUT_MS").unwrap_or(DEFAULT_FETCH_TIMEOUT_MS));

        let weibo_api_base = env_str("WEIBO_API_BASE")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Ok(Self {
            telegram_bot_token,
            data_dir,
            poll_interval,
            fetch_timeout,
            weibo_api_base,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}
