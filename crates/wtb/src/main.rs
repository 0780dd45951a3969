use std::sync::Arc;

use wtb_core::{config::Config, ports::WeiboFeed, registry::FollowRegistry};
use wtb_weibo::WeiboClient;

#[tokio::main]
async fn main() -> Result<(), wtb_core::Error> {
    wtb_core::logging::init("wtb")?;

    let cfg = Arc::new(Config::load()?);
    let registry = FollowRegistry::open(&cfg.data_dir)?;
    let feed: Arc<dyn WeiboFeed> = Arc::new(WeiboClient::new(
        cfg.weibo_api_base.clone(),
        cfg.fetch_timeout,
    )?);

    wtb_telegram::router::run_polling(cfg, registry, feed)
        .await
        .map_err(|e| wtb_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
