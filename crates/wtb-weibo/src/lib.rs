//! Weibo container-API adapter.
//!
//! This crate implements the `wtb-core` WeiboFeed port over the public
//! m.weibo.cn `getIndex` endpoint. All calls are unauthenticated; the JSON
//! shape is best-effort and parse failures surface as upstream errors.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use wtb_core::{
    domain::{Post, Uid},
    ports::{UserProfile, UserSummary, WeiboFeed},
    Error, Result,
};

mod parse;

const GET_INDEX_PATH: &str = "/api/container/getIndex";
/// Search container prefix; the nickname is appended as the `q` sub-field.
const SEARCH_CONTAINER_PREFIX: &str = "100103type=3&q=";

#[derive(Clone, Debug)]
pub struct WeiboClient {
    http: reqwest::Client,
    base: String,
}

impl WeiboClient {
    pub fn new(base: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base: base.into(),
        })
    }

    async fn get_index(&self, query: &[(&str, String)]) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base, GET_INDEX_PATH);
        debug!(%url, "upstream fetch");
        let rsp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("request failed: {e}")))?
            .error_for_status()
            .map_err(|e| Error::Upstream(format!("bad status: {e}")))?;

        rsp.json::<serde_json::Value>()
            .await
            .map_err(|e| Error::Upstream(format!("response is not json: {e}")))
    }
}

#[async_trait]
impl WeiboFeed for WeiboClient {
    async fn fetch_profile(&self, uid: &Uid) -> Result<UserProfile> {
        let body = self
            .get_index(&[("type", "uid".to_string()), ("value", uid.0.clone())])
            .await?;
        parse::profile(&body)
    }

    async fn fetch_page(&self, uid: &Uid, container_id: &str, page: u32) -> Result<Vec<Post>> {
        let body = self
            .get_index(&[
                ("type", "uid".to_string()),
                ("value", uid.0.clone()),
                ("containerid", container_id.to_string()),
                ("page", page.to_string()),
            ])
            .await?;
        parse::page_posts(&body)
    }

    async fn search_by_nickname(&self, nickname: &str) -> Result<Option<UserSummary>> {
        // The search container id itself carries an encoded query string;
        // reqwest percent-encodes the inner `=`/`&` when serializing it.
        let body = self
            .get_index(&[
                (
                    "containerid",
                    format!("{SEARCH_CONTAINER_PREFIX}{nickname}"),
                ),
                ("page_type", "searchall".to_string()),
            ])
            .await?;
        Ok(parse::search_user(&body, nickname))
    }
}
