use async_trait::async_trait;

use crate::{
    domain::{GroupId, Post, Uid},
    Result,
};

/// A user profile page: nickname plus the feed tabs the upstream exposes.
#[derive(Clone, Debug)]
pub struct UserProfile {
    pub uid: Uid,
    pub nickname: String,
    pub tabs: Vec<FeedTab>,
}

/// One feed tab on a profile ("weibo" for posts, "album" for media, ...).
/// The container id is opaque and selects which feed a page request targets.
#[derive(Clone, Debug)]
pub struct FeedTab {
    pub key: String,
    pub container_id: String,
}

impl UserProfile {
    pub fn container_id(&self, key: &str) -> Option<&str> {
        self.tabs
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.container_id.as_str())
    }
}

/// A user found via nickname search.
#[derive(Clone, Debug)]
pub struct UserSummary {
    pub uid: Uid,
    pub nickname: String,
}

/// Upstream feed port.
///
/// The m.weibo.cn container API is the first implementation; all calls are
/// unauthenticated best-effort HTTP and may fail at any time, so callers
/// must contain failures at the smallest unit of work (one uid).
#[async_trait]
pub trait WeiboFeed: Send + Sync {
    async fn fetch_profile(&self, uid: &Uid) -> Result<UserProfile>;

    /// One page of posts for (uid, container, page), in API order
    /// (reverse-chronological, pinned post possibly first).
    async fn fetch_page(&self, uid: &Uid, container_id: &str, page: u32) -> Result<Vec<Post>>;

    async fn search_by_nickname(&self, nickname: &str) -> Result<Option<UserSummary>>;
}

/// Outbound group messaging port, implemented by the chat adapter.
#[async_trait]
pub trait GroupMessenger: Send + Sync {
    async fn send_to_group(&self, group: &GroupId, text: &str) -> Result<()>;
}
