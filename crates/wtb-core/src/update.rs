//! The incremental-update engine: decides which posts are new for one uid.
//!
//! Two modes, selected by the watermark:
//! - cold start (watermark 0): page 0 only, bounded to the first few posts
//!   so a fresh subscription does not flood the group;
//! - incremental: bounded page walk that stops once a page yields an
//!   ordinary old post. A pinned post with an old id does not stop the walk,
//!   since pinned posts float to the top regardless of recency.

use tracing::debug;

use crate::{
    domain::Uid,
    formatting::format_post,
    ports::WeiboFeed,
    registry::PollEntry,
    Error, Result,
};

/// Cap on posts accepted the first time a uid is polled.
const FIRST_FETCH_LIMIT: usize = 5;
/// Highest page index fetched per incremental cycle (3 pages, ~30 posts).
const MAX_PAGE: u32 = 2;
/// The profile tab carrying the post feed.
const FEED_TAB_KEY: &str = "weibo";

/// Runs one update for one uid, mutating `entry` in place: accepted posts
/// are appended in fetch order and `last_seen` is raised to the highest id
/// observed. Any error leaves the caller to treat this uid as "no update
/// this cycle"; other uids are unaffected.
pub async fn check_user_updates(
    feed: &dyn WeiboFeed,
    uid: &Uid,
    entry: &mut PollEntry,
) -> Result<()> {
    let profile = feed.fetch_profile(uid).await?;
    let container_id = profile
        .container_id(FEED_TAB_KEY)
        .ok_or_else(|| Error::Upstream(format!("uid {uid} has no '{FEED_TAB_KEY}' tab")))?
        .to_string();

    if entry.last_seen == 0 {
        fetch_initial(feed, uid, &container_id, entry).await
    } else {
        fetch_incremental(feed, uid, &container_id, entry).await
    }
}

/// Cold start: take the first page as-is (pinned post included), capped.
async fn fetch_initial(
    feed: &dyn WeiboFeed,
    uid: &Uid,
    container_id: &str,
    entry: &mut PollEntry,
) -> Result<()> {
    let posts = feed.fetch_page(uid, container_id, 0).await?;

    let mut max_seen = entry.last_seen;
    for post in posts.into_iter().take(FIRST_FETCH_LIMIT) {
        max_seen = max_seen.max(post.id);
        entry.text.push(format_post(&post));
        entry.posts.push(post);
    }
    entry.last_seen = max_seen;
    Ok(())
}

/// Incremental: walk pages 0..=MAX_PAGE in order. Posts with id above the
/// watermark are accepted; an ordinary (non-pinned) post at or below it
/// means we have reached previously-seen territory, so no further pages are
/// fetched after the current one.
async fn fetch_incremental(
    feed: &dyn WeiboFeed,
    uid: &Uid,
    container_id: &str,
    entry: &mut PollEntry,
) -> Result<()> {
    let last_seen = entry.last_seen;
    let mut max_seen = last_seen;

    for page in 0..=MAX_PAGE {
        let posts = feed.fetch_page(uid, container_id, page).await?;

        let mut all_new = true;
        for post in posts {
            if post.id > last_seen {
                max_seen = max_seen.max(post.id);
                entry.text.push(format_post(&post));
                entry.posts.push(post);
            } else if !post.is_top {
                all_new = false;
            }
        }

        if !all_new {
            debug!(uid = %uid, page, "reached previously-seen posts");
            break;
        }
    }

    entry.last_seen = max_seen;
    Ok(())
}
