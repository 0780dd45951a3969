use serde::{Deserialize, Serialize};

/// Weibo user id. The upstream API returns it both as a number and a string;
/// it is kept as a string everywhere, including the persisted stores.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(pub String);

/// Chat group id (string form, used as a JSON object key in `follow.json`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

/// A followed account as stored in a group's list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub nickname: String,
    pub uid: Uid,
}

/// One upstream post, text already stripped to plain text.
///
/// Posts are never persisted; they only live for the duration of a poll
/// cycle before being formatted into outbound messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Post {
    /// Strictly increasing per user; proxy for chronological order.
    pub id: i64,
    pub created_at: String,
    pub text: String,
    pub url: String,
    /// Pinned posts float to the top of the feed regardless of recency.
    pub is_top: bool,
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
