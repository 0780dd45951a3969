//! JSON parsing for the container API.
//!
//! The API wraps everything in `{"ok": .., "data": {..}}`. Posts arrive as
//! "cards"; only `card_type == 9` cards are posts. Nickname search returns a
//! nested card group (`card_type == 11` holding `card_type == 10` users).

use serde_json::Value;

use wtb_core::{
    domain::{Post, Uid},
    formatting::strip_markup,
    ports::{FeedTab, UserProfile, UserSummary},
    Error, Result,
};

const CARD_TYPE_POST: i64 = 9;
const CARD_TYPE_USER: i64 = 10;
const CARD_TYPE_USER_GROUP: i64 = 11;

fn data<'a>(body: &'a Value) -> Result<&'a Value> {
    body.get("data")
        .ok_or_else(|| Error::Upstream("response has no 'data'".to_string()))
}

pub fn profile(body: &Value) -> Result<UserProfile> {
    let data = data(body)?;
    let user_info = data
        .get("userInfo")
        .ok_or_else(|| Error::Upstream("profile has no 'userInfo'".to_string()))?;

    let uid = user_info
        .get("id")
        .and_then(id_string)
        .ok_or_else(|| Error::Upstream("profile has no user id".to_string()))?;
    let nickname = user_info
        .get("screen_name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Upstream("profile has no screen_name".to_string()))?
        .to_string();

    let mut tabs = Vec::new();
    if let Some(raw_tabs) = data
        .get("tabsInfo")
        .and_then(|t| t.get("tabs"))
        .and_then(Value::as_array)
    {
        for tab in raw_tabs {
            let (Some(key), Some(container_id)) = (
                tab.get("tabKey").and_then(Value::as_str),
                tab.get("containerid").and_then(Value::as_str),
            ) else {
                continue;
            };
            tabs.push(FeedTab {
                key: key.to_string(),
                container_id: container_id.to_string(),
            });
        }
    }

    Ok(UserProfile {
        uid: Uid(uid),
        nickname,
        tabs,
    })
}

pub fn page_posts(body: &Value) -> Result<Vec<Post>> {
    let cards = data(body)?
        .get("cards")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Upstream("page has no 'cards'".to_string()))?;

    let mut posts = Vec::new();
    for card in cards {
        if card.get("card_type").and_then(Value::as_i64) != Some(CARD_TYPE_POST) {
            continue;
        }
        let mblog = card
            .get("mblog")
            .ok_or_else(|| Error::Upstream("post card has no 'mblog'".to_string()))?;

        let id = mblog
            .get("id")
            .and_then(post_id)
            .ok_or_else(|| Error::Upstream("post has no numeric id".to_string()))?;
        let created_at = mblog
            .get("created_at")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let text = strip_markup(mblog.get("text").and_then(Value::as_str).unwrap_or_default());
        let url = card
            .get("scheme")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Upstream("post card has no 'scheme'".to_string()))?
            .to_string();
        let is_top = mblog.get("isTop").and_then(Value::as_i64).unwrap_or(0) == 1;

        posts.push(Post {
            id,
            created_at,
            text,
            url,
            is_top,
        });
    }
    Ok(posts)
}

/// First exact screen_name match among the search result user cards.
pub fn search_user(body: &Value, nickname: &str) -> Option<UserSummary> {
    let cards = data(body).ok()?.get("cards")?.as_array()?;

    for outer in cards {
        if outer.get("card_type").and_then(Value::as_i64) != Some(CARD_TYPE_USER_GROUP) {
            continue;
        }
        let Some(group) = outer.get("card_group").and_then(Value::as_array) else {
            continue;
        };
        for card in group {
            if card.get("card_type").and_then(Value::as_i64) != Some(CARD_TYPE_USER) {
                continue;
            }
            let Some(user) = card.get("user") else {
                continue;
            };
            if user.get("screen_name").and_then(Value::as_str) != Some(nickname) {
                continue;
            }
            let uid = user.get("id").and_then(id_string)?;
            return Some(UserSummary {
                uid: Uid(uid),
                nickname: nickname.to_string(),
            });
        }
    }
    None
}

/// User ids appear as numbers or strings depending on the endpoint.
fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Post ids are decimal strings in `mblog`, but tolerate plain numbers.
fn post_id(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
