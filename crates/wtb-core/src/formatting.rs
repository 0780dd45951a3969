use regex::Regex;

use crate::domain::Post;

const MESSAGE_SEPARATOR: &str = "====================";

/// Strip upstream markup from post text: removes whitespace runs and
/// tag-like `<...>` substrings, leaving plain text only.
pub fn strip_markup(text: &str) -> String {
    let re = Regex::new(r"(?s)\s|<.*?>").expect("valid regex");
    re.replace_all(text, "").into_owned()
}

/// One post as it appears inside an outbound message.
pub fn format_post(post: &Post) -> String {
    format!("{}\n{}\n{}\n", post.created_at, post.text, post.url)
}

/// The single per-user message sent to every subscribed group:
/// nickname, separator, then the new posts' text in fetch order.
pub fn compose_update_message(nickname: &str, text: &[String]) -> String {
    format!("{nickname}\n{MESSAGE_SEPARATOR}\n{}", text.join("\n"))
}
