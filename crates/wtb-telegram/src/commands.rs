use std::sync::Arc;

use teloxide::prelude::*;

use tracing::warn;

use wtb_core::domain::{GroupId, Person, Uid};

use crate::router::AppState;

const USAGE_ADD: &str = "Follow a Weibo account. Give a uid or a nickname; \
uid wins when both are given.\n\n\
/weibo_add -u UID\n\
/weibo_add -n NICKNAME";

const USAGE_DEL: &str = "Unfollow a Weibo account. Give a uid or a nickname; \
uid wins when both are given.\n\n\
/weibo_del -u UID\n\
/weibo_del -n NICKNAME";

const HELP: &str = "Forwards new Weibo posts from followed accounts to this group.\n\n\
/weibo_list - show this group's follow list\n\
/weibo_add - follow an account (admins only)\n\
/weibo_del - unfollow an account (admins only)";

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

#[derive(Debug, Default, PartialEq, Eq)]
struct FollowArgs {
    uid: Option<String>,
    nickname: Option<String>,
}

fn parse_follow_args(rest: &str) -> FollowArgs {
    let mut args = FollowArgs::default();
    let mut tokens = rest.split_whitespace();
    while let Some(tok) = tokens.next() {
        match tok {
            "-u" | "--uid" => args.uid = tokens.next().map(|s| s.to_string()),
            "-n" | "--nickname" => args.nickname = tokens.next().map(|s| s.to_string()),
            _ => {}
        }
    }
    args
}

pub async fn handle_command(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let (cmd, rest) = parse_command(msg.text().unwrap_or(""));

    match cmd.as_str() {
        "weibo_list" => list_follows(bot, msg, state).await,
        "weibo_add" => add_follow(bot, msg, state, &rest).await,
        "weibo_del" => del_follow(bot, msg, state, &rest).await,
        "start" | "help" => {
            let _ = bot.send_message(msg.chat.id, HELP).await;
            Ok(())
        }
        _ => Ok(()),
    }
}

/// All three commands are group-scoped; a private chat gets a terse refusal.
async fn require_group(bot: &Bot, msg: &Message) -> ResponseResult<Option<GroupId>> {
    if msg.chat.is_group() || msg.chat.is_supergroup() {
        return Ok(Some(GroupId(msg.chat.id.0.to_string())));
    }
    bot.send_message(msg.chat.id, "This command only works in a group chat.")
        .await?;
    Ok(None)
}

/// Mutating commands additionally require the sender to be owner or admin.
async fn require_admin(bot: &Bot, msg: &Message) -> ResponseResult<bool> {
    let Some(user) = msg.from() else {
        return Ok(false);
    };

    let is_admin = bot
        .get_chat_member(msg.chat.id, user.id)
        .await
        .map(|member| member.is_privileged())
        .unwrap_or(false);

    if !is_admin {
        bot.send_message(
            msg.chat.id,
            "Only the group owner or admins can change the follow list.",
        )
        .await?;
    }
    Ok(is_admin)
}

async fn list_follows(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(group) = require_group(&bot, &msg).await? else {
        return Ok(());
    };

    let following = state.registry.list_follows(&group).await;
    let reply = if following.is_empty() {
        "The follow list is empty.".to_string()
    } else {
        let mut reply = "Followed accounts:".to_string();
        for person in &following {
            reply.push('\n');
            reply.push_str(&person.nickname);
        }
        reply
    };

    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn add_follow(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
    rest: &str,
) -> ResponseResult<()> {
    let Some(group) = require_group(&bot, &msg).await? else {
        return Ok(());
    };
    if !require_admin(&bot, &msg).await? {
        return Ok(());
    }

    let args = parse_follow_args(rest);
    let person = if let Some(uid) = args.uid {
        // uid given: resolve the nickname from the profile
        let uid = Uid(uid);
        match state.feed.fetch_profile(&uid).await {
            Ok(profile) => Person {
                nickname: profile.nickname,
                uid,
            },
            Err(e) => {
                warn!(uid = %uid, error = %e, "profile lookup failed");
                bot.send_message(msg.chat.id, "Could not fetch that uid's profile.")
                    .await?;
                return Ok(());
            }
        }
    } else if let Some(nickname) = args.nickname {
        // nickname given: search for the uid
        match state.feed.search_by_nickname(&nickname).await {
            Ok(Some(user)) => Person {
                nickname: user.nickname,
                uid: user.uid,
            },
            Ok(None) => {
                bot.send_message(msg.chat.id, "No user found with that nickname.")
                    .await?;
                return Ok(());
            }
            Err(e) => {
                warn!(nickname = %nickname, error = %e, "nickname search failed");
                bot.send_message(msg.chat.id, "Search failed, try again later.")
                    .await?;
                return Ok(());
            }
        }
    } else {
        bot.send_message(msg.chat.id, USAGE_ADD).await?;
        return Ok(());
    };

    // Persistence failures stay internal; the in-memory list is updated
    // either way.
    if let Err(e) = state.registry.add_follow(&group, person.clone()).await {
        warn!(group = %group, error = %e, "failed to persist follow list");
    }

    bot.send_message(
        msg.chat.id,
        format!("Added:\n{} ({})", person.nickname, person.uid),
    )
    .await?;
    Ok(())
}

async fn del_follow(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
    rest: &str,
) -> ResponseResult<()> {
    let Some(group) = require_group(&bot, &msg).await? else {
        return Ok(());
    };
    if !require_admin(&bot, &msg).await? {
        return Ok(());
    }

    let args = parse_follow_args(rest);
    let person = if let Some(uid) = args.uid {
        state.registry.find_by_uid(&group, &Uid(uid)).await
    } else if let Some(nickname) = args.nickname {
        state.registry.find_by_nickname(&group, &nickname).await
    } else {
        bot.send_message(msg.chat.id, USAGE_DEL).await?;
        return Ok(());
    };

    let Some(person) = person else {
        bot.send_message(
            msg.chat.id,
            "That account is not in this group's follow list.",
        )
        .await?;
        return Ok(());
    };

    if let Err(e) = state.registry.remove_follow(&group, &person).await {
        warn!(group = %group, error = %e, "failed to persist follow list");
    }

    bot.send_message(
        msg.chat.id,
        format!("Removed:\n{} ({})", person.nickname, person.uid),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_command_strips_slash_and_bot_mention() {
        assert_eq!(
            parse_command("/weibo_add@somebot -u 123"),
            ("weibo_add".to_string(), "-u 123".to_string())
        );
        assert_eq!(parse_command("/WEIBO_LIST"), ("weibo_list".to_string(), String::new()));
    }

    #[test]
    fn follow_args_take_both_flags_in_any_order() {
        assert_eq!(
            parse_follow_args("-n someone -u 123"),
            FollowArgs {
                uid: Some("123".to_string()),
                nickname: Some("someone".to_string()),
            }
        );
        assert_eq!(
            parse_follow_args("--uid 456"),
            FollowArgs {
                uid: Some("456".to_string()),
                nickname: None,
            }
        );
        assert_eq!(parse_follow_args(""), FollowArgs::default());
    }

    #[test]
    fn follow_args_ignore_stray_tokens() {
        assert_eq!(
            parse_follow_args("please -u 123 thanks"),
            FollowArgs {
                uid: Some("123".to_string()),
                nickname: None,
            }
        );
    }
}
