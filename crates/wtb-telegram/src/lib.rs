//! Telegram adapter (teloxide).
//!
//! Implements the `wtb-core` GroupMessenger port over the Bot API and hosts
//! the command handlers for managing a group's follow list.

use async_trait::async_trait;

use teloxide::prelude::*;

use tokio::time::sleep;

pub mod commands;
pub mod router;

use wtb_core::{
    domain::GroupId,
    errors::Error,
    ports::GroupMessenger,
    Result,
};

#[derive(Clone)]
pub struct TelegramGroupMessenger {
    bot: Bot,
}

impl TelegramGroupMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(group: &GroupId) -> Result<teloxide::types::ChatId> {
        let id = group
            .0
            .parse::<i64>()
            .map_err(|_| Error::External(format!("group id is not numeric: {}", group.0)))?;
        Ok(teloxide::types::ChatId(id))
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }
}

#[async_trait]
impl GroupMessenger for TelegramGroupMessenger {
    async fn send_to_group(&self, group: &GroupId, text: &str) -> Result<()> {
        let chat = Self::tg_chat(group)?;

        // One RetryAfter retry; anything else bubbles up to the dispatch
        // layer, which logs and moves on to the next group.
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match self.bot.send_message(chat, text).await {
                Ok(_) => return Ok(()),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}
