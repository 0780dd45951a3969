//! Core domain + application logic for the Weibo group-forwarder bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the Weibo
//! container API live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod poll;
pub mod ports;
pub mod registry;
pub mod storage;
pub mod update;

pub use errors::{Error, Result};
