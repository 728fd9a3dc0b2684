//! Event handling for msc-bot.
//!
//! This module turns incoming room messages into replies:
//! - Filtering out messages the bot must not answer
//! - Resolving the mentioned MSCs
//! - Formatting and sending the reply

pub mod room_message;
