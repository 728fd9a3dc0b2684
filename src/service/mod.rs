//! Service integrations for external APIs and clients.
//!
//! This module contains implementations for the services used by the msc-bot:
//! - Chat services (e.g., Matrix)
//! - MSC resolvers (e.g., GitHub)
//!
//! Each service module defines both generic traits and concrete implementations,
//! allowing for extensibility and easy testing.

pub mod chat;
pub mod resolver;
