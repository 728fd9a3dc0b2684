//! Library root for `msc-bot`.
//!
//! Msc-bot is a Matrix bot that watches the rooms it has joined for mentions of
//! Matrix Spec Change proposals (`msc1234`) and answers with a link to each one:
//! - Mentions are matched case-insensitively and reported once, in order
//! - Titles and authors are looked up on GitHub, or links are built directly
//! - Notices are never answered, so bots do not talk to each other in loops
//!
//! The architecture is built around small traits for the chat platform and
//! the MSC resolver, so that either can be swapped or mocked.

#![recursion_limit = "256"]

#[deny(missing_docs)]
pub mod base;
pub mod interaction;
pub mod runtime;
pub mod scanner;
pub mod service;

use base::{config::Config, types::Void};
use tracing::info;

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the msc-bot runtime:
/// - Creates the runtime context with the scanner, resolver, and chat client
/// - Starts the Matrix sync loop for processing messages
pub async fn start(config: Config) -> Void {
    info!("Starting msc-bot ...");

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    // Start the runtime.
    runtime.start().await?;

    Ok(())
}
