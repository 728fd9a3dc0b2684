//! Runtime services and shared state for the msc-bot.

use std::sync::Arc;

use tracing::instrument;

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    scanner::MscScanner,
    service::{chat::ChatClient, resolver::MscResolver},
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the scanner, resolver, chat client, and configuration.
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The scanner that finds MSC mentions.
    pub scanner: Arc<MscScanner>,
    /// The MSC resolver instance.
    pub resolver: MscResolver,
    /// The chat client instance.
    pub chat: ChatClient,
}

impl Runtime {
    /// Create a new runtime instance.
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> Res<Self> {
        // Initialize the scanner.
        let scanner = Arc::new(MscScanner::new(config.msc_url_base()));

        // Initialize the resolver.
        let resolver = MscResolver::from_config(&config)?;

        // Initialize the matrix client.
        let chat = ChatClient::matrix(&config, scanner.clone(), resolver.clone()).await?;

        Ok(Self { config, scanner, resolver, chat })
    }

    pub async fn start(&self) -> Void {
        self.chat.start().await
    }
}
