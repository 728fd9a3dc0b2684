use std::sync::Arc;

use tracing::{Instrument, debug, error, info, instrument, warn};

use crate::{
    base::types::{Msc, Void, format_reply},
    scanner::{IncomingMessage, MscScanner},
    service::{chat::ChatClient, resolver::MscResolver},
};

/// A room message, stripped of everything platform specific.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMessage {
    pub room_id: String,
    pub event_id: String,
    pub sender: String,
    /// Whether the event replaces (edits) an earlier message.
    pub is_edit: bool,
    pub message: IncomingMessage,
}

#[instrument(skip_all, fields(room_id = %event.room_id, event_id = %event.event_id))]
pub fn handle_room_message(event: RoomMessage, scanner: Arc<MscScanner>, resolver: MscResolver, chat: ChatClient) {
    tokio::spawn(
        async move {
            // Process the event.
            let result = process_room_message(&event, &scanner, &resolver, &chat).await;

            // Log any errors.
            if let Err(err) = &result {
                error!("Error while handling: {}", err);
            }
        }
        .in_current_span(),
    );
}

/// Answer a single room message, if it mentions any MSCs.
#[instrument(skip_all)]
pub async fn process_room_message(event: &RoomMessage, scanner: &MscScanner, resolver: &MscResolver, chat: &ChatClient) -> Void {
    // Ignore messages we have sent ourselves.
    if event.sender == chat.bot_user_id() {
        return Ok(());
    }

    // Edits would only repeat the answer to the original message.
    if event.is_edit {
        debug!("Skipping message edit.");
        return Ok(());
    }

    // The scanner drops notices, which other bots may be posting.
    let references = scanner.scan(&event.message);
    if references.is_empty() {
        return Ok(());
    }

    let mut mscs = Vec::with_capacity(references.len());

    for reference in references {
        debug!("Resolving MSC{} ...", reference.id);

        match resolver.resolve(&reference).await {
            Ok(Some(msc)) => mscs.push(msc),
            Ok(None) => debug!("MSC{} is not a proposal; skipping.", reference.id),
            Err(err) => {
                warn!("Failed to resolve MSC{}, linking it directly: {}", reference.id, err);
                mscs.push(Msc::from(reference));
            }
        }
    }

    let Some(reply) = format_reply(&mscs) else {
        debug!("No suitable MSCs found. Not responding.");
        return Ok(());
    };

    info!("Replying with {} MSC(s) ...", mscs.len());

    chat.send_notice(&event.room_id, &reply).await
}
