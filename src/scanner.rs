//! Detection of MSC mentions in message bodies.
//!
//! The scanner is a pure function of the message: it holds no mutable state
//! and can be shared freely between concurrently handled events.

use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;

use crate::base::types::{Msc, format_reply};

/// Matches `msc` (any case) immediately followed by the proposal number.
///
/// Only ASCII digits count; `\d` would also take other scripts' digits, which
/// do not parse as a number.
static MSC_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)msc([0-9]+)").expect("MSC pattern is valid"));

/// Default base of the proposal links.
pub const DEFAULT_URL_BASE: &str = "https://github.com/matrix-org/matrix-spec-proposals/issues";

// Types.

/// The kind of an incoming message, as far as the scanner cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Automated output (`m.notice`); never answered.
    Notice,
    /// Regular user text (`m.text`, `m.emote`).
    Normal,
    /// Anything else that still carries a body.
    Other,
}

/// A message as handed over by the chat adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub body: String,
    pub kind: MessageKind,
}

impl IncomingMessage {
    pub fn new(body: impl Into<String>, kind: MessageKind) -> Self {
        Self { body: body.into(), kind }
    }
}

/// A proposal mentioned in a message, with its link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MscReference {
    pub id: u32,
    pub url: String,
}

// Scanner.

/// Extracts [`MscReference`]s from messages.
#[derive(Debug, Clone)]
pub struct MscScanner {
    url_base: String,
}

impl Default for MscScanner {
    fn default() -> Self {
        Self::new(DEFAULT_URL_BASE)
    }
}

impl MscScanner {
    /// Create a scanner whose links are `{url_base}/{id}`.
    pub fn new(url_base: impl Into<String>) -> Self {
        let url_base = url_base.into().trim_end_matches('/').to_string();
        Self { url_base }
    }

    /// Build the reference for a proposal number.
    pub fn reference(&self, id: u32) -> MscReference {
        MscReference {
            id,
            url: format!("{}/{}", self.url_base, id),
        }
    }

    /// Distinct references in the message, in order of first appearance.
    ///
    /// Notices always yield nothing. Numbers too large for a `u32` are not
    /// proposals and are skipped.
    pub fn scan(&self, message: &IncomingMessage) -> Vec<MscReference> {
        if message.kind == MessageKind::Notice {
            return Vec::new();
        }

        let mut seen = HashSet::new();

        MSC_PATTERN
            .captures_iter(&message.body)
            .filter_map(|captures| captures[1].parse::<u32>().ok())
            .filter(|id| seen.insert(*id))
            .map(|id| self.reference(id))
            .collect()
    }

    /// One `MSC{id}: {url}` line per reference in the message.
    pub fn replies(&self, message: &IncomingMessage) -> Vec<String> {
        self.scan(message).into_iter().map(|reference| Msc::from(reference).format(true)).collect()
    }

    /// The reply the bot sends for the message when no metadata is looked up,
    /// or `None` when there is nothing to say.
    pub fn reply(&self, message: &IncomingMessage) -> Option<String> {
        let mscs: Vec<Msc> = self.scan(message).into_iter().map(Msc::from).collect();

        format_reply(&mscs)
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    fn text(body: &str) -> IncomingMessage {
        IncomingMessage::new(body, MessageKind::Normal)
    }

    fn ids(references: &[MscReference]) -> Vec<u32> {
        references.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_notice_is_ignored() {
        let scanner = MscScanner::default();

        for body in ["msc1234", "MSC1 and MSC2", "nothing here"] {
            let message = IncomingMessage::new(body, MessageKind::Notice);
            assert!(scanner.scan(&message).is_empty());
            assert!(scanner.replies(&message).is_empty());
            assert_eq!(scanner.reply(&message), None);
        }
    }

    #[test]
    fn test_single_reference() {
        let scanner = MscScanner::default();

        let references = scanner.scan(&text("have you read msc1234?"));

        assert_eq!(
            references,
            vec![MscReference {
                id: 1234,
                url: "https://github.com/matrix-org/matrix-spec-proposals/issues/1234".to_string(),
            }]
        );
    }

    #[test]
    fn test_duplicates_reported_once() {
        let scanner = MscScanner::default();

        assert_eq!(ids(&scanner.scan(&text("MSC42 and msc42"))), vec![42]);
        assert_eq!(ids(&scanner.scan(&text("msc042 is msc42"))), vec![42]);
    }

    #[test]
    fn test_order_of_first_appearance() {
        let scanner = MscScanner::default();

        assert_eq!(ids(&scanner.scan(&text("msc1 msc2"))), vec![1, 2]);
        assert_eq!(ids(&scanner.scan(&text("Msc3575 vs msc2716, then MSC3575 again"))), vec![3575, 2716]);
    }

    #[test]
    fn test_no_match() {
        let scanner = MscScanner::default();

        for body in ["", "msc", "msc-1234", "msc 1234", "the mscs are great", "1234"] {
            assert!(scanner.scan(&text(body)).is_empty(), "matched {body:?}");
            assert_eq!(scanner.reply(&text(body)), None);
        }
    }

    #[test]
    fn test_other_kinds_are_scanned() {
        let scanner = MscScanner::default();

        let message = IncomingMessage::new("msc1767-extensible-events.pdf", MessageKind::Other);

        assert_eq!(ids(&scanner.scan(&message)), vec![1767]);
    }

    #[test]
    fn test_embedded_tokens_match() {
        let scanner = MscScanner::default();

        assert_eq!(ids(&scanner.scan(&text("(msc2444)"))), vec![2444]);
        assert_eq!(ids(&scanner.scan(&text("xmsc12y"))), vec![12]);
    }

    #[test]
    fn test_only_ascii_digits_are_taken() {
        let scanner = MscScanner::default();

        assert_eq!(ids(&scanner.scan(&text("msc12\u{0663} please"))), vec![12]);
        assert!(scanner.scan(&text("msc\u{0661}\u{0662}")).is_empty());
    }

    #[test]
    fn test_oversized_number_is_skipped() {
        let scanner = MscScanner::default();

        assert_eq!(ids(&scanner.scan(&text("msc99999999999999999999 msc7"))), vec![7]);
    }

    #[test]
    fn test_replies_and_reply() {
        let scanner = MscScanner::new("https://example.org/proposals/");
        let message = text("msc1 msc2");

        assert_eq!(scanner.replies(&message), vec!["MSC1: https://example.org/proposals/1", "MSC2: https://example.org/proposals/2"]);
        assert_eq!(
            scanner.reply(&message).as_deref(),
            Some("MSC1: https://example.org/proposals/1\n\nMSC2: https://example.org/proposals/2")
        );
    }

    #[test]
    fn test_single_reply_matches_sent_format() {
        let scanner = MscScanner::new("https://example.org/proposals");

        assert_eq!(scanner.reply(&text("msc42")).as_deref(), Some("[MSC42](https://example.org/proposals/42)"));
    }

    #[test]
    fn test_scanning_is_idempotent() {
        let scanner = MscScanner::default();
        let message = text("MSC3 msc1 msc3 msc2");

        assert_eq!(scanner.scan(&message), scanner.scan(&message));
        assert_eq!(scanner.replies(&message), scanner.replies(&message));
    }
}
