//! Common types shared across the msc-bot.

use crate::scanner::MscReference;

/// Error type used throughout the crate.
pub type Err = anyhow::Error;
/// Result type used throughout the crate.
pub type Res<T> = Result<T, Err>;
/// Result of an operation that only reports success or failure.
pub type Void = Res<()>;

/// A resolved proposal, ready to be shown in a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Msc {
    /// The reference found in the message.
    pub reference: MscReference,
    /// Proposal title, when the resolver knows it.
    pub title: Option<String>,
    /// Proposal author, rendered as `@login`.
    pub author: Option<String>,
}

impl Msc {
    /// The proposal number.
    pub fn id(&self) -> u32 {
        self.reference.id
    }

    /// Link to the proposal.
    pub fn url(&self) -> &str {
        &self.reference.url
    }

    /// Render as a markdown line, optionally prefixed with `MSC{id}: `.
    ///
    /// Entries without a title always carry the number: as the link text when
    /// unprefixed, as the prefix followed by the bare URL otherwise.
    pub fn format(&self, with_id: bool) -> String {
        let entry = match (&self.title, &self.author) {
            (None, _) if with_id => return format!("MSC{}: {}", self.id(), self.url()),
            (None, _) => format!("[MSC{}]({})", self.id(), self.url()),
            (Some(title), Some(author)) => format!("[{}]({}) by {}", title, self.url(), author),
            (Some(title), None) => format!("[{}]({})", title, self.url()),
        };

        if with_id { format!("MSC{}: {}", self.id(), entry) } else { entry }
    }
}

impl From<MscReference> for Msc {
    fn from(reference: MscReference) -> Self {
        Self { reference, title: None, author: None }
    }
}

/// Build the reply text for the resolved MSCs.
///
/// A single MSC is shown on its own; several are listed with their numbers,
/// separated by blank lines.
pub fn format_reply(mscs: &[Msc]) -> Option<String> {
    match mscs {
        [] => None,
        [msc] => Some(msc.format(false)),
        mscs => Some(mscs.iter().map(|msc| msc.format(true)).collect::<Vec<_>>().join("\n\n")),
    }
}
