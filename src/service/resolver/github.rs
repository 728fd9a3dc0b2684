//! GitHub-backed MSC resolver.
//!
//! Proposals are GitHub issues carrying a dedicated label. Looking the issue
//! up gives the title and author for the reply, and weeds out numbers that
//! belong to plain issues or pull requests.

use async_trait::async_trait;
use reqwest::{StatusCode, header};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::{
    base::{
        config::Config,
        types::{Msc, Res},
    },
    scanner::MscReference,
};

use super::{GenericMscResolver, MscResolver};

// Extra methods on `MscResolver` applied by the GitHub implementation.

impl MscResolver {
    /// Creates a new GitHub resolver.
    pub fn github(config: &Config) -> Res<Self> {
        let resolver = GithubMscResolver::new(config)?;
        Ok(Self { inner: Arc::new(resolver) })
    }
}

// Wire types.

#[derive(Debug, Deserialize)]
struct GithubIssue {
    title: Option<String>,
    user: Option<GithubUser>,
    #[serde(default)]
    labels: Vec<GithubLabel>,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    login: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubLabel {
    name: Option<String>,
}

// Structs.

/// GitHub resolver implementation.
#[derive(Clone)]
pub struct GithubMscResolver {
    client: reqwest::Client,
    api_url: String,
    repo: String,
    proposal_label: String,
    token: Option<String>,
}

impl GithubMscResolver {
    /// Create a new GitHub resolver.
    pub fn new(config: &Config) -> Res<Self> {
        let client = reqwest::Client::builder().user_agent(concat!("msc-bot/", env!("CARGO_PKG_VERSION"))).build()?;

        Ok(Self {
            client,
            api_url: config.github_api_url.trim_end_matches('/').to_string(),
            repo: config.msc_repo.clone(),
            proposal_label: config.msc_proposal_label.clone(),
            token: config.github_token.clone().filter(|t| !t.is_empty()),
        })
    }

    fn issue_url(&self, id: u32) -> String {
        format!("{}/repos/{}/issues/{}", self.api_url, self.repo, id)
    }

    fn is_proposal(&self, issue: &GithubIssue) -> bool {
        issue.labels.iter().any(|label| label.name.as_deref() == Some(self.proposal_label.as_str()))
    }
}

#[async_trait]
impl GenericMscResolver for GithubMscResolver {
    #[instrument(skip(self, reference), fields(msc = reference.id))]
    async fn resolve(&self, reference: &MscReference) -> Res<Option<Msc>> {
        let mut request = self.client.get(self.issue_url(reference.id)).header(header::ACCEPT, "application/vnd.github+json");

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("No issue exists for this number.");
            return Ok(None);
        }

        let issue: GithubIssue = response.error_for_status()?.json().await?;

        if !self.is_proposal(&issue) {
            debug!("Issue is not labeled as a proposal.");
            return Ok(None);
        }

        let title = issue.title.unwrap_or_else(|| "Unknown title".to_string());
        let login = issue.user.and_then(|u| u.login).unwrap_or_else(|| "Unknown author".to_string());

        Ok(Some(Msc {
            reference: reference.clone(),
            title: Some(title),
            author: Some(format!("@{login}")),
        }))
    }
}

// Tests.
