//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, path::PathBuf, sync::Arc};

use serde::Deserialize;

use super::types::Res;

/// Default device display name used when logging in.
fn default_matrix_device_name() -> String {
    "msc-bot".to_string()
}

/// Invites are accepted unless turned off.
fn default_matrix_autojoin() -> bool {
    true
}

/// Default GitHub repository holding the proposals.
fn default_msc_repo() -> String {
    "matrix-org/matrix-spec-proposals".to_string()
}

/// Default GitHub label that marks an issue as a proposal.
fn default_msc_proposal_label() -> String {
    "proposal".to_string()
}

/// Default GitHub API base URL.
fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

/// Which resolver turns matched MSC numbers into reply entries.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResolverKind {
    /// Query the GitHub issues API for the title and author.
    #[default]
    Github,
    /// Build the link from the URL template alone.
    Static,
}

/// Configuration for the msc-bot application.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// The shared configuration values.
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Configuration values, shared behind [`Config`].
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConfigInner {
    /// Homeserver base URL (`MSC_BOT_MATRIX_HOMESERVER_URL`).
    pub matrix_homeserver_url: String,
    /// Bot login, localpart or full user ID (`MSC_BOT_MATRIX_USERNAME`).
    pub matrix_username: String,
    /// Bot password (`MSC_BOT_MATRIX_PASSWORD`).
    pub matrix_password: String,
    /// Device display name (`MSC_BOT_MATRIX_DEVICE_NAME`).
    #[serde(default = "default_matrix_device_name")]
    pub matrix_device_name: String,
    /// Optional directory for the SDK's sqlite store (`MSC_BOT_MATRIX_STORE_PATH`).
    /// Without it, sync and crypto state only live in memory.
    #[serde(default)]
    pub matrix_store_path: Option<PathBuf>,
    /// Optional file holding the login session (`MSC_BOT_MATRIX_SESSION_FILE`).
    /// Defaults to `session.json` inside the store directory, if there is one.
    #[serde(default)]
    pub matrix_session_file: Option<PathBuf>,
    /// Accept room invites automatically (`MSC_BOT_MATRIX_AUTOJOIN`).
    #[serde(default = "default_matrix_autojoin")]
    pub matrix_autojoin: bool,
    /// GitHub repository holding the proposals, as `owner/name` (`MSC_BOT_MSC_REPO`).
    #[serde(default = "default_msc_repo")]
    pub msc_repo: String,
    /// Label that marks an issue as a proposal (`MSC_BOT_MSC_PROPOSAL_LABEL`).
    #[serde(default = "default_msc_proposal_label")]
    pub msc_proposal_label: String,
    /// Resolver to use, `github` or `static` (`MSC_BOT_MSC_RESOLVER`).
    #[serde(default)]
    pub msc_resolver: ResolverKind,
    /// GitHub API base URL (`MSC_BOT_GITHUB_API_URL`).
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,
    /// Optional token for authenticated GitHub requests (`MSC_BOT_GITHUB_TOKEN`).
    #[serde(default)]
    pub github_token: Option<String>,
}

impl ConfigInner {
    /// Where the login session is kept between runs, if anywhere.
    pub fn matrix_session_path(&self) -> Option<PathBuf> {
        self.matrix_session_file.clone().or_else(|| self.matrix_store_path.as_ref().map(|p| p.join("session.json")))
    }

    /// Base of the proposal links, e.g. `https://github.com/matrix-org/matrix-spec-proposals/issues`.
    pub fn msc_url_base(&self) -> String {
        format!("https://github.com/{}/issues", self.msc_repo)
    }
}

impl Config {
    /// Load from the environment and the optional TOML file, then validate.
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(config::Environment::default().prefix("MSC_BOT").prefix_separator("_"));

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }

    /// Check the values that deserialization alone cannot.
    pub fn validate(&self) -> Res<()> {
        if !is_http_url(&self.matrix_homeserver_url) {
            return Err(anyhow::anyhow!("Matrix homeserver URL must be an http(s) URL."));
        }

        if self.matrix_username.trim().is_empty() {
            return Err(anyhow::anyhow!("Matrix username must not be empty."));
        }

        let mut repo_parts = self.msc_repo.split('/');
        let is_repo = matches!((repo_parts.next(), repo_parts.next(), repo_parts.next()), (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty());
        if !is_repo {
            return Err(anyhow::anyhow!("MSC repository must be of the form `owner/name`."));
        }

        if self.msc_resolver == ResolverKind::Github && !is_http_url(&self.github_api_url) {
            return Err(anyhow::anyhow!("GitHub API URL must be an http(s) URL."));
        }

        Ok(())
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("https://") || value.starts_with("http://")
}
