//! Remote copy of the state document kept in a GitHub repository through the
//! contents API.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GitHubSettings;
use crate::error::MirrorError;

const USER_AGENT: &str = "guild-cloner";

#[derive(Debug, Deserialize)]
struct ContentResponse {
    sha: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutPayload<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    content: PutContent,
}

#[derive(Debug, Deserialize)]
struct PutContent {
    sha: String,
}

pub struct GitHubMirror {
    client: Client,
    settings: GitHubSettings,
    /// Revision token of the last document read or written.
    sha: Option<String>,
}

impl GitHubMirror {
    pub fn new(settings: GitHubSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
            sha: None,
        }
    }

    fn contents_url(&self) -> String {
        contents_url(&self.settings.api_root, &self.settings.repo, &self.settings.path)
    }

    /// Reads the stored document. `Ok(None)` when it does not exist yet.
    pub async fn fetch(&mut self) -> Result<Option<String>, MirrorError> {
        let response = self
            .client
            .get(self.contents_url())
            .query(&[("ref", self.settings.branch.as_str())])
            .header("Authorization", format!("token {}", self.settings.token))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(MirrorError::Status(status));
        }

        let body: ContentResponse = response.json().await?;
        self.sha = Some(body.sha);
        body.content.as_deref().map(decode_content).transpose()
    }

    /// Writes `document`, overwriting whatever revision is there.
    ///
    /// A stale revision token gets one refresh and retry; the local document
    /// always wins.
    pub async fn push(&mut self, document: &str, message: &str) -> Result<(), MirrorError> {
        match self.put(document, message).await {
            Err(MirrorError::Status(status)) if is_stale_revision(status) => {
                debug!("Revision token for {} is stale, refreshing", self.settings.path);
                self.fetch().await?;
                self.put(document, message).await
            }
            other => other,
        }
    }

    async fn put(&mut self, document: &str, message: &str) -> Result<(), MirrorError> {
        let payload = PutPayload {
            message,
            content: STANDARD.encode(document),
            branch: &self.settings.branch,
            sha: self.sha.as_deref(),
        };

        let response = self
            .client
            .put(self.contents_url())
            .header("Authorization", format!("token {}", self.settings.token))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MirrorError::Status(response.status()));
        }

        let body: PutResponse = response.json().await?;
        self.sha = Some(body.content.sha);
        Ok(())
    }
}

fn is_stale_revision(status: StatusCode) -> bool {
    status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY
}

fn contents_url(api_root: &str, repo: &str, path: &str) -> String {
    format!("{api_root}/repos/{repo}/contents/{}", path.trim_start_matches('/'))
}

/// The API wraps base64 at 60 columns.
fn decode_content(content: &str) -> Result<String, MirrorError> {
    let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(String::from_utf8(STANDARD.decode(compact)?)?)
}
