//! Runtime configuration, read once from the environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serenity::all::GuildId;

use crate::error::ConfigError;
use crate::processing::AttachmentNaming;

pub const DEFAULT_PAGE_SIZE: u8 = 50;
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 25_000_000;

/// Fixed delays that keep the run under the platform's global rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Between simple calls such as channel creation or single sends.
    pub call: Duration,
    /// After each relayed message.
    pub message: Duration,
    /// Between page fetches.
    pub page: Duration,
    /// Base delay for fetch retries; doubles per attempt.
    pub error: Duration,
    /// Between channels.
    pub channel: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            call: Duration::from_millis(300),
            message: Duration::from_millis(500),
            page: Duration::from_secs(2),
            error: Duration::from_secs(2),
            channel: Duration::from_secs(1),
        }
    }
}

impl Pacing {
    pub fn none() -> Self {
        Self {
            call: Duration::ZERO,
            message: Duration::ZERO,
            page: Duration::ZERO,
            error: Duration::ZERO,
            channel: Duration::ZERO,
        }
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        self.error.saturating_mul(1 << attempt.saturating_sub(1).min(6))
    }
}

pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubSettings {
    pub token: String,
    /// `owner/name`
    pub repo: String,
    pub branch: String,
    pub path: String,
    /// Base URL of the REST API, without a trailing slash.
    pub api_root: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub source_guild: GuildId,
    pub target_guild: GuildId,
    pub port: u16,
    pub progress_path: PathBuf,
    pub github: Option<GitHubSettings>,
    /// Delete everything in the target before the first structure pass.
    pub start_fresh: bool,
    pub page_size: u8,
    pub max_attachment_bytes: u64,
    pub attachment_naming: AttachmentNaming,
    pub use_webhooks: bool,
    pub mark_nsfw: bool,
    pub fetch_retries: u32,
    /// Push the state to the remote mirror every this many relayed messages.
    pub mirror_every: u64,
    pub pacing: Pacing,
}

impl Config {
    pub fn new(token: impl Into<String>, source_guild: GuildId, target_guild: GuildId) -> Self {
        Self {
            token: token.into(),
            source_guild,
            target_guild,
            port: 3000,
            progress_path: PathBuf::from("progress.json"),
            github: None,
            start_fresh: true,
            page_size: DEFAULT_PAGE_SIZE,
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            attachment_naming: AttachmentNaming::default(),
            use_webhooks: false,
            mark_nsfw: true,
            fetch_retries: 3,
            mirror_every: 20,
            pacing: Pacing::default(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let token = get("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;
        let source = guild_id(&get, "SOURCE_GUILD_ID")?;
        let target = guild_id(&get, "TARGET_GUILD_ID")?;
        if source == target {
            return Err(ConfigError::Invalid {
                key: "TARGET_GUILD_ID",
                reason: "must differ from SOURCE_GUILD_ID".to_string(),
            });
        }

        let mut config = Self::new(token, source, target);

        if let Some(port) = parsed(&get, "PORT")? {
            config.port = port;
        }
        if let Some(path) = get("PROGRESS_PATH") {
            config.progress_path = PathBuf::from(path);
        }
        if let (Some(token), Some(repo)) = (get("GITHUB_TOKEN"), get("GITHUB_REPO")) {
            config.github = Some(GitHubSettings {
                token,
                repo,
                branch: get("GITHUB_BRANCH").unwrap_or_else(|| "main".to_string()),
                path: get("GITHUB_PATH").unwrap_or_else(|| "progress.json".to_string()),
                api_root: get("GITHUB_API_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| DEFAULT_GITHUB_API.to_string()),
            });
        }
        if let Some(flag) = flag(&get, "START_FRESH")? {
            config.start_fresh = flag;
        }
        if let Some(size) = parsed::<u8>(&get, "PAGE_SIZE")? {
            if !(1..=100).contains(&size) {
                return Err(ConfigError::Invalid {
                    key: "PAGE_SIZE",
                    reason: "must be between 1 and 100".to_string(),
                });
            }
            config.page_size = size;
        }
        if let Some(bytes) = parsed(&get, "MAX_ATTACHMENT_BYTES")? {
            config.max_attachment_bytes = bytes;
        }
        if let Some(naming) = parsed(&get, "ATTACHMENT_NAMING")? {
            config.attachment_naming = naming;
        }
        if let Some(flag) = flag(&get, "USE_WEBHOOKS")? {
            config.use_webhooks = flag;
        }
        if let Some(flag) = flag(&get, "MARK_NSFW")? {
            config.mark_nsfw = flag;
        }
        if let Some(retries) = parsed(&get, "FETCH_RETRIES")? {
            config.fetch_retries = retries;
        }
        if let Some(every) = parsed::<u64>(&get, "MIRROR_EVERY")? {
            config.mirror_every = every.max(1);
        }

        Ok(config)
    }
}

fn guild_id(get: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<GuildId, ConfigError> {
    let raw = get(key).ok_or(ConfigError::Missing(key))?;
    match raw.parse::<u64>() {
        Ok(id) if id != 0 => Ok(GuildId::new(id)),
        _ => Err(ConfigError::Invalid {
            key,
            reason: format!("'{raw}' is not a server id"),
        }),
    }
}

fn parsed<T>(get: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|raw| {
            raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn flag(get: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<bool>, ConfigError> {
    get(key)
        .map(|raw| match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                reason: format!("'{raw}' is not a boolean"),
            }),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DISCORD_TOKEN", "secret"),
        ("SOURCE_GUILD_ID", "111"),
        ("TARGET_GUILD_ID", "222"),
    ];

    #[test]
    fn defaults_apply_when_only_required_values_are_set() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.source_guild, GuildId::new(111));
        assert_eq!(config.target_guild, GuildId::new(222));
        assert_eq!(config.page_size, 50);
        assert_eq!(config.max_attachment_bytes, 25_000_000);
        assert_eq!(config.port, 3000);
        assert!(config.start_fresh);
        assert!(config.github.is_none());
        assert_eq!(config.pacing, Pacing::default());
    }

    #[test]
    fn missing_token_is_fatal() {
        let err = Config::from_lookup(lookup(&REQUIRED[1..])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DISCORD_TOKEN")));
    }

    #[test]
    fn rejects_bad_ids_and_page_sizes() {
        let mut pairs = REQUIRED.to_vec();
        pairs[1] = ("SOURCE_GUILD_ID", "abc");
        assert!(matches!(
            Config::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { key: "SOURCE_GUILD_ID", .. })
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PAGE_SIZE", "0"));
        assert!(matches!(
            Config::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { key: "PAGE_SIZE", .. })
        ));
    }

    #[test]
    fn github_mirror_needs_token_and_repo() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("GITHUB_REPO", "me/state"));
        assert!(Config::from_lookup(lookup(&pairs)).unwrap().github.is_none());

        pairs.push(("GITHUB_TOKEN", "ghp"));
        pairs.push(("USE_WEBHOOKS", "yes"));
        pairs.push(("ATTACHMENT_NAMING", "unique:clip"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        let github = config.github.unwrap();
        assert_eq!(github.repo, "me/state");
        assert_eq!(github.branch, "main");
        assert_eq!(github.api_root, DEFAULT_GITHUB_API);
        assert!(config.use_webhooks);
        assert_eq!(config.attachment_naming, AttachmentNaming::Unique("clip".to_string()));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let pacing = Pacing::default();
        assert_eq!(pacing.backoff(1), Duration::from_secs(2));
        assert_eq!(pacing.backoff(3), Duration::from_secs(8));
    }
}
