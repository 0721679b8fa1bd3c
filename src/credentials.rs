//! API key resolution with layered fallback.
//!
//! The key is looked up in three places, first hit wins:
//!
//! 1. a JSON credential file (default `openai.json`) with one of the fields
//!    `key`, `api_key` or `OPENAI_API_KEY`, whose value starts with `sk-`;
//! 2. the process environment variable (default `OPENAI_API_KEY`);
//! 3. the same variable in a local dotenv file (default `.env`).
//!
//! The dotenv file never overrides a variable that is already set in the
//! process environment, which is why it is consulted last. Anything wrong
//! with the credential file (missing, unreadable, malformed) simply means
//! "not found there".
//!
//! Resolution does not write to the process environment. The result is
//! stored in [`Config::api_key`](crate::config::Config::api_key) and handed
//! to whatever needs it.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::{CredentialsConfig, Environment, ProcessEnv};

/// Field names recognized in the credential file, in lookup order.
pub const KEY_FIELDS: &[&str] = &["key", "api_key", "OPENAI_API_KEY"];

/// Prefix a key from the credential file must carry to be accepted.
pub const KEY_PREFIX: &str = "sk-";

/// An API key. `Debug` and `Display` only ever show a masked form.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw token, for building request headers.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn has_recognized_prefix(&self) -> bool {
        self.0.starts_with(KEY_PREFIX)
    }

    /// `sk-…wxyz` style rendering. Short keys show no tail at all.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        let head: String = chars.iter().take(3).collect();
        if chars.len() <= 10 {
            return format!("{}…", head);
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}…{}", head, tail)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey({})", self.masked())
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// Where a credential was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    KeyFile,
    Environment,
    EnvFile,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CredentialSource::KeyFile => "credential file",
            CredentialSource::Environment => "process environment",
            CredentialSource::EnvFile => "dotenv file",
        };
        f.write_str(label)
    }
}

/// A resolved key together with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub key: ApiKey,
    pub source: CredentialSource,
}

/// Read a key from a JSON credential file.
///
/// Returns `None` for a missing file, invalid JSON, a non-object document,
/// or when none of [`KEY_FIELDS`] holds a string starting with
/// [`KEY_PREFIX`].
pub fn load_key_from_file(path: &Path) -> Option<ApiKey> {
    let content = std::fs::read_to_string(path).ok()?;
    let value: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "ignoring malformed credential file");
            return None;
        }
    };
    let obj = value.as_object()?;

    KEY_FIELDS.iter().find_map(|field| {
        obj.get(*field)
            .and_then(|v| v.as_str())
            .filter(|s| s.starts_with(KEY_PREFIX))
            .map(ApiKey::new)
    })
}

/// Parse a dotenv file into a map without touching the process environment.
///
/// Lines that fail to parse are skipped. A missing file yields an empty map.
pub fn read_env_file(path: &Path) -> HashMap<String, String> {
    match dotenvy::from_path_iter(path) {
        Ok(iter) => iter.filter_map(Result::ok).collect(),
        Err(_) => HashMap::new(),
    }
}

/// Resolves the API key from the configured sources.
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    key_file: PathBuf,
    env_file: PathBuf,
    env_var: String,
}

impl CredentialResolver {
    pub fn new(
        key_file: impl Into<PathBuf>,
        env_file: impl Into<PathBuf>,
        env_var: impl Into<String>,
    ) -> Self {
        Self {
            key_file: key_file.into(),
            env_file: env_file.into(),
            env_var: env_var.into(),
        }
    }

    pub fn from_config(config: &CredentialsConfig) -> Self {
        Self::new(&config.key_file, &config.env_file, &config.env_var)
    }

    /// Resolve against the real process environment.
    pub fn resolve(&self) -> Option<Credential> {
        self.resolve_with(&ProcessEnv)
    }

    /// Resolve against an arbitrary environment. Safe to call repeatedly.
    pub fn resolve_with(&self, env: &dyn Environment) -> Option<Credential> {
        if let Some(key) = load_key_from_file(&self.key_file) {
            debug!(path = %self.key_file.display(), "credential found in key file");
            return Some(Credential {
                key,
                source: CredentialSource::KeyFile,
            });
        }

        let from_env = env
            .var(&self.env_var)
            .filter(|v| !v.trim().is_empty())
            .map(|v| (v, CredentialSource::Environment));

        let found = from_env.or_else(|| {
            read_env_file(&self.env_file)
                .remove(&self.env_var)
                .filter(|v| !v.trim().is_empty())
                .map(|v| (v, CredentialSource::EnvFile))
        });

        let (raw, source) = found?;
        let key = ApiKey::new(raw.trim());
        if !key.has_recognized_prefix() {
            warn!(
                var = %self.env_var,
                %source,
                "credential does not start with '{}'; using it anyway",
                KEY_PREFIX
            );
        }
        debug!(%source, "credential resolved");
        Some(Credential { key, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn resolver(dir: &TempDir) -> CredentialResolver {
        CredentialResolver::new(
            dir.path().join("openai.json"),
            dir.path().join(".env"),
            "OPENAI_API_KEY",
        )
    }

    fn empty_env() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_each_field_name_accepts_sk_prefix() {
        for field in KEY_FIELDS {
            let dir = TempDir::new().unwrap();
            let body = format!(r#"{{"{}": "sk-from-file-123456"}}"#, field);
            fs::write(dir.path().join("openai.json"), body).unwrap();

            let cred = resolver(&dir).resolve_with(&empty_env()).unwrap();
            assert_eq!(cred.key.expose(), "sk-from-file-123456", "field {}", field);
            assert_eq!(cred.source, CredentialSource::KeyFile);
        }
    }

    #[test]
    fn test_each_field_name_rejects_other_prefixes() {
        for field in KEY_FIELDS {
            let dir = TempDir::new().unwrap();
            let body = format!(r#"{{"{}": "pk-not-a-key"}}"#, field);
            fs::write(dir.path().join("openai.json"), body).unwrap();

            assert!(
                load_key_from_file(&dir.path().join("openai.json")).is_none(),
                "field {}",
                field
            );
        }
    }

    #[test]
    fn test_later_field_used_when_earlier_is_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("openai.json"),
            r#"{"key": "nope", "api_key": 42, "OPENAI_API_KEY": "sk-third"}"#,
        )
        .unwrap();
        let key = load_key_from_file(&dir.path().join("openai.json")).unwrap();
        assert_eq!(key.expose(), "sk-third");
    }

    #[test]
    fn test_malformed_file_falls_through_to_env() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("openai.json"), "{ not json").unwrap();
        let mut env = empty_env();
        env.insert("OPENAI_API_KEY".into(), "sk-env".into());

        let cred = resolver(&dir).resolve_with(&env).unwrap();
        assert_eq!(cred.key.expose(), "sk-env");
        assert_eq!(cred.source, CredentialSource::Environment);
    }

    #[test]
    fn test_non_object_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("openai.json"), r#"["sk-in-array"]"#).unwrap();
        assert!(resolver(&dir).resolve_with(&empty_env()).is_none());
    }

    #[test]
    fn test_nothing_anywhere_is_absent() {
        let dir = TempDir::new().unwrap();
        assert!(resolver(&dir).resolve_with(&empty_env()).is_none());
    }

    #[test]
    fn test_env_file_used_when_process_env_missing() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(".env"),
            "# local secrets\nOPENAI_API_KEY=sk-dotenv\nOTHER=1\n",
        )
        .unwrap();

        let cred = resolver(&dir).resolve_with(&empty_env()).unwrap();
        assert_eq!(cred.key.expose(), "sk-dotenv");
        assert_eq!(cred.source, CredentialSource::EnvFile);
    }

    #[test]
    fn test_process_env_wins_over_env_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".env"), "OPENAI_API_KEY=sk-dotenv\n").unwrap();
        let mut env = empty_env();
        env.insert("OPENAI_API_KEY".into(), "sk-process".into());

        let cred = resolver(&dir).resolve_with(&env).unwrap();
        assert_eq!(cred.key.expose(), "sk-process");
    }

    #[test]
    fn test_key_file_wins_over_everything() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("openai.json"), r#"{"api_key": "sk-file"}"#).unwrap();
        fs::write(dir.path().join(".env"), "OPENAI_API_KEY=sk-dotenv\n").unwrap();
        let mut env = empty_env();
        env.insert("OPENAI_API_KEY".into(), "sk-process".into());

        let cred = resolver(&dir).resolve_with(&env).unwrap();
        assert_eq!(cred.key.expose(), "sk-file");
        assert_eq!(cred.source, CredentialSource::KeyFile);
    }

    #[test]
    fn test_blank_env_value_is_absent() {
        let dir = TempDir::new().unwrap();
        let mut env = empty_env();
        env.insert("OPENAI_API_KEY".into(), "   ".into());
        assert!(resolver(&dir).resolve_with(&env).is_none());
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("openai.json"), r#"{"key": "sk-twice"}"#).unwrap();
        let r = resolver(&dir);
        assert_eq!(r.resolve_with(&empty_env()), r.resolve_with(&empty_env()));
    }

    #[test]
    fn test_masking_hides_the_token() {
        let key = ApiKey::new("sk-abcdefghijklmnop1234");
        assert_eq!(key.masked(), "sk-…1234");
        assert!(!format!("{:?}", key).contains("abcdefghijklmnop"));
        assert!(!key.to_string().contains("abcdefghijklmnop"));
        assert_eq!(ApiKey::new("sk-short").masked(), "sk-…");
    }
}
