//! Push credentials for the promotion remote.
//!
//! HTTP(S) remotes push with a token taken from the environment and embedded
//! in the remote URL. The token is held as a [`SecretString`] and scrubbed
//! from anything we log or return as an error.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use crate::error::PromotionError;

const REDACTED: &str = "[REDACTED]";

/// Remote URL used for pushing, possibly carrying a token.
pub struct PushUrl {
    url: SecretString,
    token: Option<SecretString>,
}

impl PushUrl {
    /// Resolve the push URL for `repo_url`, reading the token from `token_env`.
    pub fn from_env(repo_url: &str, token_env: &str) -> Result<Self, PromotionError> {
        let token = std::env::var(token_env)
            .ok()
            .filter(|token| !token.trim().is_empty());
        Self::resolve(repo_url, token, token_env)
    }

    /// Build the push URL. A token is only required (and only used) when the
    /// remote speaks HTTP(S); local paths and ssh remotes use ambient git auth.
    pub fn resolve(
        repo_url: &str,
        token: Option<String>,
        token_env: &str,
    ) -> Result<Self, PromotionError> {
        let Some((scheme, rest)) = split_http_scheme(repo_url) else {
            return Ok(Self {
                url: SecretString::from(repo_url.to_string()),
                token: None,
            });
        };
        let token = token.ok_or_else(|| PromotionError::CredentialMissing(token_env.to_string()))?;
        let host_and_path = strip_userinfo(rest);
        Ok(Self {
            url: SecretString::from(format!("{scheme}{token}@{host_and_path}")),
            token: Some(SecretString::from(token)),
        })
    }

    pub fn expose(&self) -> &str {
        self.url.expose_secret()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Replace any occurrence of the token in `text`.
    pub fn redact(&self, text: &str) -> String {
        redact_token(self.token.as_ref(), text)
    }

    pub(crate) fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }
}

impl fmt::Debug for PushUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushUrl")
            .field("url", &self.redact(self.expose()))
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

pub(crate) fn redact_token(token: Option<&SecretString>, text: &str) -> String {
    match token {
        Some(token) if !token.expose_secret().is_empty() => {
            text.replace(token.expose_secret(), REDACTED)
        }
        _ => text.to_string(),
    }
}

fn split_http_scheme(url: &str) -> Option<(&'static str, &str)> {
    if let Some(rest) = url.strip_prefix("https://") {
        return Some(("https://", rest));
    }
    url.strip_prefix("http://").map(|rest| ("http://", rest))
}

fn strip_userinfo(rest: &str) -> &str {
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => &rest[at + 1..],
        None => rest,
    }
}
