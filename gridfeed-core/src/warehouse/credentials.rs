//! Service-account keys and bearer-token sources.
//!
//! The OAuth exchange that turns a service-account key into an access token
//! happens outside this crate; a [`TokenSource`] supplies the result.

use crate::error::GridError;
use serde::Deserialize;
use std::fmt;

/// Google Cloud service-account key, as stored in the JSON key file.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    pub project_id: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, GridError> {
        let key: Self = serde_json::from_str(json)
            .map_err(|e| GridError::Authentication(format!("invalid service account JSON: {e}")))?;
        if key.key_type != "service_account" {
            return Err(GridError::Authentication(format!(
                "expected a service_account key, got '{}'",
                key.key_type
            )));
        }
        Ok(key)
    }

    /// Read the key from the environment variable named `var`.
    pub fn from_env(var: &str) -> Result<Self, GridError> {
        let json = std::env::var(var).map_err(|_| {
            GridError::Authentication(format!("environment variable {var} is not set"))
        })?;
        Self::from_json(&json)
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Supplies OAuth bearer tokens for warehouse requests.
pub trait TokenSource: Send + Sync {
    fn access_token(&self) -> Result<String, GridError>;
}

/// A fixed token.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenSource for StaticToken {
    fn access_token(&self) -> Result<String, GridError> {
        Ok(self.0.clone())
    }
}

/// Reads the token from an environment variable on every request.
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl TokenSource for EnvToken {
    fn access_token(&self) -> Result<String, GridError> {
        match std::env::var(&self.var) {
            Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            _ => Err(GridError::Authentication(format!(
                "no access token in environment variable {}",
                self.var
            ))),
        }
    }
}
