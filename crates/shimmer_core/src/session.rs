//! Per-user context passed to every provider fetch.

use std::collections::BTreeMap;
use std::fmt;

use secrecy::{ExposeSecret, SecretString};

/// Who the request is for and the credentials to act on their behalf.
///
/// Carried explicitly through each call; nothing here is process-wide.
#[derive(Clone)]
pub struct Session {
    user_id: String,
    access_token: SecretString,
    parameters: BTreeMap<String, String>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, access_token: SecretString) -> Self {
        Self {
            user_id: user_id.into(),
            access_token,
            parameters: BTreeMap::new(),
        }
    }

    /// Attach a provider-specific value, such as an account or device id.
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    pub(crate) fn has_token(&self) -> bool {
        !self.access_token.expose_secret().is_empty()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("access_token", &"[REDACTED]")
            .field("parameters", &self.parameters)
            .finish()
    }
}
