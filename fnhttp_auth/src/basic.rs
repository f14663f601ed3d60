//! HTTP Basic authentication

use std::collections::HashMap;

use base64::Engine;
use fnhttp::Error;
use serde::Deserialize;

/// Credentials accepted by the [`BasicAuthenticator`]
#[derive(Clone, Debug, Default, Deserialize)]
pub struct BasicAuthenticationParameters {
    /// Accepted passwords, keyed by username
    #[serde(default)]
    pub valid_credentials: HashMap<String, String>,
}

impl BasicAuthenticationParameters {
    /// Accepts the given username and password
    #[must_use]
    pub fn with_credential(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.valid_credentials.insert(username.into(), password.into());
        self
    }
}

/// Checks `Authorization: Basic` credentials against a configured set
#[derive(Clone, Debug, Default)]
pub struct BasicAuthenticator {
    parameters: Option<BasicAuthenticationParameters>,
}

impl BasicAuthenticator {
    /// Constructs an authenticator; without parameters every call fails
    pub fn new(parameters: Option<BasicAuthenticationParameters>) -> Self {
        Self { parameters }
    }

    /// Validates the raw value of an `Authorization` header
    ///
    /// Returns whether the credentials match a configured pair. Usernames and
    /// passwords are compared case-insensitively.
    ///
    /// # Errors
    ///
    /// Fails if the authenticator is unconfigured or the header is not a
    /// well-formed Basic credential.
    pub fn authenticate(&self, authorization_header: &str) -> Result<bool, Error> {
        let parameters = self.parameters.as_ref().ok_or_else(|| {
            Error::invalid_configuration("Basic authentication parameters have not been configured")
        })?;

        let encoded = authorization_header
            .strip_prefix("Basic ")
            .ok_or_else(|| Error::authentication("Expected a basic auth token"))?;

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| {
                Error::authentication_with_source(
                    "Failed to read the authorization header from base64 string",
                    e,
                )
            })?;

        let credentials = String::from_utf8_lossy(&decoded);
        let (username, password) = match credentials.split(':').collect::<Vec<_>>()[..] {
            [username, password] => (username, password),
            _ => {
                return Err(Error::authentication(
                    "Invalid credentials format, expected base64 encoded username:password",
                ))
            }
        };

        let valid = parameters.valid_credentials.iter().any(|(u, p)| {
            u.eq_ignore_ascii_case(username) && p.eq_ignore_ascii_case(password)
        });

        tracing::debug!(username, valid, "basic credentials checked");
        Ok(valid)
    }
}
