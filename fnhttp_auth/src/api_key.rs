//! API key authentication via a caller-supplied verifier

use std::{fmt, future::Future, sync::Arc};

use async_trait::async_trait;
use fnhttp::{Error, HttpRequest};
use serde::Deserialize;

/// Decides whether an API key grants access
///
/// Implemented for any async closure taking the key and the request, so
/// lookups against external stores are straightforward.
#[async_trait]
pub trait ApiKeyVerifier: Send + Sync {
    /// Returns whether `key` is acceptable for `request`
    async fn verify(&self, key: &str, request: &HttpRequest) -> bool;
}

#[async_trait]
impl<F, Fut> ApiKeyVerifier for F
where
    F: Fn(String, HttpRequest) -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send,
{
    async fn verify(&self, key: &str, request: &HttpRequest) -> bool {
        (self)(key.to_owned(), request.clone()).await
    }
}

/// Where API keys are read from, and how they are verified
#[derive(Clone, Default, Deserialize)]
pub struct ApiKeyAuthenticationParameters {
    /// The header carrying the key, for [`Scheme::HeaderApiKey`](fnhttp::Scheme::HeaderApiKey)
    #[serde(default)]
    pub header_name: Option<String>,
    /// The query parameter carrying the key, for
    /// [`Scheme::QueryApiKey`](fnhttp::Scheme::QueryApiKey)
    #[serde(default)]
    pub query_parameter_name: Option<String>,
    /// Decides whether a key is valid
    #[serde(skip)]
    pub verifier: Option<Arc<dyn ApiKeyVerifier>>,
}

impl ApiKeyAuthenticationParameters {
    /// Reads keys from the named header
    #[must_use]
    pub fn with_header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = Some(name.into());
        self
    }

    /// Reads keys from the named query parameter
    #[must_use]
    pub fn with_query_parameter_name(mut self, name: impl Into<String>) -> Self {
        self.query_parameter_name = Some(name.into());
        self
    }

    /// Verifies keys with `verifier`
    #[must_use]
    pub fn with_verifier(mut self, verifier: impl ApiKeyVerifier + 'static) -> Self {
        self.verifier = Some(Arc::new(verifier));
        self
    }
}

impl fmt::Debug for ApiKeyAuthenticationParameters {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ApiKeyAuthenticationParameters")
            .field("header_name", &self.header_name)
            .field("query_parameter_name", &self.query_parameter_name)
            .field("verifier", &self.verifier.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Delegates API key decisions to the configured verifier
#[derive(Clone, Debug, Default)]
pub struct ApiKeyAuthenticator {
    parameters: Option<ApiKeyAuthenticationParameters>,
}

impl ApiKeyAuthenticator {
    /// Constructs an authenticator; without a verifier every call fails
    pub fn new(parameters: Option<ApiKeyAuthenticationParameters>) -> Self {
        Self { parameters }
    }

    /// The configured parameters
    pub fn parameters(&self) -> Option<&ApiKeyAuthenticationParameters> {
        self.parameters.as_ref()
    }

    /// Asks the verifier whether `key` grants access
    ///
    /// # Errors
    ///
    /// Fails if no verifier is configured, or if neither a header nor a query
    /// parameter name is configured.
    pub async fn authenticate(&self, key: &str, request: &HttpRequest) -> Result<bool, Error> {
        let parameters = self.parameters.as_ref();

        let verifier = parameters.and_then(|p| p.verifier.as_ref()).ok_or_else(|| {
            Error::invalid_configuration("API key verifier has not been configured")
        })?;

        if parameters.map_or(true, |p| {
            p.header_name.is_none() && p.query_parameter_name.is_none()
        }) {
            return Err(Error::invalid_configuration(
                "Neither an API key header name nor a query parameter name has been configured",
            ));
        }

        let valid = verifier.verify(key, request).await;
        tracing::debug!(valid, "API key checked");
        Ok(valid)
    }
}
