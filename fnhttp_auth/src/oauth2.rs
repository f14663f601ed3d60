//! OAuth2 bearer token authentication via a caller-supplied authorizer

use std::{fmt, future::Future, sync::Arc};

use async_trait::async_trait;
use fnhttp::{Authorize, ClaimsPrincipal, Error, HttpRequest};

/// Exchanges a bearer token for an identity
///
/// Typically calls out to the provider that issued the token. Rejects access
/// by returning an authentication or authorization error.
#[async_trait]
pub trait OAuth2Authorizer: Send + Sync {
    /// Resolves `token` to the identity it represents
    async fn authorize(
        &self,
        token: &str,
        request: &HttpRequest,
        markers: &[Authorize],
    ) -> Result<ClaimsPrincipal, Error>;
}

#[async_trait]
impl<F, Fut> OAuth2Authorizer for F
where
    F: Fn(String, HttpRequest, Vec<Authorize>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ClaimsPrincipal, Error>> + Send,
{
    async fn authorize(
        &self,
        token: &str,
        request: &HttpRequest,
        markers: &[Authorize],
    ) -> Result<ClaimsPrincipal, Error> {
        (self)(token.to_owned(), request.clone(), markers.to_vec()).await
    }
}

/// The delegate that resolves OAuth2 tokens
#[derive(Clone)]
pub struct OAuth2AuthenticationParameters {
    /// Resolves tokens to identities
    pub authorizer: Arc<dyn OAuth2Authorizer>,
}

impl OAuth2AuthenticationParameters {
    /// Resolves tokens with `authorizer`
    pub fn new(authorizer: impl OAuth2Authorizer + 'static) -> Self {
        Self {
            authorizer: Arc::new(authorizer),
        }
    }
}

impl fmt::Debug for OAuth2AuthenticationParameters {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("OAuth2AuthenticationParameters")
            .finish_non_exhaustive()
    }
}

/// Hands bearer tokens to the configured authorizer
#[derive(Clone, Debug, Default)]
pub struct OAuth2Authenticator {
    parameters: Option<OAuth2AuthenticationParameters>,
}

impl OAuth2Authenticator {
    /// Constructs an authenticator; without parameters every call fails
    pub fn new(parameters: Option<OAuth2AuthenticationParameters>) -> Self {
        Self { parameters }
    }

    /// Strips the bearer prefix from `authorization_header` and resolves the
    /// token
    ///
    /// # Errors
    ///
    /// Fails if the authenticator is unconfigured, the header is not a bearer
    /// token, or the authorizer rejects the token.
    pub async fn authenticate(
        &self,
        authorization_header: &str,
        request: &HttpRequest,
        markers: &[Authorize],
    ) -> Result<ClaimsPrincipal, Error> {
        let parameters = self.parameters.as_ref().ok_or_else(|| {
            Error::invalid_configuration("OAuth2 authentication parameters have not been configured")
        })?;

        let token = authorization_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .ok_or_else(|| Error::authentication("Expected Bearer token in Authorization header"))?;

        let principal = parameters
            .authorizer
            .authorize(token, request, markers)
            .await?;

        tracing::debug!(subject = ?principal.name, "OAuth2 token accepted");
        Ok(principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use fnhttp::Scheme;

    fn request() -> HttpRequest {
        HttpRequest::from(http::Request::get("/").body(Bytes::new()).unwrap())
    }

    fn authenticator() -> OAuth2Authenticator {
        OAuth2Authenticator::new(Some(OAuth2AuthenticationParameters::new(
            |token: String, _req: HttpRequest, markers: Vec<Authorize>| async move {
                if token == "good" {
                    Ok(ClaimsPrincipal::new("oauth2")
                        .with_name("ada")
                        .with_claim("markers", markers.len()))
                } else {
                    Err(Error::authorization("Unknown token"))
                }
            },
        )))
    }

    #[tokio::test]
    async fn authorizer_resolves_token() {
        let markers = [Authorize::new(Scheme::OAuth2)];
        let principal = authenticator()
            .authenticate("Bearer good", &request(), &markers)
            .await
            .unwrap();

        assert_eq!(principal.name.as_deref(), Some("ada"));
        assert_eq!(principal.claim("markers"), Some(&serde_json::json!(1)));
    }

    #[tokio::test]
    async fn authorizer_errors_propagate() {
        let err = authenticator()
            .authenticate("Bearer bad", &request(), &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), fnhttp::ErrorKind::Authorization);
    }

    #[tokio::test]
    async fn configuration_is_checked_before_the_header() {
        let err = OAuth2Authenticator::default()
            .authenticate("garbage", &request(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration { .. }));
    }

    #[tokio::test]
    async fn non_bearer_header_is_rejected() {
        let err = authenticator()
            .authenticate("Basic abc", &request(), &[])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Expected Bearer token in Authorization header");
    }
}
