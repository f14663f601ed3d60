//! JSON Web Token authentication

use std::{fmt, future::Future, sync::Arc};

use aliri::{jwt, Jwks, Jwt, JwtRef};
use aliri_clock::UnixTime;
use aliri_oauth2::{Authority, HasScope, Scope, ScopePolicy};
use async_trait::async_trait;
use fnhttp::{Authorize, BoxError, ClaimsPrincipal, Error};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::oidc::{ConfigurationRetriever, HttpConfigurationRetriever};

/// The claims carried by an accepted token
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The `aud` claim
    #[serde(default, skip_serializing_if = "jwt::Audiences::is_empty")]
    pub aud: jwt::Audiences,
    /// The `iss` claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<jwt::Issuer>,
    /// The `sub` claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<jwt::Subject>,
    /// The `exp` claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<UnixTime>,
    /// The `nbf` claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<UnixTime>,
    /// The `scope` claim
    #[serde(default)]
    pub scope: Scope,
    /// Every other claim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl jwt::CoreClaims for JwtClaims {
    fn nbf(&self) -> Option<UnixTime> {
        self.nbf
    }

    fn exp(&self) -> Option<UnixTime> {
        self.exp
    }

    fn aud(&self) -> &jwt::Audiences {
        &self.aud
    }

    fn iss(&self) -> Option<&jwt::IssuerRef> {
        self.iss.as_deref()
    }

    fn sub(&self) -> Option<&jwt::SubjectRef> {
        self.sub.as_deref()
    }
}

impl HasScope for JwtClaims {
    fn scope(&self) -> &Scope {
        &self.scope
    }
}

impl JwtClaims {
    /// The identity described by these claims
    pub fn to_principal(&self) -> ClaimsPrincipal {
        let claims = match serde_json::to_value(self) {
            Ok(Value::Object(claims)) => claims,
            _ => Map::new(),
        };

        ClaimsPrincipal {
            authentication_type: "jwt".to_owned(),
            name: self.sub.as_ref().map(|s| s.as_str().to_owned()),
            claims,
        }
    }
}

/// A token that passed validation, with its claims
#[derive(Clone, Debug)]
pub struct ValidatedToken {
    /// The raw token
    pub token: Jwt,
    /// The validated claims
    pub claims: JwtClaims,
}

/// Checks a token's signature and claims
pub trait TokenValidator: Send + Sync {
    /// Validates `token`, returning its claims
    fn validate(&self, token: &JwtRef) -> Result<JwtClaims, BoxError>;
}

impl TokenValidator for Authority {
    fn validate(&self, token: &JwtRef) -> Result<JwtClaims, BoxError> {
        Ok(self.verify_token::<JwtClaims>(token, &ScopePolicy::allow_any())?)
    }
}

/// How tokens are validated
#[derive(Clone, Debug)]
pub enum TokenValidationParameters {
    /// Validates against a fixed key set
    Static {
        /// Checks applied to the token's header and claims
        validator: jwt::CoreValidator,
        /// Keys tokens may be signed with
        signing_keys: Jwks,
    },
    /// Validates against the configuration published by an OpenID Connect
    /// provider
    ///
    /// The configuration is fetched on first use and cached. When signing
    /// keys are supplied up front, nothing is fetched.
    OpenIdConnect {
        /// The provider's discovery document URL
        configuration_url: String,
        /// Checks applied to the token's header and claims
        validator: jwt::CoreValidator,
        /// Keys to use instead of the provider's published keys
        signing_keys: Option<Jwks>,
    },
}

/// A custom check run after a token has been validated
///
/// Rejects access by returning an authorization error.
#[async_trait]
pub trait JwtAuthorizationFilter: Send + Sync {
    /// Decides whether the authenticated identity may proceed
    async fn authorize(
        &self,
        principal: &ClaimsPrincipal,
        token: &ValidatedToken,
        markers: &[Authorize],
    ) -> Result<(), Error>;
}

#[async_trait]
impl<F, Fut> JwtAuthorizationFilter for F
where
    F: Fn(ClaimsPrincipal, ValidatedToken, Vec<Authorize>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), Error>> + Send,
{
    async fn authorize(
        &self,
        principal: &ClaimsPrincipal,
        token: &ValidatedToken,
        markers: &[Authorize],
    ) -> Result<(), Error> {
        (self)(principal.clone(), token.clone(), markers.to_vec()).await
    }
}

/// Token validation settings and the optional post-validation check
#[derive(Clone)]
pub struct JwtAuthenticationParameters {
    /// How tokens are validated
    pub validation: TokenValidationParameters,
    /// An additional check run after validation
    pub authorization_filter: Option<Arc<dyn JwtAuthorizationFilter>>,
}

impl JwtAuthenticationParameters {
    /// Validates tokens as described by `validation`
    pub fn new(validation: TokenValidationParameters) -> Self {
        Self {
            validation,
            authorization_filter: None,
        }
    }

    /// Runs `filter` after each successful validation
    #[must_use]
    pub fn with_authorization_filter(mut self, filter: impl JwtAuthorizationFilter + 'static) -> Self {
        self.authorization_filter = Some(Arc::new(filter));
        self
    }
}

impl fmt::Debug for JwtAuthenticationParameters {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("JwtAuthenticationParameters")
            .field("validation", &self.validation)
            .field(
                "authorization_filter",
                &self.authorization_filter.as_ref().map(|_| ".."),
            )
            .finish()
    }
}

/// Validates bearer tokens
pub struct JwtAuthenticator {
    parameters: Option<JwtAuthenticationParameters>,
    retriever: Arc<dyn ConfigurationRetriever>,
    validator: tokio::sync::OnceCell<Arc<dyn TokenValidator>>,
}

impl JwtAuthenticator {
    /// Constructs an authenticator; without parameters every call fails
    pub fn new(parameters: Option<JwtAuthenticationParameters>) -> Self {
        Self::with_retriever(parameters, Arc::new(HttpConfigurationRetriever::new()))
    }

    /// Constructs an authenticator fetching OpenID Connect configuration
    /// through `retriever`
    pub fn with_retriever(
        parameters: Option<JwtAuthenticationParameters>,
        retriever: Arc<dyn ConfigurationRetriever>,
    ) -> Self {
        Self {
            parameters,
            retriever,
            validator: tokio::sync::OnceCell::new(),
        }
    }

    /// The configured parameters
    pub fn parameters(&self) -> Option<&JwtAuthenticationParameters> {
        self.parameters.as_ref()
    }

    /// Validates the raw value of an `Authorization` header
    ///
    /// # Errors
    ///
    /// Fails with an authentication error if the authenticator is
    /// unconfigured, the header is not a bearer token, the OpenID Connect
    /// configuration cannot be retrieved, or the token is rejected.
    pub async fn authenticate(
        &self,
        authorization_header: &str,
    ) -> Result<(ClaimsPrincipal, ValidatedToken), Error> {
        let parameters = self.parameters.as_ref().ok_or_else(|| {
            Error::invalid_configuration("JWT authentication parameters have not been configured")
        })?;

        let token = authorization_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .ok_or_else(|| Error::authentication("Expected Bearer token in Authorization header"))?;

        let validator = self
            .validator
            .get_or_try_init(|| self.build_validator(&parameters.validation))
            .await?;

        let token = JwtRef::from_str(token);
        let claims = validator
            .validate(token)
            .map_err(|e| {
                tracing::debug!(error = %e, "JWT validation failed");
                Error::authentication_with_source("Token validation failed", e)
            })?;

        let principal = claims.to_principal();
        tracing::debug!(subject = ?principal.name, "JWT accepted");

        Ok((
            principal,
            ValidatedToken {
                token: token.to_owned(),
                claims,
            },
        ))
    }

    async fn build_validator(
        &self,
        validation: &TokenValidationParameters,
    ) -> Result<Arc<dyn TokenValidator>, Error> {
        let authority = match validation {
            TokenValidationParameters::Static {
                validator,
                signing_keys,
            }
            | TokenValidationParameters::OpenIdConnect {
                validator,
                signing_keys: Some(signing_keys),
                ..
            } => Authority::new(signing_keys.clone(), validator.clone()),
            TokenValidationParameters::OpenIdConnect {
                configuration_url,
                validator,
                signing_keys: None,
            } => {
                let configuration = self
                    .retriever
                    .retrieve(configuration_url)
                    .await
                    .map_err(|e| {
                        tracing::warn!(oidc.url = %configuration_url, error = %e, "unable to retrieve OpenID Connect configuration");
                        Error::authentication_with_source(
                            "Failed to retrieve OpenID Connect configuration",
                            e,
                        )
                    })?;

                let validator = match configuration.issuer {
                    Some(issuer) => validator.clone().require_issuer(issuer),
                    None => validator.clone(),
                };

                Authority::new(configuration.signing_keys, validator)
            }
        };

        Ok(Arc::new(authority))
    }
}

impl fmt::Debug for JwtAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("JwtAuthenticator")
            .field("parameters", &self.parameters)
            .field("initialized", &self.validator.initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sign, signing_key, validator, AUDIENCE, ISSUER};
    use crate::oidc::OpenIdConfiguration;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn static_authenticator() -> JwtAuthenticator {
        let mut keys = Jwks::default();
        keys.add_key(signing_key());
        JwtAuthenticator::new(Some(JwtAuthenticationParameters::new(
            TokenValidationParameters::Static {
                validator: validator(),
                signing_keys: keys,
            },
        )))
    }

    #[derive(Debug, Default)]
    struct CountingRetriever {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ConfigurationRetriever for CountingRetriever {
        async fn retrieve(&self, _url: &str) -> Result<OpenIdConfiguration, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut signing_keys = Jwks::default();
            signing_keys.add_key(signing_key());
            Ok(OpenIdConfiguration {
                issuer: Some(jwt::Issuer::from_static(ISSUER)),
                signing_keys,
            })
        }
    }

    #[tokio::test]
    async fn valid_token_yields_principal() {
        let token = sign(json!({ "sub": "ada", "role": "admin", "scope": "read write" }));
        let (principal, validated) = static_authenticator()
            .authenticate(&format!("Bearer {token}"))
            .await
            .unwrap();

        assert_eq!(principal.name.as_deref(), Some("ada"));
        assert_eq!(principal.claim("role"), Some(&json!("admin")));
        assert_eq!(principal.claim("iss"), Some(&json!(ISSUER)));
        assert_eq!(validated.claims.aud.iter().next().map(|a| a.as_str()), Some(AUDIENCE));
    }

    #[tokio::test]
    async fn missing_bearer_prefix_is_rejected() {
        let token = sign(json!({ "sub": "ada" }));
        let err = static_authenticator().authenticate(&token).await.unwrap_err();
        assert_eq!(err.to_string(), "Expected Bearer token in Authorization header");
    }

    #[tokio::test]
    async fn tampered_token_fails_validation() {
        let token = sign(json!({ "sub": "ada" }));
        let tampered = format!("Bearer {token}x");
        let err = static_authenticator().authenticate(&tampered).await.unwrap_err();
        assert_eq!(err.to_string(), "Token validation failed");
        assert_eq!(err.kind(), fnhttp::ErrorKind::Authentication);
    }

    #[tokio::test]
    async fn openid_configuration_is_fetched_once() {
        let retriever = Arc::new(CountingRetriever::default());
        let authenticator = JwtAuthenticator::with_retriever(
            Some(JwtAuthenticationParameters::new(
                TokenValidationParameters::OpenIdConnect {
                    configuration_url: "https://login.example.com/.well-known/openid-configuration"
                        .to_owned(),
                    validator: validator(),
                    signing_keys: None,
                },
            )),
            retriever.clone(),
        );

        for _ in 0..3 {
            let token = sign(json!({ "sub": "ada" }));
            authenticator
                .authenticate(&format!("Bearer {token}"))
                .await
                .unwrap();
        }

        assert_eq!(retriever.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pre_supplied_keys_skip_discovery() {
        let retriever = Arc::new(CountingRetriever::default());
        let mut keys = Jwks::default();
        keys.add_key(signing_key());
        let authenticator = JwtAuthenticator::with_retriever(
            Some(JwtAuthenticationParameters::new(
                TokenValidationParameters::OpenIdConnect {
                    configuration_url: "https://login.example.com/.well-known/openid-configuration"
                        .to_owned(),
                    validator: validator(),
                    signing_keys: Some(keys),
                },
            )),
            retriever.clone(),
        );

        let token = sign(json!({ "sub": "ada" }));
        authenticator
            .authenticate(&format!("Bearer {token}"))
            .await
            .unwrap();

        assert_eq!(retriever.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unconfigured_authenticator_fails() {
        let err = JwtAuthenticator::new(None)
            .authenticate("Bearer abc")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration { .. }));
    }
}
