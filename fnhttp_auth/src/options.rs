//! Per-scheme authentication settings consumed by the authorization filter

use crate::{
    ApiKeyAuthenticationParameters, BasicAuthenticationParameters, JwtAuthenticationParameters,
    OAuth2AuthenticationParameters,
};

/// Host-level authentication settings
///
/// Set once at startup. Schemes without parameters fail with a configuration
/// error when a function requires them.
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct HttpAuthenticationOptions {
    /// Settings for [`Scheme::Basic`](fnhttp::Scheme::Basic)
    pub basic: Option<BasicAuthenticationParameters>,
    /// Settings for the API key schemes
    pub api_key: Option<ApiKeyAuthenticationParameters>,
    /// Settings for [`Scheme::Jwt`](fnhttp::Scheme::Jwt)
    pub jwt: Option<JwtAuthenticationParameters>,
    /// Settings for [`Scheme::OAuth2`](fnhttp::Scheme::OAuth2)
    pub oauth2: Option<OAuth2AuthenticationParameters>,
}

impl HttpAuthenticationOptions {
    /// No scheme configured
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures Basic authentication
    pub fn with_basic(mut self, parameters: BasicAuthenticationParameters) -> Self {
        self.basic = Some(parameters);
        self
    }

    /// Configures API key authentication
    pub fn with_api_key(mut self, parameters: ApiKeyAuthenticationParameters) -> Self {
        self.api_key = Some(parameters);
        self
    }

    /// Configures JWT authentication
    pub fn with_jwt(mut self, parameters: JwtAuthenticationParameters) -> Self {
        self.jwt = Some(parameters);
        self
    }

    /// Configures OAuth2 authentication
    pub fn with_oauth2(mut self, parameters: OAuth2AuthenticationParameters) -> Self {
        self.oauth2 = Some(parameters);
        self
    }
}
