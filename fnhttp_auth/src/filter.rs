//! Authenticates and authorizes callers before the function runs

use std::sync::Arc;

use async_trait::async_trait;
use fnhttp::{
    Argument, Authorize, ClaimsPrincipal, Error, HttpRequest, Invocation, InvocationFilter, Scheme,
};

use crate::{
    ApiKeyAuthenticator, BasicAuthenticator, FunctionRegistry, HttpAuthenticationOptions,
    JwtAuthenticator, OAuth2Authenticator,
};

/// Enforces each function's [`Authorize`] markers
///
/// Schemes are tried in a fixed order: JWT, then OAuth2, then API keys, then
/// Basic. Only the first scheme the function declares is enforced. Functions
/// absent from the registry pass through unauthenticated.
#[derive(Debug)]
pub struct HttpAuthorizationFilter {
    registry: Arc<FunctionRegistry>,
    basic: BasicAuthenticator,
    api_key: ApiKeyAuthenticator,
    jwt: JwtAuthenticator,
    oauth2: OAuth2Authenticator,
}

impl HttpAuthorizationFilter {
    /// Enforces markers of the functions in `registry` using `options`
    pub fn new(registry: Arc<FunctionRegistry>, options: HttpAuthenticationOptions) -> Self {
        Self::with_jwt_authenticator(
            registry,
            options.clone(),
            JwtAuthenticator::new(options.jwt),
        )
    }

    /// As [`new`](Self::new), with a preconfigured JWT authenticator
    ///
    /// The `jwt` member of `options` is ignored.
    pub fn with_jwt_authenticator(
        registry: Arc<FunctionRegistry>,
        options: HttpAuthenticationOptions,
        jwt: JwtAuthenticator,
    ) -> Self {
        Self {
            registry,
            basic: BasicAuthenticator::new(options.basic),
            api_key: ApiKeyAuthenticator::new(options.api_key),
            jwt,
            oauth2: OAuth2Authenticator::new(options.oauth2),
        }
    }

    async fn authorize_jwt(
        &self,
        invocation: &Invocation,
        markers: &[Authorize],
    ) -> Result<(), Error> {
        let header = authorization_header(invocation.request())?;
        let (principal, token) = self.jwt.authenticate(&header).await?;

        if let Some(filter) = self
            .jwt
            .parameters()
            .and_then(|p| p.authorization_filter.as_ref())
        {
            filter.authorize(&principal, &token, markers).await?;
        }

        assign_principal(invocation, principal);
        Ok(())
    }

    async fn authorize_oauth2(
        &self,
        invocation: &Invocation,
        markers: &[Authorize],
    ) -> Result<(), Error> {
        let header = authorization_header(invocation.request())?;
        let markers: Vec<Authorize> = markers
            .iter()
            .filter(|m| m.scheme() == Scheme::OAuth2)
            .copied()
            .collect();
        let principal = self
            .oauth2
            .authenticate(&header, invocation.request(), &markers)
            .await?;

        assign_principal(invocation, principal);
        Ok(())
    }

    async fn authorize_api_key(
        &self,
        invocation: &Invocation,
        markers: &[Authorize],
    ) -> Result<(), Error> {
        let request = invocation.request();
        let parameters = self.api_key.parameters();

        for marker in markers {
            let values = match marker.scheme() {
                Scheme::HeaderApiKey => parameters
                    .and_then(|p| p.header_name.as_deref())
                    .and_then(|name| request.header_values(name)),
                Scheme::QueryApiKey => parameters
                    .and_then(|p| p.query_parameter_name.as_deref())
                    .and_then(|name| request.query_values(name)),
                _ => continue,
            };

            let key = values
                .and_then(|v| v.into_iter().next())
                .unwrap_or_default();

            if !self.api_key.authenticate(&key, request).await? {
                tracing::debug!(scheme = %marker.scheme(), "API key rejected");
                return Err(Error::authorization("Unauthorized"));
            }
        }

        Ok(())
    }

    fn authorize_basic(&self, invocation: &Invocation) -> Result<(), Error> {
        let header = authorization_header(invocation.request())?;

        if self.basic.authenticate(&header)? {
            Ok(())
        } else {
            Err(Error::authorization("Unauthorized"))
        }
    }
}

fn authorization_header(request: &HttpRequest) -> Result<String, Error> {
    request
        .header_values("authorization")
        .and_then(|v| v.into_iter().next())
        .ok_or_else(|| Error::authentication("Authorization header is missing"))
}

fn assign_principal(invocation: &Invocation, principal: ClaimsPrincipal) {
    for (name, argument) in invocation.arguments().iter() {
        if let Argument::User(user) = argument {
            if user.set(principal.clone()).is_err() {
                tracing::trace!(parameter = name, "identity already assigned");
            }
        }
    }
}

fn declares(markers: &[Authorize], schemes: &[Scheme]) -> bool {
    markers.iter().any(|m| schemes.contains(&m.scheme()))
}

#[async_trait]
impl InvocationFilter for HttpAuthorizationFilter {
    fn name(&self) -> &'static str {
        "authorization"
    }

    async fn on_executing(&self, invocation: &Invocation) -> Result<(), Error> {
        let descriptor = match self.registry.get(invocation.function_name()) {
            Some(descriptor) => descriptor,
            None => {
                tracing::trace!("function does not require authorization");
                return Ok(());
            }
        };

        let markers = descriptor.authorizations();

        if declares(markers, &[Scheme::Jwt]) {
            self.authorize_jwt(invocation, markers).await
        } else if declares(markers, &[Scheme::OAuth2]) {
            self.authorize_oauth2(invocation, markers).await
        } else if declares(markers, &[Scheme::HeaderApiKey, Scheme::QueryApiKey]) {
            self.authorize_api_key(invocation, markers).await
        } else if declares(markers, &[Scheme::Basic]) {
            self.authorize_basic(invocation)
        } else {
            Ok(())
        }
    }
}
