//! Authentication and authorization for `fnhttp` functions
//!
//! Functions declare the schemes they require with
//! [`FunctionDescriptor::authorize`](fnhttp::FunctionDescriptor::authorize).
//! At startup, the descriptors are gathered into a [`FunctionRegistry`],
//! and an [`HttpAuthorizationFilter`] built from that registry and the
//! host's [`HttpAuthenticationOptions`] is placed in the pipeline ahead of
//! parameter assignment.
//!
//! ```
//! use std::sync::Arc;
//!
//! use fnhttp::{FunctionDescriptor, HttpRequest, HttpRequestStore, Pipeline, Scheme};
//! use fnhttp_auth::{
//!     BasicAuthenticationParameters, FunctionRegistry, HttpAuthenticationOptions,
//!     HttpAuthorizationFilter,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let descriptors = vec![
//!     FunctionDescriptor::new("admin").trigger("req").user("user").authorize(Scheme::Basic),
//! ];
//!
//! let registry = Arc::new(FunctionRegistry::discover(descriptors)?);
//! let options = HttpAuthenticationOptions::new()
//!     .with_basic(BasicAuthenticationParameters::default().with_credential("admin", "hunter2"));
//!
//! let pipeline = Pipeline::builder(Arc::new(HttpRequestStore::new()))
//!     .with_request_metadata()
//!     .authorization(Arc::new(HttpAuthorizationFilter::new(registry, options)))
//!     .with_parameter_assignment(None)
//!     .build();
//! # let _ = pipeline;
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod api_key;
mod basic;
mod filter;
mod jwt;
mod oauth2;
mod oidc;
mod options;
mod registry;

#[cfg(test)]
mod test_support;

pub use api_key::{ApiKeyAuthenticationParameters, ApiKeyAuthenticator, ApiKeyVerifier};
pub use basic::{BasicAuthenticationParameters, BasicAuthenticator};
pub use filter::HttpAuthorizationFilter;
pub use jwt::{
    JwtAuthenticationParameters, JwtAuthenticator, JwtAuthorizationFilter, JwtClaims,
    TokenValidationParameters, TokenValidator, ValidatedToken,
};
pub use oauth2::{OAuth2AuthenticationParameters, OAuth2Authenticator, OAuth2Authorizer};
pub use oidc::{ConfigurationRetriever, HttpConfigurationRetriever, OpenIdConfiguration};
pub use options::HttpAuthenticationOptions;
pub use registry::{DiscoveryError, FunctionRegistry};
