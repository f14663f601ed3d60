//! Retrieval of OpenID Connect discovery documents

use aliri::{jwt, Jwks};
use async_trait::async_trait;
use fnhttp::BoxError;
use reqwest::Client;
use serde::Deserialize;

/// The issuer and signing keys published by an OpenID Connect provider
#[derive(Clone, Debug)]
pub struct OpenIdConfiguration {
    /// The issuer tokens must name, if the provider declared one
    pub issuer: Option<jwt::Issuer>,
    /// The keys tokens are signed with
    pub signing_keys: Jwks,
}

/// Fetches OpenID Connect configuration
#[async_trait]
pub trait ConfigurationRetriever: Send + Sync {
    /// Retrieves the configuration published at `configuration_url`
    async fn retrieve(&self, configuration_url: &str) -> Result<OpenIdConfiguration, BoxError>;
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    #[serde(default)]
    issuer: Option<jwt::Issuer>,
    jwks_uri: String,
}

/// Reads the discovery document and then the JWKS it points to
#[derive(Clone, Debug, Default)]
pub struct HttpConfigurationRetriever {
    client: Option<Client>,
}

impl HttpConfigurationRetriever {
    /// Uses a dedicated client for each retrieval
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the given client
    pub fn with_client(client: Client) -> Self {
        Self {
            client: Some(client),
        }
    }

    fn client(&self) -> Result<Client, reqwest::Error> {
        match &self.client {
            Some(client) => Ok(client.clone()),
            None => Client::builder()
                .user_agent(concat!("fnhttp_auth/", env!("CARGO_PKG_VERSION")))
                .build(),
        }
    }
}

#[async_trait]
impl ConfigurationRetriever for HttpConfigurationRetriever {
    async fn retrieve(&self, configuration_url: &str) -> Result<OpenIdConfiguration, BoxError> {
        let client = self.client()?;

        let response = client.get(configuration_url).send().await?;
        response.error_for_status_ref()?;
        let document = response.json::<DiscoveryDocument>().await?;

        let response = client.get(&document.jwks_uri).send().await?;
        response.error_for_status_ref()?;
        let signing_keys = response.json::<Jwks>().await?;

        tracing::info!(
            oidc.url = %configuration_url,
            jwks.url = %document.jwks_uri,
            "OpenID Connect configuration retrieved"
        );

        Ok(OpenIdConfiguration {
            issuer: document.issuer,
            signing_keys,
        })
    }
}
