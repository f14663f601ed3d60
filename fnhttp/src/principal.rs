//! The authenticated identity made available to function bodies

use std::{fmt, sync::Arc};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An authenticated identity and the claims asserted about it
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimsPrincipal {
    /// The scheme that authenticated the identity
    pub authentication_type: String,
    /// The identity's name, if one was asserted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// All claims, keyed by claim type
    #[serde(default)]
    pub claims: Map<String, Value>,
}

impl ClaimsPrincipal {
    /// Constructs a principal with no claims
    pub fn new(authentication_type: impl Into<String>) -> Self {
        Self {
            authentication_type: authentication_type.into(),
            name: None,
            claims: Map::new(),
        }
    }

    /// Sets the identity's name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a claim
    #[must_use]
    pub fn with_claim(mut self, claim_type: impl Into<String>, value: impl Into<Value>) -> Self {
        self.claims.insert(claim_type.into(), value.into());
        self
    }

    /// Looks up a claim
    pub fn claim(&self, claim_type: &str) -> Option<&Value> {
        self.claims.get(claim_type)
    }
}

/// Receives the authenticated identity for one invocation
///
/// Populated by the authorization filter once authentication succeeds and
/// read by the function body. Clones share the same cell.
#[derive(Clone, Default)]
pub struct HttpUser {
    cell: Arc<OnceCell<ClaimsPrincipal>>,
}

impl HttpUser {
    /// An empty holder
    pub fn new() -> Self {
        Self::default()
    }

    /// The authenticated identity, if any
    pub fn principal(&self) -> Option<&ClaimsPrincipal> {
        self.cell.get()
    }

    /// Assigns the identity, returning it back if one was already assigned
    pub fn set(&self, principal: ClaimsPrincipal) -> Result<(), ClaimsPrincipal> {
        self.cell.set(principal)
    }
}

impl fmt::Debug for HttpUser {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HttpUser")
            .field("authenticated", &self.cell.get().is_some())
            .finish()
    }
}
