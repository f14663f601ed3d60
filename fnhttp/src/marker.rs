//! Declarative markers attached to parameters and functions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where in the request a parameter value is read from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// The request body
    Body,
    /// A form field or uploaded file
    Form,
    /// A request header
    Header,
    /// A query string parameter
    Query,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Body => "body",
            Self::Form => "form",
            Self::Header => "header",
            Self::Query => "query",
        };
        f.write_str(s)
    }
}

/// Describes the source of a single declared parameter
///
/// ```
/// use fnhttp::Source;
///
/// let source = Source::header().named("x-request-id").required();
/// assert_eq!(source.resolved_name("request_id"), "x-request-id");
/// assert!(source.is_required());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct Source {
    kind: SourceKind,
    name: Option<String>,
    required: bool,
}

impl Source {
    const fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            name: None,
            required: false,
        }
    }

    /// The parameter is read from the request body
    pub const fn body() -> Self {
        Self::new(SourceKind::Body)
    }

    /// The parameter is read from a form field or file
    pub const fn form() -> Self {
        Self::new(SourceKind::Form)
    }

    /// The parameter is read from a header
    pub const fn header() -> Self {
        Self::new(SourceKind::Header)
    }

    /// The parameter is read from the query string
    pub const fn query() -> Self {
        Self::new(SourceKind::Query)
    }

    /// Overrides the name used to locate the value in the request
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Marks the value as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// The kind of request location
    pub const fn kind(&self) -> SourceKind {
        self.kind
    }

    /// The name override, if any
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether the value must be present
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// The name used for lookup, defaulting to the parameter's own name
    pub fn resolved_name<'a>(&'a self, parameter: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(parameter)
    }
}

/// An authentication scheme a function may require
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    /// HTTP Basic credentials
    Basic,
    /// An opaque OAuth2 bearer token checked by a custom authorizer
    OAuth2,
    /// A JSON Web Token bearer token
    Jwt,
    /// An API key sent in a header
    HeaderApiKey,
    /// An API key sent in the query string
    QueryApiKey,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Requires the caller to authenticate with the given scheme
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Authorize {
    scheme: Scheme,
}

impl Authorize {
    /// Requires authentication with `scheme`
    pub const fn new(scheme: Scheme) -> Self {
        Self { scheme }
    }

    /// The required scheme
    pub const fn scheme(&self) -> Scheme {
        self.scheme
    }
}

impl From<Scheme> for Authorize {
    fn from(scheme: Scheme) -> Self {
        Self::new(scheme)
    }
}
