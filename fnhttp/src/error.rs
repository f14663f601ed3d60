//! Errors raised while binding parameters or authenticating callers

use std::{error::Error as StdError, fmt::Write};

use http::StatusCode;
use thiserror::Error;

/// A boxed, thread-safe error
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// The classes of failure that can occur before a function body runs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A parameter marked as required was absent or empty
    ParameterRequired,
    /// A raw value could not be converted to the declared type
    FormatConversion,
    /// Credentials were missing, malformed, or failed validation
    Authentication,
    /// Credentials were valid, but access was not granted
    Authorization,
}

impl ErrorKind {
    /// The HTTP status code used when reporting this kind of failure
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::ParameterRequired | Self::FormatConversion => StatusCode::BAD_REQUEST,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Authorization => StatusCode::FORBIDDEN,
        }
    }
}

/// An error raised by one of the invocation filters
#[derive(Debug, Error)]
pub enum Error {
    /// A required parameter was not present in the request
    #[error("{message}")]
    ParameterRequired {
        /// Description of the missing value
        message: String,
        /// Name of the declared parameter
        parameter: String,
    },
    /// A request value could not be converted into the declared type
    #[error("{message}")]
    ParameterFormatConversion {
        /// Description of the failure
        message: String,
        /// Name of the declared parameter
        parameter: String,
        /// The underlying conversion failure
        #[source]
        source: Option<BoxError>,
    },
    /// The caller could not be authenticated
    #[error("{message}")]
    Authentication {
        /// Description of the failure
        message: String,
        /// The underlying validation failure
        #[source]
        source: Option<BoxError>,
    },
    /// An authenticator was used without its mandatory configuration
    #[error("{message}")]
    InvalidConfiguration {
        /// Description of the missing configuration
        message: String,
    },
    /// The caller was authenticated but is not allowed access
    #[error("{message}")]
    Authorization {
        /// Description of the failure
        message: String,
        /// The underlying policy failure
        #[source]
        source: Option<BoxError>,
    },
}

impl Error {
    /// A required parameter was missing
    pub fn parameter_required(message: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self::ParameterRequired {
            message: message.into(),
            parameter: parameter.into(),
        }
    }

    /// A value could not be converted
    pub fn format_conversion(message: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self::ParameterFormatConversion {
            message: message.into(),
            parameter: parameter.into(),
            source: None,
        }
    }

    /// A value could not be converted because of an underlying error
    pub fn format_conversion_with_source(
        message: impl Into<String>,
        parameter: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::ParameterFormatConversion {
            message: message.into(),
            parameter: parameter.into(),
            source: Some(source.into()),
        }
    }

    /// Authentication failed
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
            source: None,
        }
    }

    /// Authentication failed because of an underlying error
    pub fn authentication_with_source(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Authentication {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Mandatory authenticator configuration was absent
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Access was denied
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
            source: None,
        }
    }

    /// Access was denied because of an underlying error
    pub fn authorization_with_source(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Authorization {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// The class of this failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ParameterRequired { .. } => ErrorKind::ParameterRequired,
            Self::ParameterFormatConversion { .. } => ErrorKind::FormatConversion,
            Self::Authentication { .. } | Self::InvalidConfiguration { .. } => {
                ErrorKind::Authentication
            }
            Self::Authorization { .. } => ErrorKind::Authorization,
        }
    }

    /// The declared parameter this failure relates to, for binding failures
    pub fn parameter(&self) -> Option<&str> {
        match self {
            Self::ParameterRequired { parameter, .. }
            | Self::ParameterFormatConversion { parameter, .. } => Some(parameter),
            _ => None,
        }
    }

    /// Whether this failure came from parameter binding
    pub fn is_binding(&self) -> bool {
        self.parameter().is_some()
    }
}

/// Renders an error and all of its sources, joined by `"; "`
pub fn message_chain(error: &(dyn StdError + 'static)) -> String {
    let mut description = error.to_string();
    let mut err = error;
    while let Some(next) = err.source() {
        let _ = write!(&mut description, "; {next}");
        err = next;
    }
    description
}
