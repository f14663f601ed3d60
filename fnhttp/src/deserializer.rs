//! Hooks for overriding how raw request values are converted

use std::any::Any;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{error::BoxError, FormFile, FunctionNameRef, HttpRequest, TargetType};

/// The outcome of a custom deserialization attempt
#[derive(Debug)]
pub enum DeserializerResult {
    /// The hook declined; the default conversion runs instead
    NotHandled,
    /// The hook produced a value of the declared type
    Handled(Box<dyn Any + Send + Sync>),
}

impl DeserializerResult {
    /// A handled result carrying `value`
    pub fn handled<T: Any + Send + Sync>(value: T) -> Self {
        Self::Handled(Box::new(value))
    }

    /// Whether the hook produced a value
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled(_))
    }
}

/// Overrides the default conversion of request values, per source kind
///
/// Every method defaults to [`DeserializerResult::NotHandled`], so an
/// implementation only needs to override the sources it cares about. A
/// handled value must be of the declared [`TargetType`].
///
/// ```
/// use async_trait::async_trait;
/// use fnhttp::{
///     BoxError, DeserializerResult, FunctionNameRef, HttpRequest, ParamValueDeserializer,
///     TargetType,
/// };
///
/// #[derive(Debug)]
/// struct UppercaseHeaders;
///
/// #[async_trait]
/// impl ParamValueDeserializer for UppercaseHeaders {
///     async fn deserialize_header(
///         &self,
///         _header_name: &str,
///         values: &[String],
///         target: TargetType,
///         _function: &FunctionNameRef,
///         _request: &HttpRequest,
///     ) -> Result<DeserializerResult, BoxError> {
///         if target.is::<String>() {
///             Ok(DeserializerResult::handled(values.join(",").to_uppercase()))
///         } else {
///             Ok(DeserializerResult::NotHandled)
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait ParamValueDeserializer: Send + Sync {
    /// Converts the request body
    async fn deserialize_body(
        &self,
        _body: &Bytes,
        _target: TargetType,
        _function: &FunctionNameRef,
        _request: &HttpRequest,
    ) -> Result<DeserializerResult, BoxError> {
        Ok(DeserializerResult::NotHandled)
    }

    /// Converts the values of a header
    async fn deserialize_header(
        &self,
        _header_name: &str,
        _values: &[String],
        _target: TargetType,
        _function: &FunctionNameRef,
        _request: &HttpRequest,
    ) -> Result<DeserializerResult, BoxError> {
        Ok(DeserializerResult::NotHandled)
    }

    /// Converts the values of a form field
    async fn deserialize_form_field(
        &self,
        _field_name: &str,
        _values: &[String],
        _target: TargetType,
        _function: &FunctionNameRef,
        _request: &HttpRequest,
    ) -> Result<DeserializerResult, BoxError> {
        Ok(DeserializerResult::NotHandled)
    }

    /// Converts the values of a query parameter
    async fn deserialize_query_parameter(
        &self,
        _parameter_name: &str,
        _values: &[String],
        _target: TargetType,
        _function: &FunctionNameRef,
        _request: &HttpRequest,
    ) -> Result<DeserializerResult, BoxError> {
        Ok(DeserializerResult::NotHandled)
    }

    /// Converts an uploaded form file
    async fn deserialize_form_file(
        &self,
        _field_name: &str,
        _file: &FormFile,
        _target: TargetType,
        _function: &FunctionNameRef,
        _request: &HttpRequest,
    ) -> Result<DeserializerResult, BoxError> {
        Ok(DeserializerResult::NotHandled)
    }
}
