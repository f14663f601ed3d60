//! Populates request-bound parameter holders before the function runs

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    deserializer::{DeserializerResult, ParamValueDeserializer},
    error::BoxError,
    filter::{InvocationFilter, Outcome},
    param::ParamSlot,
    Error, FormFile, FormFiles, HttpRequestStore, Invocation, SourceKind,
};

/// Registers every invocation's request in the [`HttpRequestStore`]
///
/// Placed first in the pipeline so that failures in later filters can
/// still resolve the request.
pub struct RequestMetadataFilter {
    store: Arc<HttpRequestStore>,
}

impl RequestMetadataFilter {
    /// Registers requests in `store`
    pub fn new(store: Arc<HttpRequestStore>) -> Self {
        Self { store }
    }
}

impl fmt::Debug for RequestMetadataFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RequestMetadataFilter").finish_non_exhaustive()
    }
}

#[async_trait]
impl InvocationFilter for RequestMetadataFilter {
    fn name(&self) -> &'static str {
        "request-metadata"
    }

    async fn on_executing(&self, invocation: &Invocation) -> Result<(), Error> {
        self.store
            .set(invocation.id(), Arc::clone(invocation.request()));
        Ok(())
    }
}

/// Locates, converts, and assigns every request-bound parameter
///
/// A configured [`ParamValueDeserializer`] is always consulted first; the
/// default conversion only runs when it declines.
pub struct HttpParamAssignmentFilter {
    store: Arc<HttpRequestStore>,
    deserializer: Option<Arc<dyn ParamValueDeserializer>>,
}

impl HttpParamAssignmentFilter {
    /// Constructs a filter using only the default conversions
    pub fn new(store: Arc<HttpRequestStore>) -> Self {
        Self {
            store,
            deserializer: None,
        }
    }

    /// Consults `deserializer` before the default conversions
    #[must_use]
    pub fn with_deserializer(mut self, deserializer: Arc<dyn ParamValueDeserializer>) -> Self {
        self.deserializer = Some(deserializer);
        self
    }

    async fn assign_body(
        &self,
        invocation: &Invocation,
        parameter: &str,
        slot: &dyn ParamSlot,
    ) -> Result<(), Error> {
        let request = invocation.request();
        let body = request.body();

        if let Some(deserializer) = &self.deserializer {
            let result = deserializer
                .deserialize_body(body, slot.target(), invocation.function_name(), request)
                .await
                .map_err(|e| body_conversion_failed(parameter, slot, e))?;

            if let DeserializerResult::Handled(value) = result {
                return slot
                    .assign_value(value)
                    .map_err(|e| assignment_failed(parameter, e));
            }
        }

        if body.is_empty() {
            if slot.source().is_required() {
                return Err(Error::parameter_required(
                    "Body parameter is required",
                    parameter,
                ));
            }
            tracing::trace!(parameter, "body is empty, leaving parameter unset");
            return Ok(());
        }

        let media_type = request.media_type().unwrap_or_default();
        let result = if is_xml(&media_type) {
            utf8(body).and_then(|text| slot.assign_xml(text))
        } else if is_json(&media_type) {
            slot.assign_json(body)
        } else if media_type == "text/plain" {
            utf8(body).and_then(|text| slot.assign_text(text))
        } else {
            return Err(Error::format_conversion(
                format!("Body with content type '{media_type}' is unsupported"),
                parameter,
            ));
        };

        result.map_err(|e| body_conversion_failed(parameter, slot, e))
    }

    async fn assign_form(
        &self,
        invocation: &Invocation,
        parameter: &str,
        slot: &dyn ParamSlot,
    ) -> Result<(), Error> {
        let source = slot.source();
        let field = source.resolved_name(parameter);
        let form = invocation.request().form();

        if let Some(values) = form.and_then(|f| f.field_values(field)) {
            if source.is_required() && all_empty(&values) {
                return Err(Error::parameter_required(
                    format!("Form field '{field}' is required"),
                    parameter,
                ));
            }
            return self
                .assign_strings(invocation, parameter, slot, field, &values)
                .await;
        }

        if let Some(file) = form.and_then(|f| f.file(field)) {
            return self.assign_file(invocation, parameter, slot, field, file).await;
        }

        if slot.target().is::<FormFiles>() {
            let files = form.map(|f| f.files().to_vec()).unwrap_or_default();
            if files.is_empty() && source.is_required() {
                return Err(Error::parameter_required(
                    "Form files are required",
                    parameter,
                ));
            }
            return slot
                .assign_value(Box::new(FormFiles(files)))
                .map_err(|e| assignment_failed(parameter, e));
        }

        if source.is_required() {
            return Err(Error::parameter_required(
                format!("Form field '{field}' is required"),
                parameter,
            ));
        }

        Ok(())
    }

    async fn assign_file(
        &self,
        invocation: &Invocation,
        parameter: &str,
        slot: &dyn ParamSlot,
        field: &str,
        file: &FormFile,
    ) -> Result<(), Error> {
        let target = slot.target();

        if let Some(deserializer) = &self.deserializer {
            let result = deserializer
                .deserialize_form_file(
                    field,
                    file,
                    target,
                    invocation.function_name(),
                    invocation.request(),
                )
                .await
                .map_err(|e| file_assignment_failed(parameter, e))?;

            if let DeserializerResult::Handled(value) = result {
                return slot
                    .assign_value(value)
                    .map_err(|e| file_assignment_failed(parameter, e));
            }
        }

        let value: Box<dyn std::any::Any + Send + Sync> = if target.is::<FormFile>() {
            Box::new(file.clone())
        } else if target.is::<Bytes>() {
            Box::new(file.data.clone())
        } else if target.is::<Vec<u8>>() {
            Box::new(file.data.to_vec())
        } else if target.is::<FormFiles>() {
            let files = invocation
                .request()
                .form()
                .map(|f| f.files().to_vec())
                .unwrap_or_default();
            Box::new(FormFiles(files))
        } else {
            return Err(Error::format_conversion(
                "Only byte and form file targets are supported for uploaded files",
                parameter,
            ));
        };

        slot.assign_value(value)
            .map_err(|e| file_assignment_failed(parameter, e))
    }

    async fn assign_named(
        &self,
        invocation: &Invocation,
        parameter: &str,
        slot: &dyn ParamSlot,
    ) -> Result<(), Error> {
        let source = slot.source();
        let name = source.resolved_name(parameter);
        let request = invocation.request();

        let (values, description) = match source.kind() {
            SourceKind::Header => (request.header_values(name), "Header"),
            _ => (request.query_values(name), "Query parameter"),
        };

        match values {
            Some(values) if !(source.is_required() && all_empty(&values)) => {
                self.assign_strings(invocation, parameter, slot, name, &values)
                    .await
            }
            _ if source.is_required() => Err(Error::parameter_required(
                format!("{description} '{name}' is required"),
                parameter,
            )),
            _ => Ok(()),
        }
    }

    async fn assign_strings(
        &self,
        invocation: &Invocation,
        parameter: &str,
        slot: &dyn ParamSlot,
        name: &str,
        values: &[String],
    ) -> Result<(), Error> {
        let target = slot.target();

        if let Some(deserializer) = &self.deserializer {
            let function = invocation.function_name();
            let request = &**invocation.request();

            let result = match slot.source().kind() {
                SourceKind::Header => {
                    deserializer
                        .deserialize_header(name, values, target, function, request)
                        .await
                }
                SourceKind::Form => {
                    deserializer
                        .deserialize_form_field(name, values, target, function, request)
                        .await
                }
                SourceKind::Query => {
                    deserializer
                        .deserialize_query_parameter(name, values, target, function, request)
                        .await
                }
                SourceKind::Body => Ok(DeserializerResult::NotHandled),
            };

            let result = result.map_err(|e| {
                Error::format_conversion_with_source(
                    format!("Format conversion failed for argument '{parameter}'"),
                    parameter,
                    e,
                )
            })?;

            if let DeserializerResult::Handled(value) = result {
                return slot
                    .assign_value(value)
                    .map_err(|e| assignment_failed(parameter, e));
            }
        }

        tracing::trace!(parameter, values = values.len(), %target, "converting request values");

        slot.assign_values(values).map_err(|e| {
            Error::format_conversion_with_source(
                format!("Failed to convert input of argument '{parameter}' to type '{target}'"),
                parameter,
                e,
            )
        })
    }
}

impl fmt::Debug for HttpParamAssignmentFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HttpParamAssignmentFilter")
            .field("custom_deserializer", &self.deserializer.is_some())
            .finish()
    }
}

#[async_trait]
impl InvocationFilter for HttpParamAssignmentFilter {
    fn name(&self) -> &'static str {
        "parameter-assignment"
    }

    async fn on_executing(&self, invocation: &Invocation) -> Result<(), Error> {
        self.store
            .set(invocation.id(), Arc::clone(invocation.request()));

        for (parameter, slot) in invocation.arguments().params() {
            if slot.is_assigned() {
                continue;
            }

            let slot = &**slot;
            tracing::trace!(parameter, source = %slot.source().kind(), "assigning parameter");

            match slot.source().kind() {
                SourceKind::Body => self.assign_body(invocation, parameter, slot).await?,
                SourceKind::Form => self.assign_form(invocation, parameter, slot).await?,
                SourceKind::Header | SourceKind::Query => {
                    self.assign_named(invocation, parameter, slot).await?
                }
            }
        }

        Ok(())
    }

    async fn on_executed(&self, invocation: &Invocation, outcome: Outcome) {
        if outcome.is_success() {
            self.store.remove(invocation.id());
        }
    }
}

fn is_xml(media_type: &str) -> bool {
    media_type.ends_with("/xml") || media_type.ends_with("+xml")
}

fn is_json(media_type: &str) -> bool {
    media_type.ends_with("/json") || media_type.ends_with("+json")
}

fn utf8(body: &[u8]) -> Result<&str, BoxError> {
    Ok(std::str::from_utf8(body)?)
}

fn all_empty(values: &[String]) -> bool {
    values.iter().all(|v| v.is_empty())
}

fn body_conversion_failed(parameter: &str, slot: &dyn ParamSlot, error: BoxError) -> Error {
    Error::format_conversion_with_source(
        format!("Failed to convert body to type '{}'", slot.target()),
        parameter,
        error,
    )
}

fn assignment_failed(parameter: &str, error: BoxError) -> Error {
    Error::format_conversion_with_source(
        format!("Failed to assign parameter '{parameter}' value"),
        parameter,
        error,
    )
}

fn file_assignment_failed(parameter: &str, error: BoxError) -> Error {
    Error::format_conversion_with_source("Form file assignment failed", parameter, error)
}
