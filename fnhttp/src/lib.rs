//! Typed parameter binding and invocation filters for HTTP-triggered
//! functions
//!
//! A hosted function is described by a [`FunctionDescriptor`] that declares
//! where each of its parameters comes from (body, form, header, or query)
//! and which authentication schemes it requires. For each request, the
//! descriptor is instantiated into an [`Invocation`] holding fresh
//! [`HttpParam`] and [`HttpUser`] holders, and a [`Pipeline`] of
//! [`InvocationFilter`]s populates those holders before the function body
//! runs.
//!
//! Failures raised by a filter are recorded on the invocation rather than
//! propagated directly. The function body is then skipped and the
//! exception stage turns the recorded failure into a response through an
//! [`ErrorFormatter`].
//!
//! ```
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use fnhttp::{FunctionDescriptor, HttpRequest, HttpRequestStore, Pipeline, Source};
//! use http::{Request, Response, StatusCode};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let descriptor = FunctionDescriptor::new("greet")
//!     .trigger("req")
//!     .param::<String>("name", Source::query().required());
//!
//! let pipeline = Pipeline::builder(Arc::new(HttpRequestStore::new()))
//!     .with_request_metadata()
//!     .with_parameter_assignment(None)
//!     .build();
//!
//! let request = Request::get("/greet?name=Ada").body(Bytes::new()).unwrap();
//! let invocation = descriptor.instantiate(Arc::new(HttpRequest::from(request)));
//!
//! let response = pipeline
//!     .invoke(invocation, |inv| async move {
//!         let name = inv.arguments().param::<String>("name").and_then(|p| p.cloned());
//!         let greeting = format!("Hello, {}!", name.unwrap_or_default());
//!         Ok(Response::new(Bytes::from(greeting)))
//!     })
//!     .await;
//!
//! assert_eq!(response.status(), StatusCode::OK);
//! assert_eq!(response.body(), "Hello, Ada!");
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

mod assign;
mod deserializer;
mod error;
mod filter;
mod function;
mod invocation;
mod marker;
mod param;
mod pipeline;
mod principal;
mod request;
mod response;
mod store;
mod values;

pub use assign::{HttpParamAssignmentFilter, RequestMetadataFilter};
pub use deserializer::{DeserializerResult, ParamValueDeserializer};
pub use error::{message_chain, BoxError, Error, ErrorKind};
pub use filter::{InvocationFilter, Outcome};
pub use function::{FunctionDescriptor, FunctionName, FunctionNameRef, ParameterDeclaration};
pub use invocation::{Argument, Arguments, Invocation, InvocationId, PendingFailure};
pub use marker::{Authorize, Scheme, Source, SourceKind};
pub use param::{HttpParam, ParamSlot, TargetType};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use principal::{ClaimsPrincipal, HttpUser};
pub use request::{Form, FormFile, FormFiles, HttpRequest};
pub use response::{
    find_filter_error, DefaultErrorFormatter, DefaultExceptionHandler, ErrorFormatter,
    ExceptionFilter, ExceptionHandler,
};
pub use store::{HttpRequestStore, StoreGuard};
