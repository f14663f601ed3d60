//! Hosts `fnhttp` functions as `tower` services
//!
//! A [`FunctionLayer`] wraps a function body, itself a
//! `Service<Invocation>`, so that every inbound `http::Request` is buffered,
//! turned into an [`Invocation`](fnhttp::Invocation), and run through the
//! pipeline. `multipart/form-data` bodies are parsed into form fields and
//! files before any filter runs.
//!
//! ```
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use fnhttp::{BoxError, FunctionDescriptor, HttpRequestStore, Invocation, Pipeline, Source};
//! use fnhttp_tower::FunctionLayer;
//! use http::{Request, Response, StatusCode};
//! use http_body_util::{BodyExt, Full};
//! use tower::{service_fn, Layer, ServiceExt};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let descriptor = FunctionDescriptor::new("echo")
//!     .trigger("req")
//!     .param::<String>("text", Source::header().named("x-text").required());
//!
//! let pipeline = Pipeline::builder(Arc::new(HttpRequestStore::new()))
//!     .with_request_metadata()
//!     .with_parameter_assignment(None)
//!     .build();
//!
//! let service = FunctionLayer::new(pipeline, descriptor).layer(service_fn(
//!     |inv: Invocation| async move {
//!         let text = inv.arguments().param::<String>("text").and_then(|p| p.cloned());
//!         Ok::<_, BoxError>(Response::new(Bytes::from(text.unwrap_or_default())))
//!     },
//! ));
//!
//! let request = Request::get("/echo")
//!     .header("x-text", "hi")
//!     .body(Full::new(Bytes::new()))?;
//! let response = service.oneshot(request).await?;
//!
//! assert_eq!(response.status(), StatusCode::OK);
//! assert_eq!(response.into_body().collect().await?.to_bytes(), "hi");
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

mod multipart;
mod service;

pub use service::{FunctionLayer, FunctionService};
