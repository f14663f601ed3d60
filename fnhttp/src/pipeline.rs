//! Runs invocations through the filter chain and the exception stage

use std::{fmt, future::Future, sync::Arc};

use bytes::Bytes;
use http::Response;

use crate::{
    assign::{HttpParamAssignmentFilter, RequestMetadataFilter},
    error::BoxError,
    filter::{InvocationFilter, Outcome},
    response::{DefaultErrorFormatter, DefaultExceptionHandler, ExceptionFilter, ExceptionHandler},
    HttpRequestStore, Invocation, ParamValueDeserializer, PendingFailure,
};

/// The chain of filters wrapped around every function invocation
///
/// Filters run in the order they were added. A failing filter stops the
/// chain and its error is recorded on the invocation; the function body is
/// then skipped and the exception stage produces the response instead.
#[derive(Clone)]
pub struct Pipeline {
    filters: Arc<[Arc<dyn InvocationFilter>]>,
    exception: ExceptionFilter,
    store: Arc<HttpRequestStore>,
}

impl Pipeline {
    /// Starts building a pipeline around `store`
    pub fn builder(store: Arc<HttpRequestStore>) -> PipelineBuilder {
        PipelineBuilder {
            store,
            metadata: None,
            authorization: Vec::new(),
            filters: Vec::new(),
            handler: None,
        }
    }

    /// The request store shared by the filters
    pub fn store(&self) -> &Arc<HttpRequestStore> {
        &self.store
    }

    /// Runs `function` for `invocation` inside the filter chain
    ///
    /// Always produces a response: either the function's own, or the one
    /// produced by the exception stage. Dropping the returned future cancels
    /// the invocation and releases its store entry.
    #[tracing::instrument(
        skip_all,
        fields(function = %invocation.function_name(), invocation.id = %invocation.id())
    )]
    pub async fn invoke<F, Fut>(&self, invocation: Invocation, function: F) -> Response<Bytes>
    where
        F: FnOnce(Invocation) -> Fut + Send,
        Fut: Future<Output = Result<Response<Bytes>, BoxError>> + Send,
    {
        let _release = self.store.release_on_drop(invocation.id());

        for filter in self.filters.iter() {
            if let Err(error) = filter.on_executing(&invocation).await {
                tracing::debug!(filter = filter.name(), %error, "pre-invocation filter failed");
                invocation.stash_failure(filter.name(), error);
                break;
            }
        }

        let result = match invocation.pending_failure() {
            Some(failure) => Err(Failure::Filter(failure)),
            None => function(invocation.clone()).await.map_err(Failure::Function),
        };

        let outcome = if result.is_ok() {
            Outcome::Succeeded
        } else {
            Outcome::Failed
        };

        for filter in self.filters.iter() {
            filter.on_executed(&invocation, outcome).await;
        }

        match result {
            Ok(response) => response,
            Err(Failure::Filter(failure)) => {
                self.exception
                    .on_exception(&invocation, failure.error())
                    .await
            }
            Err(Failure::Function(error)) => self.exception.on_exception(&invocation, &*error).await,
        }
    }
}

enum Failure<'a> {
    Filter(&'a PendingFailure),
    Function(BoxError),
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names: Vec<&str> = self.filters.iter().map(|f| f.name()).collect();
        f.debug_struct("Pipeline")
            .field("filters", &names)
            .field("exception", &self.exception)
            .finish()
    }
}

/// Builder for a [`Pipeline`]
///
/// Filters are ordered into three stages regardless of the order in which
/// they are added: request metadata, then [`authorization`](Self::authorization)
/// filters, then every other [`filter`](Self::filter) in insertion order.
/// Callers are never bound to parameters before they are authorized.
///
/// ```
/// use std::sync::Arc;
/// use fnhttp::{HttpRequestStore, Pipeline};
///
/// let pipeline = Pipeline::builder(Arc::new(HttpRequestStore::new()))
///     .with_request_metadata()
///     .with_parameter_assignment(None)
///     .build();
/// # let _ = pipeline;
/// ```
#[must_use]
pub struct PipelineBuilder {
    store: Arc<HttpRequestStore>,
    metadata: Option<Arc<dyn InvocationFilter>>,
    authorization: Vec<Arc<dyn InvocationFilter>>,
    filters: Vec<Arc<dyn InvocationFilter>>,
    handler: Option<Arc<dyn ExceptionHandler>>,
}

impl PipelineBuilder {
    /// Appends a filter to the final stage
    ///
    /// Runs after request metadata and every authorization filter. Use
    /// [`authorization`](Self::authorization) for filters that authenticate
    /// callers.
    pub fn filter(mut self, filter: Arc<dyn InvocationFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Appends a filter to the authorization stage
    ///
    /// Authorization filters run before the parameter assignment filter and
    /// any other filter added with [`filter`](Self::filter).
    pub fn authorization(mut self, filter: Arc<dyn InvocationFilter>) -> Self {
        self.authorization.push(filter);
        self
    }

    /// Registers requests in the store before any other filter runs
    pub fn with_request_metadata(mut self) -> Self {
        let filter = RequestMetadataFilter::new(Arc::clone(&self.store));
        self.metadata = Some(Arc::new(filter));
        self
    }

    /// Appends the parameter assignment filter to the final stage
    pub fn with_parameter_assignment(
        self,
        deserializer: Option<Arc<dyn ParamValueDeserializer>>,
    ) -> Self {
        let mut filter = HttpParamAssignmentFilter::new(Arc::clone(&self.store));
        if let Some(deserializer) = deserializer {
            filter = filter.with_deserializer(deserializer);
        }
        self.filter(Arc::new(filter))
    }

    /// Replaces the default exception handler
    pub fn exception_handler(mut self, handler: Arc<dyn ExceptionHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Finishes the pipeline
    pub fn build(self) -> Pipeline {
        let handler: Arc<dyn ExceptionHandler> = match self.handler {
            Some(handler) => handler,
            None => Arc::new(DefaultExceptionHandler::new(DefaultErrorFormatter::default())),
        };

        let filters: Vec<Arc<dyn InvocationFilter>> = self
            .metadata
            .into_iter()
            .chain(self.authorization)
            .chain(self.filters)
            .collect();

        Pipeline {
            filters: filters.into(),
            exception: ExceptionFilter::new(Arc::clone(&self.store), handler),
            store: self.store,
        }
    }
}

impl fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let authorization: Vec<&str> = self.authorization.iter().map(|f| f.name()).collect();
        let names: Vec<&str> = self.filters.iter().map(|f| f.name()).collect();
        f.debug_struct("PipelineBuilder")
            .field("request_metadata", &self.metadata.is_some())
            .field("authorization", &authorization)
            .field("filters", &names)
            .field("custom_handler", &self.handler.is_some())
            .finish()
    }
}
