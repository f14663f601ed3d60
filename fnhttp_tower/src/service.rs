use std::{
    convert::Infallible,
    fmt,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use bytes::Bytes;
use fnhttp::{
    BoxError, DefaultErrorFormatter, Error, ErrorFormatter, FunctionDescriptor, HttpRequest,
    Invocation, Pipeline,
};
use http::{Request, Response};
use http_body::Body;
use http_body_util::{BodyExt, Full};
use tower_layer::Layer;
use tower_service::Service;

use crate::multipart::{parse_form, MULTIPART_FORM};

/// Hosts one function behind the given pipeline
///
/// The wrapped service is the function body. It receives the
/// [`Invocation`] after every filter has passed and produces the response.
#[derive(Clone)]
pub struct FunctionLayer {
    pipeline: Pipeline,
    descriptor: Arc<FunctionDescriptor>,
}

impl FunctionLayer {
    /// Runs invocations of `descriptor` through `pipeline`
    pub fn new(pipeline: Pipeline, descriptor: FunctionDescriptor) -> Self {
        Self {
            pipeline,
            descriptor: Arc::new(descriptor),
        }
    }
}

impl fmt::Debug for FunctionLayer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FunctionLayer")
            .field("function", &self.descriptor.name())
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

impl<S> Layer<S> for FunctionLayer {
    type Service = FunctionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        FunctionService {
            inner,
            pipeline: self.pipeline.clone(),
            descriptor: Arc::clone(&self.descriptor),
        }
    }
}

/// A function body wrapped in its invocation pipeline
///
/// Reads the request body, parses multipart forms, and always answers with
/// a response; failures are turned into responses by the pipeline's
/// exception stage.
#[derive(Clone)]
pub struct FunctionService<S> {
    inner: S,
    pipeline: Pipeline,
    descriptor: Arc<FunctionDescriptor>,
}

impl<S> fmt::Debug for FunctionService<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FunctionService")
            .field("function", &self.descriptor.name())
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl<S, B> Service<Request<B>> for FunctionService<S>
where
    S: Service<Invocation, Response = Response<Bytes>, Error = BoxError> + Clone + Send + 'static,
    S::Future: Send,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        let inner = self.inner.clone();
        let pipeline = self.pipeline.clone();
        let descriptor = Arc::clone(&self.descriptor);

        Box::pin(async move {
            let request = match read_request(request).await {
                Ok(request) => request,
                Err(error) => {
                    tracing::warn!(%error, "unable to read request body");
                    let error = Error::format_conversion_with_source(
                        "Failed to read the request body",
                        "body",
                        error,
                    );
                    let response = DefaultErrorFormatter::default().format(&error, None);
                    return Ok(response.map(Full::new));
                }
            };

            let invocation = descriptor.instantiate(Arc::new(request));
            let response = pipeline
                .invoke(invocation, |invocation| call_function(inner, invocation))
                .await;

            Ok(response.map(Full::new))
        })
    }
}

async fn call_function<S>(mut inner: S, invocation: Invocation) -> Result<Response<Bytes>, BoxError>
where
    S: Service<Invocation, Response = Response<Bytes>, Error = BoxError>,
{
    futures_util::future::poll_fn(|cx| inner.poll_ready(cx)).await?;
    inner.call(invocation).await
}

async fn read_request<B>(request: Request<B>) -> Result<HttpRequest, BoxError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let (parts, body) = request.into_parts();
    let body = body.collect().await.map_err(Into::into)?.to_bytes();

    let mut request = HttpRequest::from_parts(parts, body);

    if request.media_type().as_deref() == Some(MULTIPART_FORM) {
        let content_type = request.content_type().unwrap_or_default().to_owned();
        match parse_form(&content_type, request.body().clone()).await {
            Ok(form) => request = request.with_form(form),
            Err(error) => tracing::warn!(%error, "ignoring malformed multipart body"),
        }
    }

    Ok(request)
}
