use std::sync::Arc;

use bytes::Bytes;
use color_eyre::Result;
use fnhttp::{
    BoxError, FormFile, FunctionDescriptor, HttpRequestStore, Invocation, Pipeline, Scheme, Source,
};
use fnhttp_auth::{
    BasicAuthenticationParameters, FunctionRegistry, HttpAuthenticationOptions,
    HttpAuthorizationFilter,
};
use fnhttp_tower::FunctionLayer;
use http::{header, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use serde::Deserialize;
use serde_json::{json, Value};
use tower::{service_fn, Layer, ServiceExt};
use tracing_test::traced_test;

#[derive(Debug, Deserialize)]
struct Order {
    sku: String,
    quantity: u32,
}

fn pipeline(descriptors: Vec<FunctionDescriptor>) -> Result<Pipeline> {
    let registry = Arc::new(FunctionRegistry::discover(descriptors)?);
    let options = HttpAuthenticationOptions::new()
        .with_basic(BasicAuthenticationParameters::default().with_credential("clerk", "s3cret"));

    Ok(Pipeline::builder(Arc::new(HttpRequestStore::new()))
        .with_request_metadata()
        .authorization(Arc::new(HttpAuthorizationFilter::new(registry, options)))
        .with_parameter_assignment(None)
        .build())
}

async fn send<S>(service: S, request: Request<Full<Bytes>>) -> Result<(StatusCode, Bytes)>
where
    S: tower::Service<
        Request<Full<Bytes>>,
        Response = Response<Full<Bytes>>,
        Error = std::convert::Infallible,
    >,
{
    let response = service.oneshot(request).await?;
    let status = response.status();
    let body = response.into_body().collect().await?.to_bytes();
    Ok((status, body))
}

fn upload_descriptor() -> FunctionDescriptor {
    FunctionDescriptor::new("upload")
        .trigger("req")
        .param::<String>("title", Source::form().required())
        .param::<FormFile>("attachment", Source::form().required())
}

async fn upload(invocation: Invocation) -> Result<Response<Bytes>, BoxError> {
    let args = invocation.arguments();
    let title = args.param::<String>("title").and_then(|p| p.cloned());
    let file = args.param::<FormFile>("attachment").and_then(|p| p.cloned());

    let summary = match (title, file) {
        (Some(title), Some(file)) => format!(
            "{title}:{}:{}",
            file.file_name.unwrap_or_default(),
            file.data.len()
        ),
        _ => String::new(),
    };
    Ok(Response::new(Bytes::from(summary)))
}

#[tokio::test]
async fn multipart_upload_binds_fields_and_files() -> Result<()> {
    let descriptor = upload_descriptor();
    let service = FunctionLayer::new(pipeline(vec![descriptor.clone()])?, descriptor)
        .layer(service_fn(upload));

    let body = [
        "--b0undary\r\n",
        "Content-Disposition: form-data; name=\"title\"\r\n\r\n",
        "receipt\r\n",
        "--b0undary\r\n",
        "Content-Disposition: form-data; name=\"attachment\"; filename=\"r.txt\"\r\n",
        "Content-Type: text/plain\r\n\r\n",
        "12345\r\n",
        "--b0undary--\r\n",
    ]
    .concat();

    let request = Request::post("/api/upload")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=b0undary")
        .body(Full::new(Bytes::from(body)))?;

    let (status, body) = send(service, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "receipt:r.txt:5");
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn malformed_multipart_is_reported_as_missing_fields() -> Result<()> {
    let descriptor = upload_descriptor();
    let service = FunctionLayer::new(pipeline(vec![descriptor.clone()])?, descriptor)
        .layer(service_fn(upload));

    let request = Request::post("/api/upload")
        .header(header::CONTENT_TYPE, "multipart/form-data")
        .body(Full::new(Bytes::from_static(b"garbage")))?;

    let (status, body) = send(service, request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body)?;
    assert_eq!(body["parameter"], "title");
    assert!(logs_contain("ignoring malformed multipart body"));
    Ok(())
}

#[tokio::test]
async fn json_body_binds_typed_value() -> Result<()> {
    let descriptor = FunctionDescriptor::new("place_order")
        .trigger("req")
        .param::<Order>("order", Source::body().required())
        .authorize(Scheme::Basic);

    let service = FunctionLayer::new(pipeline(vec![descriptor.clone()])?, descriptor).layer(
        service_fn(|inv: Invocation| async move {
            let order = inv.arguments().param::<Order>("order");
            let text = order
                .as_ref()
                .and_then(|o| o.value())
                .map(|o| format!("{}x{}", o.quantity, o.sku))
                .unwrap_or_default();
            Ok::<_, BoxError>(Response::new(Bytes::from(text)))
        }),
    );

    let unauthenticated = Request::post("/api/orders")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from_static(br#"{"sku":"A-1","quantity":3}"#)))?;
    let (status, body) = send(service.clone(), unauthenticated).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        serde_json::from_slice::<Value>(&body)?,
        json!({ "message": "Authorization header is missing" })
    );

    let authenticated = Request::post("/api/orders")
        .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
        .header(header::AUTHORIZATION, "Basic Y2xlcms6czNjcmV0")
        .body(Full::new(Bytes::from_static(br#"{"sku":"A-1","quantity":3}"#)))?;
    let (status, body) = send(service, authenticated).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "3xA-1");
    Ok(())
}

#[tokio::test]
async fn urlencoded_form_binds_multiple_values() -> Result<()> {
    let descriptor = FunctionDescriptor::new("tags")
        .trigger("req")
        .param::<Vec<u32>>("id", Source::form());

    let service = FunctionLayer::new(pipeline(vec![descriptor.clone()])?, descriptor).layer(
        service_fn(|inv: Invocation| async move {
            let ids = inv
                .arguments()
                .param::<Vec<u32>>("id")
                .and_then(|p| p.cloned())
                .unwrap_or_default();
            Ok::<_, BoxError>(Response::new(Bytes::from(format!("{ids:?}"))))
        }),
    );

    let request = Request::post("/api/tags")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Full::new(Bytes::from_static(b"id=3&id=1&id=2")))?;

    let (status, body) = send(service, request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[3, 1, 2]");
    Ok(())
}
