use std::sync::Arc;

use aliri::{jwa, jwk, jwt, Jwk, Jwks};
use aliri_base64::Base64UrlRef;
use aliri_clock::{Clock, System};
use bytes::Bytes;
use color_eyre::Result;
use fnhttp::{
    FunctionDescriptor, HttpRequest, HttpRequestStore, Invocation, Pipeline, Scheme, Source,
};
use fnhttp_auth::{
    ApiKeyAuthenticationParameters, FunctionRegistry, HttpAuthenticationOptions,
    HttpAuthorizationFilter, JwtAuthenticationParameters, TokenValidationParameters,
};
use http::{Request, Response, StatusCode};
use serde_json::{json, Value};
use tracing_test::traced_test;

const ISSUER: &str = "https://login.example.com/";
const AUDIENCE: &str = "https://api.example.com/";

fn key() -> Jwk {
    Jwk::from(jwa::Hmac::new(Base64UrlRef::from_slice(b"integration").to_owned()))
        .with_algorithm(jwa::Algorithm::HS256)
        .with_key_id(jwk::KeyId::from_static("integration"))
}

fn token(sub: &str) -> String {
    let claims = json!({
        "iss": ISSUER,
        "aud": AUDIENCE,
        "sub": sub,
        "exp": System.now().0 + 300,
    });
    let headers =
        jwt::BasicHeaders::with_key_id(jwa::Algorithm::HS256, jwk::KeyId::from_static("integration"));

    aliri::Jwt::try_from_parts_with_signature(&headers, &claims, &key())
        .unwrap()
        .as_str()
        .to_owned()
}

fn descriptors() -> Vec<FunctionDescriptor> {
    vec![
        FunctionDescriptor::new("whoami")
            .trigger("req")
            .user("user")
            .authorize(Scheme::Jwt),
        FunctionDescriptor::new("report")
            .trigger("req")
            .param::<u32>("year", Source::query().required())
            .authorize(Scheme::HeaderApiKey),
        FunctionDescriptor::new("health").trigger("req"),
    ]
}

fn pipeline() -> Result<Pipeline> {
    let mut keys = Jwks::default();
    keys.add_key(key());

    let validator = jwt::CoreValidator::default()
        .add_approved_algorithm(jwa::Algorithm::HS256)
        .add_allowed_audience(jwt::Audience::from_static(AUDIENCE))
        .require_issuer(jwt::Issuer::from_static(ISSUER));

    let options = HttpAuthenticationOptions::new()
        .with_jwt(JwtAuthenticationParameters::new(
            TokenValidationParameters::Static {
                validator,
                signing_keys: keys,
            },
        ))
        .with_api_key(
            ApiKeyAuthenticationParameters::default()
                .with_header_name("x-functions-key")
                .with_verifier(|key: String, _req: HttpRequest| async move { key == "k3y" }),
        );

    let registry = Arc::new(FunctionRegistry::discover(descriptors())?);

    Ok(Pipeline::builder(Arc::new(HttpRequestStore::new()))
        .with_request_metadata()
        .authorization(Arc::new(HttpAuthorizationFilter::new(registry, options)))
        .with_parameter_assignment(None)
        .build())
}

fn invocation(name: &str, request: http::request::Builder) -> Invocation {
    let descriptor = descriptors()
        .into_iter()
        .find(|d| d.name().as_str() == name)
        .unwrap();
    let request = HttpRequest::from(request.body(Bytes::new()).unwrap());
    descriptor.instantiate(Arc::new(request))
}

async fn whoami(invocation: Invocation) -> Result<Response<Bytes>, fnhttp::BoxError> {
    let name = invocation
        .arguments()
        .user()
        .and_then(|u| u.principal())
        .and_then(|p| p.name.clone())
        .unwrap_or_default();
    Ok(Response::new(Bytes::from(name)))
}

fn json_body(response: &Response<Bytes>) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

#[tokio::test]
async fn bearer_token_populates_user() -> Result<()> {
    let pipeline = pipeline()?;
    let invocation = invocation(
        "whoami",
        Request::get("/api/whoami").header("authorization", format!("Bearer {}", token("ada"))),
    );

    let response = pipeline.invoke(invocation.clone(), whoami).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body(), "ada");
    let principal = invocation.arguments().user().and_then(|u| u.principal());
    assert!(principal.is_some_and(|p| !p.claims.is_empty()));
    assert!(pipeline.store().is_empty());
    Ok(())
}

#[tokio::test]
#[traced_test]
async fn missing_header_is_surfaced_as_unauthorized() -> Result<()> {
    let pipeline = pipeline()?;
    let invocation = invocation("whoami", Request::get("/api/whoami"));

    let response = pipeline.invoke(invocation.clone(), whoami).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(&response),
        json!({ "message": "Authorization header is missing" })
    );

    let failure = invocation.pending_failure().unwrap();
    assert_eq!(failure.filter(), "authorization");
    assert!(invocation.arguments().user().unwrap().principal().is_none());
    assert!(pipeline.store().is_empty());
    assert!(logs_contain("invocation rejected"));
    Ok(())
}

#[tokio::test]
async fn authorization_runs_before_parameter_binding() -> Result<()> {
    let pipeline = pipeline()?;
    let invocation = invocation("report", Request::get("/api/report"));

    let response = pipeline
        .invoke(invocation, |_| async { Ok(Response::new(Bytes::new())) })
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(&response), json!({ "message": "Unauthorized" }));
    Ok(())
}

#[tokio::test]
async fn api_key_then_binding() -> Result<()> {
    let pipeline = pipeline()?;

    let invocation = invocation(
        "report",
        Request::get("/api/report").header("x-functions-key", "k3y"),
    );
    let response = pipeline
        .invoke(invocation, |_| async { Ok(Response::new(Bytes::new())) })
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(&response),
        json!({ "message": "Query parameter 'year' is required", "parameter": "year" })
    );
    Ok(())
}

#[tokio::test]
async fn unregistered_function_is_open() -> Result<()> {
    let pipeline = pipeline()?;
    let invocation = invocation("health", Request::get("/api/health"));

    let response = pipeline
        .invoke(invocation, |_| async { Ok(Response::new(Bytes::from_static(b"ok"))) })
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}
