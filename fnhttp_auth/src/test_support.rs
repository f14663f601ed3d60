//! Signing keys and token helpers shared by the unit tests

use aliri::{jwa, jwk, jwt, Jwk};
use aliri_base64::Base64UrlRef;
use aliri_clock::{Clock, System};
use serde_json::Value;

pub(crate) const ISSUER: &str = "https://login.example.com/";
pub(crate) const AUDIENCE: &str = "https://api.example.com/";

pub(crate) fn signing_key() -> Jwk {
    Jwk::from(jwa::Hmac::new(
        Base64UrlRef::from_slice(b"test").to_owned(),
    ))
    .with_algorithm(jwa::Algorithm::HS256)
    .with_key_id(jwk::KeyId::from_static("test key"))
}

pub(crate) fn validator() -> jwt::CoreValidator {
    jwt::CoreValidator::default()
        .add_approved_algorithm(jwa::Algorithm::HS256)
        .add_allowed_audience(jwt::Audience::from_static(AUDIENCE))
        .require_issuer(jwt::Issuer::from_static(ISSUER))
}

/// Signs `claims`, filling in issuer, audience, and expiry when absent
pub(crate) fn sign(mut claims: Value) -> String {
    if let Value::Object(map) = &mut claims {
        let exp = System.now().0 + 300;
        map.entry("iss").or_insert_with(|| ISSUER.into());
        map.entry("aud").or_insert_with(|| AUDIENCE.into());
        map.entry("exp").or_insert_with(|| exp.into());
    }

    let headers = jwt::BasicHeaders::with_key_id(
        jwa::Algorithm::HS256,
        jwk::KeyId::from_static("test key"),
    );

    aliri::Jwt::try_from_parts_with_signature(&headers, &claims, &signing_key())
        .unwrap()
        .as_str()
        .to_owned()
}
