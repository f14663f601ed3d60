//! A buffered view of the inbound HTTP request

use bytes::Bytes;
use http::{header, request::Parts, HeaderMap, Method, Request, Uri};
use serde::Deserialize;
use std::ops::Deref;

const URLENCODED_FORM: &str = "application/x-www-form-urlencoded";

/// An inbound request whose body has been fully read
///
/// Query and form lookups are case-insensitive. Header lookups go through
/// [`HeaderMap`] and so are case-insensitive as well.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    body: Bytes,
    form: Option<Form>,
}

impl HttpRequest {
    /// Constructs a request from its head and a buffered body
    ///
    /// A body sent as `application/x-www-form-urlencoded` is parsed into
    /// form fields immediately.
    pub fn from_parts(parts: Parts, body: Bytes) -> Self {
        let query = parts
            .uri
            .query()
            .and_then(|q| match serde_urlencoded::from_str::<Vec<(String, String)>>(q) {
                Ok(pairs) => Some(pairs),
                Err(error) => {
                    tracing::debug!(%error, "ignoring malformed query string");
                    None
                }
            })
            .unwrap_or_default();

        let mut request = Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            query,
            body,
            form: None,
        };

        if request.has_media_type(URLENCODED_FORM) {
            match serde_urlencoded::from_bytes::<Vec<(String, String)>>(&request.body) {
                Ok(fields) => {
                    let mut form = Form::default();
                    for (name, value) in fields {
                        form.push_field(name, value);
                    }
                    request.form = Some(form);
                }
                Err(error) => tracing::debug!(%error, "ignoring malformed urlencoded form"),
            }
        }

        request
    }

    /// Attaches a form that was parsed from the body by the host
    #[must_use]
    pub fn with_form(mut self, form: Form) -> Self {
        self.form = Some(form);
        self
    }

    /// The request method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request URI
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// All request headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The raw request body
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The form sent with the request, if any
    pub fn form(&self) -> Option<&Form> {
        self.form.as_ref()
    }

    /// The value of the `Content-Type` header
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// The media type of the body, without parameters, lowercased
    pub fn media_type(&self) -> Option<String> {
        self.content_type()
            .and_then(|ct| ct.split(';').next())
            .map(|mt| mt.trim().to_ascii_lowercase())
            .filter(|mt| !mt.is_empty())
    }

    fn has_media_type(&self, expected: &str) -> bool {
        self.media_type().as_deref() == Some(expected)
    }

    /// Values of the named header, or `None` if the header is absent
    pub fn header_values(&self, name: &str) -> Option<Vec<String>> {
        let values: Vec<String> = self
            .headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(ToOwned::to_owned)
            .collect();

        if values.is_empty() {
            None
        } else {
            Some(values)
        }
    }

    /// Values of the named query parameter, or `None` if it is absent
    pub fn query_values(&self, name: &str) -> Option<Vec<String>> {
        collect_named(&self.query, name)
    }
}

impl From<Request<Bytes>> for HttpRequest {
    fn from(req: Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::from_parts(parts, body)
    }
}

fn collect_named(pairs: &[(String, String)], name: &str) -> Option<Vec<String>> {
    let values: Vec<String> = pairs
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.clone())
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

/// Fields and files sent as a form body
#[derive(Debug, Clone, Default)]
pub struct Form {
    fields: Vec<(String, String)>,
    files: Vec<FormFile>,
}

impl Form {
    /// Adds a text field
    pub fn push_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Adds an uploaded file
    pub fn push_file(&mut self, file: FormFile) {
        self.files.push(file);
    }

    /// Values of the named text field, or `None` if it is absent
    pub fn field_values(&self, name: &str) -> Option<Vec<String>> {
        collect_named(&self.fields, name)
    }

    /// The first file uploaded under the given field name
    pub fn file(&self, name: &str) -> Option<&FormFile> {
        self.files.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// All uploaded files
    pub fn files(&self) -> &[FormFile] {
        &self.files
    }
}

/// A file uploaded as part of a form
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FormFile {
    /// The form field name
    pub name: String,
    /// The client-supplied file name
    #[serde(default)]
    pub file_name: Option<String>,
    /// The declared content type of the file
    #[serde(default)]
    pub content_type: Option<String>,
    /// The file contents
    pub data: Bytes,
}

/// Every file uploaded with a form
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct FormFiles(pub Vec<FormFile>);

impl Deref for FormFiles {
    type Target = [FormFile];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str, content_type: Option<&str>, body: &'static str) -> HttpRequest {
        let mut builder = Request::builder().method(Method::POST).uri(uri);
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        HttpRequest::from(builder.body(Bytes::from_static(body.as_bytes())).unwrap())
    }

    #[test]
    fn query_lookup_is_case_insensitive_and_keeps_order() {
        let req = request("/api/items?Tag=a&tag=b&other=c", None, "");
        assert_eq!(
            req.query_values("TAG"),
            Some(vec!["a".to_owned(), "b".to_owned()])
        );
        assert_eq!(req.query_values("missing"), None);
    }

    #[test]
    fn urlencoded_body_is_parsed_as_form() {
        let req = request(
            "/api/items",
            Some("application/x-www-form-urlencoded; charset=utf-8"),
            "name=widget&count=3",
        );
        let form = req.form().unwrap();
        assert_eq!(form.field_values("Name"), Some(vec!["widget".to_owned()]));
        assert_eq!(form.field_values("count"), Some(vec!["3".to_owned()]));
    }

    #[test]
    fn media_type_drops_parameters() {
        let req = request("/", Some("Application/JSON; charset=utf-8"), "{}");
        assert_eq!(req.media_type().as_deref(), Some("application/json"));
    }
}
