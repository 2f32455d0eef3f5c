//! Immutable snapshot of an incoming HTTP request.
//!
//! The dispatcher builds one `MockRequest` per request after reading the
//! body; everything the matcher looks at is precomputed or lazily cached
//! here, so matcher evaluation stays pure.

use bytes::Bytes;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::OnceLock;

pub struct MockRequest {
    method: String,
    path: String,
    query: Option<String>,
    /// Keys lowercased; a name maps to every value received under it.
    headers: HashMap<String, Vec<String>>,
    body: Bytes,
    /// Parsed form fields, computed on first access. `None` inside the cell
    /// means the body was not `application/x-www-form-urlencoded`.
    form: OnceLock<Option<HashMap<String, String>>>,
}

impl MockRequest {
    pub fn new(
        method: &str,
        path: impl Into<String>,
        query: Option<String>,
        headers: HashMap<String, Vec<String>>,
        body: Bytes,
    ) -> Self {
        Self {
            method: method.to_uppercase(),
            path: path.into(),
            query,
            headers,
            body,
            form: OnceLock::new(),
        }
    }

    /// Build a snapshot from hyper request parts. Header keys are lowercased
    /// and duplicate values accumulate under one key.
    pub fn from_parts(
        method: &hyper::Method,
        uri: &hyper::Uri,
        headers: &hyper::HeaderMap,
        body: Bytes,
    ) -> Self {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in headers.iter() {
            map.entry(name.as_str().to_lowercase())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
        Self::new(
            method.as_str(),
            uri.path(),
            uri.query().map(|q| q.to_string()),
            map,
            body,
        )
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// The string the `url` matcher is evaluated against:
    /// `path?query` when a query is present, else just the path.
    pub fn url_for_match(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        }
    }

    pub fn headers(&self) -> &HashMap<String, Vec<String>> {
        &self.headers
    }

    /// All values received under a (case-insensitive) header name.
    pub fn header_values(&self, name: &str) -> &[String] {
        self.headers
            .get(&name.to_lowercase())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn body_utf8(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Form fields of an `application/x-www-form-urlencoded` body, parsed on
    /// first access and cached on the snapshot. `None` when the content type
    /// does not match.
    pub fn form_fields(&self) -> Option<&HashMap<String, String>> {
        self.form
            .get_or_init(|| {
                let content_type = self
                    .header_values("content-type")
                    .first()
                    .map(String::as_str)
                    .unwrap_or("");
                if !content_type.contains("application/x-www-form-urlencoded") {
                    return None;
                }
                Some(parse_form(&self.body_utf8()))
            })
            .as_ref()
    }
}

fn parse_form(body: &str) -> HashMap<String, String> {
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next().unwrap_or("");
            Some((
                urlencoding::decode(key).unwrap_or_default().into_owned(),
                urlencoding::decode(value).unwrap_or_default().into_owned(),
            ))
        })
        .collect()
}
