//! Request field collection and shared-secret checking.
//!
//! A request may carry its fields in the query string, a urlencoded form
//! body, or a JSON body. All three are collected once into [`RequestFields`]
//! so the credential check and the handlers read from the same place.

use std::collections::HashMap;

use axum::body::to_bytes;
use axum::extract::Request;
use axum::http::{HeaderMap, header};
use relay_core::RelayError;

/// Names accepted for the shared secret in query, form and JSON fields.
pub const KEY_FIELDS: [&str; 3] = ["api_key", "apikey", "key"];
/// Header consulted when no field carries the secret.
pub const KEY_HEADER: &str = "x-api-key";

const BODY_LIMIT: usize = 64 * 1024;

/// String fields gathered from every location a client may use.
#[derive(Debug, Default)]
pub struct RequestFields {
    pub query: HashMap<String, String>,
    pub form: HashMap<String, String>,
    pub json: serde_json::Map<String, serde_json::Value>,
    pub headers: HeaderMap,
}

impl RequestFields {
    /// Consume the request. Unreadable or malformed bodies yield no fields.
    pub async fn collect(req: Request) -> Self {
        let (parts, body) = req.into_parts();

        let query: HashMap<String, String> = parts
            .uri
            .query()
            .and_then(|q| serde_urlencoded::from_str(q).ok())
            .unwrap_or_default();

        let bytes = match to_bytes(body, BODY_LIMIT).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(error = %e, "request body unreadable, ignored");
                Default::default()
            }
        };

        let mut fields = Self { query, headers: parts.headers, ..Self::default() };
        if bytes.is_empty() {
            return fields;
        }

        if is_form(&fields.headers) {
            fields.form = serde_urlencoded::from_bytes(&bytes).unwrap_or_default();
        } else if let Ok(serde_json::Value::Object(map)) = serde_json::from_slice(&bytes) {
            fields.json = map;
        }
        fields
    }

    /// A body field, from JSON first and then the form.
    pub fn body_field(&self, name: &str) -> Option<&str> {
        self.json
            .get(name)
            .and_then(|v| v.as_str())
            .or_else(|| self.form.get(name).map(String::as_str))
    }

    /// Like [`Self::body_field`] but distinguishes "absent" from "present and wrong".
    ///
    /// Absent or JSON `null` gives `None`; a non-string JSON value gives
    /// `Some("")` so that it fails switch validation instead of being ignored.
    pub fn optional_body_field(&self, name: &str) -> Option<&str> {
        match self.json.get(name) {
            Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.as_str()),
            Some(_) => Some(""),
            None => self.form.get(name).map(String::as_str),
        }
    }

    pub fn query_field(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

// ── credential extraction ──

type Extractor = fn(&RequestFields) -> Option<&str>;

/// Tried in order; the first non-empty value wins.
const EXTRACTORS: [(&str, Extractor); 4] = [
    ("query", from_query),
    ("form", from_form),
    ("json", from_json),
    ("header", from_header),
];

fn first_named<'a>(lookup: impl Fn(&str) -> Option<&'a str>) -> Option<&'a str> {
    KEY_FIELDS.iter().find_map(|&name| lookup(name).filter(|v| !v.is_empty()))
}

fn from_query(fields: &RequestFields) -> Option<&str> {
    first_named(|name| fields.query.get(name).map(String::as_str))
}

fn from_form(fields: &RequestFields) -> Option<&str> {
    first_named(|name| fields.form.get(name).map(String::as_str))
}

fn from_json(fields: &RequestFields) -> Option<&str> {
    first_named(|name| fields.json.get(name).and_then(|v| v.as_str()))
}

fn from_header(fields: &RequestFields) -> Option<&str> {
    fields
        .headers
        .get(KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// The presented secret and where it was found.
pub fn presented_key(fields: &RequestFields) -> Option<(&'static str, &str)> {
    EXTRACTORS
        .iter()
        .find_map(|(location, extract)| extract(fields).map(|key| (*location, key)))
}

/// Reject unless the presented secret equals `expected` exactly.
pub fn authorize(fields: &RequestFields, expected: &str) -> Result<(), RelayError> {
    match presented_key(fields) {
        Some((_, key)) if key == expected => Ok(()),
        Some((location, _)) => {
            tracing::debug!(location, "api key mismatch");
            Err(RelayError::Unauthorized)
        }
        None => {
            tracing::debug!("api key missing");
            Err(RelayError::Unauthorized)
        }
    }
}
