//! Request contract implemented by every endpoint
//!
//! An endpoint is a single-use command object: it describes what to call
//! ([`ApiRequest::method`], [`ApiRequest::path`], body, parameters) and owns
//! the slots the dispatch engine decodes the response into. The defaults
//! describe a bodiless JSON `GET`, so endpoints override only what differs.

use std::collections::BTreeMap;

use reqwest::Method;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result, ValidationError};

/// Default content type for request bodies
pub const APPLICATION_JSON: &str = "application/json";

/// Body attached to an outgoing request
pub enum RequestBody {
    /// Raw bytes sent with [`ApiRequest::content_type`]
    Bytes(Vec<u8>),
    /// Multipart form; carries its own boundary content type
    Multipart(reqwest::multipart::Form),
}

/// Parameters, headers and one-shot bookkeeping shared by all endpoints
#[derive(Debug, Clone, Default)]
pub struct RequestBase {
    parameters: BTreeMap<String, String>,
    headers: BTreeMap<String, String>,
    one_shot: bool,
    used: bool,
}

impl RequestBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base for a request whose body or response may be consumed only once.
    pub fn one_shot() -> Self {
        Self {
            one_shot: true,
            ..Self::default()
        }
    }

    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parameters.insert(name.into(), value.into());
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn is_used(&self) -> bool {
        self.used
    }

    /// Mark a one-shot request as executed, failing if it already was.
    pub(crate) fn claim(&mut self) -> std::result::Result<(), ValidationError> {
        if !self.one_shot {
            return Ok(());
        }
        if self.used {
            return Err(ValidationError::AlreadyUsed);
        }
        self.used = true;
        Ok(())
    }
}

/// Slot a successful JSON body is decoded into
pub trait ResponseTarget: Send {
    fn decode(&mut self, body: &[u8]) -> serde_json::Result<()>;
}

/// An empty body leaves the slot at `None` instead of failing.
impl<T: DeserializeOwned + Send> ResponseTarget for Option<T> {
    fn decode(&mut self, body: &[u8]) -> serde_json::Result<()> {
        if body.iter().all(u8::is_ascii_whitespace) {
            *self = None;
            return Ok(());
        }
        *self = Some(serde_json::from_slice(body)?);
        Ok(())
    }
}

/// Destination field for one response header
pub enum HeaderSlot<'a> {
    Text(&'a mut String),
    Integer(&'a mut i64),
}

/// A record populated from named response headers
pub trait ResponseHeaders: Send {
    /// Header names paired with the fields they fill.
    fn slots(&mut self) -> Vec<(&'static str, HeaderSlot<'_>)>;
}

/// Copy declared headers into their fields. Absent headers yield empty/zero.
pub fn populate_headers(target: &mut dyn ResponseHeaders, headers: &HeaderMap) -> Result<()> {
    for (name, slot) in target.slots() {
        let value = headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .trim();
        match slot {
            HeaderSlot::Text(field) => *field = value.to_string(),
            HeaderSlot::Integer(field) => {
                *field = if value.is_empty() {
                    0
                } else {
                    value.parse().map_err(|_| {
                        Error::InvalidResponse(format!(
                            "header {} is not an integer: {:?}",
                            name, value
                        ))
                    })?
                };
            }
        }
    }
    Ok(())
}

/// Capability set every dispatchable endpoint implements
pub trait ApiRequest: Send {
    fn base(&self) -> &RequestBase;

    fn base_mut(&mut self) -> &mut RequestBase;

    fn method(&self) -> Method {
        Method::GET
    }

    /// Path relative to the API domain, e.g. `/v3.0/sandbox/tasks`
    fn path(&self) -> String {
        String::new()
    }

    /// Absolute URI that overrides [`path`](Self::path) when non-empty
    fn continuation_uri(&self) -> &str {
        ""
    }

    /// Produce the body for the next dispatch.
    fn body(&mut self) -> Result<Option<RequestBody>> {
        Ok(None)
    }

    fn content_type(&self) -> &str {
        APPLICATION_JSON
    }

    /// JSON decode target; `None` routes the response to [`consume_raw`](Self::consume_raw).
    fn response_target(&mut self) -> Option<&mut dyn ResponseTarget> {
        None
    }

    fn response_headers(&mut self) -> Option<&mut dyn ResponseHeaders> {
        None
    }

    /// Receives the undecoded response when there is no JSON target.
    fn consume_raw(&mut self, _response: reqwest::Response) {}
}
