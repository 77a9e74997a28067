//! Blocking JSON-over-HTTP transport.
//!
//! A [`Resource`] is rooted at a server URI and sends JSON requests to
//! paths below it. Responses carrying a JSON content type are decoded;
//! anything else decodes to [`Value::Null`]. Non-success statuses become
//! [`Error::Http`], with the server's `{"err": "..."}` message unpacked when
//! present.

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};

/// User agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("restpose-rust/", env!("CARGO_PKG_VERSION"));

/// HTTP methods the RestPose API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// A handle on a server's HTTP API. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Resource {
    client: Client,
    base: String,
}

fn is_json(response: &reqwest::blocking::Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("application/json"))
}

/// Pull the message out of an error body, falling back to the raw text.
fn error_message(body: &str, json: bool) -> String {
    if json {
        if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(body) {
            if let Some(msg) = obj.get("err").and_then(Value::as_str) {
                return msg.to_string();
            }
        }
    }
    body.trim().to_string()
}

impl Resource {
    /// Create a transport rooted at `uri`. A trailing `/` is ignored.
    pub fn new(uri: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base: uri.trim_end_matches('/').to_string(),
        })
    }

    /// The base URI, without a trailing `/`.
    pub fn uri(&self) -> &str {
        &self.base
    }

    pub fn get(&self, path: &str) -> Result<Value> {
        self.request(Method::Get, path, None)
    }

    pub fn post(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        self.request(Method::Post, path, body)
    }

    pub fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(Method::Put, path, Some(body))
    }

    pub fn delete(&self, path: &str) -> Result<Value> {
        self.request(Method::Delete, path, None)
    }

    /// Send one request and decode the reply.
    pub fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}{}", self.base, path);
        let mut builder: RequestBuilder = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Delete => self.client.delete(&url),
        };
        builder = builder
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, DEFAULT_USER_AGENT);

        if let Some(body) = body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(serde_json::to_vec(body)?);
        }

        let response = builder.send()?;
        let status = response.status();
        let json = is_json(&response);
        let text = response.text()?;
        debug!(method = method.as_str(), path, status = status.as_u16(), "restpose request");

        if !status.is_success() {
            return Err(Error::Http {
                method: method.as_str().to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                message: error_message(&text, json),
            });
        }

        if json && !text.trim().is_empty() {
            Ok(serde_json::from_str(&text)?)
        } else {
            Ok(Value::Null)
        }
    }
}
