//! JSON front for hosts that pass untyped values
//!
//! Wraps any [`UriProvider`] and checks argument shapes before delegating:
//! a uri must be a JSON string, a stream request must be a descriptor object
//! with a `uri` string. Descriptors are handed back as JSON.

use crate::error::{Error, Result};
use crate::models::UriDetails;
use crate::provider::UriProvider;
use crate::stream::StreamHandle;
use serde_json::Value;
use std::sync::Arc;

/// Name of a JSON value's type, for error messages
fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Dynamic-typed wrapper around a [`UriProvider`]
#[derive(Debug)]
pub struct HostAdapter<P: ?Sized> {
    provider: Arc<P>,
}

impl<P: ?Sized> Clone for HostAdapter<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
        }
    }
}

impl<P: UriProvider + ?Sized> HostAdapter<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub async fn can_play_uri(&self, uri: &Value) -> Result<bool> {
        let uri = expect_uri(uri)?;
        self.provider.can_play_uri(uri).await
    }

    pub async fn get_uri_details(&self, uri: &Value) -> Result<Value> {
        let uri = expect_uri(uri)?;
        let details = self.provider.get_uri_details(uri).await?;
        Ok(serde_json::to_value(details)?)
    }

    pub async fn get_stream(&self, track: &Value) -> Result<StreamHandle> {
        let details = expect_descriptor(track)?;
        self.provider.get_stream(&details).await
    }
}

fn expect_uri(value: &Value) -> Result<&str> {
    value
        .as_str()
        .ok_or_else(|| Error::type_error("string", json_type(value)))
}

fn expect_descriptor(value: &Value) -> Result<UriDetails> {
    let has_uri = value.get("uri").is_some_and(Value::is_string);
    if !value.is_object() || !has_uri {
        return Err(Error::type_error("track object", json_type(value)));
    }

    serde_json::from_value(value.clone())
        .map_err(|e| Error::type_error("track object", e))
}
