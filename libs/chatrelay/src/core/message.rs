// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;

use serde_json::Value;

use crate::core::endpoint::EndpointName;

/// Structured data carried alongside message text.
pub type DataMap = serde_json::Map<String, Value>;

/// Well-known data keys. Endpoints may add their own.
pub mod keys {
    /// Format template the default text was rendered from.
    pub const MESSAGE_FORMAT: &str = "MESSAGE_FORMAT";
    /// Raw message body, without sender decoration.
    pub const MESSAGE_TEXT: &str = "MESSAGE_TEXT";
    /// Display name of whoever sent the message.
    pub const SENDER_NAME: &str = "SENDER_NAME";
}

/// A message as submitted by its source endpoint. Immutable once built and
/// shared by every destination it fans out to.
#[derive(Debug, Clone)]
pub struct Message {
    source: EndpointName,
    default_text: String,
    data: Arc<DataMap>,
}

impl Message {
    pub fn new(source: EndpointName, default_text: impl Into<String>, data: DataMap) -> Self {
        Self {
            source,
            default_text: default_text.into(),
            data: Arc::new(data),
        }
    }

    pub fn source(&self) -> &EndpointName {
        &self.source
    }

    pub fn default_text(&self) -> &str {
        &self.default_text
    }

    pub fn data(&self) -> &DataMap {
        &self.data
    }

    /// String value of a data key.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub(crate) fn shared_data(&self) -> Arc<DataMap> {
        Arc::clone(&self.data)
    }
}
