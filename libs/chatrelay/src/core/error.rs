// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::any::Any;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Invalid configuration structure: {0}")]
    ConfigStructure(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{kind} type '{name}' is already registered")]
    DuplicateType { kind: &'static str, name: String },

    #[error("Duplicate endpoint name: {0}")]
    DuplicateEndpointName(String),

    #[error("Missing required field '{key}' for type '{type_name}'")]
    MissingField { type_name: String, key: String },

    #[error("Field '{key}' expected {expected}: {reason}")]
    FieldConversion {
        key: String,
        expected: &'static str,
        reason: String,
    },

    #[error("Field '{key}' of type '{type_name}' has unsupported kind: {kind}")]
    UnsupportedFieldKind {
        type_name: String,
        key: String,
        kind: &'static str,
    },

    #[error("Invalid config item: {0}")]
    InvalidItem(String),

    #[error("Filter failed: {0}")]
    FilterRuntime(String),

    #[error("Delivery to '{endpoint}' failed: {reason}")]
    Delivery { endpoint: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;

/// Best-effort text of a caught panic payload.
pub(crate) fn describe_panic(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
