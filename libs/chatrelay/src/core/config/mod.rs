// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod relay_config;

pub use relay_config::{DistributorSettings, RelayConfig};

/// Generic configuration tree. Every config item handed to the type
/// registries is one of these, usually an object.
pub type ConfigNode = serde_json::Value;

/// String value at `key`, if the node is an object holding a string there.
pub fn node_str<'a>(node: &'a ConfigNode, key: &str) -> Option<&'a str> {
    node.get(key).and_then(ConfigNode::as_str)
}

/// True when `key` is missing or explicitly null.
pub fn node_is_absent(node: &ConfigNode, key: &str) -> bool {
    matches!(node.get(key), None | Some(ConfigNode::Null))
}

/// Boolean flag that also accepts the string form (`"true"`, any case).
pub fn node_flag(node: &ConfigNode, key: &str) -> bool {
    match node.get(key) {
        Some(ConfigNode::Bool(value)) => *value,
        Some(ConfigNode::String(value)) => value.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}
