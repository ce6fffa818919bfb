// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use crate::core::config::{ConfigNode, node_str};
use crate::core::{RelayError, Result};

/// One config item submitted to a [`TypeRegistry`](super::TypeRegistry),
/// plus whatever the owning manager needs to place the finished instance.
#[derive(Debug, Clone)]
pub struct ConfigItem<A = ()> {
    node: ConfigNode,
    attachment: A,
}

impl ConfigItem<()> {
    pub fn new(node: ConfigNode) -> Self {
        Self {
            node,
            attachment: (),
        }
    }
}

impl<A> ConfigItem<A> {
    pub fn with_attachment(node: ConfigNode, attachment: A) -> Self {
        Self { node, attachment }
    }

    pub fn node(&self) -> &ConfigNode {
        &self.node
    }

    pub fn attachment(&self) -> &A {
        &self.attachment
    }

    /// Value of the `type` key.
    pub fn type_name(&self) -> Option<&str> {
        node_str(&self.node, "type")
    }

    pub(crate) fn require_type_name(&self) -> Result<&str> {
        self.type_name()
            .ok_or_else(|| RelayError::InvalidItem("No type set".into()))
    }
}

/// Receives every instance a registry finishes building, and every item it
/// could not build.
pub trait LoadHandler<T, A>: Send + Sync {
    /// Called with a fully injected instance. An error here is routed to
    /// [`failed`](Self::failed) for the same item.
    fn completed(&self, instance: T, item: &ConfigItem<A>) -> Result<()>;

    fn failed(&self, item: &ConfigItem<A>, error: RelayError);
}
