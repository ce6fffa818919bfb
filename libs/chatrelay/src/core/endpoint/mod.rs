// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Endpoints: named, configured places messages come from and go to.

mod bots;
mod channel;
mod manager;
mod name;

pub use bots::{BotRegistry, ChatBot};
pub use channel::{CHANNEL_ENDPOINT_TYPE, ChannelEndpoint, ChannelEvent, ChannelMessageKind, channel_keys};
pub use manager::EndpointManager;
pub use name::EndpointName;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::config::ConfigNode;
use crate::core::distributor::MessageSender;
use crate::core::error::describe_panic;
use crate::core::link::Link;
use crate::core::message::{DataMap, Message};
use crate::core::targeted_message::TargetedMessage;
use crate::core::{RelayError, Result};

/// A configured endpoint type.
///
/// Instances are built by the endpoint registry from a config item: fields
/// declared in the type's recipe are injected first, then
/// [`load_extra`](Self::load_extra) receives the item's `extra` subtree.
pub trait Endpoint: Send + 'static {
    /// Type-specific setup from the `extra` subtree (null when absent).
    fn load_extra(&mut self, context: &EndpointContext<'_>, extra: &ConfigNode) -> Result<()> {
        let _ = (context, extra);
        Ok(())
    }

    /// Deliver a filtered message that arrived over `link`.
    fn receive_message(&mut self, message: &TargetedMessage, link: &Link) -> Result<()>;
}

/// What an endpoint can reach while it loads.
pub struct EndpointContext<'a> {
    name: &'a EndpointName,
    bots: &'a BotRegistry,
    sender: &'a MessageSender,
}

impl<'a> EndpointContext<'a> {
    pub(crate) fn new(name: &'a EndpointName, bots: &'a BotRegistry, sender: &'a MessageSender) -> Self {
        Self { name, bots, sender }
    }

    /// Name the manager assigned from the item's `name` key.
    pub fn name(&self) -> &EndpointName {
        self.name
    }

    pub fn bot(&self, name: &str) -> Option<Arc<dyn ChatBot>> {
        self.bots.get(name)
    }

    /// Handle for submitting messages that originate at this endpoint.
    pub fn intake(&self) -> EndpointIntake {
        EndpointIntake {
            source: self.name.clone(),
            sender: self.sender.clone(),
        }
    }
}

/// Submits messages on behalf of one endpoint. Cheap to clone; safe to hand
/// to a bot's reader thread.
#[derive(Clone)]
pub struct EndpointIntake {
    source: EndpointName,
    sender: MessageSender,
}

impl EndpointIntake {
    pub fn new(source: EndpointName, sender: MessageSender) -> Self {
        Self { source, sender }
    }

    pub fn source(&self) -> &EndpointName {
        &self.source
    }

    pub fn submit(&self, default_text: impl Into<String>, data: DataMap) {
        self.sender
            .send(Message::new(self.source.clone(), default_text, data));
    }
}

/// An endpoint instance the manager accepted, under its configured name.
pub struct LoadedEndpoint {
    name: EndpointName,
    type_name: String,
    inner: Mutex<Box<dyn Endpoint>>,
}

impl LoadedEndpoint {
    pub fn new(name: EndpointName, type_name: impl Into<String>, endpoint: Box<dyn Endpoint>) -> Self {
        Self {
            name,
            type_name: type_name.into(),
            inner: Mutex::new(endpoint),
        }
    }

    pub fn name(&self) -> &EndpointName {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Hand a message to the endpoint. Panics are caught and reported as
    /// delivery errors.
    pub fn deliver(&self, message: &TargetedMessage, link: &Link) -> Result<()> {
        let mut endpoint = self.inner.lock();
        match catch_unwind(AssertUnwindSafe(|| endpoint.receive_message(message, link))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => Err(RelayError::Delivery {
                endpoint: self.name.to_string(),
                reason: error.to_string(),
            }),
            Err(payload) => Err(RelayError::Delivery {
                endpoint: self.name.to_string(),
                reason: format!("panicked: {}", describe_panic(payload.as_ref())),
            }),
        }
    }
}

impl std::fmt::Debug for LoadedEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedEndpoint")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .finish()
    }
}
