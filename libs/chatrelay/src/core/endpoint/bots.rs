// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Chat bots: long-lived protocol clients that channel endpoints ride on.
//!
//! The relay never speaks a chat protocol itself. The host builds one
//! [`ChatBot`] per entry in the `bots` section and hands them over in a
//! [`BotRegistry`]; channel endpoints look their bot up by name.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::EndpointIntake;
use crate::core::config::{ConfigNode, node_str};
use crate::core::diagnostics::Diagnostics;
use crate::core::relay::Shutdownable;
use crate::core::Result;

pub trait ChatBot: Send + Sync {
    fn name(&self) -> &str;

    /// Join `channel` (if not already joined) and submit its traffic through
    /// `intake`.
    fn add_channel(&self, channel: &str, intake: EndpointIntake);

    /// Send text to a channel this bot has joined.
    fn send_message(&self, channel: &str, text: &str) -> Result<()>;

    fn shutdown(&self) {}
}

pub struct BotRegistry {
    diagnostics: Diagnostics,
    bots: RwLock<HashMap<String, Arc<dyn ChatBot>>>,
}

impl BotRegistry {
    pub fn new(diagnostics: Diagnostics) -> Self {
        Self {
            diagnostics,
            bots: RwLock::new(HashMap::new()),
        }
    }

    /// Add a bot. A second bot with the same name is ignored.
    pub fn insert(&self, bot: Arc<dyn ChatBot>) -> bool {
        let _scope = self.diagnostics.enter();
        let name = bot.name().to_string();
        let mut bots = self.bots.write();
        if bots.contains_key(&name) {
            tracing::warn!(
                "[{}] Ignoring duplicate bot name '{}'",
                self.diagnostics.scope(),
                name
            );
            return false;
        }
        tracing::debug!("[{}] Registered bot '{}'", self.diagnostics.scope(), name);
        bots.insert(name, bot);
        true
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ChatBot>> {
        self.bots.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bots.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.bots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bots.read().is_empty()
    }

    /// Warn about `bots` entries that are malformed or that nobody supplied
    /// a bot for. Returns how many definitions are backed by a bot.
    pub fn reconcile(&self, definitions: &[ConfigNode]) -> usize {
        let _scope = self.diagnostics.enter();
        let mut backed = 0;
        for (index, definition) in definitions.iter().enumerate() {
            match node_str(definition, "name") {
                Some(name) if self.get(name).is_some() => backed += 1,
                Some(name) => tracing::warn!(
                    "[{}] Bot '{}' is defined but no bot was supplied for it",
                    self.diagnostics.scope(),
                    name
                ),
                None => tracing::warn!(
                    "[{}] Bot definition #{} has no name, skipping",
                    self.diagnostics.scope(),
                    index + 1
                ),
            }
        }
        backed
    }
}

impl Shutdownable for BotRegistry {
    fn shutdown(&self) {
        let bots: Vec<_> = self.bots.read().values().cloned().collect();
        for bot in bots {
            bot.shutdown();
        }
    }
}
