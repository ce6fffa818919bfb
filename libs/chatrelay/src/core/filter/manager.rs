// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::{AntiHighlightFilter, DataMapperFilter, Filter, RegexFilter};
use crate::core::config::ConfigNode;
use crate::core::diagnostics::Diagnostics;
use crate::core::link::Link;
use crate::core::registry::{ConfigItem, LoadHandler, TypeRecipe, TypeRegistry};
use crate::core::{RelayError, Result};

/// Where a filter item goes once it is built.
#[derive(Debug, Clone)]
pub struct FilterSlot {
    link: Weak<Link>,
    position: usize,
}

/// Attaches finished filters to their links.
struct FilterAttacher {
    diagnostics: Diagnostics,
}

impl LoadHandler<Arc<dyn Filter>, FilterSlot> for FilterAttacher {
    fn completed(&self, filter: Arc<dyn Filter>, item: &ConfigItem<FilterSlot>) -> Result<()> {
        let slot = item.attachment();
        let link = slot
            .link
            .upgrade()
            .ok_or_else(|| RelayError::InvalidItem("link no longer exists".into()))?;
        let type_name = item.type_name().unwrap_or_default();
        link.attach_filter(slot.position, type_name, filter);

        let _scope = self.diagnostics.enter();
        tracing::debug!(
            "[{}] Attached filter '{}' at position {} on {}",
            self.diagnostics.scope(),
            type_name,
            slot.position,
            link
        );
        Ok(())
    }

    fn failed(&self, item: &ConfigItem<FilterSlot>, error: RelayError) {
        let _scope = self.diagnostics.enter();
        let link = item
            .attachment()
            .link
            .upgrade()
            .map(|link| link.to_string())
            .unwrap_or_else(|| "<dropped link>".into());
        tracing::warn!(
            "[{}] Failed to load filter #{} on {}: {}",
            self.diagnostics.scope(),
            item.attachment().position + 1,
            link,
            error
        );
    }
}

/// Filter type registry plus the `repeatable-filters` templates.
pub struct FilterManager {
    diagnostics: Diagnostics,
    registry: TypeRegistry<Arc<dyn Filter>, FilterSlot>,
    templates: RwLock<HashMap<String, ConfigNode>>,
}

impl FilterManager {
    /// Create the manager with the built-in filter types registered.
    pub fn new(diagnostics: Diagnostics) -> Result<Self> {
        let registry = TypeRegistry::new(
            "filter",
            diagnostics.clone(),
            Arc::new(FilterAttacher {
                diagnostics: diagnostics.clone(),
            }) as Arc<dyn LoadHandler<Arc<dyn Filter>, FilterSlot>>,
        );
        let manager = Self {
            diagnostics,
            registry,
            templates: RwLock::new(HashMap::new()),
        };

        manager.register_type(AntiHighlightFilter::TYPE_NAME, AntiHighlightFilter::recipe())?;
        manager.register_type(DataMapperFilter::TYPE_NAME, DataMapperFilter::recipe())?;
        manager.register_type(RegexFilter::TYPE_NAME, RegexFilter::recipe())?;
        Ok(manager)
    }

    /// Register a filter type. Filters already configured with this type are
    /// built and attached at their original chain position.
    pub fn register_type<F: Filter>(&self, name: &str, recipe: TypeRecipe<F>) -> Result<()> {
        let recipe = recipe.finish(|mut filter: F, item: &ConfigItem<FilterSlot>| {
            let link = item
                .attachment()
                .link
                .upgrade()
                .ok_or_else(|| RelayError::InvalidItem("link no longer exists".into()))?;
            filter.load(&link, item.node())?;
            Ok(Arc::new(filter) as Arc<dyn Filter>)
        });
        self.registry.register_type(name, recipe)
    }

    /// Store the `repeatable-filters` section. Each value is a full filter
    /// item that link filter lists can reference by key.
    pub fn load_templates(&self, templates: &serde_json::Map<String, ConfigNode>) {
        let _scope = self.diagnostics.enter();
        let mut stored = self.templates.write();
        for (name, node) in templates {
            if !node.is_object() {
                tracing::warn!(
                    "[{}] Repeatable filter '{}' is not a mapping, skipping",
                    self.diagnostics.scope(),
                    name
                );
                continue;
            }
            stored.insert(name.clone(), node.clone());
        }
        tracing::debug!(
            "[{}] {} repeatable filter(s) available",
            self.diagnostics.scope(),
            stored.len()
        );
    }

    pub fn template(&self, name: &str) -> Option<ConfigNode> {
        self.templates.read().get(name).cloned()
    }

    /// Build the filter list of one link. Entries are either full filter
    /// items or the name of a repeatable filter.
    pub fn load_for_link(&self, link: &Arc<Link>, entries: &[ConfigNode]) {
        let mut items = Vec::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            let node = match entry {
                ConfigNode::String(name) => match self.template(name) {
                    Some(node) => node,
                    None => {
                        let _scope = self.diagnostics.enter();
                        tracing::warn!(
                            "[{}] Unknown repeatable filter '{}' on {}, skipping",
                            self.diagnostics.scope(),
                            name,
                            link
                        );
                        continue;
                    }
                },
                ConfigNode::Object(_) => entry.clone(),
                _ => {
                    let _scope = self.diagnostics.enter();
                    tracing::warn!(
                        "[{}] Filter #{} on {} is neither a mapping nor a template name, skipping",
                        self.diagnostics.scope(),
                        position + 1,
                        link
                    );
                    continue;
                }
            };
            items.push(ConfigItem::with_attachment(
                node,
                FilterSlot {
                    link: Arc::downgrade(link),
                    position,
                },
            ));
        }
        self.registry.load_all(items);
    }

    pub fn registry(&self) -> &TypeRegistry<Arc<dyn Filter>, FilterSlot> {
        &self.registry
    }
}
