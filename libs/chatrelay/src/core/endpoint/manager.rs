// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Endpoint registry and routing table.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::channel::{CHANNEL_ENDPOINT_TYPE, ChannelEndpoint};
use super::{BotRegistry, Endpoint, EndpointContext, EndpointName, LoadedEndpoint};
use crate::core::config::{ConfigNode, node_str};
use crate::core::diagnostics::Diagnostics;
use crate::core::distributor::{Destination, DestinationResolver, DistributorConfig, MessageDistributor};
use crate::core::link::LinkManager;
use crate::core::message::Message;
use crate::core::registry::{ConfigItem, LoadHandler, TypeRecipe, TypeRegistry};
use crate::core::{RelayError, Result};

/// Name-keyed table of loaded endpoints, filled by the registry.
struct EndpointTable {
    diagnostics: Diagnostics,
    endpoints: RwLock<HashMap<EndpointName, Arc<LoadedEndpoint>>>,
    // Names of endpoints loaded or still loading. Claimed before
    // `load_extra` runs.
    claimed: Mutex<HashSet<EndpointName>>,
}

impl EndpointTable {
    fn get(&self, name: &EndpointName) -> Option<Arc<LoadedEndpoint>> {
        self.endpoints.read().get(name).cloned()
    }

    fn claim(&self, name: &EndpointName) -> Result<NameClaim<'_>> {
        if !self.claimed.lock().insert(name.clone()) {
            return Err(RelayError::DuplicateEndpointName(name.to_string()));
        }
        Ok(NameClaim {
            table: self,
            name: Some(name.clone()),
        })
    }
}

/// Releases a claimed name on drop unless the endpoint was kept.
struct NameClaim<'a> {
    table: &'a EndpointTable,
    name: Option<EndpointName>,
}

impl NameClaim<'_> {
    fn keep(mut self) {
        self.name = None;
    }
}

impl Drop for NameClaim<'_> {
    fn drop(&mut self) {
        if let Some(name) = self.name.take() {
            self.table.claimed.lock().remove(&name);
        }
    }
}

impl LoadHandler<Arc<LoadedEndpoint>, ()> for EndpointTable {
    fn completed(&self, endpoint: Arc<LoadedEndpoint>, _item: &ConfigItem) -> Result<()> {
        let mut endpoints = self.endpoints.write();
        if endpoints.contains_key(endpoint.name()) {
            return Err(RelayError::DuplicateEndpointName(endpoint.name().to_string()));
        }

        let _scope = self.diagnostics.enter();
        tracing::info!(
            "[{}] Loaded endpoint '{}' ({})",
            self.diagnostics.scope(),
            endpoint.name(),
            endpoint.type_name()
        );
        endpoints.insert(endpoint.name().clone(), endpoint);
        Ok(())
    }

    fn failed(&self, item: &ConfigItem, error: RelayError) {
        let _scope = self.diagnostics.enter();
        match node_str(item.node(), "name") {
            Some(name) => tracing::warn!(
                "[{}] Failed to load endpoint '{}': {}",
                self.diagnostics.scope(),
                name,
                error
            ),
            None => tracing::warn!(
                "[{}] Failed to load endpoint: {}",
                self.diagnostics.scope(),
                error
            ),
        }
    }
}

/// Resolves a source to its `(link, endpoint)` destinations for the
/// distributor.
struct Router {
    endpoints: Arc<EndpointTable>,
    links: Arc<LinkManager>,
}

impl DestinationResolver for Router {
    fn destinations(&self, source: &EndpointName) -> Vec<Destination> {
        self.links
            .get_links(source)
            .into_iter()
            .filter_map(|link| {
                let endpoint = self.endpoints.get(link.target())?;
                Some((link, endpoint))
            })
            .collect()
    }
}

pub struct EndpointManager {
    diagnostics: Diagnostics,
    table: Arc<EndpointTable>,
    registry: TypeRegistry<Arc<LoadedEndpoint>>,
    router: Arc<Router>,
    bots: Arc<BotRegistry>,
    distributor: Arc<MessageDistributor>,
}

impl EndpointManager {
    /// Create the manager, start its distributor and register the built-in
    /// channel endpoint type.
    pub fn new(
        diagnostics: Diagnostics,
        bots: Arc<BotRegistry>,
        links: Arc<LinkManager>,
        distributor_config: DistributorConfig,
    ) -> Result<Self> {
        let table = Arc::new(EndpointTable {
            diagnostics: diagnostics.clone(),
            endpoints: RwLock::new(HashMap::new()),
            claimed: Mutex::new(HashSet::new()),
        });
        let router = Arc::new(Router {
            endpoints: Arc::clone(&table),
            links,
        });
        let distributor = Arc::new(MessageDistributor::spawn(
            diagnostics.scoped("distributor"),
            distributor_config,
            Arc::clone(&router) as Arc<dyn DestinationResolver>,
        )?);
        let registry = TypeRegistry::new(
            "endpoint",
            diagnostics.clone(),
            Arc::clone(&table) as Arc<dyn LoadHandler<Arc<LoadedEndpoint>, ()>>,
        );

        let manager = Self {
            diagnostics,
            table,
            registry,
            router,
            bots,
            distributor,
        };
        manager.register_type(CHANNEL_ENDPOINT_TYPE, TypeRecipe::<ChannelEndpoint>::default())?;
        Ok(manager)
    }

    /// Register an endpoint type. Items already waiting for `name` are
    /// loaded immediately.
    pub fn register_type<E: Endpoint>(&self, name: &str, recipe: TypeRecipe<E>) -> Result<()> {
        let bots = Arc::clone(&self.bots);
        let table = Arc::clone(&self.table);
        let sender = self.distributor.sender();
        let type_name = name.to_string();

        let recipe = recipe.finish(move |mut endpoint: E, item: &ConfigItem| {
            let name = node_str(item.node(), "name")
                .ok_or_else(|| RelayError::InvalidItem("Endpoint has no name".into()))?;
            let name = EndpointName::new(name);
            let extra = item.node().get("extra").unwrap_or(&ConfigNode::Null);

            let claim = table.claim(&name)?;
            endpoint.load_extra(&EndpointContext::new(&name, &bots, &sender), extra)?;
            claim.keep();
            Ok(Arc::new(LoadedEndpoint::new(
                name,
                type_name.clone(),
                Box::new(endpoint),
            )))
        });
        self.registry.register_type(name, recipe)
    }

    /// Load every item of the `endpoints` section.
    pub fn load_endpoints(&self, items: &[ConfigNode]) {
        let _scope = self.diagnostics.enter();
        tracing::debug!(
            "[{}] Loading {} endpoint item(s)",
            self.diagnostics.scope(),
            items.len()
        );
        self.registry
            .load_all(items.iter().cloned().map(ConfigItem::new));
    }

    pub fn load_endpoint(&self, item: ConfigNode) {
        self.registry.load(ConfigItem::new(item));
    }

    /// Queue a message for asynchronous distribution. Never blocks on
    /// delivery.
    pub fn send_message(&self, message: Message) {
        self.distributor.add_message(message);
    }

    /// Every `(link, endpoint)` pair a message from `source` goes to, in
    /// link order. Links whose target never loaded are left out.
    pub fn get_destinations(&self, source: &EndpointName) -> Vec<Destination> {
        self.router.destinations(source)
    }

    pub fn endpoint(&self, name: &EndpointName) -> Option<Arc<LoadedEndpoint>> {
        self.table.get(name)
    }

    pub fn endpoint_names(&self) -> Vec<EndpointName> {
        let mut names: Vec<_> = self.table.endpoints.read().keys().cloned().collect();
        names.sort_by(|a, b| a.key().cmp(b.key()));
        names
    }

    pub fn len(&self) -> usize {
        self.table.endpoints.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.endpoints.read().is_empty()
    }

    pub fn registry(&self) -> &TypeRegistry<Arc<LoadedEndpoint>> {
        &self.registry
    }

    pub fn distributor(&self) -> &Arc<MessageDistributor> {
        &self.distributor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::endpoint::{ChatBot, EndpointIntake};
    use crate::core::filter::FilterManager;
    use crate::core::targeted_message::TargetedMessage;
    use crate::core::link::Link;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct Sink;

    impl Endpoint for Sink {
        fn receive_message(&mut self, _message: &TargetedMessage, _link: &Link) -> Result<()> {
            Ok(())
        }
    }

    fn sink_recipe() -> TypeRecipe<Sink> {
        TypeRecipe::<Sink>::default()
    }

    struct ChannelLog {
        channels: Mutex<Vec<String>>,
    }

    impl ChatBot for ChannelLog {
        fn name(&self) -> &str {
            "main"
        }

        fn add_channel(&self, channel: &str, _intake: EndpointIntake) {
            self.channels.lock().push(channel.to_string());
        }

        fn send_message(&self, _channel: &str, _text: &str) -> Result<()> {
            Ok(())
        }
    }

    fn manager() -> (EndpointManager, Arc<LinkManager>, Arc<ChannelLog>) {
        let diagnostics = Diagnostics::new("endpoint-test");
        let bots = Arc::new(BotRegistry::new(diagnostics.scoped("bots")));
        let bot = Arc::new(ChannelLog {
            channels: Mutex::new(Vec::new()),
        });
        bots.insert(bot.clone());
        let filters = Arc::new(FilterManager::new(diagnostics.scoped("filters")).unwrap());
        let links = Arc::new(LinkManager::new(diagnostics.scoped("links"), filters));
        let manager = EndpointManager::new(
            diagnostics,
            bots,
            Arc::clone(&links),
            DistributorConfig::default(),
        )
        .unwrap();
        (manager, links, bot)
    }

    #[test]
    fn test_channel_type_is_built_in() {
        let (manager, _, bot) = manager();
        assert!(manager.registry().is_registered(CHANNEL_ENDPOINT_TYPE));

        manager.load_endpoints(&[json!({
            "type": "irc", "name": "Lobby", "extra": {"bot": "main", "channel": "#lobby"}
        })]);
        let endpoint = manager.endpoint(&"lobby".into()).unwrap();
        assert_eq!(endpoint.name().as_str(), "Lobby");
        assert_eq!(endpoint.type_name(), "irc");
        assert_eq!(*bot.channels.lock(), ["#lobby"]);
    }

    #[test]
    fn test_builtin_type_cannot_be_replaced() {
        let (manager, _, _) = manager();
        let err = manager.register_type("irc", sink_recipe()).unwrap_err();
        assert!(matches!(err, RelayError::DuplicateType { kind: "endpoint", .. }));
    }

    #[test]
    fn test_channel_endpoint_with_unknown_bot_is_dropped() {
        let (manager, _, _) = manager();
        manager.load_endpoints(&[
            json!({"type": "irc", "name": "a", "extra": {"bot": "nobody", "channel": "#a"}}),
            json!({"type": "irc", "name": "b", "extra": {"channel": "#b"}}),
            json!({"type": "irc", "name": "c", "extra": {"bot": "main"}}),
            json!({"type": "irc", "name": "d"}),
        ]);
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let (manager, _, _) = manager();
        manager.register_type("sink", sink_recipe()).unwrap();
        manager.load_endpoints(&[
            json!({"type": "sink", "name": "Alpha", "label": "first"}),
            json!({"type": "sink", "name": "ALPHA", "label": "second"}),
            json!({"type": "sink", "label": "nameless"}),
        ]);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.endpoint_names()[0].as_str(), "Alpha");
    }

    #[test]
    fn test_duplicate_channel_endpoint_never_joins() {
        let (manager, _, bot) = manager();
        manager.load_endpoints(&[
            json!({"type": "irc", "name": "Alpha", "extra": {"bot": "main", "channel": "#alpha"}}),
            json!({"type": "irc", "name": "ALPHA", "extra": {"bot": "main", "channel": "#other"}}),
        ]);
        assert_eq!(manager.len(), 1);
        assert_eq!(*bot.channels.lock(), ["#alpha"]);
    }

    #[test]
    fn test_failed_endpoint_releases_its_name() {
        let (manager, _, bot) = manager();
        manager.register_type("sink", sink_recipe()).unwrap();
        manager.load_endpoints(&[
            json!({"type": "irc", "name": "Gamma", "extra": {"bot": "nobody", "channel": "#gamma"}}),
            json!({"type": "sink", "name": "gamma"}),
        ]);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.endpoint(&"GAMMA".into()).unwrap().type_name(), "sink");
        assert!(bot.channels.lock().is_empty());
    }

    #[test]
    fn test_late_type_registration_loads_waiting_items() {
        let (manager, _, _) = manager();
        manager.load_endpoints(&[
            json!({"type": "sink", "name": "one"}),
            json!({"type": "sink", "name": "two"}),
        ]);
        assert_eq!(manager.len(), 0);
        assert_eq!(manager.registry().pending_count(), 2);

        manager.register_type("sink", sink_recipe()).unwrap();
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.registry().pending_count(), 0);
    }

    #[test]
    fn test_destinations_skip_missing_targets() {
        let (manager, links, _) = manager();
        manager.register_type("sink", sink_recipe()).unwrap();
        manager.load_endpoints(&[
            json!({"type": "sink", "name": "src"}),
            json!({"type": "sink", "name": "dst"}),
        ]);
        links.load_links(&[
            json!({"source": "src", "target": "ghost"}),
            json!({"source": "SRC", "target": "Dst"}),
        ]);

        let destinations = manager.get_destinations(&"src".into());
        assert_eq!(destinations.len(), 1);
        assert_eq!(destinations[0].1.name().as_str(), "dst");
        assert!(manager.get_destinations(&"dst".into()).is_empty());
    }
}
