// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Relay startup and lifecycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::core::Result;
use crate::core::config::RelayConfig;
use crate::core::diagnostics::Diagnostics;
use crate::core::endpoint::{BotRegistry, EndpointManager};
use crate::core::filter::FilterManager;
use crate::core::link::LinkManager;

/// Something with background work to stop when the relay shuts down.
pub trait Shutdownable: Send + Sync {
    fn shutdown(&self);
}

/// A running relay.
///
/// Built from a parsed config and the host's bots. Custom endpoint and
/// filter types may be registered through the managers at any time after
/// start; config items already waiting for them load on registration.
pub struct Relay {
    diagnostics: Diagnostics,
    bots: Arc<BotRegistry>,
    filters: Arc<FilterManager>,
    links: Arc<LinkManager>,
    endpoints: EndpointManager,
    shutdownables: Mutex<Vec<Arc<dyn Shutdownable>>>,
    shut_down: AtomicBool,
}

impl Relay {
    pub fn start(config: RelayConfig, bots: BotRegistry, diagnostics: Diagnostics) -> Result<Self> {
        let _scope = diagnostics.enter();
        config.validate_structure()?;

        let filters = Arc::new(FilterManager::new(diagnostics.scoped("filters"))?);
        filters.load_templates(&config.repeatable_filters);

        let bots = Arc::new(bots);
        let backed = bots.reconcile(&config.bots);
        tracing::info!(
            "[{}] {} of {} configured bot(s) available",
            diagnostics.scope(),
            backed,
            config.bots.len()
        );

        let links = Arc::new(LinkManager::new(diagnostics.scoped("links"), Arc::clone(&filters)));
        let endpoints = EndpointManager::new(
            diagnostics.scoped("endpoints"),
            Arc::clone(&bots),
            Arc::clone(&links),
            config.distributor.to_distributor_config(),
        )?;

        let relay = Self {
            diagnostics: diagnostics.clone(),
            bots,
            filters,
            links,
            endpoints,
            shutdownables: Mutex::new(Vec::new()),
            shut_down: AtomicBool::new(false),
        };
        relay.track_shutdownable(Arc::clone(relay.endpoints.distributor()) as Arc<dyn Shutdownable>);
        relay.track_shutdownable(Arc::clone(&relay.bots) as Arc<dyn Shutdownable>);

        relay.endpoints.load_endpoints(&config.endpoints);
        relay.links.load_links(&config.links);

        tracing::info!(
            "[{}] Relay started: {} endpoint(s), {} link(s)",
            diagnostics.scope(),
            relay.endpoints.len(),
            relay.links.link_count()
        );
        Ok(relay)
    }

    pub fn endpoint_manager(&self) -> &EndpointManager {
        &self.endpoints
    }

    pub fn link_manager(&self) -> &Arc<LinkManager> {
        &self.links
    }

    pub fn filter_manager(&self) -> &Arc<FilterManager> {
        &self.filters
    }

    pub fn bot_registry(&self) -> &Arc<BotRegistry> {
        &self.bots
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Stop `item` when the relay shuts down. Items are stopped in the
    /// order they were tracked.
    pub fn track_shutdownable(&self, item: Arc<dyn Shutdownable>) {
        if self.is_shut_down() {
            item.shutdown();
            return;
        }
        self.shutdownables.lock().push(item);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Stop every tracked worker. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let _scope = self.diagnostics.enter();
        tracing::info!("[{}] Shutting down", self.diagnostics.scope());

        let items = std::mem::take(&mut *self.shutdownables.lock());
        for item in items {
            item.shutdown();
        }
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.shutdown();
    }
}
