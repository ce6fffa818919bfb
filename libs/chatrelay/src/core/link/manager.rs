// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Link graph: endpoints are nodes, links are parallel-capable edges.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use super::{Link, LinkId};
use crate::core::config::{ConfigNode, node_flag, node_str};
use crate::core::diagnostics::Diagnostics;
use crate::core::endpoint::EndpointName;
use crate::core::filter::FilterManager;

#[derive(Default)]
struct LinkGraph {
    graph: DiGraph<EndpointName, Arc<Link>>,
    name_to_node: HashMap<EndpointName, NodeIndex>,
}

impl LinkGraph {
    fn node(&mut self, name: &EndpointName) -> NodeIndex {
        if let Some(index) = self.name_to_node.get(name) {
            return *index;
        }
        let index = self.graph.add_node(name.clone());
        self.name_to_node.insert(name.clone(), index);
        index
    }
}

pub struct LinkManager {
    diagnostics: Diagnostics,
    filters: Arc<FilterManager>,
    graph: RwLock<LinkGraph>,
    next_id: AtomicU64,
}

impl LinkManager {
    pub fn new(diagnostics: Diagnostics, filters: Arc<FilterManager>) -> Self {
        Self {
            diagnostics,
            filters,
            graph: RwLock::new(LinkGraph::default()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Load every entry of the `links` section. Malformed entries are logged
    /// and skipped. Returns how many links were created, reverse links
    /// included.
    pub fn load_links(&self, entries: &[ConfigNode]) -> usize {
        let _scope = self.diagnostics.enter();
        let mut created = 0;

        for (index, entry) in entries.iter().enumerate() {
            let (Some(source), Some(target)) = (node_str(entry, "source"), node_str(entry, "target"))
            else {
                tracing::warn!(
                    "[{}] Link #{} needs both 'source' and 'target', skipping",
                    self.diagnostics.scope(),
                    index + 1
                );
                continue;
            };

            let filters: &[ConfigNode] = match entry.get("filters") {
                None | Some(ConfigNode::Null) => &[],
                Some(ConfigNode::Array(filters)) => filters,
                Some(_) => {
                    tracing::warn!(
                        "[{}] Link #{} ({} -> {}) has a non-list 'filters', ignoring them",
                        self.diagnostics.scope(),
                        index + 1,
                        source,
                        target
                    );
                    &[]
                }
            };

            self.add_link(source, target, filters);
            created += 1;

            if node_flag(entry, "bidirectional") {
                if !filters.is_empty() {
                    tracing::warn!(
                        "[{}] Link #{} is bidirectional with filters; the reverse link {} -> {} gets none",
                        self.diagnostics.scope(),
                        index + 1,
                        target,
                        source
                    );
                }
                self.add_link(target, source, &[]);
                created += 1;
            }
        }

        tracing::info!(
            "[{}] Loaded {} link(s) from {} entr{}",
            self.diagnostics.scope(),
            created,
            entries.len(),
            if entries.len() == 1 { "y" } else { "ies" }
        );
        created
    }

    /// Create one link and load its filters.
    ///
    /// Filters whose type is known attach before the link becomes visible to
    /// routing; late filter types attach in place when registered.
    pub fn add_link(&self, source: &str, target: &str, filters: &[ConfigNode]) -> Arc<Link> {
        let id = LinkId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let link = Arc::new(Link::new(
            id,
            EndpointName::new(source),
            EndpointName::new(target),
            self.diagnostics.clone(),
        ));

        self.filters.load_for_link(&link, filters);

        let mut graph = self.graph.write();
        let from = graph.node(link.source());
        let to = graph.node(link.target());
        graph.graph.add_edge(from, to, Arc::clone(&link));

        tracing::debug!(
            "[{}] Added {} with {} filter(s)",
            self.diagnostics.scope(),
            link,
            link.filter_count()
        );
        link
    }

    /// Links leaving `source`, in creation order.
    pub fn get_links(&self, source: &EndpointName) -> Vec<Arc<Link>> {
        let graph = self.graph.read();
        let Some(&node) = graph.name_to_node.get(source) else {
            return Vec::new();
        };
        let mut links: Vec<Arc<Link>> = graph
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|edge| Arc::clone(edge.weight()))
            .collect();
        links.sort_by_key(|link| link.id());
        links
    }

    /// Every link, in creation order.
    pub fn links(&self) -> Vec<Arc<Link>> {
        let graph = self.graph.read();
        let mut links: Vec<Arc<Link>> = graph.graph.edge_weights().cloned().collect();
        links.sort_by_key(|link| link.id());
        links
    }

    pub fn link_count(&self) -> usize {
        self.graph.read().graph.edge_count()
    }

    pub fn to_dot(&self) -> String {
        use petgraph::dot::{Config, Dot};
        let graph = self.graph.read();
        format!("{:?}", Dot::with_config(&graph.graph, &[Config::EdgeNoLabel]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manager() -> LinkManager {
        let diagnostics = Diagnostics::new("link-manager-test");
        let filters = FilterManager::new(diagnostics.scoped("filters")).unwrap();
        filters.load_templates(
            json!({"no-commands": {"type": "regex", "pattern": "^!"}})
                .as_object()
                .unwrap(),
        );
        LinkManager::new(diagnostics, Arc::new(filters))
    }

    fn targets(links: &[Arc<Link>]) -> Vec<&str> {
        links.iter().map(|l| l.target().as_str()).collect()
    }

    #[test]
    fn test_links_keep_config_order() {
        let manager = manager();
        manager.load_links(&[
            json!({"source": "a", "target": "c"}),
            json!({"source": "b", "target": "a"}),
            json!({"source": "a", "target": "b"}),
            json!({"source": "a", "target": "c"}),
        ]);
        let links = manager.get_links(&"a".into());
        assert_eq!(targets(&links), ["c", "b", "c"]);
        assert_ne!(links[0].id(), links[2].id());
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let manager = manager();
        manager.load_links(&[json!({"source": "Lobby", "target": "Mirror"})]);
        assert_eq!(manager.get_links(&"LOBBY".into()).len(), 1);
        assert!(manager.get_links(&"mirror".into()).is_empty());
        assert!(manager.get_links(&"unknown".into()).is_empty());
    }

    #[test]
    fn test_bidirectional_reverse_link_is_filterless() {
        let manager = manager();
        let created = manager.load_links(&[
            json!({"source": "a", "target": "b", "bidirectional": "TRUE", "filters": ["no-commands"]}),
            json!({"source": "c", "target": "d", "bidirectional": true}),
            json!({"source": "e", "target": "f", "bidirectional": "no"}),
        ]);
        assert_eq!(created, 5);

        let forward = manager.get_links(&"a".into());
        let reverse = manager.get_links(&"b".into());
        assert_eq!(forward[0].filter_count(), 1);
        assert_eq!(reverse[0].filter_count(), 0);
        assert_eq!(targets(&reverse), ["a"]);
        assert_eq!(manager.get_links(&"d".into()).len(), 1);
        assert!(manager.get_links(&"f".into()).is_empty());
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let manager = manager();
        let created = manager.load_links(&[
            json!({"source": "a"}),
            json!({"target": "b"}),
            json!("a -> b"),
            json!({"source": "a", "target": 5}),
            json!({"source": "a", "target": "b", "filters": "no-commands"}),
        ]);
        assert_eq!(created, 1);
        assert_eq!(manager.link_count(), 1);
        assert_eq!(manager.links()[0].filter_count(), 0);
    }

    #[test]
    fn test_to_dot() {
        let manager = manager();
        manager.load_links(&[json!({"source": "a", "target": "b"})]);
        let dot = manager.to_dot();
        assert!(dot.contains("digraph"));
    }
}
