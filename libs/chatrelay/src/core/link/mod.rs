// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Directed, filtered connections between endpoints.

mod manager;

pub use manager::LinkManager;

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::diagnostics::Diagnostics;
use crate::core::endpoint::EndpointName;
use crate::core::error::describe_panic;
use crate::core::filter::Filter;
use crate::core::targeted_message::TargetedMessage;

/// Unique link id, assigned in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkId(u64);

impl LinkId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link_{}", self.0)
    }
}

struct AttachedFilter {
    position: usize,
    type_name: String,
    filter: Arc<dyn Filter>,
}

/// A source → target link and its ordered filter chain.
///
/// Filters attach at their configured position, so the chain keeps config
/// order even when some filter types register later than others.
pub struct Link {
    id: LinkId,
    source: EndpointName,
    target: EndpointName,
    filters: RwLock<Vec<AttachedFilter>>,
    diagnostics: Diagnostics,
}

impl Link {
    pub fn new(id: LinkId, source: EndpointName, target: EndpointName, diagnostics: Diagnostics) -> Self {
        Self {
            id,
            source,
            target,
            filters: RwLock::new(Vec::new()),
            diagnostics,
        }
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn source(&self) -> &EndpointName {
        &self.source
    }

    pub fn target(&self) -> &EndpointName {
        &self.target
    }

    pub fn filter_count(&self) -> usize {
        self.filters.read().len()
    }

    /// Type names of the attached filters, in chain order.
    pub fn filter_types(&self) -> Vec<String> {
        self.filters.read().iter().map(|f| f.type_name.clone()).collect()
    }

    /// Insert `filter` at its configured `position` in the chain.
    pub fn attach_filter(&self, position: usize, type_name: &str, filter: Arc<dyn Filter>) {
        let mut filters = self.filters.write();
        let index = filters.partition_point(|f| f.position <= position);
        filters.insert(
            index,
            AttachedFilter {
                position,
                type_name: type_name.to_string(),
                filter,
            },
        );
    }

    /// Run the chain over `message`, stopping as soon as it is rejected.
    ///
    /// A failing or panicking filter is logged and skipped; the message
    /// continues through the rest of the chain.
    pub fn filter_message(&self, message: &mut TargetedMessage) {
        let chain: Vec<(String, Arc<dyn Filter>)> = self
            .filters
            .read()
            .iter()
            .map(|f| (f.type_name.clone(), Arc::clone(&f.filter)))
            .collect();

        for (type_name, filter) in chain {
            match catch_unwind(AssertUnwindSafe(|| filter.process_message(message))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    let _scope = self.diagnostics.enter();
                    tracing::warn!(
                        "[{}] Filter '{}' on {} failed, passing message through: {}",
                        self.diagnostics.scope(),
                        type_name,
                        self,
                        error
                    );
                }
                Err(payload) => {
                    let _scope = self.diagnostics.enter();
                    tracing::warn!(
                        "[{}] Filter '{}' on {} panicked, passing message through: {}",
                        self.diagnostics.scope(),
                        type_name,
                        self,
                        describe_panic(payload.as_ref())
                    );
                }
            }
            if message.is_rejected() {
                return;
            }
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} -> {})", self.id, self.source, self.target)
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("target", &self.target)
            .field("filters", &self.filter_types())
            .finish()
    }
}
