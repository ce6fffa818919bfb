// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Diagnostics handle threaded through every relay component.
//!
//! There is no process-global logger configuration in this crate. The host
//! installs whatever `tracing` subscriber it wants; each component receives a
//! [`Diagnostics`] at construction and emits its events inside that handle's
//! span, so a host running several relays can tell their output apart.

use std::sync::Arc;

use tracing::Span;

#[derive(Clone, Debug)]
pub struct Diagnostics {
    span: Span,
    scope: Arc<str>,
}

impl Diagnostics {
    /// Root handle for one relay instance.
    pub fn new(relay_name: &str) -> Self {
        Self {
            span: tracing::info_span!("chatrelay", relay = %relay_name),
            scope: Arc::from(relay_name),
        }
    }

    /// Child handle for a component, nested under this one.
    pub fn scoped(&self, component: &str) -> Self {
        Self {
            span: tracing::info_span!(parent: &self.span, "component", component = %component),
            scope: Arc::from(format!("{}/{}", self.scope, component)),
        }
    }

    /// Slash-separated path used as the `[...]` prefix in log lines.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    pub fn in_scope<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.span.in_scope(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_paths_nest() {
        let root = Diagnostics::new("relay-a");
        let links = root.scoped("links");
        let filters = links.scoped("filters");

        assert_eq!(root.scope(), "relay-a");
        assert_eq!(links.scope(), "relay-a/links");
        assert_eq!(filters.scope(), "relay-a/links/filters");
    }

    #[test]
    fn test_in_scope_returns_value() {
        let diagnostics = Diagnostics::new("relay-b");
        assert_eq!(diagnostics.in_scope(|| 3 + 4), 7);
    }
}
