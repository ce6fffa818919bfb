// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Name-keyed type registry with deferred loading.
//!
//! Config items name their type with a `type` key. Items whose type is not
//! registered yet are parked per type name and replayed, in arrival order,
//! the moment the type is registered. This is what lets extensions register
//! their endpoint and filter types after the config has already been read.

mod item;
mod recipe;

pub use item::{ConfigItem, LoadHandler};
pub use recipe::{FieldBinding, FieldKind, FieldSpec, FieldValue, Recipe, TypeRecipe};

use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::diagnostics::Diagnostics;
use crate::core::error::describe_panic;
use crate::core::{RelayError, Result};

struct RegistryState<T, A> {
    types: HashMap<String, Arc<Recipe<T, A>>>,
    pending: HashMap<String, VecDeque<ConfigItem<A>>>,
    // Types whose parked items are still being replayed. New items for them
    // queue behind the parked ones instead of building immediately.
    replaying: HashSet<String>,
}

/// Registry of buildable types for one kind of component.
///
/// `T` is what the owning manager stores (a boxed endpoint, a shared filter),
/// `A` is per-item context the manager needs when the instance is finished.
pub struct TypeRegistry<T, A = ()> {
    kind: &'static str,
    diagnostics: Diagnostics,
    // Types and pending items share one lock so a registration can never
    // miss an item parked concurrently.
    state: Mutex<RegistryState<T, A>>,
    handler: Arc<dyn LoadHandler<T, A>>,
}

impl<T, A> TypeRegistry<T, A>
where
    T: 'static,
    A: 'static,
{
    pub fn new(
        kind: &'static str,
        diagnostics: Diagnostics,
        handler: Arc<dyn LoadHandler<T, A>>,
    ) -> Self {
        Self {
            kind,
            diagnostics,
            state: Mutex::new(RegistryState {
                types: HashMap::new(),
                pending: HashMap::new(),
                replaying: HashSet::new(),
            }),
            handler,
        }
    }

    /// Register a type and replay any items that were waiting for it.
    pub fn register_type(&self, name: &str, recipe: Recipe<T, A>) -> Result<()> {
        let _scope = self.diagnostics.enter();

        if let Some(field) = recipe.fields().iter().find(|f| !f.kind.is_injectable()) {
            tracing::warn!(
                "[{}] Rejecting {} type '{}': field '{}' is a {}",
                self.diagnostics.scope(),
                self.kind,
                name,
                field.key,
                field.kind
            );
            return Err(RelayError::UnsupportedFieldKind {
                type_name: name.to_string(),
                key: field.key.clone(),
                kind: field.kind.name(),
            });
        }

        let recipe = Arc::new(recipe);
        let mut waiting = {
            let mut state = self.state.lock();
            if state.types.contains_key(name) {
                tracing::warn!(
                    "[{}] {} type '{}' is already registered",
                    self.diagnostics.scope(),
                    self.kind,
                    name
                );
                return Err(RelayError::DuplicateType {
                    kind: self.kind,
                    name: name.to_string(),
                });
            }
            state.types.insert(name.to_string(), Arc::clone(&recipe));
            let waiting = state.pending.remove(name).unwrap_or_default();
            if !waiting.is_empty() {
                state.replaying.insert(name.to_string());
            }
            waiting
        };

        tracing::info!(
            "[{}] Registered {} type '{}' ({} pending item(s))",
            self.diagnostics.scope(),
            self.kind,
            name,
            waiting.len()
        );

        while !waiting.is_empty() {
            for item in waiting {
                self.build(&recipe, item);
            }
            // Pick up anything loaded for this type while replaying.
            let mut state = self.state.lock();
            waiting = state.pending.remove(name).unwrap_or_default();
            if waiting.is_empty() {
                state.replaying.remove(name);
            }
        }
        Ok(())
    }

    /// Build each item now if its type is known, otherwise park it.
    ///
    /// While a type's parked items are being replayed, new items for it are
    /// queued behind them and built by the replaying thread, so build order
    /// always follows load order.
    pub fn load_all(&self, items: impl IntoIterator<Item = ConfigItem<A>>) {
        for item in items {
            self.load(item);
        }
    }

    pub fn load(&self, item: ConfigItem<A>) {
        let type_name = match item.require_type_name() {
            Ok(name) => name.to_string(),
            Err(error) => {
                self.handler.failed(&item, error);
                return;
            }
        };

        let recipe = {
            let mut state = self.state.lock();
            let replaying = state.replaying.contains(&type_name);
            match state.types.get(&type_name).cloned() {
                Some(recipe) if !replaying => recipe,
                Some(_) => {
                    state.pending.entry(type_name).or_default().push_back(item);
                    return;
                }
                None => {
                    let _scope = self.diagnostics.enter();
                    tracing::debug!(
                        "[{}] {} type '{}' not registered yet, deferring item",
                        self.diagnostics.scope(),
                        self.kind,
                        type_name
                    );
                    state.pending.entry(type_name).or_default().push_back(item);
                    return;
                }
            }
        };

        self.build(&recipe, item);
    }

    fn build(&self, recipe: &Recipe<T, A>, item: ConfigItem<A>) {
        let built = catch_unwind(AssertUnwindSafe(|| recipe.build(&item))).unwrap_or_else(|payload| {
            Err(RelayError::InvalidItem(format!(
                "construction panicked: {}",
                describe_panic(payload.as_ref())
            )))
        });

        match built {
            Ok(instance) => {
                if let Err(error) = self.handler.completed(instance, &item) {
                    self.handler.failed(&item, error);
                }
            }
            Err(error) => self.handler.failed(&item, error),
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.state.lock().types.contains_key(name)
    }

    pub fn registered_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().types.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of items parked across all unknown types.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.values().map(VecDeque::len).sum()
    }

    /// Type names that currently have parked items.
    pub fn pending_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().pending.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        completed: Mutex<Vec<String>>,
        failed: Mutex<Vec<String>>,
    }

    impl LoadHandler<String, ()> for Recorder {
        fn completed(&self, instance: String, _item: &ConfigItem<()>) -> Result<()> {
            if instance == "reject-me" {
                return Err(RelayError::InvalidItem("handler refused".into()));
            }
            self.completed.lock().push(instance);
            Ok(())
        }

        fn failed(&self, item: &ConfigItem<()>, error: RelayError) {
            let id = item.node().get("id").and_then(|v| v.as_str()).unwrap_or("?");
            self.failed.lock().push(format!("{}: {}", id, error));
        }
    }

    #[derive(Default)]
    struct Labeled {
        id: String,
    }

    fn labeled_recipe(prefix: &'static str) -> Recipe<String, ()> {
        TypeRecipe::<Labeled>::default()
            .field(FieldBinding::text("id", |l: &mut Labeled, v| l.id = v).required())
            .finish(move |l, _| Ok(format!("{}{}", prefix, l.id)))
    }

    fn registry() -> (TypeRegistry<String>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let registry = TypeRegistry::new(
            "test",
            Diagnostics::new("registry-test"),
            Arc::clone(&recorder) as Arc<dyn LoadHandler<String, ()>>,
        );
        (registry, recorder)
    }

    fn item(type_name: &str, id: &str) -> ConfigItem {
        ConfigItem::new(json!({"type": type_name, "id": id}))
    }

    #[test]
    fn test_known_type_loads_immediately() {
        let (registry, recorder) = registry();
        registry.register_type("plain", labeled_recipe("")).unwrap();
        registry.load_all([item("plain", "a"), item("plain", "b")]);

        assert_eq!(*recorder.completed.lock(), ["a", "b"]);
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn test_pending_items_replay_in_arrival_order() {
        let (registry, recorder) = registry();
        registry.load_all([
            item("custom", "1"),
            item("other", "x"),
            item("custom", "2"),
            item("custom", "3"),
        ]);
        assert!(recorder.completed.lock().is_empty());
        assert_eq!(registry.pending_count(), 4);
        assert_eq!(registry.pending_types(), ["custom", "other"]);

        registry.register_type("custom", labeled_recipe("c")).unwrap();
        assert_eq!(*recorder.completed.lock(), ["c1", "c2", "c3"]);
        assert_eq!(registry.pending_count(), 1);
        assert_eq!(registry.pending_types(), ["other"]);
    }

    /// Loads one more item of the same type when it sees `trigger` complete.
    struct Chaining {
        registry: std::sync::OnceLock<std::sync::Weak<TypeRegistry<String>>>,
        trigger: &'static str,
        completed: Mutex<Vec<String>>,
    }

    impl LoadHandler<String, ()> for Chaining {
        fn completed(&self, instance: String, _item: &ConfigItem<()>) -> Result<()> {
            let chain = instance == self.trigger;
            self.completed.lock().push(instance);
            if chain {
                if let Some(registry) = self.registry.get().and_then(|r| r.upgrade()) {
                    registry.load(item("plain", "late"));
                }
            }
            Ok(())
        }

        fn failed(&self, _item: &ConfigItem<()>, _error: RelayError) {}
    }

    #[test]
    fn test_items_loaded_during_replay_build_after_parked_ones() {
        let handler = Arc::new(Chaining {
            registry: std::sync::OnceLock::new(),
            trigger: "a",
            completed: Mutex::new(Vec::new()),
        });
        let registry = Arc::new(TypeRegistry::new(
            "test",
            Diagnostics::new("registry-test"),
            Arc::clone(&handler) as Arc<dyn LoadHandler<String, ()>>,
        ));
        let _ = handler.registry.set(Arc::downgrade(&registry));

        registry.load_all([item("plain", "a"), item("plain", "b")]);
        registry.register_type("plain", labeled_recipe("")).unwrap();

        assert_eq!(*handler.completed.lock(), ["a", "b", "late"]);
        assert_eq!(registry.pending_count(), 0);

        registry.load(item("plain", "after"));
        assert_eq!(handler.completed.lock().last().map(String::as_str), Some("after"));
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let (registry, recorder) = registry();
        registry.register_type("plain", labeled_recipe("first-")).unwrap();

        let err = registry
            .register_type("plain", labeled_recipe("second-"))
            .unwrap_err();
        assert!(matches!(err, RelayError::DuplicateType { kind: "test", ref name } if name == "plain"));

        registry.load(item("plain", "a"));
        assert_eq!(*recorder.completed.lock(), ["first-a"]);
        assert_eq!(registry.registered_types(), ["plain"]);
    }

    #[test]
    fn test_unsupported_field_kind_fails_registration() {
        let (registry, _) = registry();
        let recipe = TypeRecipe::<Labeled>::default()
            .field(FieldBinding::new("tags", FieldKind::Sequence, |_, _| Ok(())))
            .finish(|l, _| Ok(l.id));

        let err = registry.register_type("tagged", recipe).unwrap_err();
        assert!(matches!(err, RelayError::UnsupportedFieldKind { ref key, kind: "sequence", .. } if key == "tags"));
        assert!(!registry.is_registered("tagged"));
    }

    #[test]
    fn test_failures_do_not_stop_siblings() {
        let (registry, recorder) = registry();
        registry.register_type("plain", labeled_recipe("")).unwrap();
        registry.load_all([
            item("plain", "a"),
            ConfigItem::new(json!({"type": "plain"})),
            ConfigItem::new(json!({"id": "untyped"})),
            item("plain", "reject-me"),
            item("plain", "b"),
        ]);

        assert_eq!(*recorder.completed.lock(), ["a", "b"]);
        let failed = recorder.failed.lock();
        assert_eq!(failed.len(), 3);
        assert!(failed[0].contains("Missing required field 'id'"));
        assert!(failed[1].starts_with("untyped: Invalid config item"));
        assert!(failed[2].contains("handler refused"));
    }

    #[test]
    fn test_panicking_constructor_is_reported() {
        let (registry, recorder) = registry();
        let recipe = TypeRecipe::<Labeled>::new(|| panic!("boom"))
            .finish(|l: Labeled, _: &ConfigItem| Ok(l.id));
        registry.register_type("explodes", recipe).unwrap();

        registry.load(item("explodes", "a"));
        assert!(recorder.completed.lock().is_empty());
        assert!(recorder.failed.lock()[0].contains("boom"));
    }

    #[test]
    fn test_concurrent_registration_never_strands_items() {
        for _ in 0..20 {
            let (registry, recorder) = registry();
            let registry = Arc::new(registry);

            let loader = {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        registry.load(item("late", &i.to_string()));
                    }
                })
            };
            registry.register_type("late", labeled_recipe("")).unwrap();
            loader.join().unwrap();

            assert_eq!(recorder.completed.lock().len(), 50);
            assert_eq!(registry.pending_count(), 0);
        }
    }
}
