// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Construction recipes: how to build a named type and which config keys to
//! inject into it.

use std::fmt;

use super::ConfigItem;
use crate::core::config::ConfigNode;
use crate::core::{RelayError, Result};

/// Declared kind of an injectable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Boolean,
    Floating,
    Integer,
    /// Not injectable; declaring it fails registration.
    Sequence,
    /// Not injectable; declaring it fails registration.
    Mapping,
}

impl FieldKind {
    pub fn is_injectable(self) -> bool {
        !matches!(self, FieldKind::Sequence | FieldKind::Mapping)
    }

    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Boolean => "boolean",
            FieldKind::Floating => "floating-point",
            FieldKind::Integer => "integer",
            FieldKind::Sequence => "sequence",
            FieldKind::Mapping => "mapping",
        }
    }

    /// Convert a present, non-null node to this kind. Scalars are converted
    /// leniently: `"42"` is an integer, `7` is text, `"TRUE"` is a boolean.
    pub fn convert(self, key: &str, node: &ConfigNode) -> Result<FieldValue> {
        let mismatch = |reason: String| RelayError::FieldConversion {
            key: key.to_string(),
            expected: self.name(),
            reason,
        };

        match self {
            FieldKind::Text => match node {
                ConfigNode::String(s) => Ok(FieldValue::Text(s.clone())),
                ConfigNode::Number(n) => Ok(FieldValue::Text(n.to_string())),
                ConfigNode::Bool(b) => Ok(FieldValue::Text(b.to_string())),
                other => Err(mismatch(format!("got {}", describe(other)))),
            },
            FieldKind::Boolean => match node {
                ConfigNode::Bool(b) => Ok(FieldValue::Boolean(*b)),
                ConfigNode::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "yes" | "on" => Ok(FieldValue::Boolean(true)),
                    "false" | "no" | "off" => Ok(FieldValue::Boolean(false)),
                    _ => Err(mismatch(format!("'{}' is not a boolean", s))),
                },
                other => Err(mismatch(format!("got {}", describe(other)))),
            },
            FieldKind::Floating => match node {
                ConfigNode::Number(n) => n
                    .as_f64()
                    .map(FieldValue::Floating)
                    .ok_or_else(|| mismatch(format!("{} is out of range", n))),
                ConfigNode::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(FieldValue::Floating)
                    .map_err(|e| mismatch(format!("'{}': {}", s, e))),
                other => Err(mismatch(format!("got {}", describe(other)))),
            },
            FieldKind::Integer => match node {
                ConfigNode::Number(n) => n
                    .as_i64()
                    .map(FieldValue::Integer)
                    .ok_or_else(|| mismatch(format!("{} is not a whole number", n))),
                ConfigNode::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(FieldValue::Integer)
                    .map_err(|e| mismatch(format!("'{}': {}", s, e))),
                other => Err(mismatch(format!("got {}", describe(other)))),
            },
            FieldKind::Sequence | FieldKind::Mapping => {
                Err(mismatch(format!("{} fields cannot be injected", self.name())))
            }
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn describe(node: &ConfigNode) -> &'static str {
    match node {
        ConfigNode::Null => "null",
        ConfigNode::Bool(_) => "a boolean",
        ConfigNode::Number(_) => "a number",
        ConfigNode::String(_) => "a string",
        ConfigNode::Array(_) => "a sequence",
        ConfigNode::Object(_) => "a mapping",
    }
}

/// A converted field value, ready for a setter.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Boolean(bool),
    Floating(f64),
    Integer(i64),
}

type Setter<C> = Box<dyn Fn(&mut C, FieldValue) -> Result<()> + Send + Sync>;

/// A config key bound to a setter on the instance under construction.
pub struct FieldBinding<C> {
    key: String,
    kind: FieldKind,
    required: bool,
    setter: Setter<C>,
}

macro_rules! typed_binding {
    ($fn_name:ident, $variant:ident, $ty:ty) => {
        pub fn $fn_name<F>(key: impl Into<String>, set: F) -> Self
        where
            F: Fn(&mut C, $ty) + Send + Sync + 'static,
        {
            let key = key.into();
            let setter_key = key.clone();
            Self::new(key, FieldKind::$variant, move |instance, value| match value {
                FieldValue::$variant(v) => {
                    set(instance, v);
                    Ok(())
                }
                other => Err(RelayError::FieldConversion {
                    key: setter_key.clone(),
                    expected: FieldKind::$variant.name(),
                    reason: format!("setter received {:?}", other),
                }),
            })
        }
    };
}

impl<C> FieldBinding<C> {
    /// Raw binding. Prefer the typed constructors below.
    pub fn new<F>(key: impl Into<String>, kind: FieldKind, setter: F) -> Self
    where
        F: Fn(&mut C, FieldValue) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            kind,
            required: false,
            setter: Box::new(setter),
        }
    }

    typed_binding!(text, Text, String);
    typed_binding!(boolean, Boolean, bool);
    typed_binding!(floating, Floating, f64);
    typed_binding!(integer, Integer, i64);

    /// Fail the whole item when this key is missing or null.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    fn spec(&self) -> FieldSpec {
        FieldSpec {
            key: self.key.clone(),
            kind: self.kind,
            required: self.required,
        }
    }

    fn inject(&self, instance: &mut C, node: &ConfigNode, type_name: &str) -> Result<()> {
        match node.get(&self.key) {
            None | Some(ConfigNode::Null) => {
                if self.required {
                    Err(RelayError::MissingField {
                        type_name: type_name.to_string(),
                        key: self.key.clone(),
                    })
                } else {
                    Ok(())
                }
            }
            Some(value) => {
                let converted = self.kind.convert(&self.key, value)?;
                (self.setter)(instance, converted)
            }
        }
    }
}

/// Key, kind and requiredness of a declared field, kept after the recipe
/// has been erased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: String,
    pub kind: FieldKind,
    pub required: bool,
}

/// Typed recipe for building `C` from a config item.
pub struct TypeRecipe<C> {
    construct: Box<dyn Fn() -> C + Send + Sync>,
    fields: Vec<FieldBinding<C>>,
}

impl<C: 'static> TypeRecipe<C> {
    pub fn new<F>(construct: F) -> Self
    where
        F: Fn() -> C + Send + Sync + 'static,
    {
        Self {
            construct: Box::new(construct),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, binding: FieldBinding<C>) -> Self {
        self.fields.push(binding);
        self
    }

    pub fn fields(&self) -> &[FieldBinding<C>] {
        &self.fields
    }

    /// Erase the concrete type. `finish` runs after all fields are injected
    /// and turns the instance into whatever the owning registry stores.
    pub fn finish<T, A, F>(self, finish: F) -> Recipe<T, A>
    where
        T: 'static,
        A: 'static,
        F: Fn(C, &ConfigItem<A>) -> Result<T> + Send + Sync + 'static,
    {
        let specs = self.fields.iter().map(FieldBinding::spec).collect();
        let TypeRecipe { construct, fields } = self;

        Recipe {
            fields: specs,
            build: Box::new(move |item| {
                let type_name = item.type_name().unwrap_or_default();
                let mut instance = construct();
                for binding in &fields {
                    binding.inject(&mut instance, item.node(), type_name)?;
                }
                finish(instance, item)
            }),
        }
    }
}

impl<C: Default + 'static> Default for TypeRecipe<C> {
    fn default() -> Self {
        Self::new(C::default)
    }
}

type BuildFn<T, A> = Box<dyn Fn(&ConfigItem<A>) -> Result<T> + Send + Sync>;

/// Type-erased recipe stored by a [`TypeRegistry`](super::TypeRegistry).
pub struct Recipe<T, A = ()> {
    fields: Vec<FieldSpec>,
    build: BuildFn<T, A>,
}

impl<T, A> Recipe<T, A> {
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub(crate) fn build(&self, item: &ConfigItem<A>) -> Result<T> {
        (self.build)(item)
    }
}

impl<T, A> fmt::Debug for Recipe<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recipe").field("fields", &self.fields).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default, Debug)]
    struct Knobs {
        label: Option<String>,
        enabled: bool,
        ratio: f64,
        count: i64,
    }

    fn knobs_recipe() -> Recipe<Knobs, ()> {
        TypeRecipe::<Knobs>::default()
            .field(FieldBinding::text("label", |k: &mut Knobs, v| k.label = Some(v)).required())
            .field(FieldBinding::boolean("enabled", |k: &mut Knobs, v| k.enabled = v))
            .field(FieldBinding::floating("ratio", |k: &mut Knobs, v| k.ratio = v))
            .field(FieldBinding::integer("count", |k: &mut Knobs, v| k.count = v))
            .finish(|k, _item| Ok(k))
    }

    #[test]
    fn test_injects_native_values() {
        let item = ConfigItem::new(json!({
            "type": "knobs", "label": "x", "enabled": true, "ratio": 0.5, "count": 9
        }));
        let knobs = knobs_recipe().build(&item).unwrap();
        assert_eq!(knobs.label.as_deref(), Some("x"));
        assert!(knobs.enabled);
        assert_eq!(knobs.ratio, 0.5);
        assert_eq!(knobs.count, 9);
    }

    #[test]
    fn test_lenient_scalar_conversion() {
        let item = ConfigItem::new(json!({
            "type": "knobs", "label": 12, "enabled": "Yes", "ratio": "2.25", "count": " 42 "
        }));
        let knobs = knobs_recipe().build(&item).unwrap();
        assert_eq!(knobs.label.as_deref(), Some("12"));
        assert!(knobs.enabled);
        assert_eq!(knobs.ratio, 2.25);
        assert_eq!(knobs.count, 42);
    }

    #[test]
    fn test_absent_optional_fields_keep_defaults() {
        let item = ConfigItem::new(json!({"type": "knobs", "label": "x", "count": null}));
        let knobs = knobs_recipe().build(&item).unwrap();
        assert!(!knobs.enabled);
        assert_eq!(knobs.count, 0);
    }

    #[test]
    fn test_missing_required_field() {
        let item = ConfigItem::new(json!({"type": "knobs", "label": null}));
        let err = knobs_recipe().build(&item).unwrap_err();
        assert!(matches!(
            err,
            RelayError::MissingField { ref type_name, ref key } if type_name == "knobs" && key == "label"
        ));
    }

    #[test]
    fn test_conversion_failures() {
        let recipe = knobs_recipe();
        let bad = [
            json!({"type": "knobs", "label": "x", "count": "many"}),
            json!({"type": "knobs", "label": "x", "count": 1.5}),
            json!({"type": "knobs", "label": "x", "enabled": "maybe"}),
            json!({"type": "knobs", "label": ["a"]}),
            json!({"type": "knobs", "label": "x", "ratio": {"n": 1}}),
        ];
        for node in bad {
            let err = recipe.build(&ConfigItem::new(node.clone())).unwrap_err();
            assert!(
                matches!(err, RelayError::FieldConversion { .. }),
                "expected conversion error for {}",
                node
            );
        }
    }

    #[test]
    fn test_field_specs_survive_erasure() {
        let recipe = knobs_recipe();
        let keys: Vec<_> = recipe.fields().iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, ["label", "enabled", "ratio", "count"]);
        assert!(recipe.fields()[0].required);
        assert_eq!(recipe.fields()[3].kind, FieldKind::Integer);
    }

    #[test]
    fn test_injectable_kinds() {
        assert!(FieldKind::Text.is_injectable());
        assert!(FieldKind::Integer.is_injectable());
        assert!(!FieldKind::Sequence.is_injectable());
        assert!(!FieldKind::Mapping.is_injectable());
    }

    #[test]
    fn test_container_kinds_never_convert() {
        let err = FieldKind::Sequence.convert("tags", &json!(["a"])).unwrap_err();
        assert!(matches!(
            err,
            RelayError::FieldConversion { ref key, expected: "sequence", .. } if key == "tags"
        ));
        let err = FieldKind::Mapping.convert("opts", &json!({"a": 1})).unwrap_err();
        assert!(matches!(err, RelayError::FieldConversion { expected: "mapping", .. }));
    }
}
