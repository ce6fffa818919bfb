// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use regex::{Captures, Regex};
use serde_json::Value;

use super::Filter;
use crate::core::config::ConfigNode;
use crate::core::link::Link;
use crate::core::registry::{FieldBinding, TypeRecipe};
use crate::core::targeted_message::TargetedMessage;
use crate::core::{RelayError, Result};

/// Rebuilds the text from a template.
///
/// `%KEY%` in the required `format` field is replaced with the message's
/// custom data under `KEY`. Unknown keys are left as written.
#[derive(Default)]
pub struct DataMapperFilter {
    format: String,
    token: Option<Regex>,
}

impl DataMapperFilter {
    pub const TYPE_NAME: &'static str = "data-mapper";

    pub fn recipe() -> TypeRecipe<Self> {
        TypeRecipe::default()
            .field(FieldBinding::text("format", |f: &mut Self, v| f.format = v).required())
    }

    fn render(&self, token: &Regex, message: &TargetedMessage) -> String {
        let data = message.custom_data();
        token
            .replace_all(&self.format, |caps: &Captures<'_>| match data.get(&caps[1]) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => caps[0].to_string(),
                Some(other) => other.to_string(),
            })
            .into_owned()
    }
}

impl Filter for DataMapperFilter {
    fn load(&mut self, _link: &Link, _node: &ConfigNode) -> Result<()> {
        let token = Regex::new(r"%([A-Za-z0-9_\-]+)%")
            .map_err(|e| RelayError::Config(format!("data-mapper token pattern: {}", e)))?;
        self.token = Some(token);
        Ok(())
    }

    fn process_message(&self, message: &mut TargetedMessage) -> Result<()> {
        let token = self
            .token
            .as_ref()
            .ok_or_else(|| RelayError::FilterRuntime("data-mapper used before load".into()))?;
        let text = self.render(token, message);
        message.set_custom_text(text);
        Ok(())
    }
}
