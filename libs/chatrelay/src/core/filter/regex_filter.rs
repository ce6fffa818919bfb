// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use regex::{Regex, RegexBuilder};

use super::Filter;
use crate::core::config::ConfigNode;
use crate::core::link::Link;
use crate::core::registry::{FieldBinding, TypeRecipe};
use crate::core::targeted_message::TargetedMessage;
use crate::core::{RelayError, Result};

/// Matches `pattern` against the custom text, or against data key
/// `variable` when set.
///
/// With a `replacement`, every match is rewritten in place. Without one, a
/// match rejects the message for this link.
#[derive(Default)]
pub struct RegexFilter {
    pattern: String,
    variable: Option<String>,
    replacement: Option<String>,
    ignore_case: bool,
    compiled: Option<Regex>,
}

impl RegexFilter {
    pub const TYPE_NAME: &'static str = "regex";

    pub fn recipe() -> TypeRecipe<Self> {
        TypeRecipe::default()
            .field(FieldBinding::text("pattern", |f: &mut Self, v| f.pattern = v).required())
            .field(FieldBinding::text("variable", |f: &mut Self, v| f.variable = Some(v)))
            .field(FieldBinding::text("replacement", |f: &mut Self, v| f.replacement = Some(v)))
            .field(FieldBinding::boolean("ignore-case", |f: &mut Self, v| f.ignore_case = v))
    }
}

impl Filter for RegexFilter {
    fn load(&mut self, _link: &Link, _node: &ConfigNode) -> Result<()> {
        let compiled = RegexBuilder::new(&self.pattern)
            .case_insensitive(self.ignore_case)
            .build()
            .map_err(|e| RelayError::Config(format!("invalid pattern '{}': {}", self.pattern, e)))?;
        self.compiled = Some(compiled);
        Ok(())
    }

    fn process_message(&self, message: &mut TargetedMessage) -> Result<()> {
        let regex = self
            .compiled
            .as_ref()
            .ok_or_else(|| RelayError::FilterRuntime("regex used before load".into()))?;

        let subject = match &self.variable {
            Some(key) => match message.custom_data_str(key) {
                Some(value) => value.to_string(),
                None => return Ok(()),
            },
            None => message.custom_text().to_string(),
        };
        if !regex.is_match(&subject) {
            return Ok(());
        }

        match (&self.replacement, &self.variable) {
            (None, _) => message.reject(),
            (Some(replacement), None) => {
                let text = regex.replace_all(&subject, replacement.as_str()).into_owned();
                message.set_custom_text(text);
            }
            (Some(replacement), Some(key)) => {
                let value = regex.replace_all(&subject, replacement.as_str()).into_owned();
                message.set_data(key.clone(), value);
            }
        }
        Ok(())
    }
}
