// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use super::Filter;
use crate::core::Result;
use crate::core::message::keys;
use crate::core::registry::{FieldBinding, TypeRecipe};
use crate::core::targeted_message::TargetedMessage;

/// Breaks up the sender's name in the relayed text so it does not ping the
/// same user on the other side.
///
/// Fields: `splitter` (default zero-width space) is inserted after the first
/// character of the name found under data key `variable` (default
/// `SENDER_NAME`).
pub struct AntiHighlightFilter {
    splitter: String,
    variable: String,
}

impl Default for AntiHighlightFilter {
    fn default() -> Self {
        Self {
            splitter: "\u{200B}".to_string(),
            variable: keys::SENDER_NAME.to_string(),
        }
    }
}

impl AntiHighlightFilter {
    pub const TYPE_NAME: &'static str = "anti-highlight";

    pub fn recipe() -> TypeRecipe<Self> {
        TypeRecipe::default()
            .field(FieldBinding::text("splitter", |f: &mut Self, v| f.splitter = v))
            .field(FieldBinding::text("variable", |f: &mut Self, v| f.variable = v))
    }
}

impl Filter for AntiHighlightFilter {
    fn process_message(&self, message: &mut TargetedMessage) -> Result<()> {
        let Some(name) = message.custom_data_str(&self.variable).map(str::to_owned) else {
            return Ok(());
        };
        let mut chars = name.chars();
        let Some(first) = chars.next() else {
            return Ok(());
        };
        let rest = chars.as_str();
        if rest.is_empty() {
            return Ok(());
        }

        let broken = format!("{}{}{}", first, self.splitter, rest);
        let text = message.custom_text().replace(&name, &broken);
        message.set_custom_text(text);
        Ok(())
    }
}
