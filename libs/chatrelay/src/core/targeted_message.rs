// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Per-destination view of a [`Message`].

use std::sync::Arc;

use serde_json::Value;

use crate::core::endpoint::EndpointName;
use crate::core::message::{DataMap, Message};

/// One message on its way to one destination.
///
/// Starts as a copy of the original text and data. Filters rewrite the
/// custom text and data freely; the originating message is never touched,
/// so sibling destinations always start from the same content. The data map
/// is only cloned on first write.
#[derive(Debug, Clone)]
pub struct TargetedMessage {
    origin: Arc<Message>,
    target: EndpointName,
    custom_text: String,
    custom_data: Arc<DataMap>,
    rejected: bool,
}

impl TargetedMessage {
    pub fn new(target: EndpointName, origin: Arc<Message>) -> Self {
        let custom_text = origin.default_text().to_string();
        let custom_data = origin.shared_data();
        Self {
            origin,
            target,
            custom_text,
            custom_data,
            rejected: false,
        }
    }

    pub fn originating_message(&self) -> &Message {
        &self.origin
    }

    /// Name of the endpoint this copy is addressed to.
    pub fn target(&self) -> &EndpointName {
        &self.target
    }

    pub fn custom_text(&self) -> &str {
        &self.custom_text
    }

    /// Replace the text, returning the previous value.
    pub fn set_custom_text(&mut self, text: impl Into<String>) -> String {
        std::mem::replace(&mut self.custom_text, text.into())
    }

    pub fn custom_data(&self) -> &DataMap {
        &self.custom_data
    }

    pub fn custom_data_str(&self, key: &str) -> Option<&str> {
        self.custom_data.get(key).and_then(Value::as_str)
    }

    pub fn custom_data_mut(&mut self) -> &mut DataMap {
        Arc::make_mut(&mut self.custom_data)
    }

    pub fn set_data(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.custom_data_mut().insert(key.into(), value.into())
    }

    /// True once any filter has written to the data map.
    pub fn is_data_modified(&self) -> bool {
        !Arc::ptr_eq(&self.custom_data, &self.origin.shared_data())
    }

    /// Stop delivery to this destination. Cannot be undone.
    pub fn reject(&mut self) {
        self.rejected = true;
    }

    pub fn is_rejected(&self) -> bool {
        self.rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::keys;
    use serde_json::json;

    fn origin() -> Arc<Message> {
        let mut data = DataMap::new();
        data.insert(keys::SENDER_NAME.into(), json!("alice"));
        data.insert(keys::MESSAGE_TEXT.into(), json!("hi all"));
        Arc::new(Message::new("lobby".into(), "<alice> hi all", data))
    }

    #[test]
    fn test_starts_as_copy_of_origin() {
        let targeted = TargetedMessage::new("mirror".into(), origin());
        assert_eq!(targeted.custom_text(), "<alice> hi all");
        assert_eq!(targeted.custom_data_str(keys::SENDER_NAME), Some("alice"));
        assert_eq!(targeted.target().as_str(), "mirror");
        assert!(!targeted.is_data_modified());
        assert!(!targeted.is_rejected());
    }

    #[test]
    fn test_mutation_leaves_origin_and_siblings_alone() {
        let origin = origin();
        let mut first = TargetedMessage::new("a".into(), Arc::clone(&origin));
        let second = TargetedMessage::new("b".into(), Arc::clone(&origin));

        let previous = first.set_custom_text("rewritten");
        assert_eq!(previous, "<alice> hi all");
        first.set_data(keys::SENDER_NAME, "bob");
        first.custom_data_mut().remove(keys::MESSAGE_TEXT);

        assert!(first.is_data_modified());
        assert_eq!(first.custom_data_str(keys::SENDER_NAME), Some("bob"));
        assert!(first.custom_data().get(keys::MESSAGE_TEXT).is_none());

        assert_eq!(origin.default_text(), "<alice> hi all");
        assert_eq!(origin.data_str(keys::SENDER_NAME), Some("alice"));
        assert_eq!(second.custom_text(), "<alice> hi all");
        assert_eq!(second.custom_data_str(keys::MESSAGE_TEXT), Some("hi all"));
        assert!(!second.is_data_modified());
    }

    #[test]
    fn test_reject_is_monotonic() {
        let mut targeted = TargetedMessage::new("a".into(), origin());
        targeted.reject();
        targeted.set_custom_text("still editable");
        targeted.reject();
        assert!(targeted.is_rejected());
    }
}
