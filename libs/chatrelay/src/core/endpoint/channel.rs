// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Built-in channel endpoint: one chat channel reached through a named bot.

use std::sync::Arc;

use serde_json::json;

use super::{ChatBot, Endpoint, EndpointContext, EndpointIntake};
use crate::core::config::{ConfigNode, node_str};
use crate::core::link::Link;
use crate::core::message::{DataMap, keys};
use crate::core::targeted_message::TargetedMessage;
use crate::core::{RelayError, Result};

/// Type name the channel endpoint registers under.
pub const CHANNEL_ENDPOINT_TYPE: &str = "irc";

/// Data keys set on messages submitted from a channel.
pub mod channel_keys {
    pub const IRC_CHANNEL: &str = "IRC_CHANNEL";
    pub const IRC_MASK: &str = "IRC_MASK";
    pub const IRC_NICK: &str = "IRC_NICK";
    /// Highest-ranked mode prefix of the sender (`@`, `+`, ...), or empty.
    pub const IRC_PREFIX: &str = "IRC_PREFIX";
    /// Every mode prefix of the sender, highest first.
    pub const IRC_PREFIXES: &str = "IRC_PREFIXES";
    pub const IRC_MESSAGE_TYPE: &str = "IRC_MESSAGE_TYPE";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMessageKind {
    /// Plain channel message.
    Message,
    /// `/me` action.
    Action,
}

impl ChannelMessageKind {
    /// printf-style template stored under `MESSAGE_FORMAT`.
    pub fn format_template(self) -> &'static str {
        match self {
            ChannelMessageKind::Message => "<%s> %s",
            ChannelMessageKind::Action => "* %s %s",
        }
    }

    pub fn render(self, nick: &str, text: &str) -> String {
        match self {
            ChannelMessageKind::Message => format!("<{}> {}", nick, text),
            ChannelMessageKind::Action => format!("* {} {}", nick, text),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelMessageKind::Message => "message",
            ChannelMessageKind::Action => "action",
        }
    }
}

/// A line seen in a channel, as reported by a bot.
#[derive(Debug, Clone)]
pub struct ChannelEvent {
    pub channel: String,
    /// Full `nick!user@host` of the sender.
    pub mask: String,
    pub nick: String,
    /// Sender's mode prefixes, highest first.
    pub prefixes: String,
    pub text: String,
    pub kind: ChannelMessageKind,
}

impl ChannelEvent {
    /// Default text and data for this event.
    pub fn to_message_parts(&self) -> (String, DataMap) {
        let prefix: String = self.prefixes.chars().take(1).collect();
        let mut data = DataMap::new();
        data.insert(channel_keys::IRC_CHANNEL.into(), json!(self.channel));
        data.insert(channel_keys::IRC_MASK.into(), json!(self.mask));
        data.insert(channel_keys::IRC_NICK.into(), json!(self.nick));
        data.insert(channel_keys::IRC_PREFIX.into(), json!(prefix));
        data.insert(channel_keys::IRC_PREFIXES.into(), json!(self.prefixes));
        data.insert(channel_keys::IRC_MESSAGE_TYPE.into(), json!(self.kind.as_str()));
        data.insert(keys::MESSAGE_FORMAT.into(), json!(self.kind.format_template()));
        data.insert(keys::MESSAGE_TEXT.into(), json!(self.text));
        data.insert(keys::SENDER_NAME.into(), json!(self.nick));
        (self.kind.render(&self.nick, &self.text), data)
    }

    pub fn submit(&self, intake: &EndpointIntake) {
        let (text, data) = self.to_message_parts();
        intake.submit(text, data);
    }
}

/// Relays to and from one channel of one bot.
///
/// `extra` must name the `bot` and the `channel`.
#[derive(Default)]
pub struct ChannelEndpoint {
    bot: Option<Arc<dyn ChatBot>>,
    channel: String,
}

impl ChannelEndpoint {
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl Endpoint for ChannelEndpoint {
    fn load_extra(&mut self, context: &EndpointContext<'_>, extra: &ConfigNode) -> Result<()> {
        let bot_name =
            node_str(extra, "bot").ok_or_else(|| RelayError::InvalidItem("No bot defined".into()))?;
        let bot = context.bot(bot_name).ok_or_else(|| {
            RelayError::InvalidItem(format!("No bot defined with name '{}'", bot_name))
        })?;
        let channel = node_str(extra, "channel")
            .ok_or_else(|| RelayError::InvalidItem("No channel defined".into()))?;

        bot.add_channel(channel, context.intake());
        self.channel = channel.to_string();
        self.bot = Some(bot);
        Ok(())
    }

    fn receive_message(&mut self, message: &TargetedMessage, _link: &Link) -> Result<()> {
        match &self.bot {
            Some(bot) => bot.send_message(&self.channel, message.custom_text()),
            None => Err(RelayError::Delivery {
                endpoint: message.target().to_string(),
                reason: "channel endpoint has no bot".into(),
            }),
        }
    }
}
