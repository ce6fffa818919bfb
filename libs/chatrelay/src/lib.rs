// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Config-driven chat relay.
//!
//! Endpoints are named places messages come from and go to. Links connect
//! them and carry filter chains. A single distributor thread fans every
//! submitted message out over its source's links. Endpoint and filter types
//! are looked up by name from config and may be registered late.

#![allow(clippy::type_complexity)] // Recipe closures are clear in context

pub mod core;

pub use crate::core::{
    BotRegistry, ChannelEndpoint, ChannelEvent, ChannelMessageKind, ChatBot, ConfigNode, DataMap,
    Diagnostics, DistributorConfig, DistributorState, Endpoint, EndpointContext, EndpointIntake,
    EndpointManager, EndpointName, FieldBinding, FieldKind, Filter, FilterManager, Link,
    LinkManager, LoadedEndpoint, Message, MessageSender, Relay, RelayConfig, RelayError, Result,
    Shutdownable, TargetedMessage, TypeRecipe, keys,
};
