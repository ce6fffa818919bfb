// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod config;
pub mod diagnostics;
pub mod distributor;
pub mod endpoint;
pub mod error;
pub mod filter;
pub mod link;
pub mod message;
pub mod prelude;
pub mod registry;
pub mod relay;
pub mod targeted_message;

pub use config::{ConfigNode, RelayConfig};
pub use diagnostics::Diagnostics;
pub use distributor::{
    DEFAULT_MIN_CYCLE, Destination, DestinationResolver, DistributorConfig, DistributorState,
    MessageDistributor, MessageSender,
};
pub use endpoint::{
    BotRegistry, ChannelEndpoint, ChannelEvent, ChannelMessageKind, ChatBot, Endpoint,
    EndpointContext, EndpointIntake, EndpointManager, EndpointName, LoadedEndpoint,
};
pub use error::*;
pub use filter::{Filter, FilterManager};
pub use link::{Link, LinkId, LinkManager};
pub use message::{DataMap, Message, keys};
pub use registry::{FieldBinding, FieldKind, FieldValue, TypeRecipe, TypeRegistry};
pub use relay::{Relay, Shutdownable};
pub use targeted_message::TargetedMessage;
