// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Everything needed to write a custom endpoint or filter type.

pub use crate::core::config::ConfigNode;
pub use crate::core::endpoint::{
    ChatBot, Endpoint, EndpointContext, EndpointIntake, EndpointName,
};
pub use crate::core::error::{RelayError, Result};
pub use crate::core::filter::Filter;
pub use crate::core::link::Link;
pub use crate::core::message::{DataMap, Message, keys};
pub use crate::core::registry::{FieldBinding, TypeRecipe};
pub use crate::core::targeted_message::TargetedMessage;
