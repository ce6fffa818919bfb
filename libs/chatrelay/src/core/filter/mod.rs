// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Per-link message filters.

mod anti_highlight;
mod data_mapper;
mod manager;
mod regex_filter;

pub use anti_highlight::AntiHighlightFilter;
pub use data_mapper::DataMapperFilter;
pub use manager::{FilterManager, FilterSlot};
pub use regex_filter::RegexFilter;

use crate::core::Result;
use crate::core::config::ConfigNode;
use crate::core::link::Link;
use crate::core::targeted_message::TargetedMessage;

/// A step in a link's filter chain.
///
/// Filters may rewrite the message's custom text and data, or reject it for
/// this destination. An error is logged and the message passes on
/// unchanged by this filter.
pub trait Filter: Send + Sync + 'static {
    /// Called once after field injection, with the link the filter is being
    /// attached to and its full config item.
    fn load(&mut self, link: &Link, node: &ConfigNode) -> Result<()> {
        let _ = (link, node);
        Ok(())
    }

    fn process_message(&self, message: &mut TargetedMessage) -> Result<()>;
}
