// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Endpoint name. Compared case-insensitively; displayed as configured.
#[derive(Clone)]
pub struct EndpointName {
    display: Arc<str>,
    key: Arc<str>,
}

impl EndpointName {
    pub fn new(name: &str) -> Self {
        Self {
            display: Arc::from(name),
            key: Arc::from(name.to_lowercase()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// Lowercase form used for equality and hashing.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PartialEq for EndpointName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for EndpointName {}

impl Hash for EndpointName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for EndpointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl fmt::Debug for EndpointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EndpointName({:?})", &*self.display)
    }
}

impl From<&str> for EndpointName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for EndpointName {
    fn from(name: String) -> Self {
        Self::new(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_case_insensitive_identity() {
        let a = EndpointName::new("Lobby");
        let b = EndpointName::from("LOBBY");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "Lobby");
        assert_eq!(b.key(), "lobby");

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_display_keeps_original_case() {
        assert_eq!(EndpointName::new("DevChat").to_string(), "DevChat");
    }
}
