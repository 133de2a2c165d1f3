//! squall-router: Radix trie route matching core
//!
//! Single Source of Truth (SSOT) matcher used by squall-core; it knows
//! nothing about handlers, methods or HTTP and simply maps paths to values.
//!
//! ## Features
//! - O(k) path lookup where k = path length
//! - Static paths: `/users`, `/api/v1/health`
//! - Named parameters: `/users/{id}`, typed as `/users/{id:int}`
//! - Inline parameters: `/{name}_world`
//! - Catch-alls: `/static/{filepath:*}`
//! - Trailing-slash detection and case-insensitive path recovery
//!
//! ## Path Syntax
//! - `{name}` - Named parameter (captures one segment)
//! - `{name:type}` - Typed parameter (`int`, `uuid`, `slug`, ...; see `pattern`)
//! - `{name:regex}` - Raw regex constraint
//! - `{name:*}` - Catch-all (captures the remaining path, slashes included)
//!
//! ## Priority
//! 1. Exact static match (highest)
//! 2. Parameter match
//! 3. Catch-all match (lowest)
//!
//! ## Example
//! ```
//! use squall_router::Tree;
//!
//! let mut tree = Tree::new();
//! tree.insert("/users", 0).unwrap();
//! tree.insert("/users/{id}", 1).unwrap();
//! tree.insert("/files/{path:*}", 2).unwrap();
//!
//! let hit = tree.get("/users/42");
//! assert_eq!(hit.value, Some(&1));
//! assert_eq!(hit.params.get("id"), Some("42"));
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod error;
mod node;
pub mod pattern;
mod recovery;
mod tree;

use std::collections::HashMap;

pub use error::{InsertError, PatternError};
pub use tree::{Lookup, Tree};

/// Path parameters captured during a lookup.
///
/// Stored as ordered `(name, value)` pairs; values are owned copies so they
/// never alias the request buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    /// Create an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a parameter value by name
    pub fn get(&self, name: &str) -> Option<&str> {
        // Shallower captures are pushed last and shadow deeper ones
        self.0
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Check whether any parameters were captured
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of captured parameters
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over `(name, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Get params as a HashMap for convenient access
    pub fn to_map(&self) -> HashMap<String, String> {
        self.0.iter().cloned().collect()
    }

    pub(crate) fn push(&mut self, name: String, value: String) {
        self.0.push((name, value));
    }
}
