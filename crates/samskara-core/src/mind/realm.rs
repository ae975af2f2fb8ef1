//! Realms
//!
//! Hierarchical recall scopes. Realms form a DAG rooted at `brahman`; a
//! node tagged `realm:X` is visible only when X is an ancestor of (or
//! equal to) the current realm. Untagged nodes are universally visible.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MindError, Result};

/// The root every realm chain ends at
pub const ROOT_REALM: &str = "brahman";

/// Persisted current realm plus the realm -> parent map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealmManager {
    current: String,
    parents: HashMap<String, String>,
}

impl Default for RealmManager {
    fn default() -> Self {
        Self {
            current: ROOT_REALM.to_string(),
            parents: HashMap::new(),
        }
    }
}

impl RealmManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn exists(&self, name: &str) -> bool {
        name == ROOT_REALM || self.parents.contains_key(name)
    }

    /// Switch the current realm; the target must have been created
    pub fn set_current(&mut self, name: &str) -> Result<()> {
        if !self.exists(name) {
            return Err(MindError::NotFound(format!("realm {}", name)));
        }
        self.current = name.to_string();
        Ok(())
    }

    /// Register a realm under an existing parent. Cycles cannot form
    /// because the child must be new and the parent must already exist.
    pub fn create(&mut self, name: &str, parent: &str) -> Result<()> {
        if name.is_empty() || name == ROOT_REALM {
            return Err(MindError::InvalidParams(format!(
                "cannot create realm {:?}",
                name
            )));
        }
        if self.exists(name) {
            return Err(MindError::InvalidRequest(format!(
                "realm {} already exists",
                name
            )));
        }
        if !self.exists(parent) {
            return Err(MindError::NotFound(format!("realm {}", parent)));
        }
        self.parents.insert(name.to_string(), parent.to_string());
        Ok(())
    }

    /// Walk upward from `descendant` toward the root looking for
    /// `ancestor`
    pub fn is_ancestor_or_equal(&self, ancestor: &str, descendant: &str) -> bool {
        let mut cursor = descendant;
        loop {
            if cursor == ancestor {
                return true;
            }
            match self.parents.get(cursor) {
                Some(parent) => cursor = parent,
                None => return ancestor == ROOT_REALM && cursor == ROOT_REALM,
            }
        }
    }

    /// A node scoped to `realm` is visible iff its realm is
    /// an ancestor of (or equal to) the current realm; unscoped nodes
    /// always pass
    pub fn visible(&self, node_realm: Option<&str>) -> bool {
        match node_realm {
            None => true,
            Some(realm) => self.is_ancestor_or_equal(realm, &self.current),
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let body = serde_json::to_vec_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, body)
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let body = std::fs::read(path)?;
        serde_json::from_slice(&body)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

// ============================================================================
// TESTS
// ============================================================================
