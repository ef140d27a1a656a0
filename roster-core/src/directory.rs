//! Member directory — the identity lookup table.
//!
//! The directory is maintained outside this system and read from YAML:
//!
//! ```yaml
//! members:
//!   - member_id: 600037
//!     display_name: みか
//!     home_shop: "006"
//! ```
//!
//! Resolution is scoped to one shop: [`MemberDirectory::for_shop`] builds a
//! [`ShopDirectory`] keyed by [`names::lookup_key`].

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};
use crate::names;
use crate::types::{MemberId, ShopId};

/// Maps a published display name to a member id.
pub trait IdentityResolver {
    fn resolve(&self, display_name: &str) -> Option<MemberId>;
}

/// One directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub member_id: MemberId,
    /// Name as published on the shop's roster page.
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_shop: Option<ShopId>,
}

/// The full member directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDirectory {
    #[serde(default)]
    pub members: Vec<Member>,
}

impl MemberDirectory {
    /// Load the directory from `path`.
    ///
    /// Returns `CoreError::DirectoryNotFound` if absent,
    /// `CoreError::Parse` (with path + line context) if malformed YAML.
    pub fn load_at(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            return Err(CoreError::DirectoryNotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        serde_yaml::from_str(&contents).map_err(|e| CoreError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Build the resolver for one shop.
    ///
    /// Members without a home shop resolve nowhere. When two members of the
    /// same shop normalise to the same key, the first entry wins.
    pub fn for_shop(&self, shop: &ShopId) -> ShopDirectory {
        let mut by_key = HashMap::new();
        for member in &self.members {
            let Some(home) = &member.home_shop else {
                tracing::debug!(member_id = %member.member_id, "directory entry has no home shop");
                continue;
            };
            if !home.matches(shop) {
                continue;
            }
            let key = names::lookup_key(&member.display_name);
            if key.is_empty() {
                tracing::warn!(member_id = %member.member_id, "directory name normalises to nothing");
                continue;
            }
            if let Some(existing) = by_key.get(&key) {
                tracing::warn!(
                    shop = %shop,
                    kept = %existing,
                    ignored = %member.member_id,
                    "duplicate directory name",
                );
                continue;
            }
            by_key.insert(key, member.member_id.clone());
        }
        ShopDirectory { by_key }
    }
}

/// Name → member lookup for one shop.
#[derive(Debug, Clone, Default)]
pub struct ShopDirectory {
    by_key: HashMap<String, MemberId>,
}

impl ShopDirectory {
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

impl IdentityResolver for ShopDirectory {
    fn resolve(&self, display_name: &str) -> Option<MemberId> {
        let key = names::lookup_key(display_name);
        if key.is_empty() {
            return None;
        }
        self.by_key.get(&key).cloned()
    }
}
