//! Authority grant.

use serde::{Deserialize, Serialize};

/// An authority tag with an integer level. Comparisons between grants must use the
/// level, never the tag name (§9 design note: "dynamic grant dispatch").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grant {
    Owner,
    PartialOwner,
    Shared,
    Client,
    App,
}

impl Grant {
    /// Numeric authority level. Higher means more authority.
    pub const fn level(self) -> u32 {
        match self {
            Grant::Owner => 1000,
            Grant::PartialOwner => 200,
            Grant::Shared => 100,
            Grant::Client => 100,
            Grant::App => 50,
        }
    }

    /// The serialization-boundary name, matching the source system's grant strings.
    pub const fn name(self) -> &'static str {
        match self {
            Grant::Owner => "owner",
            Grant::PartialOwner => "partialOwner",
            Grant::Shared => "shared",
            Grant::Client => "client",
            Grant::App => "app",
        }
    }

    /// Resolve a grant from its serialization name. Used by the Auth Engine's
    /// authority-grant resolution (§4.D) and nowhere else — name comparisons must not
    /// leak into authority decisions.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "owner" => Some(Grant::Owner),
            "partialOwner" => Some(Grant::PartialOwner),
            "shared" => Some(Grant::Shared),
            "client" => Some(Grant::Client),
            "app" => Some(Grant::App),
            _ => None,
        }
    }

    /// Whether `self` has sufficient authority to be granted to a principal invited
    /// at `target`, i.e. `self.level() <= target.level()` (§4.C "assemble invite
    /// key-set": keys with higher authority than the target grant are skipped).
    pub fn authorized_for(self, target: Grant) -> bool {
        self.level() <= target.level()
    }
}
