//! Bundle addresses and the subject prefixes derived from them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::RouterError;

/// Namespace token every internally originated cross-bundle subject starts with.
pub const ROUTER_NAMESPACE: &str = "ROUTER";

/// Identity of one bundle instance: `<GROUP>-<INDEX>`, e.g. `NESTED-000`.
///
/// Both components are non-empty and upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BundleAddress {
    group: String,
    index: String,
}

/// The three subject prefixes a router instance works with. Each carries
/// its trailing dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Prefixes {
    /// `<GROUP>-<INDEX>.`: this exact instance, on the external bus.
    pub unicast: String,
    /// `<GROUP>.`: any instance of this group, on the external bus.
    pub anycast: String,
    /// `ROUTER.`: cross-bundle traffic on the internal bus.
    pub internal: String,
}

impl BundleAddress {
    /// Parse `GROUP-INDEX`.
    ///
    /// # Errors
    ///
    /// [`RouterError::InvalidBundleId`] unless `raw` splits on `-` into exactly
    /// two non-empty parts.
    pub fn parse(raw: &str) -> Result<Self, RouterError> {
        let invalid = || RouterError::InvalidBundleId {
            raw: raw.to_string(),
        };

        let mut parts = raw.trim().split('-');
        let (Some(group), Some(index), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };
        if group.is_empty() || index.is_empty() {
            return Err(invalid());
        }
        // Subjects are dot-delimited; a dot or space inside an address would
        // split its prefix into extra tokens.
        if raw.trim().contains(|c: char| c == '.' || c.is_whitespace()) {
            return Err(invalid());
        }

        Ok(Self {
            group: group.to_uppercase(),
            index: index.to_uppercase(),
        })
    }

    /// Bundle group, e.g. `NESTED`.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Instance index within the group, e.g. `000`.
    #[must_use]
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Whether `group` names this bundle's group (case-insensitive).
    #[must_use]
    pub fn in_group(&self, group: &str) -> bool {
        self.group.eq_ignore_ascii_case(group.trim())
    }

    /// Subject prefixes for this instance.
    #[must_use]
    pub fn prefixes(&self) -> Prefixes {
        Prefixes {
            unicast: format!("{self}."),
            anycast: format!("{}.", self.group),
            internal: format!("{ROUTER_NAMESPACE}."),
        }
    }
}

impl fmt::Display for BundleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.group, self.index)
    }
}

impl FromStr for BundleAddress {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BundleAddress {
    type Error = RouterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<BundleAddress> for String {
    fn from(address: BundleAddress) -> Self {
        address.to_string()
    }
}
