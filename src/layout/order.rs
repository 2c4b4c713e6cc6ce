//! Fixed-region parameter ordering
//!
//! Reordering never crosses the fixed region: resource slots and the
//! variable tail keep declaration order. Sorting is stable, so parameters of
//! equal size stay in declaration order under every policy.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::{ParamKind, Parameter};

/// How a backend orders fixed-size parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortPolicy {
    /// Keep declaration order
    #[default]
    Declaration,
    /// Smallest first; packs sub-word values ahead of wide ones
    AscendingSize,
    /// Largest first
    DescendingSize,
}

impl SortPolicy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SortPolicy::Declaration => "declaration",
            SortPolicy::AscendingSize => "ascending-size",
            SortPolicy::DescendingSize => "descending-size",
        }
    }

    /// `Greater` means `successor` is placed before `predecessor`.
    ///
    /// Only ever compares fixed parameters; anything else stays put.
    pub fn compare(&self, predecessor: &Parameter, successor: &Parameter) -> Ordering {
        let (Some(a), Some(b)) = (fixed_bits(predecessor), fixed_bits(successor)) else {
            return Ordering::Equal;
        };
        match self {
            SortPolicy::Declaration => Ordering::Equal,
            SortPolicy::AscendingSize => a.cmp(&b),
            SortPolicy::DescendingSize => b.cmp(&a),
        }
    }

    /// Order fixed parameters for placement
    pub fn sort<'a>(&self, params: &mut [&'a Parameter]) {
        params.sort_by(|a, b| self.compare(a, b));
    }
}

fn fixed_bits(param: &Parameter) -> Option<u32> {
    match param.kind {
        ParamKind::Fixed { size_bits } => Some(size_bits),
        _ => None,
    }
}

impl fmt::Display for SortPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "declaration" | "none" => Ok(SortPolicy::Declaration),
            "ascending-size" | "ascending" => Ok(SortPolicy::AscendingSize),
            "descending-size" | "descending" => Ok(SortPolicy::DescendingSize),
            _ => Err(ConfigError::UnknownSortPolicy(s.to_string())),
        }
    }
}
