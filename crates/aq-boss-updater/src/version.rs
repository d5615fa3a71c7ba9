// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Version comparison module
//!
//! Versions are opaque strings ordered by the non-negative integers embedded in
//! them, read left to right: `"2.5.0"`, `"v2.5"` and `"2.5.0-1ubuntu"` all work.

use std::cmp::Ordering;
use std::fmt;

/// One run of digits, compared by numeric value at any length
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DigitGroup(String);

impl DigitGroup {
    fn new(digits: &str) -> Self {
        let trimmed = digits.trim_start_matches('0');
        Self(if trimmed.is_empty() { "0" } else { trimmed }.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for DigitGroup {
    // No leading zeros, so the longer run is the larger number
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for DigitGroup {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DigitGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered integer groups embedded in `version`; `[0]` when it has none.
pub fn version_key(version: &str) -> Vec<DigitGroup> {
    let key: Vec<DigitGroup> = version
        .split(|c: char| !c.is_ascii_digit())
        .filter(|group| !group.is_empty())
        .map(DigitGroup::new)
        .collect();

    if key.is_empty() {
        vec![DigitGroup::new("0")]
    } else {
        key
    }
}

/// Returns true if `candidate` is strictly newer than `current`.
///
/// An empty `current` means nothing is installed, so any non-empty candidate
/// is newer. An empty candidate is never newer. Otherwise the integer keys are
/// compared element-wise, and a strict prefix is the older of the two.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    let candidate = candidate.trim();
    let current = current.trim();

    if candidate.is_empty() {
        return false;
    }
    if current.is_empty() {
        return true;
    }

    version_key(candidate) > version_key(current)
}
