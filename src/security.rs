// ABOUTME: Security helpers shared by the HTTP layer
// ABOUTME: Cookie construction and parsing plus constant-time secret comparison
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 C-Point Community

/// Session and remember-token cookies
pub mod cookies;

use subtle::ConstantTimeEq;

/// Compare two secrets without leaking the position of the first difference
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("cron-key", "cron-key"));
        assert!(!constant_time_eq("cron-key", "cron-kez"));
        assert!(!constant_time_eq("cron-key", "cron"));
    }
}
