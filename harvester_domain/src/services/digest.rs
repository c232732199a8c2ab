// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Hash Generation
//!
//! Stable SHA-1 hex digests of UTF-8 bytes. Two uses:
//!
//! - document ids: `sha1(sourceId)`
//! - change detection: per-pipeline version hashes, combined across enabled
//!   pipelines in registration order
//!
//! The combined hash is `None` whenever any contributing hash is unknown,
//! which explicitly signals "freshness cannot be proven".

use sha1::{Digest, Sha1};

/// SHA-1 hex digest of a UTF-8 string
pub fn sha1_hex(input: &str) -> String {
    sha1_hex_bytes(input.as_bytes())
}

/// SHA-1 hex digest of raw bytes
pub fn sha1_hex_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Combines per-pipeline hashes deterministically.
///
/// Concatenates the hashes in iteration order and digests the result. Any
/// unknown (`None`) contribution, or an empty contribution set, yields
/// `None`.
pub fn combine_hashes<'a, I>(hashes: I) -> Option<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut concatenated = String::new();
    let mut any = false;

    for hash in hashes {
        concatenated.push_str(hash?);
        any = true;
    }

    if any {
        Some(sha1_hex(&concatenated))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha1_known_vector() {
        // sha1("abc")
        assert_eq!(sha1_hex("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_digest_is_stable() {
        assert_eq!(sha1_hex("record-1"), sha1_hex("record-1"));
        assert_ne!(sha1_hex("record-1"), sha1_hex("record-2"));
    }

    #[test]
    fn test_combine_is_deterministic_and_order_sensitive() {
        let combined = combine_hashes([Some("aaa"), Some("bbb")]).unwrap();
        assert_eq!(combined, combine_hashes([Some("aaa"), Some("bbb")]).unwrap());
        assert_ne!(combined, combine_hashes([Some("bbb"), Some("aaa")]).unwrap());
        assert_eq!(combined, sha1_hex("aaabbb"));
    }

    #[test]
    fn test_combine_unknown_contribution_is_unknown() {
        assert_eq!(combine_hashes([Some("aaa"), None]), None);
        assert_eq!(combine_hashes([None]), None);
    }

    #[test]
    fn test_combine_empty_set_is_unknown() {
        assert_eq!(combine_hashes(std::iter::empty::<Option<&str>>()), None);
    }
}
