// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Timestamped History Ring
//!
//! A bounded deque of `(unix-millis, value)` entries used for state and
//! health audit trails. Capacity defaults to 10; appending to a full ring
//! evicts the oldest entry. Entries are ordered by timestamp ascending, and
//! a merge keeps that order: the merged entries are stably sorted first,
//! then truncated from the front down to capacity.
//!
//! The serialized form is the bare entry list
//! (`[{"timestamp": <ms>, "value": <v>}, …]`), matching the persisted
//! `state.json` layout; capacity is a construction-time policy, not data.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::VecDeque;

use crate::error::HarvestError;

/// Default ring capacity
pub const DEFAULT_CAPACITY: usize = 10;

/// One `(timestamp, value)` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampedEntry<V> {
    /// Unix epoch milliseconds
    pub timestamp: i64,
    pub value: V,
}

impl<V> TimestampedEntry<V> {
    pub fn new(timestamp: i64, value: V) -> Self {
        Self { timestamp, value }
    }
}

/// Bounded ring of timestamped values.
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampedHistory<V> {
    capacity: usize,
    entries: VecDeque<TimestampedEntry<V>>,
}

impl<V> TimestampedHistory<V> {
    /// Creates an empty ring with the default capacity of 10
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an empty ring with the given capacity (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends a value stamped with the current time, evicting the oldest
    /// entry when full.
    pub fn append(&mut self, value: V) {
        self.append_at(Utc::now().timestamp_millis(), value);
    }

    /// Appends a value with an explicit timestamp.
    pub fn append_at(&mut self, timestamp: i64, value: V) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(TimestampedEntry::new(timestamp, value));
    }

    /// Latest value; calling on an empty ring is an error.
    pub fn latest_value(&self) -> Result<&V, HarvestError> {
        self.entries
            .back()
            .map(|e| &e.value)
            .ok_or_else(|| HarvestError::internal("latest_value called on an empty history"))
    }

    /// Latest timestamp; calling on an empty ring is an error.
    pub fn latest_timestamp(&self) -> Result<i64, HarvestError> {
        self.entries
            .back()
            .map(|e| e.timestamp)
            .ok_or_else(|| HarvestError::internal("latest_timestamp called on an empty history"))
    }

    /// Merges another history into this one, preserving timestamp order.
    ///
    /// No eviction happens while merging even if the union overflows; the
    /// combined entries are stably sorted, then truncated from the front to
    /// capacity.
    pub fn merge_sorted(&mut self, other: &TimestampedHistory<V>)
    where
        V: Clone,
    {
        self.entries.extend(other.entries.iter().cloned());
        self.entries
            .make_contiguous()
            .sort_by_key(|entry| entry.timestamp);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimestampedEntry<V>> {
        self.entries.iter()
    }
}

impl<V> Default for TimestampedHistory<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Serialize> Serialize for TimestampedHistory<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.iter())
    }
}

impl<'de, V: DeserializeOwned> Deserialize<'de> for TimestampedHistory<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries: Vec<TimestampedEntry<V>> = Vec::deserialize(deserializer)?;
        let mut history = TimestampedHistory::with_capacity(DEFAULT_CAPACITY.max(entries.len()));
        for entry in entries {
            history.entries.push_back(entry);
        }
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_latest() {
        let mut history = TimestampedHistory::new();
        history.append_at(1, "a");
        history.append_at(2, "b");

        assert_eq!(history.len(), 2);
        assert_eq!(*history.latest_value().unwrap(), "b");
        assert_eq!(history.latest_timestamp().unwrap(), 2);
    }

    #[test]
    fn test_empty_ring_latest_is_error() {
        let history: TimestampedHistory<i32> = TimestampedHistory::new();
        assert!(history.latest_value().is_err());
        assert!(history.latest_timestamp().is_err());
    }

    #[test]
    fn test_eviction_at_capacity() {
        let mut history = TimestampedHistory::with_capacity(3);
        for i in 0..5 {
            history.append_at(i, i);
        }
        assert_eq!(history.len(), 3);
        let timestamps: Vec<i64> = history.iter().map(|e| e.timestamp).collect();
        assert_eq!(timestamps, vec![2, 3, 4]);
    }

    #[test]
    fn test_merge_preserves_order_and_truncates_front() {
        let mut left = TimestampedHistory::with_capacity(4);
        left.append_at(1, "l1");
        left.append_at(5, "l5");
        left.append_at(9, "l9");

        let mut right = TimestampedHistory::with_capacity(4);
        right.append_at(3, "r3");
        right.append_at(7, "r7");

        left.merge_sorted(&right);

        assert_eq!(left.len(), 4);
        let timestamps: Vec<i64> = left.iter().map(|e| e.timestamp).collect();
        assert_eq!(timestamps, vec![3, 5, 7, 9]);
    }

    #[test]
    fn test_merge_is_stable_for_equal_timestamps() {
        let mut left = TimestampedHistory::with_capacity(4);
        left.append_at(1, "first");

        let mut right = TimestampedHistory::with_capacity(4);
        right.append_at(1, "second");

        left.merge_sorted(&right);
        let values: Vec<&str> = left.iter().map(|e| e.value).collect();
        assert_eq!(values, vec!["first", "second"]);
    }

    #[test]
    fn test_serde_round_trip() {
        let mut history = TimestampedHistory::new();
        history.append_at(100, "IDLE".to_string());
        history.append_at(200, "QUEUED".to_string());

        let json = serde_json::to_string(&history).unwrap();
        assert_eq!(
            json,
            r#"[{"timestamp":100,"value":"IDLE"},{"timestamp":200,"value":"QUEUED"}]"#
        );

        let back: TimestampedHistory<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.latest_timestamp().unwrap(), 200);
    }

    #[test]
    fn test_capacity_minimum_is_one() {
        let mut history = TimestampedHistory::with_capacity(0);
        history.append_at(1, 1);
        history.append_at(2, 2);
        assert_eq!(history.len(), 1);
        assert_eq!(*history.latest_value().unwrap(), 2);
    }
}
