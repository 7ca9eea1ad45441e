// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! External key <-> internal slot mapping
//!
//! Slots are dense `u32`s. Freed slots go on a free list and are handed to the
//! next new key; a key is never resurrected onto its old slot implicitly.

use std::collections::HashMap;

use crate::error::{IndexError, Result};

/// Slots `0..MAX_SLOTS` are addressable.
pub const MAX_SLOTS: usize = u32::MAX as usize;

#[derive(Debug)]
pub struct SlotMap {
    key_to_slot: HashMap<u64, u32>,
    slot_to_key: Vec<Option<u64>>,
    free: Vec<u32>,
    limit: usize,
}

impl SlotMap {
    pub fn new() -> Self {
        Self::with_limit(MAX_SLOTS)
    }

    pub(crate) fn with_limit(limit: usize) -> Self {
        Self {
            key_to_slot: HashMap::new(),
            slot_to_key: Vec::new(),
            free: Vec::new(),
            limit: limit.min(MAX_SLOTS),
        }
    }

    /// Live keys.
    pub fn len(&self) -> usize {
        self.key_to_slot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key_to_slot.is_empty()
    }

    /// One past the highest slot ever handed out.
    pub fn slot_count(&self) -> usize {
        self.slot_to_key.len()
    }

    pub fn contains(&self, key: u64) -> bool {
        self.key_to_slot.contains_key(&key)
    }

    pub fn slot_of(&self, key: u64) -> Option<u32> {
        self.key_to_slot.get(&key).copied()
    }

    pub fn key_of(&self, slot: u32) -> Option<u64> {
        self.slot_to_key.get(slot as usize).copied().flatten()
    }

    /// Peek at the slot `allocate` would return, without taking it.
    pub fn next_slot(&self) -> Result<u32> {
        if let Some(&slot) = self.free.last() {
            return Ok(slot);
        }
        if self.slot_to_key.len() >= self.limit {
            return Err(IndexError::CapacityExhausted { limit: self.limit });
        }
        Ok(self.slot_to_key.len() as u32)
    }

    /// Bind `key` to a free slot. The caller has already checked for duplicates.
    pub fn allocate(&mut self, key: u64) -> Result<u32> {
        debug_assert!(!self.contains(key));
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slot_to_key[slot as usize] = Some(key);
                slot
            }
            None => {
                if self.slot_to_key.len() >= self.limit {
                    return Err(IndexError::CapacityExhausted { limit: self.limit });
                }
                self.slot_to_key.try_reserve(1)?;
                let slot = self.slot_to_key.len() as u32;
                self.slot_to_key.push(Some(key));
                slot
            }
        };
        self.key_to_slot.insert(key, slot);
        Ok(slot)
    }

    /// Unbind `key` and return its slot to the free list.
    pub fn release(&mut self, key: u64) -> Result<u32> {
        let slot = self
            .key_to_slot
            .remove(&key)
            .ok_or(IndexError::KeyNotFound(key))?;
        self.slot_to_key[slot as usize] = None;
        self.free.push(slot);
        Ok(slot)
    }

    pub fn reserve(&mut self, capacity: usize) -> Result<()> {
        let additional = capacity.saturating_sub(self.len());
        self.key_to_slot.try_reserve(additional)?;
        let additional = capacity.saturating_sub(self.slot_to_key.len());
        self.slot_to_key.try_reserve(additional)?;
        Ok(())
    }

    /// Live `(slot, key)` pairs in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.slot_to_key
            .iter()
            .enumerate()
            .filter_map(|(slot, key)| key.map(|k| (slot as u32, k)))
    }

    pub fn clear(&mut self) {
        self.key_to_slot.clear();
        self.slot_to_key.clear();
        self.free.clear();
    }
}

impl Default for SlotMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_dense() {
        let mut slots = SlotMap::new();
        assert_eq!(slots.allocate(100).unwrap(), 0);
        assert_eq!(slots.allocate(7).unwrap(), 1);
        assert_eq!(slots.allocate(u64::MAX).unwrap(), 2);
        assert_eq!(slots.slot_of(7), Some(1));
        assert_eq!(slots.key_of(2), Some(u64::MAX));
        assert_eq!(slots.len(), 3);
    }

    #[test]
    fn test_release_and_reuse() {
        let mut slots = SlotMap::new();
        slots.allocate(1).unwrap();
        slots.allocate(2).unwrap();
        assert_eq!(slots.release(1).unwrap(), 0);
        assert!(!slots.contains(1));
        assert_eq!(slots.key_of(0), None);

        assert_eq!(slots.next_slot().unwrap(), 0);
        assert_eq!(slots.allocate(3).unwrap(), 0);
        assert_eq!(slots.key_of(0), Some(3));
        assert_eq!(slots.slot_count(), 2);
    }

    #[test]
    fn test_release_missing() {
        let mut slots = SlotMap::new();
        assert_eq!(slots.release(9), Err(IndexError::KeyNotFound(9)));
    }

    #[test]
    fn test_capacity_exhausted() {
        let mut slots = SlotMap::with_limit(2);
        slots.allocate(1).unwrap();
        slots.allocate(2).unwrap();
        assert_eq!(
            slots.allocate(3),
            Err(IndexError::CapacityExhausted { limit: 2 })
        );
        assert!(!slots.contains(3));

        // a freed slot is still usable at the limit
        slots.release(1).unwrap();
        assert_eq!(slots.allocate(3).unwrap(), 0);
    }

    #[test]
    fn test_iter_in_slot_order() {
        let mut slots = SlotMap::new();
        for key in [30, 10, 20] {
            slots.allocate(key).unwrap();
        }
        slots.release(10).unwrap();
        let pairs: Vec<_> = slots.iter().collect();
        assert_eq!(pairs, vec![(0, 30), (2, 20)]);
    }
}
