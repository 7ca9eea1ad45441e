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

//! Contiguous vector arena indexed by slot.

use crate::error::Result;

#[derive(Debug)]
pub struct VectorStore<T> {
    dimensions: usize,
    data: Vec<T>,
}

impl<T: Copy> VectorStore<T> {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            data: Vec::new(),
        }
    }

    /// Slots with storage behind them, live or not. Zero for a zero-width store.
    #[inline]
    pub fn slots(&self) -> usize {
        self.data.len().checked_div(self.dimensions).unwrap_or(0)
    }

    /// Slots that fit without reallocating.
    pub fn capacity(&self) -> usize {
        self.data.capacity().checked_div(self.dimensions).unwrap_or(0)
    }

    #[inline]
    pub fn get(&self, slot: u32) -> &[T] {
        let start = slot as usize * self.dimensions;
        &self.data[start..start + self.dimensions]
    }

    /// Make room for writing `slot`. After this succeeds, `put` cannot fail.
    pub fn prepare(&mut self, slot: u32) -> Result<()> {
        if (slot as usize) >= self.slots() {
            self.data.try_reserve(self.dimensions)?;
        }
        Ok(())
    }

    /// Store `vector` at `slot`. `slot` is either an existing slot or the next one.
    pub fn put(&mut self, slot: u32, vector: &[T]) {
        debug_assert_eq!(vector.len(), self.dimensions);
        let slot = slot as usize;
        if slot < self.slots() {
            let start = slot * self.dimensions;
            self.data[start..start + self.dimensions].copy_from_slice(vector);
        } else {
            debug_assert_eq!(slot, self.slots());
            self.data.extend_from_slice(vector);
        }
    }

    pub fn reserve(&mut self, slots: usize) -> Result<()> {
        let wanted = slots.saturating_mul(self.dimensions);
        self.data.try_reserve(wanted.saturating_sub(self.data.len()))?;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}
