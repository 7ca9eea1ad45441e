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

//! Runtime CPU Capability Detection
//!
//! Probes the host once and publishes the result through a `OnceLock`, so
//! concurrent first callers converge on the same set and every later call is a
//! plain load.
//!
//! ## Levels
//!
//! | Level     | Arch    | Required features | f32 lanes |
//! |-----------|---------|-------------------|-----------|
//! | `Serial`  | any     | none              | 1         |
//! | `Neon`    | aarch64 | neon              | 4         |
//! | `Haswell` | x86_64  | avx2 + fma        | 8         |
//! | `Skylake` | x86_64  | avx512f           | 16        |
//!
//! Levels are ordered weakest to strongest; the resolver prefers the
//! strongest level a kernel is registered for.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// A single SIMD feature level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CapabilityLevel {
    /// Portable code, always available
    Serial = 0,
    /// ARM Advanced SIMD (aarch64)
    Neon = 1,
    /// AVX2 + FMA (x86_64)
    Haswell = 2,
    /// AVX-512F (x86_64)
    Skylake = 3,
}

impl CapabilityLevel {
    pub const ALL: [CapabilityLevel; 4] = [
        CapabilityLevel::Serial,
        CapabilityLevel::Neon,
        CapabilityLevel::Haswell,
        CapabilityLevel::Skylake,
    ];

    #[inline]
    const fn bit(self) -> u8 {
        1 << (self as u8)
    }

    /// ISA name reported for diagnostics
    pub const fn name(self) -> &'static str {
        match self {
            CapabilityLevel::Serial => "serial",
            CapabilityLevel::Neon => "neon",
            CapabilityLevel::Haswell => "haswell",
            CapabilityLevel::Skylake => "skylake",
        }
    }
}

impl fmt::Display for CapabilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of supported capability levels. `Serial` is always a member.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CapabilitySet {
    bits: u8,
}

static DETECTED: OnceLock<CapabilitySet> = OnceLock::new();

impl CapabilitySet {
    /// The portable baseline only
    pub const fn serial() -> Self {
        Self {
            bits: CapabilityLevel::Serial.bit(),
        }
    }

    /// Every level this crate knows about, regardless of the host
    pub const fn all() -> Self {
        Self { bits: 0b1111 }
    }

    /// Capabilities of the running CPU (cached after the first call)
    pub fn detect() -> Self {
        *DETECTED.get_or_init(probe)
    }

    /// Returns a copy with `level` added
    #[must_use]
    pub const fn with(self, level: CapabilityLevel) -> Self {
        Self {
            bits: self.bits | level.bit(),
        }
    }

    #[inline]
    pub const fn contains(self, level: CapabilityLevel) -> bool {
        self.bits & level.bit() != 0
    }

    /// True when every level in `other` is also in `self`
    pub const fn is_superset_of(self, other: CapabilitySet) -> bool {
        self.bits & other.bits == other.bits
    }

    /// Levels present in both sets. `Serial` survives any intersection.
    #[must_use]
    pub const fn intersect(self, other: CapabilitySet) -> Self {
        Self {
            bits: (self.bits & other.bits) | CapabilityLevel::Serial.bit(),
        }
    }

    pub fn is_serial_only(self) -> bool {
        self == Self::serial()
    }

    /// Widest level in the set
    pub fn strongest(self) -> CapabilityLevel {
        self.iter().last().unwrap_or(CapabilityLevel::Serial)
    }

    /// Levels in ascending strength
    pub fn iter(self) -> impl Iterator<Item = CapabilityLevel> {
        CapabilityLevel::ALL
            .into_iter()
            .filter(move |level| self.contains(*level))
    }
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self::serial()
    }
}

impl From<CapabilityLevel> for CapabilitySet {
    fn from(level: CapabilityLevel) -> Self {
        Self::serial().with(level)
    }
}

impl FromIterator<CapabilityLevel> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = CapabilityLevel>>(iter: I) -> Self {
        iter.into_iter().fold(Self::serial(), Self::with)
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(CapabilityLevel::name)).finish()
    }
}

/// Capabilities of the running CPU (cached after the first call)
#[inline]
pub fn detect() -> CapabilitySet {
    CapabilitySet::detect()
}

#[allow(unused_mut)]
fn probe() -> CapabilitySet {
    let mut set = CapabilitySet::serial();

    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
            set = set.with(CapabilityLevel::Haswell);
        }
        if is_x86_feature_detected!("avx512f") {
            set = set.with(CapabilityLevel::Skylake);
        }
    }

    #[cfg(target_arch = "aarch64")]
    {
        if std::arch::is_aarch64_feature_detected!("neon") {
            set = set.with(CapabilityLevel::Neon);
        }
    }

    tracing::debug!(capabilities = ?set, strongest = %set.strongest(), "detected SIMD capabilities");
    set
}
