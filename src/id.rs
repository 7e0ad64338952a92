//! Opaque identifiers and the generators that mint them.
//!
//! [`Id`] is compared by string value only. Generation is explicit: builders
//! and the processor receive an [`IdGenerator`], so tests can swap in a
//! [`SequentialIdGenerator`] and get stable ids.

use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::{Builder, Uuid};

/// Opaque, immutable identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when no id was supplied and one should be generated.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&Id> for Id {
    fn from(value: &Id) -> Self {
        value.clone()
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Id {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Id {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Source of fresh identifiers.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Id;
}

const SEQUENCE_MAX: u16 = 0x0FFF;

#[derive(Debug, Default)]
struct ClockState {
    last_ms: u64,
    sequence: u16,
}

/// Version-7 UUIDs with a 12-bit per-millisecond sequence counter.
///
/// The counter starts at a random value in the lower half of its range each
/// new millisecond and increments on collisions; when it overflows the
/// timestamp is pushed one millisecond ahead. Ids from one generator are
/// strictly increasing, both as bytes and as hyphenated strings.
#[derive(Debug, Default)]
pub struct TimeOrderedIdGenerator {
    state: Mutex<ClockState>,
}

impl TimeOrderedIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn advance(&self, now_ms: u64) -> (u64, u16) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if now_ms > state.last_ms {
            state.last_ms = now_ms;
            state.sequence = random_sequence_start();
        } else if state.sequence >= SEQUENCE_MAX {
            // Clock stalled or went backwards and the counter is spent.
            state.last_ms += 1;
            state.sequence = random_sequence_start();
        } else {
            state.sequence += 1;
        }
        (state.last_ms, state.sequence)
    }
}

fn random_sequence_start() -> u16 {
    let bytes = Uuid::new_v4().into_bytes();
    u16::from_be_bytes([bytes[0], bytes[1]]) & (SEQUENCE_MAX >> 1)
}

impl IdGenerator for TimeOrderedIdGenerator {
    fn next_id(&self) -> Id {
        let now_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let (millis, sequence) = self.advance(now_ms);

        let random = Uuid::new_v4().into_bytes();
        let mut tail = [0u8; 10];
        let [high, low] = sequence.to_be_bytes();
        tail[0] = high & 0x0F;
        tail[1] = low;
        tail[2..].copy_from_slice(&random[8..16]);

        let uuid = Builder::from_unix_timestamp_millis(millis, &tail).into_uuid();
        Id(uuid.hyphenated().to_string())
    }
}

/// Deterministic `prefix-1`, `prefix-2`, ... ids for tests and fixtures.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> Id {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        Id(format!("{}-{n}", self.prefix))
    }
}
