//! Optimistic concurrency for request documents.
//!
//! A revision is the millisecond timestamp of the last accepted write. Zero
//! means "never written". A writer remembers the revision it loaded and the
//! store refuses the write if the live document has moved on.
use crate::error::{RequestError, Result};
use crate::utils::now_ms;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision(u64);

impl Revision {
    pub const NONE: Revision = Revision(0);

    pub fn new(ms: u64) -> Self {
        Self(ms)
    }
    pub fn as_u64(&self) -> u64 {
        self.0
    }
    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Revision {
    fn from(value: u64) -> Self {
        Revision(value)
    }
}

impl<C> minicbor::Encode<C> for Revision {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.u64(self.0)?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Revision {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        Ok(Revision(d.u64()?))
    }
}

/// Compares the revision a writer loaded with the live one.
///
/// Rejects when both are set and differ, or when the writer never saw a
/// revision but one now exists.
pub fn ensure_revision_unchanged(expected: Revision, live: Revision) -> Result<()> {
    let conflict = (!expected.is_none() && !live.is_none() && live != expected)
        || (expected.is_none() && !live.is_none());
    if conflict {
        return Err(RequestError::RevisionConflict {
            expected: expected.as_u64(),
            live: live.as_u64(),
        });
    }
    Ok(())
}

/// Issues strictly increasing revisions, tracking wall clock time.
#[derive(Debug, Default)]
pub struct RevisionClock {
    last: AtomicU64,
}

impl RevisionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next revision for a document whose live revision is `live`: the current
    /// time, bumped past both `live` and anything this clock issued before.
    pub fn next_after(&self, live: Revision) -> Revision {
        let now = now_ms();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now
                .max(prev.saturating_add(1))
                .max(live.0.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(prev, candidate, Ordering::SeqCst, Ordering::Relaxed)
            {
                Ok(_) => return Revision(candidate),
                Err(actual) => prev = actual,
            }
        }
    }
}
