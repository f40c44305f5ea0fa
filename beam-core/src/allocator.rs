//! Retrieval code allocation.
//!
//! Codes are drawn at random and claimed by inserting the record. A
//! uniqueness violation from the store means another live record holds
//! the code, so a fresh one is drawn. There is no existence pre-check.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::errors::{BeamError, BeamResult};
use crate::record::{Code, FileRecord};
use crate::store::{RecordStore, StoreError};

pub struct CodeAllocator {
    digits: u32,
    max_attempts: u32,
    rng: Mutex<StdRng>,
}

impl CodeAllocator {
    pub fn new(digits: u32, max_attempts: u32) -> Self {
        Self::from_rng(digits, max_attempts, StdRng::from_entropy())
    }

    /// Deterministic allocator for tests.
    pub fn with_seed(digits: u32, max_attempts: u32, seed: u64) -> Self {
        Self::from_rng(digits, max_attempts, StdRng::seed_from_u64(seed))
    }

    fn from_rng(digits: u32, max_attempts: u32, rng: StdRng) -> Self {
        Self {
            digits: digits.clamp(1, 9),
            max_attempts: max_attempts.max(1),
            rng: Mutex::new(rng),
        }
    }

    pub fn digits(&self) -> u32 {
        self.digits
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Number of distinct codes this allocator can produce.
    pub fn space(&self) -> u32 {
        10u32.pow(self.digits)
    }

    /// Draw a candidate code. Not reserved until inserted.
    pub fn propose(&self) -> Code {
        let n = self.rng.lock().gen_range(0..self.space());
        Code::from_number(n, self.digits)
    }

    /// Insert the record built for `first`, drawing new codes on collision.
    ///
    /// `build` is called once per attempt with the candidate code. Gives up
    /// with [`BeamError::CodeSpaceExhausted`] after `max_attempts` tries.
    pub async fn claim<F>(
        &self,
        store: &dyn RecordStore,
        first: Code,
        build: F,
    ) -> BeamResult<FileRecord>
    where
        F: Fn(Code) -> FileRecord,
    {
        let mut candidate = first;
        for attempt in 1..=self.max_attempts {
            let record = build(candidate);
            match store.insert(&record).await {
                Ok(()) => return Ok(record),
                Err(StoreError::DuplicateCode(code)) => {
                    tracing::debug!(code = %code, attempt, "retrieval code taken, drawing another");
                    candidate = self.propose();
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::error!(
            attempts = self.max_attempts,
            digits = self.digits,
            "retrieval code space exhausted"
        );
        Err(BeamError::CodeSpaceExhausted {
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecordStore;
    use chrono::Utc;

    fn record_for(code: Code) -> FileRecord {
        let now = Utc::now();
        FileRecord {
            storage_path: format!("{}_blob", code),
            code,
            original_name: "a.bin".into(),
            size: 1,
            mime_type: "application/octet-stream".into(),
            burn_after_read: false,
            expires_at: now + chrono::Duration::hours(1),
            created_at: now,
        }
    }

    #[test]
    fn proposals_have_fixed_width() {
        let alloc = CodeAllocator::with_seed(4, 8, 7);
        for _ in 0..100 {
            let code = alloc.propose();
            assert_eq!(code.as_str().len(), 4);
            assert!(code.as_str().chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn collisions_are_retried_with_fresh_codes() {
        let store = MemoryRecordStore::new();
        let alloc = CodeAllocator::with_seed(1, 200, 42);
        for n in 0..9 {
            store
                .insert(&record_for(Code::from_number(n, 1)))
                .await
                .unwrap();
        }

        let claimed = alloc
            .claim(&store, Code::from_number(0, 1), record_for)
            .await
            .unwrap();

        assert_eq!(claimed.code.as_str(), "9");
    }

    #[tokio::test]
    async fn full_code_space_is_a_server_error() {
        let store = MemoryRecordStore::new();
        let alloc = CodeAllocator::with_seed(1, 5, 1);
        for n in 0..10 {
            store
                .insert(&record_for(Code::from_number(n, 1)))
                .await
                .unwrap();
        }

        let err = alloc
            .claim(&store, alloc.propose(), record_for)
            .await
            .unwrap_err();

        assert!(matches!(err, BeamError::CodeSpaceExhausted { attempts: 5 }));
        assert_eq!(err.code(), 500);
    }

    #[tokio::test]
    async fn backend_failures_are_not_retried() {
        let store = MemoryRecordStore::new();
        store.fail_inserts(true);
        let alloc = CodeAllocator::with_seed(4, 10, 3);

        let err = alloc
            .claim(&store, alloc.propose(), record_for)
            .await
            .unwrap_err();

        assert!(matches!(err, BeamError::Persistence(_)));
    }
}
