//! In-process backend
//!
//! Keeps every envelope in memory with the same semantics as the relational
//! backend: strictly increasing entry times, one transaction id per batch,
//! and uniqueness of `(identity, effective_version, entry_version)`.

use crate::backend::{select_latest, Backend};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;
use vellum_core::{Envelope, ObjectKey, ReadRequest, Result, Timestamp, VellumError, WriteBatch};

/// Audit row of one committed batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    /// Assigned transaction id
    pub transaction_id: u64,
    /// Assigned entry time
    pub entry_time: Timestamp,
    /// Writer's user name
    pub username: String,
    /// Writer's host name
    pub hostname: String,
    /// Batch comment
    pub comment: String,
}

struct MemoryState {
    objects: BTreeMap<ObjectKey, Vec<Envelope>>,
    transactions: Vec<TransactionRecord>,
    last_entry_time: Timestamp,
}

/// Backend holding all envelopes in memory
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        MemoryBackend {
            state: Mutex::new(MemoryState {
                objects: BTreeMap::new(),
                transactions: Vec::new(),
                last_entry_time: Timestamp::EPOCH,
            }),
        }
    }

    /// Committed transactions, oldest first
    pub fn transactions(&self) -> Vec<TransactionRecord> {
        self.state.lock().transactions.clone()
    }

    /// Every stored envelope of one object, in insertion order
    pub fn history(&self, key: &ObjectKey) -> Vec<Envelope> {
        self.state
            .lock()
            .objects
            .get(key)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryBackend {
    fn execute_reads(&self, reads: &[ReadRequest]) -> Result<Vec<Envelope>> {
        let state = self.state.lock();
        let mut out = Vec::new();
        for group in reads {
            let as_of = group.as_of();
            for value in &group.identity_values {
                let key = ObjectKey::new(group.identity_type.clone(), value.clone());
                if let Some(found) = state.objects.get(&key).and_then(|rows| select_latest(rows, as_of)) {
                    out.push(found.clone());
                }
            }
        }
        Ok(out)
    }

    fn execute_writes(&self, batch: &WriteBatch) -> Result<Vec<Envelope>> {
        let mut state = self.state.lock();

        let mut seen = HashSet::new();
        for write in &batch.writes {
            let key = write.key();
            if !seen.insert(key.clone()) {
                return Err(VellumError::DuplicateWrite {
                    entity: key.to_string(),
                });
            }
            let clash = state.objects.get(&key).map_or(false, |rows| {
                rows.iter().any(|r| {
                    r.effective_version == write.effective_version && r.entry_version == write.entry_version
                })
            });
            if clash {
                return Err(VellumError::FailedUpdate {
                    reason: format!(
                        "version ({}, {}) of {} already exists",
                        write.effective_version, write.entry_version, key
                    ),
                });
            }
        }

        let entry_time = Timestamp::now().max(state.last_entry_time.next());
        state.last_entry_time = entry_time;
        let transaction_id = state.transactions.len() as u64 + 1;
        state.transactions.push(TransactionRecord {
            transaction_id,
            entry_time,
            username: batch.username.clone(),
            hostname: batch.hostname.clone(),
            comment: batch.comment.clone(),
        });

        let mut stored = Vec::with_capacity(batch.writes.len());
        for write in &batch.writes {
            let envelope = Envelope {
                identity_type: write.identity_type.clone(),
                identity_value: write.identity_value.clone(),
                concrete_type: write.concrete_type.clone(),
                contents: write.contents.clone(),
                effective_version: write.effective_version,
                entry_version: write.entry_version,
                effective_time: write.effective_time.min(entry_time),
                entry_time,
                transaction_id,
            };
            state
                .objects
                .entry(write.key())
                .or_default()
                .push(envelope.clone());
            stored.push(envelope);
        }
        debug!(target: "vellum::store", transaction_id, writes = stored.len(), "Committed in-memory batch");
        Ok(stored)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
