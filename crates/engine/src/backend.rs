//! Backend abstraction
//!
//! A backend executes whole batches: every read group of a transaction in
//! one snapshot, every write of a transaction atomically. Backends assign
//! entry times and transaction ids; clients never do.

use std::sync::Arc;
use vellum_core::{AsOf, Envelope, ReadRequest, Result, WriteBatch};

/// Storage behind an [`ObjectStore`](crate::ObjectStore)
pub trait Backend: Send + Sync {
    /// For each group, the latest admitted envelope of every identity value
    ///
    /// Identity values with no admitted envelope are simply absent from the
    /// reply.
    fn execute_reads(&self, reads: &[ReadRequest]) -> Result<Vec<Envelope>>;

    /// Insert every write in one transaction and return the stored envelopes
    fn execute_writes(&self, batch: &WriteBatch) -> Result<Vec<Envelope>>;

    /// Whether types registered as temporary may be written through this backend
    fn allows_temporary_types(&self) -> bool {
        true
    }

    /// Name for logging
    fn name(&self) -> &str;
}

impl<B: Backend + ?Sized> Backend for Arc<B> {
    fn execute_reads(&self, reads: &[ReadRequest]) -> Result<Vec<Envelope>> {
        (**self).execute_reads(reads)
    }

    fn execute_writes(&self, batch: &WriteBatch) -> Result<Vec<Envelope>> {
        (**self).execute_writes(batch)
    }

    fn allows_temporary_types(&self) -> bool {
        (**self).allows_temporary_types()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn execute_reads(&self, reads: &[ReadRequest]) -> Result<Vec<Envelope>> {
        (**self).execute_reads(reads)
    }

    fn execute_writes(&self, batch: &WriteBatch) -> Result<Vec<Envelope>> {
        (**self).execute_writes(batch)
    }

    fn allows_temporary_types(&self) -> bool {
        (**self).allows_temporary_types()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// The envelope a read bounded by `as_of` resolves to
///
/// Among the candidates admitted by the bounds, picks the greatest
/// `(effective_time, entry_time)`, with the transaction id breaking ties.
pub fn select_latest<'a, I>(candidates: I, as_of: AsOf) -> Option<&'a Envelope>
where
    I: IntoIterator<Item = &'a Envelope>,
{
    candidates
        .into_iter()
        .filter(|e| as_of.admits(e.effective_time, e.entry_time))
        .max_by_key(|e| (e.effective_time, e.entry_time, e.transaction_id))
}
