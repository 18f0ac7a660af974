//! Object store
//!
//! Batches reads and writes per transaction and executes each batch against
//! a [`Backend`]. Outside an explicit scope every call is its own implicit
//! transaction and executes immediately; inside a [`TransactionScope`] calls
//! only enqueue, and the batch runs when the scope commits or is dropped.
//!
//! A transaction holds either reads or writes, never both.

use crate::audit::AuditIdentity;
use crate::backend::{select_latest, Backend};
use crate::config::StoreConfig;
use crate::pending::Pending;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};
use vellum_core::{
    AsOf, Envelope, IdentityValue, ObjectKey, ReadRequest, Result, Timestamp, VellumError,
    WriteBatch, WriteRequest,
};
use vellum_model::{codec, make_key, make_key_named, Bookkeeping, Codec, Expected, Record, TypeRegistry, Value};

struct QueuedRead {
    requested_type: String,
    key: ObjectKey,
    as_of: AsOf,
    result: Pending<Record>,
}

struct QueuedWrite {
    request: WriteRequest,
    bookkeeping: Bookkeeping,
    result: Pending<()>,
}

/// Operations of one transaction, not yet executed
#[derive(Default)]
struct Batch {
    /// Comment of the open explicit scope, if any
    scope: Option<String>,
    reads: Vec<QueuedRead>,
    read_index: HashMap<(String, ObjectKey, AsOf), usize>,
    writes: Vec<QueuedWrite>,
    written: HashSet<ObjectKey>,
}

impl Batch {
    fn push_read(&mut self, requested_type: &str, key: ObjectKey, as_of: AsOf) -> Result<Pending<Record>> {
        if !self.writes.is_empty() {
            return Err(VellumError::MixedTransaction {
                pending: "writes".into(),
            });
        }
        let index_key = (requested_type.to_string(), key, as_of);
        if let Some(&i) = self.read_index.get(&index_key) {
            return Ok(self.reads[i].result.clone());
        }
        let result = Pending::new();
        let (requested_type, key, as_of) = index_key.clone();
        self.read_index.insert(index_key, self.reads.len());
        self.reads.push(QueuedRead {
            requested_type,
            key,
            as_of,
            result: result.clone(),
        });
        Ok(result)
    }

    fn push_write(&mut self, write: QueuedWrite) -> Result<Pending<()>> {
        if !self.reads.is_empty() {
            return Err(VellumError::MixedTransaction {
                pending: "reads".into(),
            });
        }
        let key = write.request.key();
        if !self.written.insert(key.clone()) {
            return Err(VellumError::DuplicateWrite {
                entity: key.to_string(),
            });
        }
        let result = write.result.clone();
        self.writes.push(write);
        Ok(result)
    }

    fn is_empty(&self) -> bool {
        self.reads.is_empty() && self.writes.is_empty()
    }
}

/// Bitemporal object store over a backend
pub struct ObjectStore<B: Backend> {
    backend: B,
    registry: Arc<TypeRegistry>,
    config: StoreConfig,
    audit: AuditIdentity,
    state: Mutex<Batch>,
}

impl<B: Backend> ObjectStore<B> {
    /// Store over `backend` using the process-wide registry and default config
    pub fn new(backend: B) -> Self {
        let config = StoreConfig::default();
        ObjectStore {
            backend,
            registry: TypeRegistry::shared(),
            audit: AuditIdentity::resolve(&config),
            config,
            state: Mutex::new(Batch::default()),
        }
    }

    /// Store with an explicit configuration
    pub fn with_config(backend: B, config: StoreConfig) -> Result<Self> {
        Self::with_registry(backend, TypeRegistry::shared(), config)
    }

    /// Store with its own registry and configuration
    pub fn with_registry(backend: B, registry: Arc<TypeRegistry>, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(ObjectStore {
            backend,
            registry,
            audit: AuditIdentity::resolve(&config),
            config,
            state: Mutex::new(Batch::default()),
        })
    }

    /// Registry used to resolve types on read
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// The backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Active configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Identity recorded on every batch
    pub fn audit(&self) -> &AuditIdentity {
        &self.audit
    }

    /// Whether an explicit scope is open
    pub fn in_transaction(&self) -> bool {
        self.state.lock().scope.is_some()
    }

    /// Open an explicit transaction
    ///
    /// Fails with `TransactionAlreadyActive` if one is open; the open scope is
    /// left untouched. An empty comment falls back to the configured default.
    pub fn transaction(&self, comment: impl Into<String>) -> Result<TransactionScope<'_, B>> {
        let mut state = self.state.lock();
        if state.scope.is_some() {
            return Err(VellumError::TransactionAlreadyActive);
        }
        let comment = comment.into();
        state.scope = Some(if comment.is_empty() {
            self.config.default_comment.clone()
        } else {
            comment
        });
        debug!(target: "vellum::store", backend = self.backend.name(), "Transaction opened");
        Ok(TransactionScope {
            store: self,
            finished: false,
        })
    }

    /// Read the latest version of an object
    pub fn read(&self, type_tag: &str, identity_args: &[Value]) -> Result<Pending<Record>> {
        self.read_as_of(type_tag, identity_args, AsOf::LATEST)
    }

    /// Read an object as of the given bounds
    ///
    /// `identity_args` are the identity field values in declaration order.
    pub fn read_as_of(&self, type_tag: &str, identity_args: &[Value], as_of: AsOf) -> Result<Pending<Record>> {
        let descriptor = self.registry.resolve(type_tag)?;
        descriptor.require_persistable()?;
        let key = make_key(&descriptor, identity_args)?;
        self.submit(|batch| batch.push_read(type_tag, key, as_of))
    }

    /// Read an object given named identity arguments
    pub fn read_by_fields(
        &self,
        type_tag: &str,
        identity_args: &BTreeMap<String, Value>,
        as_of: AsOf,
    ) -> Result<Pending<Record>> {
        let descriptor = self.registry.resolve(type_tag)?;
        descriptor.require_persistable()?;
        let key = make_key_named(&descriptor, identity_args)?;
        self.submit(|batch| batch.push_read(type_tag, key, as_of))
    }

    /// Write a record
    ///
    /// A head write (`as_of_effective_time = false`) records a new fact that
    /// becomes effective at the transaction's entry time. A correction keeps
    /// the record's effective version and time and bumps the entry version.
    /// The record's bookkeeping is stamped once the batch commits.
    pub fn write(&self, record: &Record, as_of_effective_time: bool) -> Result<Pending<()>> {
        let descriptor = record.descriptor();
        descriptor.require_persistable()?;
        let type_tag = record.type_tag();

        if !self.temporary_types_allowed() && self.registry.is_temporary(type_tag).unwrap_or(false) {
            return Err(VellumError::TemporaryType {
                type_tag: type_tag.to_string(),
            });
        }

        let info = record.version();
        if descriptor.is_immutable() && (info.is_written() || as_of_effective_time) {
            return Err(VellumError::FailedUpdate {
                reason: format!("{} is immutable and was already written", type_tag),
            });
        }
        if as_of_effective_time && !info.is_written() {
            return Err(VellumError::FailedUpdate {
                reason: format!("cannot correct a {} that was never written", type_tag),
            });
        }

        let key = record.key()?;
        let (effective_version, entry_version, effective_time) = info.next_write(as_of_effective_time);
        let write = QueuedWrite {
            request: WriteRequest {
                identity_type: key.identity_type,
                concrete_type: type_tag.to_string(),
                identity_value: key.identity_value,
                contents: codec::dumps(record),
                effective_version,
                entry_version,
                effective_time,
                entry_time: Timestamp::MAX,
            },
            bookkeeping: record.bookkeeping().clone(),
            result: Pending::new(),
        };
        self.submit(|batch| batch.push_write(write))
    }

    fn temporary_types_allowed(&self) -> bool {
        self.config.allow_temporary_types && self.backend.allows_temporary_types()
    }

    /// Enqueue into the open scope, or run as an implicit transaction
    fn submit<T>(&self, enqueue: impl FnOnce(&mut Batch) -> Result<T>) -> Result<T> {
        {
            let mut state = self.state.lock();
            if state.scope.is_some() {
                return enqueue(&mut state);
            }
        }
        let mut batch = Batch::default();
        let out = enqueue(&mut batch)?;
        self.execute(batch, self.config.default_comment.clone());
        Ok(out)
    }

    fn finish_scope(&self) {
        let (batch, comment) = {
            let mut state = self.state.lock();
            let comment = state.scope.take().unwrap_or_default();
            (std::mem::take(&mut *state), comment)
        };
        self.execute(batch, comment);
    }

    fn execute(&self, batch: Batch, comment: String) {
        if batch.is_empty() {
            return;
        }
        if !batch.reads.is_empty() {
            self.execute_reads(batch.reads);
        } else {
            self.execute_writes(batch.writes, comment);
        }
    }

    fn execute_reads(&self, reads: Vec<QueuedRead>) {
        let mut groups: BTreeMap<(String, AsOf), BTreeSet<IdentityValue>> = BTreeMap::new();
        for read in &reads {
            groups
                .entry((read.key.identity_type.clone(), read.as_of))
                .or_default()
                .insert(read.key.identity_value.clone());
        }
        let requests: Vec<ReadRequest> = groups
            .into_iter()
            .map(|((identity_type, as_of), values)| {
                let mut request = ReadRequest::new(identity_type, as_of);
                request.identity_values = values.into_iter().collect();
                request
            })
            .collect();

        debug!(
            target: "vellum::store",
            backend = self.backend.name(),
            reads = reads.len(),
            groups = requests.len(),
            "Executing read batch"
        );

        let envelopes = match self.backend.execute_reads(&requests) {
            Ok(envelopes) => envelopes,
            Err(e) => {
                warn!(target: "vellum::store", error = %e, "Read batch failed");
                for read in reads {
                    read.result.resolve(Err(e.clone()));
                }
                return;
            }
        };

        let mut by_key: HashMap<ObjectKey, Vec<Envelope>> = HashMap::new();
        for envelope in envelopes {
            by_key.entry(envelope.key()).or_default().push(envelope);
        }

        for read in reads {
            let result = select_latest(by_key.get(&read.key).into_iter().flatten(), read.as_of)
                .ok_or_else(|| not_found(&read.key))
                .and_then(|envelope| self.load(envelope, &read.requested_type, &read.key));
            read.result.resolve(result);
        }
    }

    fn load(&self, envelope: &Envelope, requested_type: &str, key: &ObjectKey) -> Result<Record> {
        let record = Codec::new(&self.registry).loads(&envelope.contents, Expected::Any)?;
        if !record.descriptor().is_a(requested_type) {
            debug!(
                target: "vellum::store",
                requested = requested_type,
                stored = record.type_tag(),
                "Stored record is not of the requested type"
            );
            return Err(not_found(key));
        }
        record.bookkeeping().set(envelope.version_info());
        Ok(record)
    }

    fn execute_writes(&self, writes: Vec<QueuedWrite>, comment: String) {
        let batch = WriteBatch {
            writes: writes.iter().map(|w| w.request.clone()).collect(),
            username: self.audit.username.clone(),
            hostname: self.audit.hostname.clone(),
            comment,
        };

        debug!(
            target: "vellum::store",
            backend = self.backend.name(),
            writes = batch.writes.len(),
            "Executing write batch"
        );

        let stored = match self.backend.execute_writes(&batch) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(target: "vellum::store", error = %e, "Write batch failed");
                fail_writes(writes, e);
                return;
            }
        };

        let by_key: HashMap<ObjectKey, Envelope> = stored.into_iter().map(|e| (e.key(), e)).collect();
        if let Some(missing) = writes.iter().map(|w| w.request.key()).find(|k| !by_key.contains_key(k)) {
            let e = VellumError::FailedUpdate {
                reason: format!("backend did not acknowledge the write of {}", missing),
            };
            warn!(target: "vellum::store", error = %e, "Write batch incomplete");
            fail_writes(writes, e);
            return;
        }

        for write in writes {
            if let Some(envelope) = by_key.get(&write.request.key()) {
                write.bookkeeping.set(envelope.version_info());
                write.result.resolve(Ok(()));
            }
        }
    }
}

fn not_found(key: &ObjectKey) -> VellumError {
    VellumError::object_not_found(&key.identity_type, key.identity_value.as_str())
}

fn fail_writes(writes: Vec<QueuedWrite>, error: VellumError) {
    for write in writes {
        write.result.resolve(Err(error.clone()));
    }
}

impl<B: Backend> std::fmt::Debug for ObjectStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .field("audit", &self.audit)
            .finish()
    }
}

/// An open explicit transaction
///
/// Commits on [`commit`](Self::commit) or when dropped. Either way every
/// pending result issued inside the scope is resolved.
pub struct TransactionScope<'s, B: Backend> {
    store: &'s ObjectStore<B>,
    finished: bool,
}

impl<B: Backend> TransactionScope<'_, B> {
    /// Execute the batch now
    pub fn commit(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.store.finish_scope();
        }
    }
}

impl<B: Backend> std::fmt::Debug for TransactionScope<'_, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionScope")
            .field("backend", &self.store.backend.name())
            .field("finished", &self.finished)
            .finish()
    }
}

impl<B: Backend> Drop for TransactionScope<'_, B> {
    fn drop(&mut self) {
        self.finish();
    }
}
