//! The form snapshot store.
//!
//! [`FormStore`] owns the current [`PatientRecord`] snapshot. Every accepted edit produces a
//! new snapshot through [`crate::patch`] and swaps it in; a rejected edit leaves the previous
//! snapshot in place. Snapshots are published on a `tokio::sync::watch` channel so a rendering
//! layer can observe each one.
//!
//! Attachment encodes run asynchronously and may resolve out of order. Under
//! [`AttachmentPolicy::LastResolvedWins`] each encode is applied as it resolves. Under
//! [`AttachmentPolicy::LastSelectionWins`] each slot keeps a generation counter that is bumped
//! when a selection starts; an encode whose generation is no longer current when it resolves
//! is discarded.

use crate::config::{AttachmentPolicy, FormConfig};
use crate::fields::{AttachmentSlot, FieldPath};
use crate::patch::{self, PatchValue};
use crate::record::PatientRecord;
use crate::submission::{SessionCredential, Submission};
use crate::{FormError, FormResult, PathKey};
use pform_files::AttachmentSource;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// What happened to a resolved attachment encode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentOutcome {
    /// The encoded file was written to the record.
    Applied,
    /// A newer selection for the same slot started first; the result was dropped.
    Superseded,
}

#[derive(Debug, Default)]
struct SlotTracker {
    generation: AtomicU64,
    in_flight: AtomicUsize,
}

/// Decrements the in-flight count when an encode finishes, fails or is dropped.
struct PendingGuard<'a>(&'a AtomicUsize);

impl<'a> PendingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Holds the current snapshot of a patient form.
#[derive(Debug)]
pub struct FormStore {
    config: Arc<FormConfig>,
    snapshot: watch::Sender<Arc<PatientRecord>>,
    slots: [SlotTracker; AttachmentSlot::COUNT],
}

impl FormStore {
    /// Creates a store whose first snapshot is `defaults`.
    pub fn initialize(defaults: PatientRecord, config: Arc<FormConfig>) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(defaults));
        Self {
            config,
            snapshot,
            slots: Default::default(),
        }
    }

    /// Creates a store holding an empty record.
    pub fn new(config: Arc<FormConfig>) -> Self {
        Self::initialize(PatientRecord::empty(), config)
    }

    pub fn config(&self) -> &FormConfig {
        &self.config
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<PatientRecord> {
        Arc::clone(&self.snapshot.borrow())
    }

    /// Receiver that is notified of every new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<PatientRecord>> {
        self.snapshot.subscribe()
    }

    /// Replaces the snapshot with a record fetched from the record store.
    ///
    /// Encodes still in flight belong to the previous record. Under
    /// [`AttachmentPolicy::LastSelectionWins`] they are discarded when they resolve.
    pub fn hydrate(&self, existing: PatientRecord) {
        for tracker in &self.slots {
            tracker.generation.fetch_add(1, Ordering::SeqCst);
        }
        tracing::debug!(id = existing.id().unwrap_or("<new>"), "hydrated form");
        self.snapshot.send_replace(Arc::new(existing));
    }

    /// Parses a wire record and hydrates the store with it.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::Translation`] if `json` does not have the record's shape. The
    /// snapshot is unchanged in that case.
    pub fn hydrate_json(&self, json: &str) -> FormResult<()> {
        let record = PatientRecord::from_json(json)?;
        self.hydrate(record);
        Ok(())
    }

    /// Applies one input change.
    ///
    /// # Errors
    ///
    /// Returns `FormError` if:
    /// - `raw_path` is not a well-formed identifier ([`FormError::InvalidPath`])
    /// - it does not name a record leaf ([`FormError::UnknownField`])
    /// - `value` cannot be stored in that leaf ([`FormError::ValueMismatch`])
    ///
    /// The snapshot is unchanged when an error is returned.
    pub fn apply_edit(
        &self,
        raw_path: &str,
        value: impl Into<PatchValue>,
    ) -> FormResult<Arc<PatientRecord>> {
        let field = PathKey::parse(raw_path)
            .and_then(|key| FieldPath::resolve(&key))
            .inspect_err(|err| tracing::warn!(path = raw_path, error = %err, "rejected edit"))?;

        let next = self.commit(field, value.into(), || true)?;
        tracing::debug!(path = raw_path, "applied edit");
        Ok(next.unwrap_or_else(|| self.snapshot()))
    }

    /// Encodes `source` and stores it in `slot`.
    ///
    /// The selection is recorded when this is called, before the returned future is first
    /// polled, so [`AttachmentPolicy::LastSelectionWins`] follows call order. Synchronous edits
    /// made while the encode is pending are kept; only the attachment leaf is replaced when it
    /// resolves.
    ///
    /// # Errors
    ///
    /// The future resolves to [`FormError::UnreadableFile`] if the source cannot be read to
    /// completion or exceeds the configured size limit. The attachment leaf is unchanged in
    /// that case.
    pub fn apply_attachment(
        &self,
        slot: AttachmentSlot,
        source: AttachmentSource,
    ) -> impl Future<Output = FormResult<AttachmentOutcome>> + Send + '_ {
        let tracker = &self.slots[slot.index()];
        let generation = tracker.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let pending = PendingGuard::enter(&tracker.in_flight);

        async move {
            let _pending = pending;
            let name = source.name().to_owned();

            let encoded = pform_files::encode(source, self.config.encode_options())
                .await
                .map_err(|source| {
                    tracing::warn!(%slot, file = %name, error = %source, "attachment encode failed");
                    FormError::UnreadableFile { slot, source }
                })?;
            let media_type = encoded.media_type().to_owned();

            let is_current = || match self.config.attachment_policy() {
                AttachmentPolicy::LastResolvedWins => true,
                AttachmentPolicy::LastSelectionWins => {
                    tracker.generation.load(Ordering::SeqCst) == generation
                }
            };

            match self.commit(FieldPath::Attachment(slot), encoded.into(), is_current)? {
                Some(_) => {
                    tracing::info!(%slot, file = %name, media_type = %media_type, "attachment applied");
                    Ok(AttachmentOutcome::Applied)
                }
                None => {
                    tracing::warn!(%slot, file = %name, "superseded attachment discarded");
                    Ok(AttachmentOutcome::Superseded)
                }
            }
        }
    }

    /// Number of encodes currently in flight for `slot`.
    pub fn pending_attachments(&self, slot: AttachmentSlot) -> usize {
        self.slots[slot.index()].in_flight.load(Ordering::SeqCst)
    }

    /// Reads one leaf as the input would display it.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::InvalidPath`] or [`FormError::UnknownField`] as [`Self::apply_edit`].
    pub fn value(&self, raw_path: &str) -> FormResult<String> {
        let key = PathKey::parse(raw_path)?;
        let snapshot = self.snapshot();
        let leaf = patch::read(&snapshot, &key)?;
        Ok(leaf.to_text())
    }

    /// Required paths that do not hold a non-empty value, in the order given.
    ///
    /// A path that names no leaf of the record is always reported as missing.
    pub fn missing<'a>(&self, required: impl IntoIterator<Item = &'a PathKey>) -> Vec<PathKey> {
        let snapshot = self.snapshot();
        required
            .into_iter()
            .filter(|key| match FieldPath::resolve(key) {
                Ok(field) => snapshot.leaf(field).is_empty(),
                Err(_) => true,
            })
            .cloned()
            .collect()
    }

    /// Whether every path in `required` holds a non-empty value.
    pub fn is_complete<'a>(&self, required: impl IntoIterator<Item = &'a PathKey>) -> bool {
        self.missing(required).is_empty()
    }

    /// [`Self::missing`] for the configured required set.
    pub fn missing_configured(&self) -> Vec<PathKey> {
        self.missing(self.config.required())
    }

    pub fn is_complete_configured(&self) -> bool {
        self.is_complete(self.config.required())
    }

    /// Packages the current snapshot for the transport collaborator.
    pub fn submission(&self, credential: SessionCredential) -> Submission {
        Submission::new(self.snapshot(), credential)
    }

    /// Patches the current snapshot and publishes the result.
    ///
    /// Returns `Ok(None)` without touching the snapshot when `is_current` says the change is
    /// stale. `is_current` runs while the channel is locked.
    fn commit(
        &self,
        field: FieldPath,
        value: PatchValue,
        is_current: impl FnOnce() -> bool,
    ) -> FormResult<Option<Arc<PatientRecord>>> {
        let mut outcome = Ok(None);

        self.snapshot.send_if_modified(|current| {
            if !is_current() {
                return false;
            }
            match patch::apply_field(current, field, value) {
                Ok(next) => {
                    let next = Arc::new(next);
                    *current = Arc::clone(&next);
                    outcome = Ok(Some(next));
                    true
                }
                Err(err) => {
                    outcome = Err(err);
                    false
                }
            }
        });

        outcome
    }
}
