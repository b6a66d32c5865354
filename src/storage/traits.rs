//! Abstract storage trait for contact records.
//!
//! The trait defines the contract that storage backends must implement.
//! By using a trait, we enable:
//! - In-memory backends for testing and embedded use
//! - Database-backed backends for production
//!
//! No record is ever mutated outside the reconciliation engine's control
//! flow; the store holds no independent write path for this subsystem.

use thiserror::Error;

use crate::contact::{Contact, ContactId, ContactUpdate, NewContact};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No non-deleted record exists for the given id.
    #[error("contact not found: {0}")]
    ContactNotFound(ContactId),

    /// A record with the same exact (email, phone) pair already exists.
    ///
    /// This is the uniqueness constraint that turns the read-then-write race
    /// into a detectable conflict; the engine retries the match step once
    /// when it sees this.
    #[error("duplicate identifier pair: {0}")]
    DuplicateKey(String),

    /// The payload violates a record invariant (no identifier, bad link).
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// A batch update could not be applied as a whole. No row was written.
    #[error("batch update conflict: {0}")]
    BatchConflict(String),

    /// Backend failure (connection loss, poisoned lock, corruption).
    #[error("storage backend error: {0}")]
    BackendError(String),

    /// The operation did not complete within its bounded timeout.
    #[error("storage operation timed out after {duration_ms}ms")]
    Timeout {
        /// How long the operation ran before being abandoned.
        duration_ms: u64,
    },
}

/// Storage contract for contact records.
///
/// # Contract
/// - Soft-deleted records are invisible to every read.
/// - All mutations are atomic; `batch_update` is all-or-nothing.
/// - Ids are assigned monotonically at creation and never reused.
pub trait ContactStore: Send + Sync {
    /// Fetch every non-deleted record whose email equals `email` OR whose
    /// phone equals `phone`, ordered by ascending `created_at` (ties by id).
    ///
    /// Absent criteria contribute no clause; with both absent the result is
    /// empty.
    fn find_by_identifiers(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<Contact>, StorageError>;

    /// Fetch a full chain: the record with id `primary_id` plus every record
    /// whose `linked_id` equals `primary_id`, primary first, then ascending
    /// `created_at` (ties by id).
    ///
    /// A dangling `primary_id` yields only the linked members; an unknown
    /// one yields an empty list.
    fn find_chain(&self, primary_id: ContactId) -> Result<Vec<Contact>, StorageError>;

    /// Fetch a single non-deleted record by id.
    fn find_by_id(&self, id: ContactId) -> Result<Option<Contact>, StorageError>;

    /// Insert a new record, assigning `id`, `created_at`, and `updated_at`.
    ///
    /// # Errors
    /// - [`StorageError::InvalidRecord`] if the payload carries no
    ///   identifier, or its role/link fields are inconsistent.
    /// - [`StorageError::DuplicateKey`] if a non-deleted record already
    ///   carries the exact same (email, phone) pair.
    fn create(&self, data: NewContact) -> Result<Contact, StorageError>;

    /// Apply a single link mutation, bumping `updated_at`.
    fn update(&self, update: ContactUpdate) -> Result<Contact, StorageError>;

    /// Apply several link mutations atomically, bumping each `updated_at`.
    ///
    /// Either every update applies or none does; a failed batch returns
    /// [`StorageError::BatchConflict`] and leaves no mixed state behind.
    fn batch_update(&self, updates: &[ContactUpdate]) -> Result<Vec<Contact>, StorageError>;
}
