//! In-memory storage backend.
//!
//! A thread-safe reference implementation of [`ContactStore`], intended for
//! embedded usage and tests. All state lives behind a single `RwLock`, which
//! makes every mutation - including `batch_update` - atomic with respect to
//! concurrent readers and writers.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use chrono::Utc;

use crate::contact::{Contact, ContactId, ContactUpdate, LinkRole, NewContact};
use crate::storage::traits::{ContactStore, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

type IdentifierPair = (Option<String>, Option<String>);

fn pair_label(email: Option<&str>, phone: Option<&str>) -> String {
    format!(
        "({}, {})",
        email.unwrap_or("<none>"),
        phone.unwrap_or("<none>")
    )
}

#[derive(Debug, Default)]
struct StoreState {
    contacts: BTreeMap<ContactId, Contact>,
    by_email: HashMap<String, BTreeSet<ContactId>>,
    by_phone: HashMap<String, BTreeSet<ContactId>>,
    // Live records only; enforces the exact-pair uniqueness constraint.
    by_pair: HashMap<IdentifierPair, ContactId>,
    next_id: i64,
}

impl StoreState {
    fn live(&self, id: ContactId) -> Option<&Contact> {
        self.contacts.get(&id).filter(|c| !c.is_deleted())
    }

    /// Validates the link fields of a staged record against the post-write
    /// state (`staged` rows shadow stored ones).
    fn check_link_consistency(
        &self,
        record: &Contact,
        staged: &BTreeMap<ContactId, Contact>,
    ) -> Result<(), StorageError> {
        match (record.role, record.linked_id) {
            (LinkRole::Primary, None) => Ok(()),
            (LinkRole::Primary, Some(_)) => Err(StorageError::InvalidRecord(format!(
                "primary contact {} must not carry a link",
                record.id
            ))),
            (LinkRole::Secondary, None) => Err(StorageError::InvalidRecord(format!(
                "secondary contact {} must carry a link",
                record.id
            ))),
            (LinkRole::Secondary, Some(target)) => {
                if target == record.id {
                    return Err(StorageError::InvalidRecord(format!(
                        "contact {target} cannot link to itself"
                    )));
                }
                let target_record = staged
                    .get(&target)
                    .or_else(|| self.live(target))
                    .ok_or_else(|| {
                        StorageError::InvalidRecord(format!("link target {target} does not exist"))
                    })?;
                // Chains are flat: a secondary links straight at a primary.
                if !target_record.is_primary() {
                    return Err(StorageError::InvalidRecord(format!(
                        "link target {target} is not a primary record"
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Thread-safe in-memory contact store.
///
/// Assigns monotonically increasing ids starting at 1 and enforces the
/// exact (email, phone) uniqueness constraint across non-deleted records,
/// which is what turns concurrent duplicate creations into a detectable
/// [`StorageError::DuplicateKey`] instead of silent duplication.
#[derive(Debug, Default)]
pub struct InMemoryContactStore {
    state: RwLock<StoreState>,
}

impl InMemoryContactStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Soft-delete a record, removing it from all matching and lookups.
    ///
    /// Not part of the [`ContactStore`] contract; the reconciliation core
    /// never deletes. Exposed for embedding hosts and tests.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ContactNotFound`] if `id` does not reference
    /// a live record.
    pub fn soft_delete(&self, id: ContactId) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("soft_delete"))?;
        let record = state
            .contacts
            .get(&id)
            .filter(|c| !c.is_deleted())
            .cloned()
            .ok_or(StorageError::ContactNotFound(id))?;

        if let Some(email) = record.email.as_deref() {
            if let Some(set) = state.by_email.get_mut(email) {
                set.remove(&id);
                if set.is_empty() {
                    state.by_email.remove(email);
                }
            }
        }
        if let Some(phone) = record.phone.as_deref() {
            if let Some(set) = state.by_phone.get_mut(phone) {
                set.remove(&id);
                if set.is_empty() {
                    state.by_phone.remove(phone);
                }
            }
        }
        state
            .by_pair
            .remove(&(record.email.clone(), record.phone.clone()));

        let now = Utc::now();
        if let Some(stored) = state.contacts.get_mut(&id) {
            stored.deleted_at = Some(now);
            stored.updated_at = now;
        }
        Ok(())
    }

    /// Snapshot of every live record, ordered by id. Diagnostic helper.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BackendError`] if the state lock is poisoned.
    pub fn snapshot(&self) -> Result<Vec<Contact>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("snapshot"))?;
        Ok(state
            .contacts
            .values()
            .filter(|c| !c.is_deleted())
            .cloned()
            .collect())
    }

    /// Number of live records.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BackendError`] if the state lock is poisoned.
    pub fn count(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("count"))?;
        Ok(state.contacts.values().filter(|c| !c.is_deleted()).count())
    }
}

impl ContactStore for InMemoryContactStore {
    fn find_by_identifiers(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<Contact>, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("find_by_identifiers"))?;

        let mut ids: BTreeSet<ContactId> = BTreeSet::new();
        if let Some(email) = email {
            if let Some(set) = state.by_email.get(email) {
                ids.extend(set.iter().copied());
            }
        }
        if let Some(phone) = phone {
            if let Some(set) = state.by_phone.get(phone) {
                ids.extend(set.iter().copied());
            }
        }

        let mut results: Vec<Contact> = ids
            .iter()
            .filter_map(|id| state.live(*id).cloned())
            .collect();
        results.sort_by_key(|c| (c.created_at, c.id));
        Ok(results)
    }

    fn find_chain(&self, primary_id: ContactId) -> Result<Vec<Contact>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("find_chain"))?;

        let mut members: Vec<Contact> = state
            .contacts
            .values()
            .filter(|c| !c.is_deleted())
            .filter(|c| c.id == primary_id || c.linked_id == Some(primary_id))
            .cloned()
            .collect();

        members.sort_by_key(|c| (c.id != primary_id, c.created_at, c.id));
        Ok(members)
    }

    fn find_by_id(&self, id: ContactId) -> Result<Option<Contact>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("find_by_id"))?;
        Ok(state.live(id).cloned())
    }

    fn create(&self, data: NewContact) -> Result<Contact, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("create"))?;

        if !data.has_identifier() {
            return Err(StorageError::InvalidRecord(
                "contact must carry at least one identifier".to_string(),
            ));
        }

        let pair = (data.email.clone(), data.phone.clone());
        if state.by_pair.contains_key(&pair) {
            return Err(StorageError::DuplicateKey(pair_label(
                data.email.as_deref(),
                data.phone.as_deref(),
            )));
        }

        state.next_id += 1;
        let now = Utc::now();
        let record = Contact {
            id: ContactId::from_raw(state.next_id),
            email: data.email,
            phone: data.phone,
            linked_id: data.linked_id,
            role: data.role,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        state.check_link_consistency(&record, &BTreeMap::new())?;

        if let Some(email) = record.email.as_deref() {
            state
                .by_email
                .entry(email.to_string())
                .or_default()
                .insert(record.id);
        }
        if let Some(phone) = record.phone.as_deref() {
            state
                .by_phone
                .entry(phone.to_string())
                .or_default()
                .insert(record.id);
        }
        state.by_pair.insert(pair, record.id);
        state.contacts.insert(record.id, record.clone());
        Ok(record)
    }

    fn update(&self, update: ContactUpdate) -> Result<Contact, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("update"))?;

        let mut record = state
            .live(update.id)
            .cloned()
            .ok_or(StorageError::ContactNotFound(update.id))?;

        if let Some(role) = update.role {
            record.role = role;
        }
        if let Some(linked_id) = update.linked_id {
            record.linked_id = Some(linked_id);
        }
        record.updated_at = Utc::now();

        state.check_link_consistency(&record, &BTreeMap::new())?;
        state.contacts.insert(record.id, record.clone());
        Ok(record)
    }

    fn batch_update(&self, updates: &[ContactUpdate]) -> Result<Vec<Contact>, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("batch_update"))?;
        let now = Utc::now();

        // Stage every row first; nothing is written until all rows pass.
        let mut staged: BTreeMap<ContactId, Contact> = BTreeMap::new();
        let mut order: Vec<ContactId> = Vec::with_capacity(updates.len());
        for update in updates {
            if staged.contains_key(&update.id) {
                return Err(StorageError::BatchConflict(format!(
                    "contact {} appears twice in the batch",
                    update.id
                )));
            }
            let mut record = state.live(update.id).cloned().ok_or_else(|| {
                StorageError::BatchConflict(format!("contact {} not found", update.id))
            })?;

            if let Some(role) = update.role {
                record.role = role;
            }
            if let Some(linked_id) = update.linked_id {
                record.linked_id = Some(linked_id);
            }
            record.updated_at = now;
            order.push(record.id);
            staged.insert(record.id, record);
        }

        for record in staged.values() {
            state
                .check_link_consistency(record, &staged)
                .map_err(|e| StorageError::BatchConflict(e.to_string()))?;
        }

        for record in staged.values() {
            state.contacts.insert(record.id, record.clone());
        }
        Ok(order
            .iter()
            .map(|id| staged[id].clone())
            .collect())
    }
}
