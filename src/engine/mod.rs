//! Reconciliation engine.
//!
//! The engine is the decision core of the crate: given the records matching a
//! request's identifiers, it decides whether new information spawns a
//! subordinate record, how to collapse previously unrelated chains when a
//! request bridges them, and which primary survives a merge. Everything it
//! writes goes through the injected [`ContactStore`]; it keeps no state of
//! its own.
//!
//! # Concurrency
//!
//! `resolve` performs a read-then-write sequence, so two concurrent calls
//! with the same unseen identifiers could both observe "no match" and create
//! competing records. The store's exact-pair uniqueness constraint turns the
//! losing write into [`StorageError::DuplicateKey`], and the engine re-runs
//! the match step once (configurable) before surfacing the failure as
//! retryable. Backends offering serializable transactions may instead wrap
//! the whole sequence; the retry path is the contract this crate ships.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::contact::{Contact, ContactId, ContactUpdate, NewContact};
use crate::error::{ChainResult, ExecutionError, IdentityError, ValidationError};
use crate::request::IdentifyRequest;
use crate::storage::{ContactStore, StorageError};
use crate::view::ConsolidatedView;

/// Engine tuning knobs.
///
/// Constructed once and passed at engine creation; there is no ambient
/// configuration lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How many times a lost uniqueness race re-runs the match step before
    /// the failure surfaces to the caller.
    pub conflict_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { conflict_retries: 1 }
    }
}

/// Outcome routing for a single resolve attempt.
///
/// A lost uniqueness race is the only failure the engine retries on its own;
/// everything else propagates unchanged.
enum ResolveFailure {
    LostRace(StorageError),
    Fatal(IdentityError),
}

fn storage_failure(err: StorageError) -> ResolveFailure {
    match err {
        StorageError::DuplicateKey(_) => ResolveFailure::LostRace(err),
        other => ResolveFailure::Fatal(other.into()),
    }
}

/// The surviving primary of a bridge merge: earliest `created_at` across all
/// touched chains' primaries, ties broken by smallest id.
fn select_master(chains: &[Vec<Contact>]) -> Option<&Contact> {
    chains
        .iter()
        .flatten()
        .filter(|c| c.is_primary())
        .min_by_key(|c| (c.created_at, c.id))
}

/// The identity reconciliation engine.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use idchain::{IdentifyBuilder, IdentityEngine, InMemoryContactStore};
///
/// let engine = IdentityEngine::new(Arc::new(InMemoryContactStore::new()));
/// let request = IdentifyBuilder::new().phone("123456").build().unwrap();
/// let view = engine.resolve(&request).unwrap();
/// assert_eq!(view.phone_numbers, vec!["123456"]);
/// ```
#[derive(Clone)]
pub struct IdentityEngine {
    store: Arc<dyn ContactStore>,
    config: EngineConfig,
}

impl IdentityEngine {
    /// Create a new engine over the given store with default configuration.
    #[must_use]
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    /// Create a new engine with explicit configuration.
    #[must_use]
    pub fn with_config(store: Arc<dyn ContactStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Get a reference to the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ContactStore> {
        &self.store
    }

    /// Resolve an identity from the supplied identifiers.
    ///
    /// Matches every record carrying the request's email or phone, collapses
    /// all touched chains into one, records novel identifiers as a new
    /// secondary, and returns the consolidated view of the final chain.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::MissingIdentifiers`] if the request carries none
    ///   (requests built via [`crate::IdentifyBuilder`] cannot).
    /// - [`ExecutionError::StoreUnavailable`] on transient store failure,
    ///   including a uniqueness race lost more often than the configured
    ///   retry budget.
    /// - [`ExecutionError::Conflict`] if the merge's batch relink could not
    ///   be applied as a whole.
    pub fn resolve(&self, request: &IdentifyRequest) -> ChainResult<ConsolidatedView> {
        if !request.has_identifier() {
            return Err(ValidationError::MissingIdentifiers.into());
        }

        let mut retries_left = self.config.conflict_retries;
        loop {
            match self.try_resolve(request) {
                Ok(view) => return Ok(view),
                Err(ResolveFailure::LostRace(err)) if retries_left > 0 => {
                    retries_left -= 1;
                    debug!(error = %err, "lost identifier race, re-running match step");
                }
                Err(ResolveFailure::LostRace(err)) => return Err(err.into()),
                Err(ResolveFailure::Fatal(err)) => return Err(err),
            }
        }
    }

    /// Look up the consolidated view of the chain containing `id`.
    ///
    /// # Errors
    ///
    /// - [`ExecutionError::ContactNotFound`] if `id` does not reference a
    ///   non-deleted record.
    /// - [`ExecutionError::EmptyChain`] if the chain's membership vanished
    ///   between the id lookup and the chain fetch.
    pub fn get_chain(&self, id: ContactId) -> ChainResult<ConsolidatedView> {
        let record = self
            .store
            .find_by_id(id)?
            .ok_or(ExecutionError::ContactNotFound { id })?;

        // A malformed secondary without a link is treated as its own chain
        // head rather than failing the lookup.
        let primary_id = record.chain_primary_id().unwrap_or(record.id);
        let members = self.store.find_chain(primary_id)?;
        Ok(ConsolidatedView::from_members(&members)?)
    }

    /// One pass of the match → merge → record → consolidate sequence.
    fn try_resolve(&self, request: &IdentifyRequest) -> Result<ConsolidatedView, ResolveFailure> {
        let matches = self
            .store
            .find_by_identifiers(request.email(), request.phone())
            .map_err(storage_failure)?;
        debug!(matches = matches.len(), "matched records for identify request");

        if matches.is_empty() {
            let created = self
                .store
                .create(NewContact::primary(
                    request.email().map(str::to_string),
                    request.phone().map(str::to_string),
                ))
                .map_err(storage_failure)?;
            info!(id = %created.id, "created new primary contact");
            return ConsolidatedView::from_members(&[created])
                .map_err(|e| ResolveFailure::Fatal(e.into()));
        }

        let chains = self.chains_for(&matches)?;
        let mut members = if chains.len() == 1 {
            chains.into_iter().next().unwrap_or_default()
        } else {
            self.merge_chains(chains)?
        };

        if let Some(created) = self.record_novel_identifiers(&members, request)? {
            members.push(created);
        }

        ConsolidatedView::from_members(&members).map_err(|e| ResolveFailure::Fatal(e.into()))
    }

    /// Group matched records into full chains, deduplicated by primary id.
    fn chains_for(&self, matches: &[Contact]) -> Result<Vec<Vec<Contact>>, ResolveFailure> {
        let mut primary_ids: Vec<ContactId> = Vec::new();
        for record in matches {
            match record.chain_primary_id() {
                Some(primary_id) => {
                    if !primary_ids.contains(&primary_id) {
                        primary_ids.push(primary_id);
                    }
                }
                None => warn!(id = %record.id, "skipping secondary without a link"),
            }
        }

        let mut chains = Vec::with_capacity(primary_ids.len());
        for primary_id in primary_ids {
            let chain = self.store.find_chain(primary_id).map_err(storage_failure)?;
            if chain.is_empty() {
                warn!(primary = %primary_id, "chain fetch returned no members");
                continue;
            }
            chains.push(chain);
        }

        if chains.is_empty() {
            return Err(ResolveFailure::Fatal(IdentityError::internal(
                "matched records resolved to no chains",
            )));
        }
        Ok(chains)
    }

    /// Collapse several touched chains into one under the master primary.
    ///
    /// The master is the earliest-created primary across all touched chains
    /// (ties broken by smallest id). Every member of every other chain - the
    /// demoted primary and its former secondaries alike - is relinked
    /// straight at the master in one atomic batch, keeping chains flat.
    fn merge_chains(&self, chains: Vec<Vec<Contact>>) -> Result<Vec<Contact>, ResolveFailure> {
        let master = select_master(&chains).cloned().ok_or_else(|| {
            ResolveFailure::Fatal(IdentityError::internal(
                "bridge merge found no primary record",
            ))
        })?;

        let mut members: Vec<Contact> = Vec::new();
        let mut relinks: Vec<ContactUpdate> = Vec::new();
        for chain in chains {
            if chain.iter().any(|c| c.id == master.id) {
                members.extend(chain);
            } else {
                relinks.extend(
                    chain
                        .iter()
                        .map(|c| ContactUpdate::demote_to(c.id, master.id)),
                );
            }
        }

        if !relinks.is_empty() {
            let relinked = self.store.batch_update(&relinks).map_err(storage_failure)?;
            info!(
                master = %master.id,
                relinked = relinked.len(),
                "bridge merge collapsed chains under earliest primary"
            );
            members.extend(relinked);
        }
        Ok(members)
    }

    /// Record the request's identifiers as a new secondary when they carry
    /// information the chain does not already hold.
    ///
    /// No write happens when the exact (email, phone) pair - including
    /// absent slots - already exists verbatim on a member. Otherwise a
    /// single unknown identifier is enough to count as novel.
    fn record_novel_identifiers(
        &self,
        members: &[Contact],
        request: &IdentifyRequest,
    ) -> Result<Option<Contact>, ResolveFailure> {
        let email = request.email();
        let phone = request.phone();

        let exact_exists = members
            .iter()
            .any(|c| c.email.as_deref() == email && c.phone.as_deref() == phone);
        if exact_exists {
            debug!("exact identifier pair already recorded, nothing to write");
            return Ok(None);
        }

        let email_known = email.map_or(true, |e| members.iter().any(|c| c.matches_email(e)));
        let phone_known = phone.map_or(true, |p| members.iter().any(|c| c.matches_phone(p)));
        if email_known && phone_known {
            return Ok(None);
        }

        let primary_id = members
            .iter()
            .find(|c| c.is_primary())
            .map(|c| c.id)
            .ok_or_else(|| {
                ResolveFailure::Fatal(IdentityError::internal("chain has no primary record"))
            })?;

        let created = self
            .store
            .create(NewContact::secondary(
                email.map(str::to_string),
                phone.map(str::to_string),
                primary_id,
            ))
            .map_err(storage_failure)?;
        info!(
            id = %created.id,
            primary = %primary_id,
            "recorded novel identifiers as new secondary"
        );
        Ok(Some(created))
    }
}
