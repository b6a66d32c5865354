//! Contact records and identity management.
//!
//! The contact record is the only entity in the system. Every record carries
//! at least one exact-match identifier (email or phone) and belongs to exactly
//! one chain: either it is the chain's primary, or it is a secondary whose
//! `linked_id` points directly at the primary. Chains are flat - a secondary
//! never links to another secondary.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique, monotonically assigned contact identifier.
///
/// Ids are assigned by the store at creation and never change. The primary's
/// id is the stable id callers reference for the whole identity.
///
/// # Examples
///
/// ```
/// use idchain::ContactId;
///
/// let id = ContactId::from_raw(42);
/// assert_eq!(id.as_i64(), 42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(i64);

impl ContactId {
    /// Creates a contact id from a raw integer.
    #[must_use]
    pub const fn from_raw(id: i64) -> Self {
        Self(id)
    }

    /// Returns the underlying integer value.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ContactId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<ContactId> for i64 {
    fn from(id: ContactId) -> Self {
        id.0
    }
}

/// Role of a contact within its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkRole {
    /// The canonical record of a chain.
    Primary,
    /// A subordinate record linked to the chain's primary.
    Secondary,
}

impl fmt::Display for LinkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
        }
    }
}

/// A single contact record.
///
/// Invariants maintained across the crate:
/// - at least one of `email`/`phone` is present,
/// - `linked_id` is present iff `role` is [`LinkRole::Secondary`],
/// - `linked_id` always references the chain's current primary,
/// - `created_at` never changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Unique identifier, assigned at creation.
    pub id: ContactId,

    /// Exact-match email identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Exact-match phone identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// Id of the chain's primary; present iff this record is a secondary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_id: Option<ContactId>,

    /// Role within the chain.
    pub role: LinkRole,

    /// When the record was created. Immutable; the sole tie-break for
    /// chain seniority.
    pub created_at: DateTime<Utc>,

    /// When the record was last mutated (role change, relink).
    pub updated_at: DateTime<Utc>,

    /// Soft-delete marker; soft-deleted records are excluded from matching
    /// and consolidation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Contact {
    /// Returns true if this record is its chain's primary.
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.role == LinkRole::Primary
    }

    /// Returns true if this record is a secondary.
    #[must_use]
    pub fn is_secondary(&self) -> bool {
        self.role == LinkRole::Secondary
    }

    /// Returns true if this record has been soft-deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Returns true if this record carries an email identifier.
    #[must_use]
    pub fn has_email(&self) -> bool {
        self.email.is_some()
    }

    /// Returns true if this record carries a phone identifier.
    #[must_use]
    pub fn has_phone(&self) -> bool {
        self.phone.is_some()
    }

    /// Returns true if this record's email equals `email` exactly.
    #[must_use]
    pub fn matches_email(&self, email: &str) -> bool {
        self.email.as_deref() == Some(email)
    }

    /// Returns true if this record's phone equals `phone` exactly.
    #[must_use]
    pub fn matches_phone(&self, phone: &str) -> bool {
        self.phone.as_deref() == Some(phone)
    }

    /// Resolves the id of this record's chain primary.
    ///
    /// Returns the record's own id for a primary, its `linked_id` for a
    /// secondary, and `None` for a malformed secondary without a link.
    #[must_use]
    pub fn chain_primary_id(&self) -> Option<ContactId> {
        match self.role {
            LinkRole::Primary => Some(self.id),
            LinkRole::Secondary => self.linked_id,
        }
    }

    /// Demotes this record to a secondary of `master`.
    ///
    /// `created_at` is left untouched; only `role`, `linked_id`, and
    /// `updated_at` change.
    pub fn relink_to(&mut self, master: ContactId, now: DateTime<Utc>) {
        self.role = LinkRole::Secondary;
        self.linked_id = Some(master);
        self.updated_at = now;
    }
}

impl PartialEq for Contact {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Contact {}

impl std::hash::Hash for Contact {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Payload for creating a new contact record.
///
/// The store assigns `id`, `created_at`, and `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContact {
    /// Exact-match email identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Exact-match phone identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// Id of the chain's primary; required for secondaries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_id: Option<ContactId>,

    /// Role within the chain.
    pub role: LinkRole,
}

impl NewContact {
    /// Creates a payload for a new primary record.
    #[must_use]
    pub fn primary(email: Option<String>, phone: Option<String>) -> Self {
        Self {
            email,
            phone,
            linked_id: None,
            role: LinkRole::Primary,
        }
    }

    /// Creates a payload for a new secondary record linked to `primary_id`.
    #[must_use]
    pub fn secondary(email: Option<String>, phone: Option<String>, primary_id: ContactId) -> Self {
        Self {
            email,
            phone,
            linked_id: Some(primary_id),
            role: LinkRole::Secondary,
        }
    }

    /// Returns true if the payload carries at least one identifier.
    #[must_use]
    pub fn has_identifier(&self) -> bool {
        self.email.is_some() || self.phone.is_some()
    }
}

/// Payload for mutating a contact's link fields.
///
/// Only `linked_id` and `role` are mutable; the store bumps `updated_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactUpdate {
    /// Id of the record to mutate.
    pub id: ContactId,

    /// New link target, if changing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_id: Option<ContactId>,

    /// New role, if changing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<LinkRole>,
}

impl ContactUpdate {
    /// Creates an update that demotes `id` to a secondary of `master`.
    #[must_use]
    pub fn demote_to(id: ContactId, master: ContactId) -> Self {
        Self {
            id,
            linked_id: Some(master),
            role: Some(LinkRole::Secondary),
        }
    }
}
