//! ConsolidatedView - the caller-facing summary of a contact chain.
//!
//! Unlike the raw record list, the consolidated view presents a chain as a
//! single identity: the stable primary id, every known email and phone in a
//! defined order, and the ids of all subordinate records.

use serde::{Deserialize, Serialize};

use crate::contact::{Contact, ContactId};
use crate::error::ExecutionError;

/// The consolidated summary of one contact chain.
///
/// Serializes with the wire field names thin request layers expect
/// (`primaryContactId`, `phoneNumbers`, `secondaryContactIds`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedView {
    /// Id of the chain's primary record.
    pub primary_contact_id: ContactId,

    /// All distinct emails across the chain, primary's own email first.
    pub emails: Vec<String>,

    /// All distinct phone numbers across the chain, primary's own first.
    pub phone_numbers: Vec<String>,

    /// Ids of all non-primary members, in canonical chain order.
    pub secondary_contact_ids: Vec<ContactId>,
}

impl ConsolidatedView {
    /// Builds the consolidated view of a chain from its membership list.
    ///
    /// Membership may arrive in any order; members are arranged canonically
    /// first: primary, then the rest by ascending `created_at` (ties broken
    /// by id, so a just-created secondary lands last). Emails and phones are
    /// de-duplicated keeping first occurrence, which places the primary's own
    /// identifiers at the front of their lists.
    ///
    /// When no member is marked primary the earliest-created member stands in
    /// as the chain head rather than failing the whole lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::EmptyChain`] when `members` is empty.
    pub fn from_members(members: &[Contact]) -> Result<Self, ExecutionError> {
        if members.is_empty() {
            return Err(ExecutionError::EmptyChain);
        }

        let primary = members
            .iter()
            .find(|c| c.is_primary())
            .or_else(|| members.iter().min_by_key(|c| (c.created_at, c.id)))
            .ok_or(ExecutionError::EmptyChain)?;

        let mut ordered: Vec<&Contact> = members.iter().filter(|c| c.id != primary.id).collect();
        ordered.sort_by_key(|c| (c.created_at, c.id));
        ordered.insert(0, primary);

        let mut emails = Vec::new();
        let mut phone_numbers = Vec::new();
        let mut secondary_contact_ids = Vec::new();

        for member in &ordered {
            if let Some(email) = member.email.as_deref() {
                if !emails.iter().any(|e| e == email) {
                    emails.push(email.to_string());
                }
            }
            if let Some(phone) = member.phone.as_deref() {
                if !phone_numbers.iter().any(|p| p == phone) {
                    phone_numbers.push(phone.to_string());
                }
            }
            if member.id != primary.id {
                secondary_contact_ids.push(member.id);
            }
        }

        Ok(Self {
            primary_contact_id: primary.id,
            emails,
            phone_numbers,
            secondary_contact_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::LinkRole;
    use chrono::{Duration, TimeZone, Utc};

    fn member(
        id: i64,
        email: Option<&str>,
        phone: Option<&str>,
        role: LinkRole,
        linked: Option<i64>,
        offset_secs: i64,
    ) -> Contact {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let at = base + Duration::seconds(offset_secs);
        Contact {
            id: ContactId::from_raw(id),
            email: email.map(str::to_string),
            phone: phone.map(str::to_string),
            linked_id: linked.map(ContactId::from_raw),
            role,
            created_at: at,
            updated_at: at,
            deleted_at: None,
        }
    }

    #[test]
    fn test_empty_chain_fails() {
        let result = ConsolidatedView::from_members(&[]);
        assert!(matches!(result, Err(ExecutionError::EmptyChain)));
    }

    #[test]
    fn test_single_primary() {
        let members = [member(
            1,
            Some("lorraine@hillvalley.edu"),
            Some("123456"),
            LinkRole::Primary,
            None,
            0,
        )];
        let view = ConsolidatedView::from_members(&members).unwrap();

        assert_eq!(view.primary_contact_id, ContactId::from_raw(1));
        assert_eq!(view.emails, vec!["lorraine@hillvalley.edu"]);
        assert_eq!(view.phone_numbers, vec!["123456"]);
        assert!(view.secondary_contact_ids.is_empty());
    }

    #[test]
    fn test_primary_identifiers_come_first() {
        // Membership deliberately passed secondary-first.
        let members = [
            member(2, Some("b@x.com"), Some("222"), LinkRole::Secondary, Some(1), 10),
            member(1, Some("a@x.com"), Some("111"), LinkRole::Primary, None, 0),
        ];
        let view = ConsolidatedView::from_members(&members).unwrap();

        assert_eq!(view.primary_contact_id, ContactId::from_raw(1));
        assert_eq!(view.emails, vec!["a@x.com", "b@x.com"]);
        assert_eq!(view.phone_numbers, vec!["111", "222"]);
        assert_eq!(view.secondary_contact_ids, vec![ContactId::from_raw(2)]);
    }

    #[test]
    fn test_duplicate_identifiers_deduplicated() {
        let members = [
            member(1, Some("a@x.com"), Some("111"), LinkRole::Primary, None, 0),
            member(2, Some("a@x.com"), Some("222"), LinkRole::Secondary, Some(1), 5),
            member(3, Some("c@x.com"), Some("111"), LinkRole::Secondary, Some(1), 9),
        ];
        let view = ConsolidatedView::from_members(&members).unwrap();

        assert_eq!(view.emails, vec!["a@x.com", "c@x.com"]);
        assert_eq!(view.phone_numbers, vec!["111", "222"]);
        assert_eq!(
            view.secondary_contact_ids,
            vec![ContactId::from_raw(2), ContactId::from_raw(3)]
        );
    }

    #[test]
    fn test_secondaries_ordered_by_creation() {
        let members = [
            member(5, Some("late@x.com"), None, LinkRole::Secondary, Some(1), 30),
            member(1, Some("a@x.com"), None, LinkRole::Primary, None, 0),
            member(3, Some("early@x.com"), None, LinkRole::Secondary, Some(1), 10),
        ];
        let view = ConsolidatedView::from_members(&members).unwrap();

        assert_eq!(
            view.secondary_contact_ids,
            vec![ContactId::from_raw(3), ContactId::from_raw(5)]
        );
        assert_eq!(view.emails, vec!["a@x.com", "early@x.com", "late@x.com"]);
    }

    #[test]
    fn test_created_at_tie_broken_by_id() {
        let members = [
            member(4, Some("d@x.com"), None, LinkRole::Secondary, Some(1), 10),
            member(3, Some("c@x.com"), None, LinkRole::Secondary, Some(1), 10),
            member(1, Some("a@x.com"), None, LinkRole::Primary, None, 0),
        ];
        let view = ConsolidatedView::from_members(&members).unwrap();
        assert_eq!(
            view.secondary_contact_ids,
            vec![ContactId::from_raw(3), ContactId::from_raw(4)]
        );
    }

    #[test]
    fn test_members_without_identifier_slots_skipped() {
        let members = [
            member(1, Some("a@x.com"), None, LinkRole::Primary, None, 0),
            member(2, None, Some("999"), LinkRole::Secondary, Some(1), 4),
        ];
        let view = ConsolidatedView::from_members(&members).unwrap();
        assert_eq!(view.emails, vec!["a@x.com"]);
        assert_eq!(view.phone_numbers, vec!["999"]);
    }

    #[test]
    fn test_no_explicit_primary_falls_back_to_earliest() {
        let members = [
            member(7, Some("b@x.com"), None, LinkRole::Secondary, Some(2), 20),
            member(2, Some("a@x.com"), None, LinkRole::Secondary, Some(2), 3),
        ];
        let view = ConsolidatedView::from_members(&members).unwrap();

        assert_eq!(view.primary_contact_id, ContactId::from_raw(2));
        assert_eq!(view.emails, vec!["a@x.com", "b@x.com"]);
        assert_eq!(view.secondary_contact_ids, vec![ContactId::from_raw(7)]);
    }

    #[test]
    fn test_wire_field_names() {
        let members = [
            member(11, Some("a@x.com"), Some("111"), LinkRole::Primary, None, 0),
            member(27, Some("b@x.com"), Some("222"), LinkRole::Secondary, Some(11), 6),
        ];
        let view = ConsolidatedView::from_members(&members).unwrap();
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["primaryContactId"], 11);
        assert_eq!(json["emails"][0], "a@x.com");
        assert_eq!(json["phoneNumbers"][1], "222");
        assert_eq!(json["secondaryContactIds"][0], 27);
    }

    #[test]
    fn test_view_serde_roundtrip() {
        let members = [
            member(1, Some("a@x.com"), Some("111"), LinkRole::Primary, None, 0),
            member(2, Some("b@x.com"), None, LinkRole::Secondary, Some(1), 2),
        ];
        let view = ConsolidatedView::from_members(&members).unwrap();
        let json = serde_json::to_string(&view).unwrap();
        let decoded: ConsolidatedView = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, view);
    }
}
