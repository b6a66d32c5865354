//! # IdChain - exact-match contact identity reconciliation
//!
//! IdChain resolves customer identity across contact records that share an
//! email address or a phone number, merging them into a single logical
//! "contact chain": one canonical primary record plus zero or more secondary
//! records linked directly to it.
//!
//! ## Core Concepts
//!
//! - **Contact**: A single record carrying at least one exact-match identifier
//! - **Chain**: One primary contact and all secondaries linked to it (flat, depth 1)
//! - **Merge**: Collapsing previously unrelated chains when a request bridges them
//! - **ConsolidatedView**: The caller-facing summary of a chain
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use idchain::{IdentifyBuilder, IdentityEngine, InMemoryContactStore};
//!
//! let store = Arc::new(InMemoryContactStore::new());
//! let engine = IdentityEngine::new(store);
//!
//! let request = IdentifyBuilder::new()
//!     .email("lorraine@hillvalley.edu")
//!     .phone("123456")
//!     .build()
//!     .unwrap();
//!
//! let view = engine.resolve(&request).unwrap();
//! assert!(view.secondary_contact_ids.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod contact;
pub mod error;
pub mod request;
pub mod view;

// Storage and execution
pub mod engine;
pub mod storage;

// Re-export primary types at crate root for convenience
pub use contact::{Contact, ContactId, ContactUpdate, LinkRole, NewContact};
pub use engine::{EngineConfig, IdentityEngine};
pub use error::{ChainResult, ExecutionError, IdentityError, ValidationError};
pub use request::{IdentifyBuilder, IdentifyRequest};
pub use storage::{ContactStore, InMemoryContactStore, StorageError};
pub use view::ConsolidatedView;
