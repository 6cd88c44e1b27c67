//! # Audit Pipeline
//!
//! An append-only log of `data.*`/`job.*` events, built by subscribing to
//! the kernel's event bus as an observer: it never gates the mutation
//! that triggered it, only records after the fact and emits
//! `audit.event.recorded` (spec §4.7).

pub mod entry;
pub mod event_type;
pub mod pipeline;
pub mod query;

pub use entry::{FieldChange, AuditEntry, DEFAULT_EXCLUDED_FIELDS};
pub use event_type::AuditEventType;
pub use pipeline::{AuditConfig, AuditPipeline};
pub use query::{AuditQuery, QueryPage, SortOrder};
