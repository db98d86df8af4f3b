//! Application layer for Folio.
//!
//! This crate coordinates the domain and infrastructure layers: it owns the
//! chat session state and applies the degradation rules for storage and AI
//! failures so the surface layer stays free of error branching.

pub mod session;

pub use session::{AskOutcome, DocumentSession, LoadedDocument};
