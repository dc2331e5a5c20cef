//! Unified state façade for the CampusHub sync core.
//!
//! The only component the UI talks to directly. It aggregates N
//! independent data domains (user profile, dashboard aggregates, AI
//! insights, …), each with its own loading/initialized/error flags, over
//! the cache, the request deduplicator, and the sync coordinator.
//!
//! A consumer asks for a domain; the context checks the cache; on a miss
//! or stale entry the deduplicator issues (or joins) exactly one network
//! call; the result is written back and the domain flagged initialized.
//! A failed fetch sets that domain's error flag and nothing else — one
//! domain's failure never blocks or invalidates the others, and errors
//! never propagate into UI rendering.

mod context;
mod domain;

pub use context::{StateSnapshot, UnifiedStateContext};
pub use domain::{Domain, DomainFetcher, DomainState};
