//! Domain store: the mutable state of one search node.
//!
//! A [`DomainStore`] owns, per decision variable, the finite set of values
//! the variable may still take. Propagators shrink these sets; the search
//! engine clones the whole store at each choice point (copy-on-branch, no
//! trailing/undo log) and restores by discarding the clone.
//!
//! # Key Components
//!
//! - [`Domain`] — a sorted finite integer set with monotonic shrink ops
//! - [`DomainStore`] — dense variable table plus a change-event log
//! - [`VarId`] — integer handle; entities are indexed by id, never by
//!   reference, which keeps cloning a flat `memcpy`-style copy
//! - [`DomainEvent`] — change notification strength (changed/bounds/assigned)

mod domain;
mod store;

pub use domain::{Domain, Shrink};
pub use store::{DomainEvent, DomainStore, VarId};
