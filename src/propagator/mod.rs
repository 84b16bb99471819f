//! Propagator contract.
//!
//! A propagator is an incremental constraint-checking unit: it subscribes
//! to decision variables and, whenever one of them changes according to
//! its registered event kind, re-checks the invariant it encodes —
//! shrinking domains, reporting a fixpoint, declaring itself subsumed, or
//! failing the branch.
//!
//! # Contract
//!
//! - `propagate()` must be idempotent: re-invoking it with no intervening
//!   domain change must not shrink anything further.
//! - A propagator may shrink or assign only the variables it declared in
//!   [`Propagator::subscriptions`] or [`Propagator::outputs`].
//! - The fail/not-fail outcome of a fixpoint must not depend on the order
//!   in which sibling propagators run.
//!
//! # References
//!
//! Schulte & Stuckey (2008), "Efficient Constraint Propagation Engines"

mod contract;

pub use contract::{EventKind, PropCost, Propagation, Propagator, Subscription};
