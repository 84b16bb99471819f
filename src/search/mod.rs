//! Branch-and-bound search.
//!
//! A depth-first walk over the branching variables with clone-on-branch
//! state restoration: every choice point stores the parent fixpoint
//! (domain store plus propagator states), and backtracking discards the
//! child and re-clones. Between nodes the engine drives all propagators
//! to a mutual fixpoint, cheapest first.
//!
//! # Key Components
//!
//! - [`SearchConfig`] — limits, value ordering, first-solution mode
//! - [`SearchEngine`] — the branch-and-bound loop
//! - [`SearchOutcome`] / [`SearchStats`] — best store found plus counters
//!
//! # References
//!
//! Schulte & Stuckey (2008), "Efficient Constraint Propagation Engines"

mod config;
mod engine;

pub use config::{SearchConfig, ValueHeuristic};
pub use engine::{SearchEngine, SearchOutcome, SearchStats};
