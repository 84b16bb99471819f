//! Fixed-priority schedulability analysis.
//!
//! Periodic tasks mapped onto a processor are checked in two stages:
//! a cheap utilization-bound test first, exact time-demand analysis only
//! when the bound is inconclusive. The check is packaged as a
//! [`SchedulabilityPropagator`]: it runs on *partial* mappings (only
//! processors with an assigned mode, only tasks with an assigned
//! processor) and fails the branch as soon as any assigned subset is
//! provably unschedulable — adding more tasks never helps.
//!
//! [`simulate_fixed_priority`] is the ground truth the analysis is tested
//! against: a forward simulation of the preemptive fixed-priority
//! scheduler over one hyperperiod.
//!
//! # References
//!
//! - Liu & Layland (1973), "Scheduling Algorithms for Multiprogramming in
//!   a Hard-Real-Time Environment"
//! - Lehoczky, Sha & Ding (1989), "The Rate Monotonic Scheduling
//!   Algorithm: Exact Characterization and Average Case Behavior"

mod propagator;
mod sim;

pub use propagator::{SchedParams, SchedulabilityPropagator};
pub use sim::{simulate_fixed_priority, SimTask};
