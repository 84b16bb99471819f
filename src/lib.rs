//! Constraint-based design-space exploration for embedded multiprocessor
//! mapping.
//!
//! Takes a system description — synchronous dataflow applications and
//! periodic tasks, a multiprocessor platform with per-processor modes
//! and a shared interconnect, a WCET table — and explores placements,
//! static schedules, and buffer sizes by depth-first branch-and-bound
//! over finite integer domains:
//!
//! - **Store** ([`store`]): per-variable value sets with monotonic
//!   shrink operations and clone-on-branch restoration.
//! - **Propagators** ([`propagator`], [`sched`], [`throughput`],
//!   [`model`]): incremental constraint checks that prune domains on
//!   partial assignments — fixed-priority schedulability, cycle-ratio
//!   throughput bounds over a mapping-and-scheduling-aware graph,
//!   ordering-chain and channel-delay consistency, resource accounting.
//! - **Search** ([`search`]): branch-and-bound with cost-ordered
//!   propagation to fixpoint, objective bounding, and anytime operation
//!   under time or node budgets.
//!
//! # Example
//!
//! ```no_run
//! use mapdse::model::{DseModel, Objective, SystemSpec};
//! use mapdse::search::SearchConfig;
//!
//! # fn system() -> SystemSpec { unimplemented!() }
//! let model = DseModel::new(system(), Objective::Power)?;
//! let outcome = model.solve(SearchConfig::anytime(30_000));
//! match outcome.best {
//!     Some(best) => println!("{}", best.csv_row()),
//!     None => println!("no feasible mapping"),
//! }
//! # Ok::<(), mapdse::error::ModelError>(())
//! ```

pub mod error;
pub mod model;
pub mod propagator;
pub mod sched;
pub mod search;
pub mod store;
pub mod throughput;
