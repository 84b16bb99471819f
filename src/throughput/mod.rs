//! Throughput analysis.
//!
//! From the current search state a Mapping-and-Scheduling-Aware Graph
//! (MSAG) is built: a weighted directed graph whose nodes are dataflow
//! firings, periodic tasks, and synthetic block/send/receive nodes for
//! channels routed over the shared interconnect, and whose edges carry
//! `(delay, tokens)` pairs. For any directed cycle, `Σdelay / Σtokens`
//! is a sound lower bound on the steady-state period; the maximum over
//! all cycles (MCR) is the tightest bound derivable from the decisions
//! taken so far.
//!
//! # Key Components
//!
//! - [`Msag`] / [`build_msag`] — graph construction, rebuilt from scratch
//!   on every propagation
//! - [`maximum_cycle_ratio`] — self-contained Howard policy iteration,
//!   exact rational cycle ratios, one result per weakly-connected
//!   component
//! - [`ThroughputPropagator`] — ties both into the propagation loop and
//!   tightens per-application period domains
//! - [`self_timed_execution`] — max-plus execution of an MSAG, used for
//!   latency extraction at complete assignments and as the reference
//!   semantics in tests
//!
//! # References
//!
//! - Dasdan (2004), "Experimental Analysis of the Fastest Optimum Cycle
//!   Ratio and Mean Algorithms"
//! - Sriram & Bhattacharyya (2000), "Embedded Multiprocessors: Scheduling
//!   and Synchronization"

mod mcr;
mod msag;
mod propagator;
mod sim;

pub use mcr::{maximum_cycle_ratio, CycleRatio, McrOutcome};
pub use msag::{build_msag, Msag, MsagEdge, MsagNode, NodeKind};
pub use propagator::{ThroughputParams, ThroughputPropagator};
pub use sim::{self_timed_execution, SelfTimedRun};
