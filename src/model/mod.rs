//! The mapping model: system description, decision variables, propagators.
//!
//! A [`SystemSpec`] describes what is to be mapped (dataflow applications
//! and periodic tasks, a platform with modes and a shared interconnect,
//! a WCET table, optional presolver hints). [`DseModel`] turns it into a
//! constraint model: one flat [`crate::store::DomainStore`] holding
//! placement, mode, order-chain, buffer and delay variables, plus the
//! propagator set that keeps them consistent.
//!
//! # Key Components
//!
//! - [`ApplicationSet`] / [`Platform`] / [`WcetTable`] — the system under
//!   exploration
//! - [`SystemSpec`] — everything above bundled and validated
//! - [`DseModel`] — variable layout, propagator registration, solve,
//!   solution extraction
//! - Ordering propagators — permutation-encoded static orders per
//!   processor ([`ScheduleOrderingPropagator`]), one global send chain
//!   and per-destination receive chains ([`MessageOrderingPropagator`]),
//!   data precedence on zero-token local channels
//!   ([`DataPrecedencePropagator`])
//! - [`ChannelDelayPropagator`] / [`ModeFeasibilityPropagator`] /
//!   [`ResourcePropagator`] — channel delay selection by co-location,
//!   mode pruning against the runnable WCET entries, and the
//!   used-processors/power bookkeeping
//! - [`Mapping`] — the extracted solution with derived metrics

mod application;
mod dse;
mod linking;
mod ordering;
mod platform;
mod result;
mod system;

pub use application::{Actor, ApplicationSet, Channel, PeriodicTask};
pub use linking::{ChannelDelayPropagator, ModeFeasibilityPropagator, ResourcePropagator};
pub use dse::{DseModel, DseOutcome, ModelVars, Objective};
pub use ordering::{
    DataPrecedencePropagator, DistinctPropagator, MessageOrderingPropagator,
    ScheduleOrderingPropagator,
};
pub use platform::{Interconnect, Platform, Processor, ProcessorMode};
pub use result::Mapping;
pub use system::{PresolverHints, SystemSpec, WcetTable};
