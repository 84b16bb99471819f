//! The DSE model: variables, propagators, objective, extraction.

use std::sync::Arc;

use super::linking::{ChannelDelayPropagator, ModeFeasibilityPropagator, ResourcePropagator};
use super::ordering::{
    DataPrecedencePropagator, DistinctPropagator, MessageOrderingPropagator,
    ScheduleOrderingPropagator,
};
use super::result::Mapping;
use super::system::SystemSpec;
use crate::error::{Conflict, ModelError};
use crate::propagator::Propagator;
use crate::sched::{SchedParams, SchedulabilityPropagator};
use crate::search::{SearchConfig, SearchEngine, SearchStats};
use crate::store::{Domain, DomainStore, VarId};
use crate::throughput::{ThroughputParams, ThroughputPropagator};

/// What branch-and-bound minimizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// Long-run system power.
    Power,
    /// Number of processors in use.
    ProcsUsed,
    /// Steady-state period of one application.
    Period(usize),
    /// First-iteration latency of one application.
    Latency(usize),
}

/// Decision and output variables of a model, in store order.
#[derive(Debug, Clone)]
pub struct ModelVars {
    pub proc: Vec<VarId>,
    pub proc_mode: Vec<VarId>,
    pub next: Vec<VarId>,
    pub send_next: Vec<VarId>,
    pub rec_next: Vec<VarId>,
    pub send_buf: Vec<VarId>,
    pub rec_buf: Vec<VarId>,
    pub block_time: Vec<VarId>,
    pub send_time: Vec<VarId>,
    pub period: Vec<VarId>,
    pub latency: Vec<VarId>,
    pub procs_used: VarId,
    pub sys_power: VarId,
}

/// Result of a full exploration.
#[derive(Debug, Clone)]
pub struct DseOutcome {
    /// Best mapping found, if any solution exists within the budget.
    pub best: Option<Mapping>,
    pub stats: SearchStats,
    /// Whether the stop predicate tripped before the tree was exhausted.
    pub time_limited: bool,
}

/// A ready-to-solve constraint model over one [`SystemSpec`].
///
/// Construction lays out all variables in one [`DomainStore`] (hint-seeded
/// processor domains, permutation-encoded order chains, two-valued delay
/// domains) and registers every propagator. The model itself stays
/// immutable during search; the engine works on clones of the store and
/// propagator set.
///
/// # Examples
///
/// ```no_run
/// use mapdse::model::{DseModel, Objective, SystemSpec};
/// use mapdse::search::SearchConfig;
///
/// # fn spec() -> SystemSpec { unimplemented!() }
/// let model = DseModel::new(spec(), Objective::Power).unwrap();
/// let outcome = model.solve(SearchConfig::default());
/// if let Some(best) = outcome.best {
///     println!("{}", best.csv_row());
/// }
/// ```
#[derive(Clone)]
pub struct DseModel {
    spec: SystemSpec,
    objective: Objective,
    store: DomainStore,
    propagators: Vec<Box<dyn Propagator>>,
    vars: ModelVars,
}

impl DseModel {
    pub fn new(spec: SystemSpec, objective: Objective) -> Result<Self, ModelError> {
        spec.validate()?;
        match objective {
            Objective::Period(app) | Objective::Latency(app) if app >= spec.apps.n_apps => {
                return Err(ModelError::InvalidApplications {
                    reason: format!("objective names application {app} of {}", spec.apps.n_apps),
                });
            }
            _ => {}
        }
        for (c, ch) in spec.apps.channels.iter().enumerate() {
            if ch.initial_tokens > spec.max_buffer {
                return Err(ModelError::InvalidApplications {
                    reason: format!("channel {c} holds more initial tokens than max_buffer"),
                });
            }
        }

        let n_actors = spec.apps.n_actors();
        let n_entities = spec.apps.n_entities();
        let n_procs = spec.platform.n_procs();
        let n_ch = spec.apps.channels.len();
        let n_apps = spec.apps.n_apps;

        let mut store = DomainStore::new();

        let proc: Vec<VarId> = (0..n_entities)
            .map(|e| store.new_var(Domain::from_values(spec.proc_domain(e))))
            .collect();
        let proc_mode: Vec<VarId> = spec
            .platform
            .processors
            .iter()
            .map(|p| store.new_var(Domain::range(0, p.modes.len() as i64 - 1)))
            .collect();

        // permutation domains: an actor may precede any other actor or
        // close its processor's chain; a processor slot points at a first
        // actor or at itself when idle
        let next: Vec<VarId> = (0..n_actors + n_procs)
            .map(|i| {
                let values: Vec<i64> = if i < n_actors {
                    (0..n_actors + n_procs)
                        .filter(|&v| v != i)
                        .map(|v| v as i64)
                        .collect()
                } else {
                    (0..n_actors).map(|v| v as i64).chain([i as i64]).collect()
                };
                store.new_var(Domain::from_values(values))
            })
            .collect();

        let send_next: Vec<VarId> = (0..=n_ch)
            .map(|c| {
                let values: Vec<i64> = if c < n_ch {
                    (0..=n_ch).filter(|&v| v != c).map(|v| v as i64).collect()
                } else if n_ch == 0 {
                    vec![n_ch as i64]
                } else {
                    (0..n_ch).map(|v| v as i64).collect()
                };
                store.new_var(Domain::from_values(values))
            })
            .collect();
        let rec_next: Vec<VarId> = (0..n_ch)
            .map(|c| {
                let dst = spec.apps.channels[c].dst;
                let values: Vec<i64> = (0..n_ch)
                    .filter(|&v| v != c && spec.apps.channels[v].dst == dst)
                    .map(|v| v as i64)
                    .chain([n_ch as i64])
                    .collect();
                store.new_var(Domain::from_values(values))
            })
            .collect();

        let send_buf: Vec<VarId> = (0..n_ch)
            .map(|_| store.new_var(Domain::range(1, spec.max_buffer)))
            .collect();
        let rec_buf: Vec<VarId> = spec
            .apps
            .channels
            .iter()
            .map(|ch| store.new_var(Domain::range(ch.initial_tokens.max(1), spec.max_buffer)))
            .collect();

        let interconnect: Vec<(i64, i64)> = spec
            .apps
            .channels
            .iter()
            .map(|ch| {
                (
                    spec.platform.block_delay(),
                    spec.platform.send_delay(ch.token_size),
                )
            })
            .collect();
        let block_time: Vec<VarId> = interconnect
            .iter()
            .map(|&(b, _)| store.new_var(Domain::from_values(vec![0, b])))
            .collect();
        let send_time: Vec<VarId> = interconnect
            .iter()
            .map(|&(_, s)| store.new_var(Domain::from_values(vec![0, s])))
            .collect();
        let recv_time: Vec<i64> = spec
            .apps
            .channels
            .iter()
            .map(|ch| spec.platform.receive_delay(ch.token_size))
            .collect();

        // generous horizon: every entity and every message once through
        let horizon: i64 = (0..n_entities).map(|e| spec.wcet.max_wcet(e)).sum::<i64>()
            + interconnect
                .iter()
                .zip(&recv_time)
                .map(|(&(b, s), &r)| b + s + r)
                .sum::<i64>()
            + 1;
        let period: Vec<VarId> = (0..n_apps)
            .map(|a| store.new_var(Domain::range(1, spec.period_bound[a].unwrap_or(horizon))))
            .collect();
        let latency: Vec<VarId> = (0..n_apps)
            .map(|_| store.new_var(Domain::range(0, horizon)))
            .collect();

        let procs_used = store.new_var(Domain::range(0, n_procs as i64));
        let max_power: i64 = spec
            .platform
            .processors
            .iter()
            .map(|p| p.modes.iter().map(|m| m.power).max().unwrap_or(0))
            .sum();
        let sys_power = store.new_var(Domain::range(0, max_power));

        let vars = ModelVars {
            proc,
            proc_mode,
            next,
            send_next,
            rec_next,
            send_buf,
            rec_buf,
            block_time,
            send_time,
            period,
            latency,
            procs_used,
            sys_power,
        };

        let propagators = Self::build_propagators(&spec, &vars, recv_time);

        Ok(Self {
            spec,
            objective,
            store,
            propagators,
            vars,
        })
    }

    fn build_propagators(
        spec: &SystemSpec,
        vars: &ModelVars,
        recv_time: Vec<i64>,
    ) -> Vec<Box<dyn Propagator>> {
        let n_actors = spec.apps.n_actors();
        let n_ch = spec.apps.channels.len();
        let ch_src: Vec<usize> = spec.apps.channels.iter().map(|c| c.src).collect();
        let ch_dst: Vec<usize> = spec.apps.channels.iter().map(|c| c.dst).collect();
        let tok: Vec<i64> = spec.apps.channels.iter().map(|c| c.initial_tokens).collect();
        let wcet = Arc::new(spec.wcet.clone());
        let interconnect: Vec<(i64, i64)> = spec
            .apps
            .channels
            .iter()
            .map(|ch| {
                (
                    spec.platform.block_delay(),
                    spec.platform.send_delay(ch.token_size),
                )
            })
            .collect();

        let mut props: Vec<Box<dyn Propagator>> = Vec::new();

        props.push(Box::new(DistinctPropagator::new(vars.next.clone())));
        if n_ch > 0 {
            props.push(Box::new(DistinctPropagator::new(vars.send_next.clone())));
            for dst in 0..n_actors {
                let group: Vec<VarId> = (0..n_ch)
                    .filter(|&c| ch_dst[c] == dst)
                    .map(|c| vars.rec_next[c])
                    .collect();
                if group.len() > 1 {
                    props.push(Box::new(DistinctPropagator::new(group)));
                }
            }
        }
        props.push(Box::new(ScheduleOrderingPropagator::new(
            n_actors,
            vars.proc[..n_actors].to_vec(),
            vars.next.clone(),
        )));
        if n_ch > 0 {
            props.push(Box::new(MessageOrderingPropagator::new(
                ch_dst.clone(),
                vars.send_next.clone(),
                vars.rec_next.clone(),
            )));
            props.push(Box::new(DataPrecedencePropagator::new(
                n_actors,
                ch_src.clone(),
                ch_dst.clone(),
                tok.clone(),
                vars.send_time.clone(),
                vars.next.clone(),
            )));
            props.push(Box::new(ChannelDelayPropagator::new(
                ch_src.clone(),
                ch_dst.clone(),
                vars.proc.clone(),
                vars.block_time.clone(),
                vars.send_time.clone(),
                interconnect,
            )));
        }
        props.push(Box::new(ModeFeasibilityPropagator::new(
            vars.proc.clone(),
            vars.proc_mode.clone(),
            wcet.clone(),
        )));
        props.push(Box::new(ResourcePropagator::new(
            vars.proc.clone(),
            vars.proc_mode.clone(),
            spec.platform
                .processors
                .iter()
                .map(|p| p.modes.iter().map(|m| m.power).collect())
                .collect(),
            vars.procs_used,
            vars.sys_power,
        )));

        if spec.apps.n_tasks() > 0 {
            props.push(Box::new(SchedulabilityPropagator::new(SchedParams {
                n_actors,
                proc: vars.proc.clone(),
                proc_mode: vars.proc_mode.clone(),
                wcet: wcet.clone(),
                periods: spec.apps.tasks.iter().map(|t| t.period).collect(),
                priorities: spec.apps.rate_monotonic_priorities(),
                deadlines: spec.apps.tasks.iter().map(|t| t.deadline).collect(),
            })));
        }
        if n_actors > 0 {
            props.push(Box::new(ThroughputPropagator::new(ThroughputParams {
                n_actors,
                n_procs: spec.platform.n_procs(),
                actor_app: spec.apps.actors.iter().map(|a| a.app).collect(),
                n_apps: spec.apps.n_apps,
                ch_src,
                ch_dst,
                tok,
                recv_time,
                proc: vars.proc.clone(),
                proc_mode: vars.proc_mode.clone(),
                wcet,
                next: vars.next.clone(),
                send_next: vars.send_next.clone(),
                rec_next: vars.rec_next.clone(),
                block_time: vars.block_time.clone(),
                send_time: vars.send_time.clone(),
                send_buf: vars.send_buf.clone(),
                rec_buf: vars.rec_buf.clone(),
                period: vars.period.clone(),
                latency: vars.latency.clone(),
            })));
        }
        props
    }

    pub fn spec(&self) -> &SystemSpec {
        &self.spec
    }

    pub fn vars(&self) -> &ModelVars {
        &self.vars
    }

    pub fn store(&self) -> &DomainStore {
        &self.store
    }

    /// The variable the objective minimizes.
    pub fn objective_var(&self) -> VarId {
        match self.objective {
            Objective::Power => self.vars.sys_power,
            Objective::ProcsUsed => self.vars.procs_used,
            Objective::Period(app) => self.vars.period[app],
            Objective::Latency(app) => self.vars.latency[app],
        }
    }

    /// Monotone branch-and-bound tightening: any further solution must
    /// beat `best` strictly.
    pub fn constrain(&self, store: &mut DomainStore, best: i64) -> Result<bool, Conflict> {
        store.tighten_max(self.objective_var(), best - 1)
    }

    /// Variables the engine branches on, in decision order: placement
    /// first, then modes, then the order chains, then buffers. Delay
    /// variables follow from the placement but are listed so completion
    /// is guaranteed even for channels whose endpoints stay unassigned.
    pub fn branching_order(&self) -> Vec<VarId> {
        let v = &self.vars;
        v.proc
            .iter()
            .chain(v.proc_mode.iter())
            .chain(v.next.iter())
            .chain(v.send_next.iter())
            .chain(v.rec_next.iter())
            .chain(v.send_buf.iter())
            .chain(v.rec_buf.iter())
            .chain(v.block_time.iter())
            .chain(v.send_time.iter())
            .copied()
            .collect()
    }

    /// Runs the branch-and-bound exploration.
    pub fn solve(&self, config: SearchConfig) -> DseOutcome {
        let engine = SearchEngine::new(config);
        let outcome = engine.minimize(
            self.store.clone(),
            self.propagators.clone(),
            self.branching_order(),
            Some(self.objective_var()),
        );
        DseOutcome {
            best: outcome.best.as_ref().map(|s| self.extract_result(s)),
            stats: outcome.stats,
            time_limited: outcome.time_limited,
        }
    }

    /// Reads a complete assignment out of `store`.
    ///
    /// Unassigned variables read as their current minimum, so calling
    /// this on a solution store is exact and on a partial store gives
    /// the optimistic completion.
    pub fn extract_result(&self, store: &DomainStore) -> Mapping {
        let v = &self.vars;
        let read = |var: VarId| store.min(var);
        let read_usize = |var: VarId| store.min(var) as usize;

        let proc: Vec<usize> = v.proc.iter().map(|&x| read_usize(x)).collect();
        let proc_mode: Vec<usize> = v.proc_mode.iter().map(|&x| read_usize(x)).collect();
        let periods: Vec<i64> = v.period.iter().map(|&x| read(x)).collect();

        let used: Vec<usize> = (0..self.spec.platform.n_procs())
            .filter(|&p| proc.contains(&p))
            .collect();

        let n_actors = self.spec.apps.n_actors();
        let mut load = 0f64;
        for (e, &p) in proc.iter().enumerate() {
            let wcet = self.spec.wcet.get(e, p, proc_mode[p]) as f64;
            let denom = if e < n_actors {
                periods[self.spec.apps.actors[e].app] as f64
            } else {
                self.spec.apps.tasks[e - n_actors].period as f64
            };
            if denom > 0.0 {
                load += wcet / denom;
            }
        }
        let utilization = if used.is_empty() {
            0.0
        } else {
            load / used.len() as f64
        };

        let (mut area, mut cost) = (0i64, 0i64);
        for &p in &used {
            let mode = &self.spec.platform.processors[p].modes[proc_mode[p]];
            area += mode.area;
            cost += mode.cost;
        }

        Mapping {
            proc,
            proc_mode,
            next: v.next.iter().map(|&x| read_usize(x)).collect(),
            send_next: v.send_next.iter().map(|&x| read_usize(x)).collect(),
            rec_next: v.rec_next.iter().map(|&x| read_usize(x)).collect(),
            send_buffers: v.send_buf.iter().map(|&x| read(x)).collect(),
            rec_buffers: v.rec_buf.iter().map(|&x| read(x)).collect(),
            periods,
            latencies: v.latency.iter().map(|&x| read(x)).collect(),
            procs_used: read(v.procs_used),
            utilization,
            power: read(v.sys_power),
            area,
            cost,
        }
    }
}
