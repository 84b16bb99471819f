//! The complete system specification a model is built from.

use super::application::ApplicationSet;
use super::platform::Platform;
use crate::error::ModelError;

/// WCET lookup indexed by `(entity, processor, mode)`.
///
/// An entry of zero means the entity cannot execute on that processor in
/// that mode; such processors are removed from the entity's initial
/// domain rather than checked during search.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WcetTable {
    n_entities: usize,
    n_procs: usize,
    n_modes: usize,
    values: Vec<i64>,
}

impl WcetTable {
    /// Zero-filled table; entries must be set explicitly.
    pub fn new(n_entities: usize, n_procs: usize, n_modes: usize) -> Self {
        Self {
            n_entities,
            n_procs,
            n_modes,
            values: vec![0; n_entities * n_procs * n_modes],
        }
    }

    pub fn n_entities(&self) -> usize {
        self.n_entities
    }

    pub fn n_procs(&self) -> usize {
        self.n_procs
    }

    pub fn n_modes(&self) -> usize {
        self.n_modes
    }

    pub fn set(&mut self, entity: usize, proc: usize, mode: usize, wcet: i64) {
        let idx = self.index(entity, proc, mode);
        self.values[idx] = wcet;
    }

    pub fn get(&self, entity: usize, proc: usize, mode: usize) -> i64 {
        self.values[self.index(entity, proc, mode)]
    }

    /// Processors on which `entity` can run in at least one mode.
    pub fn feasible_procs(&self, entity: usize) -> Vec<i64> {
        (0..self.n_procs)
            .filter(|&p| (0..self.n_modes).any(|m| self.get(entity, p, m) > 0))
            .map(|p| p as i64)
            .collect()
    }

    /// Largest WCET of `entity` over all feasible placements.
    pub fn max_wcet(&self, entity: usize) -> i64 {
        (0..self.n_procs)
            .flat_map(|p| (0..self.n_modes).map(move |m| self.get(entity, p, m)))
            .max()
            .unwrap_or(0)
    }

    fn index(&self, entity: usize, proc: usize, mode: usize) -> usize {
        debug_assert!(entity < self.n_entities && proc < self.n_procs && mode < self.n_modes);
        (entity * self.n_procs + proc) * self.n_modes + mode
    }
}

/// Optional mapping hints from a presolver collaborator.
///
/// Enforced pairs pin an entity to one processor; forbidden pairs remove
/// a processor from an entity's initial domain.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PresolverHints {
    pub enforced: Vec<(usize, usize)>,
    pub forbidden: Vec<(usize, usize)>,
}

impl PresolverHints {
    pub fn with_enforced(mut self, entity: usize, proc: usize) -> Self {
        self.enforced.push((entity, proc));
        self
    }

    pub fn with_forbidden(mut self, entity: usize, proc: usize) -> Self {
        self.forbidden.push((entity, proc));
        self
    }
}

/// Everything needed to build a model: application side, platform side,
/// the WCET table bridging them, and optional search guidance.
///
/// # Examples
///
/// ```
/// use mapdse::model::{
///     ApplicationSet, Actor, Interconnect, Platform, Processor, SystemSpec, WcetTable,
/// };
///
/// let apps = ApplicationSet {
///     actors: vec![Actor::new("a", 0)],
///     channels: vec![],
///     tasks: vec![],
///     n_apps: 1,
/// };
/// let platform = Platform::new(
///     vec![Processor::single_mode("pe0", 10, 4, 100)],
///     Interconnect::TdmaBus { slots: 4, slot_size: 32, round_length: 8 },
/// );
/// let mut wcet = WcetTable::new(1, 1, 1);
/// wcet.set(0, 0, 0, 5);
/// let spec = SystemSpec::new(apps, platform, wcet);
/// assert!(spec.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct SystemSpec {
    pub apps: ApplicationSet,
    pub platform: Platform,
    pub wcet: WcetTable,
    pub hints: PresolverHints,
    /// Hard period cap per application, if any.
    pub period_bound: Vec<Option<i64>>,
    /// Largest admissible channel buffer capacity, in tokens.
    pub max_buffer: i64,
}

impl SystemSpec {
    pub fn new(apps: ApplicationSet, platform: Platform, wcet: WcetTable) -> Self {
        let n_apps = apps.n_apps;
        Self {
            apps,
            platform,
            wcet,
            hints: PresolverHints::default(),
            period_bound: vec![None; n_apps],
            max_buffer: 16,
        }
    }

    pub fn with_hints(mut self, hints: PresolverHints) -> Self {
        self.hints = hints;
        self
    }

    pub fn with_period_bound(mut self, app: usize, bound: i64) -> Self {
        self.period_bound[app] = Some(bound);
        self
    }

    pub fn with_max_buffer(mut self, max_buffer: i64) -> Self {
        self.max_buffer = max_buffer;
        self
    }

    pub fn n_entities(&self) -> usize {
        self.apps.n_entities()
    }

    /// Initial processor domain of `entity`: WCET-feasible processors
    /// restricted by the presolver hints.
    pub fn proc_domain(&self, entity: usize) -> Vec<i64> {
        let mut procs = self.wcet.feasible_procs(entity);
        for &(e, p) in &self.hints.forbidden {
            if e == entity {
                procs.retain(|&v| v != p as i64);
            }
        }
        for &(e, p) in &self.hints.enforced {
            if e == entity {
                procs.retain(|&v| v == p as i64);
            }
        }
        procs
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        self.apps.validate()?;
        self.platform.validate()?;

        for entity in 0..self.n_entities() {
            if self.wcet.feasible_procs(entity).is_empty() {
                return Err(ModelError::MissingWcet {
                    entity,
                    processor: 0,
                    mode: 0,
                });
            }
        }

        let n_procs = self.platform.n_procs();
        for &(entity, processor) in self.hints.enforced.iter().chain(&self.hints.forbidden) {
            if entity >= self.n_entities() || processor >= n_procs {
                return Err(ModelError::InvalidHint { entity, processor });
            }
        }
        for entity in 0..self.n_entities() {
            if self.proc_domain(entity).is_empty() {
                return Err(ModelError::UnsatisfiableHints { entity });
            }
        }
        Ok(())
    }
}
