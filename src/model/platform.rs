//! Platform-side input: processors, modes, interconnect delay formulas.

use crate::error::ModelError;

/// One operating point of a processor.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessorMode {
    pub name: String,
    /// Power draw while active in this mode.
    pub power: i64,
    pub area: i64,
    pub cost: i64,
}

impl ProcessorMode {
    pub fn new(name: impl Into<String>, power: i64, area: i64, cost: i64) -> Self {
        Self {
            name: name.into(),
            power,
            area,
            cost,
        }
    }
}

/// A processing element with one or more modes.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Processor {
    pub name: String,
    pub modes: Vec<ProcessorMode>,
}

impl Processor {
    pub fn new(name: impl Into<String>, modes: Vec<ProcessorMode>) -> Self {
        Self {
            name: name.into(),
            modes,
        }
    }

    /// Single-mode processor, the common case for fixed-function platforms.
    pub fn single_mode(name: impl Into<String>, power: i64, area: i64, cost: i64) -> Self {
        Self::new(name, vec![ProcessorMode::new("default", power, area, cost)])
    }
}

/// The shared interconnect, with per-type delay formulas.
///
/// Both variants expose the same three quantities per message: a blocking
/// delay (worst-case wait before transmission may start), a sending delay
/// (occupancy of the medium) and a receiving delay (copy-out at the
/// destination). All are functions of the token size and the bandwidth
/// share statically allocated to each processor.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Interconnect {
    /// TDMA bus: a round of `slots` slots, each carrying `slot_size`
    /// bytes, completed every `round_length` time units. Each processor
    /// owns an equal share of the slots.
    TdmaBus {
        slots: usize,
        slot_size: i64,
        round_length: i64,
    },
    /// Time-division-multiplexed NoC: per-link bandwidth in bytes per
    /// time unit and a fixed per-router forwarding delay, with `diameter`
    /// the worst-case hop count.
    TdmNoc {
        link_bandwidth: i64,
        router_delay: i64,
        diameter: usize,
    },
}

/// The multiprocessor platform.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Platform {
    pub processors: Vec<Processor>,
    pub interconnect: Interconnect,
}

impl Platform {
    pub fn new(processors: Vec<Processor>, interconnect: Interconnect) -> Self {
        Self {
            processors,
            interconnect,
        }
    }

    pub fn n_procs(&self) -> usize {
        self.processors.len()
    }

    /// Largest mode count over all processors; mode variables share one
    /// domain size, processors with fewer modes restrict theirs.
    pub fn max_modes(&self) -> usize {
        self.processors
            .iter()
            .map(|p| p.modes.len())
            .max()
            .unwrap_or(0)
    }

    /// Worst-case wait before this processor's bandwidth share comes up.
    pub fn block_delay(&self) -> i64 {
        match self.interconnect {
            Interconnect::TdmaBus { round_length, .. } => round_length,
            Interconnect::TdmNoc { router_delay, .. } => router_delay,
        }
    }

    /// Medium occupancy for one token of `token_size` bytes. Always at
    /// least 1: a zero sending delay encodes a local channel.
    pub fn send_delay(&self, token_size: i64) -> i64 {
        let d = match self.interconnect {
            Interconnect::TdmaBus {
                slots,
                slot_size,
                round_length,
            } => {
                let share = (slots / self.n_procs().max(1)).max(1) as i64;
                let per_round = share * slot_size;
                ((token_size + per_round - 1) / per_round) * round_length
            }
            Interconnect::TdmNoc {
                link_bandwidth,
                router_delay,
                diameter,
            } => {
                (token_size + link_bandwidth - 1) / link_bandwidth
                    + diameter as i64 * router_delay
            }
        };
        d.max(1)
    }

    /// Copy-out cost at the destination.
    pub fn receive_delay(&self, token_size: i64) -> i64 {
        let bw = match self.interconnect {
            Interconnect::TdmaBus { slot_size, .. } => slot_size,
            Interconnect::TdmNoc { link_bandwidth, .. } => link_bandwidth,
        };
        ((token_size + bw - 1) / bw).max(1)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.processors.is_empty() {
            return Err(ModelError::InvalidPlatform {
                reason: "no processors".into(),
            });
        }
        for p in &self.processors {
            if p.modes.is_empty() {
                return Err(ModelError::InvalidPlatform {
                    reason: format!("processor {} has no modes", p.name),
                });
            }
        }
        let ok = match self.interconnect {
            Interconnect::TdmaBus {
                slots,
                slot_size,
                round_length,
            } => slots > 0 && slot_size > 0 && round_length > 0,
            Interconnect::TdmNoc {
                link_bandwidth,
                router_delay,
                diameter,
            } => link_bandwidth > 0 && router_delay >= 0 && diameter > 0,
        };
        if !ok {
            return Err(ModelError::InvalidPlatform {
                reason: "non-positive interconnect parameters".into(),
            });
        }
        Ok(())
    }
}
