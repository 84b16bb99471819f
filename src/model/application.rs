//! Application-side input: dataflow firings, channels, periodic tasks.
//!
//! The graph-transformation collaborator delivers the dataflow side
//! already expanded to single-rate firings, so actors here are firings
//! with unit production and consumption; channels carry their initial
//! tokens and token size for buffer and interconnect-delay modelling.

use crate::error::ModelError;

/// One dataflow firing.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Actor {
    pub name: String,
    /// Application this firing belongs to.
    pub app: usize,
}

impl Actor {
    pub fn new(name: impl Into<String>, app: usize) -> Self {
        Self {
            name: name.into(),
            app,
        }
    }
}

/// A channel between two firings.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Channel {
    pub src: usize,
    pub dst: usize,
    /// Tokens produced per firing of `src`. After graph expansion every
    /// channel is single-rate, so this is 1 unless a caller carries the
    /// pre-expansion rates along.
    pub production_rate: i64,
    /// Tokens consumed per firing of `dst`.
    pub consumption_rate: i64,
    /// Initial tokens on the channel.
    pub initial_tokens: i64,
    /// Size of one token in bytes, for interconnect delays.
    pub token_size: i64,
}

impl Channel {
    /// Single-rate channel (the shape the expanded firing graph has).
    pub fn new(src: usize, dst: usize, initial_tokens: i64, token_size: i64) -> Self {
        Self {
            src,
            dst,
            production_rate: 1,
            consumption_rate: 1,
            initial_tokens,
            token_size,
        }
    }

    pub fn with_rates(mut self, production: i64, consumption: i64) -> Self {
        self.production_rate = production;
        self.consumption_rate = consumption;
        self
    }
}

/// An independent periodic task with an implicit or explicit deadline.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeriodicTask {
    pub name: String,
    pub period: i64,
    pub deadline: i64,
}

impl PeriodicTask {
    /// Task with deadline equal to its period.
    pub fn new(name: impl Into<String>, period: i64) -> Self {
        Self {
            name: name.into(),
            period,
            deadline: period,
        }
    }

    pub fn with_deadline(mut self, deadline: i64) -> Self {
        self.deadline = deadline;
        self
    }
}

/// Everything the application side contributes to a model.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ApplicationSet {
    pub actors: Vec<Actor>,
    pub channels: Vec<Channel>,
    pub tasks: Vec<PeriodicTask>,
    pub n_apps: usize,
}

impl ApplicationSet {
    pub fn n_actors(&self) -> usize {
        self.actors.len()
    }

    pub fn n_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Global entity count: firings first, then tasks.
    pub fn n_entities(&self) -> usize {
        self.actors.len() + self.tasks.len()
    }

    /// Rate-monotonic priorities: rank by period, shortest first, ties by
    /// index. Priority 0 is the highest.
    pub fn rate_monotonic_priorities(&self) -> Vec<i64> {
        let mut order: Vec<usize> = (0..self.tasks.len()).collect();
        order.sort_by_key(|&t| (self.tasks[t].period, t));
        let mut priorities = vec![0i64; self.tasks.len()];
        for (rank, &t) in order.iter().enumerate() {
            priorities[t] = rank as i64;
        }
        priorities
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        for (i, actor) in self.actors.iter().enumerate() {
            if actor.app >= self.n_apps {
                return Err(ModelError::InvalidApplications {
                    reason: format!(
                        "actor {i} names application {} of {}",
                        actor.app, self.n_apps
                    ),
                });
            }
        }
        for (c, ch) in self.channels.iter().enumerate() {
            for actor in [ch.src, ch.dst] {
                if actor >= self.actors.len() {
                    return Err(ModelError::UndefinedActor { channel: c, actor });
                }
            }
            if ch.initial_tokens < 0 {
                return Err(ModelError::InvalidApplications {
                    reason: format!("channel {c} has negative initial tokens"),
                });
            }
            if ch.production_rate < 1 || ch.consumption_rate < 1 {
                return Err(ModelError::InvalidApplications {
                    reason: format!("channel {c} has non-positive rates"),
                });
            }
        }
        for (t, task) in self.tasks.iter().enumerate() {
            if task.period <= 0 || task.deadline <= 0 || task.deadline > task.period {
                return Err(ModelError::InvalidTask {
                    task: t,
                    period: task.period,
                    deadline: task.deadline,
                });
            }
        }
        Ok(())
    }
}
