//! Forward simulation of a preemptive fixed-priority scheduler.

/// A periodic task instance for simulation.
#[derive(Debug, Clone, Copy)]
pub struct SimTask {
    /// Release period.
    pub period: i64,
    /// Relative deadline (from release).
    pub deadline: i64,
    /// Worst-case execution time.
    pub wcet: i64,
    /// Priority; lower value means higher priority.
    pub priority: i64,
}

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn lcm(a: i64, b: i64) -> i64 {
    a / gcd(a, b) * b
}

/// Simulates all tasks on one processor over one hyperperiod.
///
/// Returns `true` iff no job misses its deadline. All tasks release their
/// first job at time zero (the critical instant), which makes the
/// simulation exact for synchronous task sets: if the first busy period
/// is schedulable, every later one is.
pub fn simulate_fixed_priority(tasks: &[SimTask]) -> bool {
    if tasks.is_empty() {
        return true;
    }
    let hyper = tasks.iter().map(|t| t.period).fold(1, lcm);

    // remaining work and absolute deadline of the current job of each task
    let mut remaining: Vec<i64> = tasks.iter().map(|t| t.wcet).collect();
    let mut deadline: Vec<i64> = tasks.iter().map(|t| t.deadline).collect();

    for now in 0..hyper {
        for (i, t) in tasks.iter().enumerate() {
            if now > 0 && now % t.period == 0 {
                if remaining[i] > 0 {
                    return false; // previous job still unfinished at re-release
                }
                remaining[i] = t.wcet;
                deadline[i] = now + t.deadline;
            }
        }

        // run the highest-priority pending job for one time unit
        let running = (0..tasks.len())
            .filter(|&i| remaining[i] > 0)
            .min_by_key(|&i| tasks[i].priority);
        if let Some(i) = running {
            remaining[i] -= 1;
        }

        // a job must have finished by its absolute deadline
        for i in 0..tasks.len() {
            if remaining[i] > 0 && now + 1 >= deadline[i] {
                return false;
            }
        }
    }

    remaining.iter().all(|&r| r == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_task_trivially_schedulable() {
        let tasks = [SimTask {
            period: 10,
            deadline: 10,
            wcet: 3,
            priority: 0,
        }];
        assert!(simulate_fixed_priority(&tasks));
    }

    #[test]
    fn test_two_tasks_half_utilization() {
        // T1(10,3) prio 0, T2(20,4) prio 1: utilization 0.5
        let tasks = [
            SimTask {
                period: 10,
                deadline: 10,
                wcet: 3,
                priority: 0,
            },
            SimTask {
                period: 20,
                deadline: 20,
                wcet: 4,
                priority: 1,
            },
        ];
        assert!(simulate_fixed_priority(&tasks));
    }

    #[test]
    fn test_overload_misses_deadline() {
        let tasks = [
            SimTask {
                period: 4,
                deadline: 4,
                wcet: 3,
                priority: 0,
            },
            SimTask {
                period: 8,
                deadline: 8,
                wcet: 4,
                priority: 1,
            },
        ];
        // utilization 1.25: cannot be schedulable
        assert!(!simulate_fixed_priority(&tasks));
    }

    #[test]
    fn test_full_utilization_harmonic() {
        // harmonic periods reach 100% utilization without misses
        let tasks = [
            SimTask {
                period: 4,
                deadline: 4,
                wcet: 2,
                priority: 0,
            },
            SimTask {
                period: 8,
                deadline: 8,
                wcet: 4,
                priority: 1,
            },
        ];
        assert!(simulate_fixed_priority(&tasks));
    }

    #[test]
    fn test_empty_set() {
        assert!(simulate_fixed_priority(&[]));
    }
}
