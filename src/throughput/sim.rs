//! Self-timed execution of an MSAG.
//!
//! A max-plus recurrence over firing completion times: firing `k` of a
//! node ends at its own delay plus the latest completion it waits on,
//! where an edge with `tok` tokens makes iteration `k` of the consumer
//! wait on iteration `k - tok` of the producer. Completions before the
//! first iteration are taken as time zero, the synchronous start.
//!
//! Unlike the cycle-ratio bound this yields concrete timestamps, so it
//! doubles as the latency extractor at complete assignments and as the
//! reference semantics the propagator tests compare against.

use super::msag::Msag;
use crate::error::Conflict;

/// Completion times of a self-timed execution.
#[derive(Debug, Clone)]
pub struct SelfTimedRun {
    /// `end_times[k][v]`: completion time of iteration `k` of node `v`.
    pub end_times: Vec<Vec<i64>>,
    /// Steady-state period observed over the final iterations.
    pub period: i64,
}

impl SelfTimedRun {
    /// End-to-end latency of one application: completion of its last
    /// firing in the first iteration, counted from the synchronous start.
    pub fn latency(&self, msag: &Msag, app: usize) -> i64 {
        self.end_times[0]
            .iter()
            .zip(&msag.nodes)
            .filter(|(_, node)| node.app == Some(app))
            .map(|(&t, _)| t)
            .max()
            .unwrap_or(0)
    }
}

/// Executes `msag` for `iterations` rounds.
///
/// Within one iteration only zero-token edges impose ordering, so nodes
/// are processed in topological order of the zero-token subgraph; a cycle
/// there means no firing can ever start and the run reports a deadlock.
pub fn self_timed_execution(msag: &Msag, iterations: usize) -> Result<SelfTimedRun, Conflict> {
    let n = msag.nodes.len();
    let order = zero_token_topo_order(msag)?;

    // in-edges per node; the (delay, 1) self-loops enter like any other
    // edge and serialize successive firings of the same node
    let mut in_edges: Vec<Vec<(usize, i64)>> = vec![Vec::new(); n];
    for e in &msag.edges {
        in_edges[e.dst].push((e.src, e.tokens));
    }

    let mut end_times: Vec<Vec<i64>> = Vec::with_capacity(iterations);
    for k in 0..iterations {
        let mut end = vec![0i64; n];
        for &v in &order {
            let mut start = 0i64;
            for &(u, tok) in &in_edges[v] {
                let dep = if tok as usize > k {
                    0
                } else if tok == 0 {
                    end[u]
                } else {
                    end_times[k - tok as usize][u]
                };
                start = start.max(dep);
            }
            end[v] = start + msag.nodes[v].delay;
        }
        end_times.push(end);
    }

    let period = if iterations >= 2 {
        let last = &end_times[iterations - 1];
        let prev = &end_times[iterations - 2];
        (0..n).map(|v| last[v] - prev[v]).max().unwrap_or(0)
    } else {
        0
    };

    Ok(SelfTimedRun { end_times, period })
}

/// Topological order of the zero-token subgraph, or the node on a
/// zero-token cycle if one exists.
fn zero_token_topo_order(msag: &Msag) -> Result<Vec<usize>, Conflict> {
    let n = msag.nodes.len();
    let mut in_deg = vec![0usize; n];
    let mut succ: Vec<Vec<usize>> = vec![Vec::new(); n];
    for e in &msag.edges {
        if e.tokens == 0 && e.src != e.dst {
            in_deg[e.dst] += 1;
            succ[e.src].push(e.dst);
        }
    }
    let mut queue: Vec<usize> = (0..n).filter(|&v| in_deg[v] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(v) = queue.pop() {
        order.push(v);
        for &w in &succ[v] {
            in_deg[w] -= 1;
            if in_deg[w] == 0 {
                queue.push(w);
            }
        }
    }
    if order.len() < n {
        let node = (0..n).find(|&v| in_deg[v] > 0).unwrap_or(0);
        return Err(Conflict::Deadlock { node });
    }
    Ok(order)
}
