//! Solution extraction.

/// A complete mapping with its derived metrics.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mapping {
    /// Processor per entity.
    pub proc: Vec<usize>,
    /// Mode per processor.
    pub proc_mode: Vec<usize>,
    /// Firing successor chains (actors plus one slot per processor).
    pub next: Vec<usize>,
    pub send_next: Vec<usize>,
    pub rec_next: Vec<usize>,
    pub send_buffers: Vec<i64>,
    pub rec_buffers: Vec<i64>,
    /// Steady-state period per application.
    pub periods: Vec<i64>,
    /// First-iteration latency per application.
    pub latencies: Vec<i64>,
    pub procs_used: i64,
    /// Mean long-run utilization of the processors in use.
    pub utilization: f64,
    pub power: i64,
    pub area: i64,
    pub cost: i64,
}

impl Mapping {
    /// One CSV row: `latencies…, periods…, procsUsed, utilization,
    /// power, area, cost`.
    pub fn csv_row(&self) -> String {
        let mut fields: Vec<String> = Vec::new();
        fields.extend(self.latencies.iter().map(|v| v.to_string()));
        fields.extend(self.periods.iter().map(|v| v.to_string()));
        fields.push(self.procs_used.to_string());
        fields.push(format!("{:.4}", self.utilization));
        fields.push(self.power.to_string());
        fields.push(self.area.to_string());
        fields.push(self.cost.to_string());
        fields.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_row_layout() {
        let m = Mapping {
            proc: vec![0, 0],
            proc_mode: vec![0],
            next: vec![1, 2, 0],
            send_next: vec![1, 1],
            rec_next: vec![1],
            send_buffers: vec![2],
            rec_buffers: vec![2],
            periods: vec![10],
            latencies: vec![14],
            procs_used: 1,
            utilization: 0.5,
            power: 30,
            area: 4,
            cost: 100,
        };
        assert_eq!(m.csv_row(), "14,10,1,0.5000,30,4,100");
    }
}
