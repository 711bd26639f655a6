use std::collections::HashMap;

use chrono::{DateTime, Utc};
use coopos_core::{ExitReason, ThreadKey};
use serde::Serialize;

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleEnd {
    /// Remaining budget dropped below the safety margin.
    Exhausted,
    /// No thread was ready to run.
    Idle,
}

/// Summary of one [`Kernel::run_cycle`](super::Kernel::run_cycle) call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    /// Steps taken, one per resumed thread.
    pub resumed: usize,
    pub spawned: usize,
    /// Resumptions that ended waiting on a lock.
    pub blocked: usize,
    pub faults: usize,
    pub exits: HashMap<ExitReason, usize>,
    /// Threads rebuilt from a previous boot's records.
    pub restored: usize,
    pub end: CycleEnd,
    pub cpu_used: f64,
}

impl CycleReport {
    pub(crate) fn new(cycle: u64) -> Self {
        Self {
            cycle,
            started_at: Utc::now(),
            resumed: 0,
            spawned: 0,
            blocked: 0,
            faults: 0,
            exits: HashMap::new(),
            restored: 0,
            end: CycleEnd::Idle,
            cpu_used: 0.0,
        }
    }

    pub(crate) fn record_exit(&mut self, reason: ExitReason) {
        *self.exits.entry(reason).or_default() += 1;
    }

    pub fn exits_for(&self, reason: ExitReason) -> usize {
        self.exits.get(&reason).copied().unwrap_or(0)
    }
}

/// Cumulative kernel counters across cycles.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KernelMetrics {
    pub cycles: u64,
    pub threads_spawned: u64,
    pub exits: HashMap<ExitReason, u64>,
    /// Failed steps by thread key.
    pub faults_by_key: HashMap<ThreadKey, u64>,
    /// Cycles that stopped because the budget ran out.
    pub exhausted_cycles: u64,
    pub avg_cpu_per_cycle: f64,
    pub last_cycle: Option<DateTime<Utc>>,
}

impl KernelMetrics {
    pub(crate) fn record_spawn(&mut self, count: usize) {
        self.threads_spawned += count as u64;
    }

    pub(crate) fn record_exit(&mut self, reason: ExitReason) {
        *self.exits.entry(reason).or_default() += 1;
    }

    pub(crate) fn record_fault(&mut self, key: &str) {
        *self.faults_by_key.entry(key.to_string()).or_default() += 1;
    }

    /// Fold a finished cycle into the totals.
    pub(crate) fn record_cycle(&mut self, report: &CycleReport) {
        self.cycles += 1;
        if report.end == CycleEnd::Exhausted {
            self.exhausted_cycles += 1;
        }
        self.last_cycle = Some(report.started_at);

        // Incremental mean: new_avg = prev_avg + (x - prev_avg) / n
        let n = self.cycles as f64;
        self.avg_cpu_per_cycle += (report.cpu_used - self.avg_cpu_per_cycle) / n;
    }

    pub fn total_exits(&self) -> u64 {
        self.exits.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_cycle_averages_cpu() {
        let mut m = KernelMetrics::default();
        let mut r = CycleReport::new(1);
        r.cpu_used = 10.0;
        m.record_cycle(&r);
        r.cpu_used = 20.0;
        r.end = CycleEnd::Exhausted;
        m.record_cycle(&r);

        assert_eq!(m.cycles, 2);
        assert_eq!(m.exhausted_cycles, 1);
        assert!((m.avg_cpu_per_cycle - 15.0).abs() < 1e-9, "got {}", m.avg_cpu_per_cycle);
        assert!(m.last_cycle.is_some());
    }

    #[test]
    fn exits_are_counted_by_reason() {
        let mut r = CycleReport::new(3);
        r.record_exit(ExitReason::Ceased);
        r.record_exit(ExitReason::Ceased);
        r.record_exit(ExitReason::Completed);
        assert_eq!(r.exits_for(ExitReason::Ceased), 2);
        assert_eq!(r.exits_for(ExitReason::Faulted), 0);
    }

    #[test]
    fn default_metrics() {
        let m = KernelMetrics::default();
        assert_eq!(m.cycles, 0);
        assert_eq!(m.total_exits(), 0);
        assert!(m.faults_by_key.is_empty());
    }
}
