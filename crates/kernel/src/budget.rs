use std::cell::Cell;

/// The host's view of how much compute the current cycle has used.
///
/// Polled before every unit of work; exceeding `limit` gets the whole cycle
/// killed by the host, so the kernel never starts work without capacity.
pub trait CpuBudget {
    fn used(&self) -> f64;

    fn limit(&self) -> f64;

    fn remaining(&self) -> f64 {
        self.limit() - self.used()
    }
}

/// True while at least `margin` cpu remains in the cycle.
pub fn has_capacity<B: CpuBudget + ?Sized>(budget: &B, margin: f64) -> bool {
    budget.remaining() >= margin
}

/// Simulated cpu counter for hosts that have no real clock.
///
/// Work is charged explicitly with [`CpuMeter::charge`]; every poll of
/// [`CpuBudget::used`] may additionally cost `poll_cost`, which models the
/// scheduler's own overhead and keeps step-only workloads bounded.
#[derive(Debug, Default)]
pub struct CpuMeter {
    used: Cell<f64>,
    limit: f64,
    poll_cost: f64,
}

impl CpuMeter {
    pub fn new(limit: f64) -> Self {
        Self {
            used: Cell::new(0.0),
            limit,
            poll_cost: 0.0,
        }
    }

    pub fn with_poll_cost(mut self, poll_cost: f64) -> Self {
        self.poll_cost = poll_cost;
        self
    }

    pub fn charge(&self, amount: f64) {
        self.used.set(self.used.get() + amount);
    }

    /// Start a new cycle.
    pub fn reset(&self) {
        self.used.set(0.0);
    }

    /// Current usage without charging a poll.
    pub fn peek(&self) -> f64 {
        self.used.get()
    }
}

impl CpuBudget for CpuMeter {
    fn used(&self) -> f64 {
        let used = self.used.get();
        self.used.set(used + self.poll_cost);
        used
    }

    fn limit(&self) -> f64 {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_respects_margin() {
        let meter = CpuMeter::new(10.0);
        meter.charge(7.0);
        assert!(has_capacity(&meter, 3.0));
        assert!(!has_capacity(&meter, 3.5));
    }

    #[test]
    fn at_the_limit_with_no_margin_still_has_capacity() {
        let meter = CpuMeter::new(5.0);
        meter.charge(5.0);
        assert!(has_capacity(&meter, 0.0));
        meter.charge(0.1);
        assert!(!has_capacity(&meter, 0.0));
    }

    #[test]
    fn polls_cost_when_configured() {
        let meter = CpuMeter::new(2.0).with_poll_cost(1.0);
        assert!(has_capacity(&meter, 0.0)); // used 0 -> 1
        assert!(has_capacity(&meter, 0.0)); // used 1 -> 2
        assert!(has_capacity(&meter, 0.0)); // used 2 -> 3
        assert!(!has_capacity(&meter, 0.0));
        meter.reset();
        assert_eq!(meter.peek(), 0.0);
    }
}
