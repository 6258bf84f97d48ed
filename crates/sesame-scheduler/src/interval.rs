//! Interval planner for launches inside a fixed time budget.
//!
//! Launches are spread over `budget - margin` with a jittered baseline so
//! the start times never form a perfectly periodic pattern. The margin is
//! reserved for settling every started session before the window closes.

use std::time::Duration;

use rand::Rng;

/// Relative spread of each delay around the baseline (±20%).
const DEFAULT_JITTER: f64 = 0.2;

/// Precomputed launch delays. `delays[i]` separates launch `i + 1` from
/// launch `i + 2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalPlan {
    baseline: Duration,
    delays: Vec<Duration>,
}

impl IntervalPlan {
    pub fn baseline(&self) -> Duration {
        self.baseline
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    pub fn total(&self) -> Duration {
        self.delays.iter().sum()
    }

    /// Elapsed time at each planned launch, starting at zero.
    pub fn launch_offsets(&self) -> Vec<Duration> {
        let mut at = Duration::ZERO;
        let mut offsets = Vec::with_capacity(self.delays.len() + 1);
        offsets.push(at);
        for d in &self.delays {
            at += *d;
            offsets.push(at);
        }
        offsets
    }

    /// Settlement follows launch order: 1, 2, .., n.
    pub fn settlement_order(&self) -> Vec<u32> {
        (1..=self.delays.len() as u32 + 1).collect()
    }
}

/// Spreads session launches across a budget while keeping a safety margin.
#[derive(Debug, Clone, Copy)]
pub struct IntervalScheduler {
    budget: Duration,
    margin: Duration,
    jitter: f64,
}

impl IntervalScheduler {
    pub fn new(budget: Duration, margin: Duration) -> Self {
        Self {
            budget,
            margin,
            jitter: DEFAULT_JITTER,
        }
    }

    /// Override the relative jitter, clamped to `[0, 1]`.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn margin(&self) -> Duration {
        self.margin
    }

    /// Time available for launches.
    pub fn usable(&self) -> Duration {
        self.budget.saturating_sub(self.margin)
    }

    /// A launch is allowed only while `elapsed <= budget - margin`.
    pub fn may_launch(&self, elapsed: Duration) -> bool {
        elapsed <= self.usable()
    }

    /// Plan `session_count` launches. Randomness comes from the caller.
    pub fn plan<R: Rng>(&self, session_count: u32, rng: &mut R) -> IntervalPlan {
        if session_count <= 1 {
            return IntervalPlan {
                baseline: Duration::ZERO,
                delays: Vec::new(),
            };
        }

        let usable_ms = self.usable().as_millis() as u64;
        let baseline_ms = usable_ms / u64::from(session_count);
        let spread = (baseline_ms as f64 * self.jitter) as i64;

        let mut allowance = usable_ms;
        let mut delays = Vec::with_capacity(session_count as usize - 1);
        for _ in 1..session_count {
            let offset = if spread > 0 { rng.gen_range(-spread..=spread) } else { 0 };
            let jittered = (baseline_ms as i64 + offset).max(0) as u64;
            let delay = jittered.min(allowance);
            allowance -= delay;
            delays.push(Duration::from_millis(delay));
        }

        IntervalPlan {
            baseline: Duration::from_millis(baseline_ms),
            delays,
        }
    }

    /// Delay to wait after launch `round_index` (1-based), given the
    /// budget still remaining. Never eats into the margin.
    pub fn next_delay(
        &self,
        plan: &IntervalPlan,
        round_index: u32,
        session_count: u32,
        remaining: Duration,
    ) -> Duration {
        if session_count <= 1 || round_index == 0 || round_index >= session_count {
            return Duration::ZERO;
        }
        let planned = plan
            .delays
            .get(round_index as usize - 1)
            .copied()
            .unwrap_or(plan.baseline);
        planned.min(remaining.saturating_sub(self.margin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const BUDGET: Duration = Duration::from_millis(12_000);
    const MARGIN: Duration = Duration::from_millis(2_200);

    #[test]
    fn test_single_session_has_no_delays() {
        let sched = IntervalScheduler::new(BUDGET, MARGIN);
        let mut rng = StdRng::seed_from_u64(1);
        for count in [0, 1] {
            let plan = sched.plan(count, &mut rng);
            assert!(plan.delays().is_empty());
            assert_eq!(sched.next_delay(&plan, 1, count, BUDGET), Duration::ZERO);
        }
    }

    #[test]
    fn test_baseline_and_bounded_jitter() {
        let sched = IntervalScheduler::new(BUDGET, MARGIN);
        let mut rng = StdRng::seed_from_u64(7);
        let plan = sched.plan(5, &mut rng);

        assert_eq!(plan.baseline(), Duration::from_millis(1_960));
        assert_eq!(plan.delays().len(), 4);
        for d in plan.delays() {
            let ms = d.as_millis() as u64;
            assert!((1_568..=2_352).contains(&ms), "delay {ms}ms out of range");
        }
    }

    #[test]
    fn test_plan_fits_budget_for_any_count() {
        let sched = IntervalScheduler::new(BUDGET, MARGIN);
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            for count in 1..=40 {
                let plan = sched.plan(count, &mut rng);
                assert!(plan.total() + MARGIN <= BUDGET);
                for offset in plan.launch_offsets() {
                    assert!(sched.may_launch(offset));
                }
            }
        }
    }

    #[test]
    fn test_delays_are_not_periodic() {
        let sched = IntervalScheduler::new(BUDGET, MARGIN);
        let mut rng = StdRng::seed_from_u64(42);
        let plan = sched.plan(10, &mut rng);
        let first = plan.delays()[0];
        assert!(plan.delays().iter().any(|d| *d != first));
    }

    #[test]
    fn test_next_delay_respects_margin() {
        let sched = IntervalScheduler::new(BUDGET, MARGIN);
        let mut rng = StdRng::seed_from_u64(3);
        let plan = sched.plan(5, &mut rng);

        assert_eq!(sched.next_delay(&plan, 1, 5, BUDGET), plan.delays()[0]);
        assert_eq!(
            sched.next_delay(&plan, 2, 5, Duration::from_millis(3_000)),
            Duration::from_millis(800)
        );
        assert_eq!(sched.next_delay(&plan, 3, 5, Duration::from_millis(2_000)), Duration::ZERO);
        // no delay after the last launch
        assert_eq!(sched.next_delay(&plan, 5, 5, BUDGET), Duration::ZERO);
    }

    #[test]
    fn test_zero_jitter_is_periodic() {
        let sched = IntervalScheduler::new(BUDGET, MARGIN).with_jitter(0.0);
        let mut rng = StdRng::seed_from_u64(0);
        let plan = sched.plan(4, &mut rng);
        assert!(plan.delays().iter().all(|d| *d == Duration::from_millis(2_450)));
        assert_eq!(plan.settlement_order(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_may_launch_boundary() {
        let sched = IntervalScheduler::new(BUDGET, MARGIN);
        assert!(sched.may_launch(Duration::from_millis(9_800)));
        assert!(!sched.may_launch(Duration::from_millis(9_801)));
    }
}
