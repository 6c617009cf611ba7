//! CFL (Courant-Friedrichs-Lewy) bound for channel incision substeps.
//!
//! A node lowering faster than its receiver closes the elevation gap between
//! them in `t = (z_i − z_r) / (rate_r − rate_i)`. Stepping past that time lets a
//! channel reverse its own slope. For an increment Δt the Courant number is
//! C = Δt / min(t); the increment is split into `n = ceil(C / CFL_MAX)` equal
//! substeps (CFL_MAX = 0.3), capped at a hard maximum.

use tracing::warn;

use crate::network::DrainageNetwork;

/// Substep limiter configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CflConfig {
    /// Maximum allowed Courant number per substep (default: 0.3).
    pub max_cfl: f64,
    /// Upper bound on substeps per external step (default: 128).
    pub max_substeps: u32,
}

impl Default for CflConfig {
    fn default() -> Self {
        Self { max_cfl: 0.3, max_substeps: 128 }
    }
}

/// How an external increment is subdivided.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubstepPlan {
    /// Number of equal substeps (≥ 1).
    pub substeps: u32,
    /// Length of each substep.
    pub dt_sub: f64,
    /// Courant number of the undivided increment (0 when unconstrained).
    pub raw_cfl: f64,
    /// Courant number of one substep.
    pub capped_cfl: f64,
    /// Whether `max_substeps` cut the plan short.
    pub was_capped: bool,
}

/// Time for the gap between a node and its receiver to close, if it is closing.
#[inline]
pub fn closing_time(gap: f64, closing_rate: f64) -> Option<f64> {
    (gap > 0.0 && closing_rate > 0.0).then(|| gap / closing_rate)
}

/// Shortest closing time across all non-outlet nodes (∞ when nothing closes).
pub fn min_closing_time(network: &DrainageNetwork, elevation: &[f64], elevation_rate: &[f64]) -> f64 {
    let mut best = f64::INFINITY;
    for node in 0..network.len() {
        let r = network.receiver(node);
        if r == node {
            continue;
        }
        let gap = elevation[node] - elevation[r];
        let closing = elevation_rate[r] - elevation_rate[node];
        if let Some(t) = closing_time(gap, closing) {
            best = best.min(t);
        }
    }
    best
}

/// Split `dt` so each substep satisfies C ≤ max_cfl.
///
/// # Formula
/// C = dt / t_min
/// n = clamp(ceil(C / max_cfl), 1, max_substeps)
pub fn plan(dt: f64, t_min: f64, config: CflConfig) -> SubstepPlan {
    let max_substeps = config.max_substeps.max(1);
    let raw_cfl = if dt > 0.0 && t_min.is_finite() && t_min > 0.0 {
        dt / t_min
    } else if dt > 0.0 && t_min <= 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    let wanted = (raw_cfl / config.max_cfl).ceil();
    let (substeps, was_capped) = if !wanted.is_finite() || wanted > max_substeps as f64 {
        (max_substeps, true)
    } else {
        ((wanted as u32).max(1), false)
    };

    if was_capped {
        warn!(
            raw_cfl,
            max_substeps, "substep cap reached; the step may overshoot the stable increment"
        );
    }

    let n = substeps as f64;
    SubstepPlan {
        substeps,
        dt_sub: if dt > 0.0 { dt / n } else { dt },
        raw_cfl,
        capped_cfl: raw_cfl / n,
        was_capped,
    }
}

/// Substep statistics over many external steps.
#[derive(Debug)]
pub struct CflStats {
    /// External steps planned.
    pub steps: u32,
    /// Substeps taken in total.
    pub substeps: u64,
    /// Steps cut short by the cap.
    pub capped_steps: u32,
    /// Largest per-substep Courant number seen.
    pub max_cfl: f64,
}

impl CflStats {
    /// Update statistics with a new plan.
    pub fn update(&mut self, plan: &SubstepPlan) {
        self.steps += 1;
        self.substeps += u64::from(plan.substeps);
        if plan.was_capped {
            self.capped_steps += 1;
        }
        self.max_cfl = self.max_cfl.max(plan.capped_cfl);
    }

    /// Mean substeps per external step.
    pub fn mean_substeps(&self) -> f64 {
        if self.steps == 0 {
            0.0
        } else {
            self.substeps as f64 / f64::from(self.steps)
        }
    }
}

impl Default for CflStats {
    fn default() -> Self {
        Self { steps: 0, substeps: 0, capped_steps: 0, max_cfl: 0.0 }
    }
}
