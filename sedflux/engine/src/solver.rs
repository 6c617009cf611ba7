//! Pseudo-implicit per-node flux solver.
//!
//! Erosion at a node depends on its relative sediment flux through the closure,
//! and the relative flux depends on how much the node itself erodes. The solver
//! breaks the loop with a bounded fixed-point iteration on the outgoing flux
//! ratio, reporting the last residual instead of failing when it does not settle.
//!
//! Units: volumes are bulk (transportable) volumes per unit time. The caller
//! supplies the detachment-limited volumetric generation rate and the bulk
//! volume released per unit of bed lowering; both already carry porosity.

use crate::closure::SedFluxClosure;

/// Result of resolving one node.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FluxSolveOutcome {
    /// Bed-lowering rate (positive when the bed goes down).
    pub lowering_rate: f64,
    /// Volumetric sediment rate leaving the node.
    pub discharge_out: f64,
    /// Mean of the clamped incoming and outgoing flux ratios.
    pub relative_flux: f64,
    /// Change in the outgoing ratio over the final iteration.
    pub error: f64,
    /// Bulk volume rate detached at the node.
    pub volume_generated: f64,
}

impl FluxSolveOutcome {
    /// Outcome for a node that can carry nothing.
    pub const ZERO_CAPACITY: FluxSolveOutcome = FluxSolveOutcome {
        lowering_rate: 0.0,
        discharge_out: 0.0,
        relative_flux: 1.0,
        error: 0.0,
        volume_generated: 0.0,
    };
}

/// Fixed-point solver bound to one closure and iteration budget.
#[derive(Clone, Copy, Debug)]
pub struct NodeFluxSolver {
    closure: SedFluxClosure,
    repeats: u32,
}

impl NodeFluxSolver {
    /// Build a solver; a budget of 0 runs a single iteration.
    pub fn new(closure: SedFluxClosure, repeats: u32) -> Self {
        Self { closure, repeats: repeats.max(1) }
    }

    /// Closure in use.
    pub fn closure(&self) -> &SedFluxClosure {
        &self.closure
    }

    /// Iteration budget.
    pub fn repeats(&self) -> u32 {
        self.repeats
    }

    /// Resolve one node.
    ///
    /// * `sed_in` - incoming volumetric sediment rate
    /// * `capacity` - transport capacity (volume rate)
    /// * `volume_potential` - undamped volumetric generation rate
    /// * `volume_per_unit_lowering` - bulk volume freed by one unit of lowering
    pub fn solve(
        &self,
        sed_in: f64,
        capacity: f64,
        volume_potential: f64,
        volume_per_unit_lowering: f64,
    ) -> FluxSolveOutcome {
        if !(capacity > 0.0) {
            return FluxSolveOutcome::ZERO_CAPACITY;
        }
        if sed_in >= capacity {
            // Already saturated: nothing can be added and the excess cannot pass.
            return FluxSolveOutcome {
                lowering_rate: 0.0,
                discharge_out: capacity,
                relative_flux: 1.0,
                error: if sed_in > capacity { 1.0 } else { 0.0 },
                volume_generated: 0.0,
            };
        }
        let rel_in = sed_in / capacity;
        let rel_in_c = clamp01(rel_in);

        let mut rel_out = rel_in_c;
        let mut prev = rel_out;
        let mut possible = rel_in;
        let mut added = 0.0;
        for _ in 0..self.repeats {
            let x = 0.5 * (rel_in_c + clamp01(rel_out));
            let damping = self.closure.eval(x);
            added = (volume_potential * damping).max(0.0);
            possible = rel_in + added / capacity;
            prev = rel_out;
            rel_out = possible.min(1.0);
            if rel_out == prev {
                break;
            }
        }

        let generated = if possible >= 1.0 || sed_in + added >= capacity {
            fill_headroom(sed_in, capacity)
        } else {
            added
        };
        // Built from its parts so supply + generation == discharge bit for bit.
        let discharge_out = sed_in + generated;
        let lowering_rate =
            if volume_per_unit_lowering > 0.0 { generated / volume_per_unit_lowering } else { 0.0 };

        FluxSolveOutcome {
            lowering_rate,
            discharge_out,
            relative_flux: 0.5 * (rel_in_c + rel_out),
            error: (rel_out - prev).abs(),
            volume_generated: generated,
        }
    }
}

/// Generation that tops `sed_in` up to `capacity` without the rounded sum
/// passing it. Requires `0 ≤ sed_in < capacity`.
fn fill_headroom(sed_in: f64, capacity: f64) -> f64 {
    let mut g = capacity - sed_in;
    while g > 0.0 && sed_in + g > capacity {
        g = next_down(g);
    }
    g
}

/// Next float toward zero for a positive finite `x`.
#[inline]
pub(crate) fn next_down(x: f64) -> f64 {
    f64::from_bits(x.to_bits() - 1)
}

/// Next float away from zero for a positive finite `x`.
#[inline]
pub(crate) fn next_up(x: f64) -> f64 {
    f64::from_bits(x.to_bits() + 1)
}

#[inline]
pub(crate) fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}
