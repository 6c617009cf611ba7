//! Adaptive substepping of one external increment.
//!
//! A trial sweep over the full increment (on a scratch copy of the reservoir)
//! gives the erosion rates the CFL bound is evaluated from. The increment is
//! then split into equal substeps; forcing is refreshed from the updated
//! elevation before every substep after the first, and each substep's bed
//! lowering and reservoir change are applied to the surface.

use tracing::debug;

use crate::cfl::{self, CflConfig, SubstepPlan};
use crate::error::{Result, SedFluxError};
use crate::network::DrainageNetwork;
use crate::sweep::{FluxState, NodeForcing, SweepEngine};

/// Residual above which a node is counted as not converged.
pub const CONVERGENCE_TOLERANCE: f64 = 1.0e-3;

/// Re-derives per-node forcing from the current elevation.
pub trait ChannelForcing {
    /// Update `forcing` in place for `elevation`.
    fn refresh(&mut self, elevation: &[f64], forcing: &mut NodeForcing);
}

/// Forcing that never changes between substeps.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedForcing;

impl ChannelForcing for FixedForcing {
    fn refresh(&mut self, _elevation: &[f64], _forcing: &mut NodeForcing) {}
}

/// Result of one external increment.
#[derive(Clone, Debug)]
pub struct SubstepOutcome {
    /// How the increment was split.
    pub plan: SubstepPlan,
    /// Sweep results from the final substep.
    pub state: FluxState,
    /// Net elevation change per node over the whole increment.
    pub elevation_change: Vec<f64>,
    /// Bulk volume detached over the increment.
    pub eroded_volume: f64,
    /// Net change in stored channel sediment volume over the increment
    /// (negative when the reservoir drains).
    pub deposited_volume: f64,
    /// Exogenous sediment volume supplied over the increment.
    pub supplied_volume: f64,
    /// Bulk volume that reached outlets and left the domain.
    pub exported_volume: f64,
    /// Largest residual seen in any substep.
    pub max_error: f64,
    /// Nodes above [`CONVERGENCE_TOLERANCE`] in the final substep.
    pub non_converged: usize,
}

/// Splits increments and drives the sweep.
#[derive(Clone, Copy, Debug)]
pub struct SubstepController {
    engine: SweepEngine,
    cfl: CflConfig,
}

impl SubstepController {
    /// Build a controller; `max_cfl` must be positive.
    pub fn new(engine: SweepEngine, cfl: CflConfig) -> Result<Self> {
        if !(cfl.max_cfl > 0.0 && cfl.max_cfl.is_finite()) {
            return Err(SedFluxError::InvalidParameter(format!(
                "max_cfl must be positive and finite, got {}",
                cfl.max_cfl
            )));
        }
        if cfl.max_substeps == 0 {
            return Err(SedFluxError::InvalidParameter("max_substeps must be at least 1".into()));
        }
        Ok(Self { engine, cfl })
    }

    /// Sweep engine in use.
    pub fn engine(&self) -> &SweepEngine {
        &self.engine
    }

    /// CFL settings.
    pub fn cfl(&self) -> CflConfig {
        self.cfl
    }

    /// Plan `dt` from a trial sweep without touching the reservoir.
    pub fn plan(
        &self,
        network: &DrainageNetwork,
        forcing: &NodeForcing,
        elevation: &[f64],
        reservoir: &[f64],
        dt: f64,
    ) -> Result<SubstepPlan> {
        if !(dt >= 0.0 && dt.is_finite()) {
            return Err(SedFluxError::InvalidParameter(format!(
                "time step must be finite and non-negative, got {dt}"
            )));
        }
        check_len("topographic__elevation", elevation.len(), network.len())?;
        let mut scratch = reservoir.to_vec();
        let trial = self.engine.run(network, forcing, &mut scratch, dt)?;
        let t_min = cfl::min_closing_time(network, elevation, &trial.elevation_rate);
        Ok(cfl::plan(dt, t_min, self.cfl))
    }

    /// Advance `elevation` and `reservoir` by `dt`.
    ///
    /// `forcing` must already hold values for the current elevation; `refresher`
    /// updates it before each later substep.
    pub fn advance<F: ChannelForcing>(
        &self,
        network: &DrainageNetwork,
        forcing: &mut NodeForcing,
        refresher: &mut F,
        elevation: &mut [f64],
        reservoir: &mut [f64],
        dt: f64,
    ) -> Result<SubstepOutcome> {
        let n = network.len();
        let plan = self.plan(network, forcing, elevation, reservoir, dt)?;
        debug!(
            substeps = plan.substeps,
            dt_sub = plan.dt_sub,
            raw_cfl = plan.raw_cfl,
            "substep plan"
        );

        let mut state = FluxState::new(n);
        let mut change = vec![0.0; n];
        let mut before = vec![0.0; n];
        let initial = reservoir.to_vec();
        let mut eroded = 0.0;
        let mut supplied = 0.0;
        let mut exported = 0.0;
        let mut max_error: f64 = 0.0;

        for k in 0..plan.substeps {
            if k > 0 {
                refresher.refresh(elevation, forcing);
            }
            before.copy_from_slice(reservoir);
            self.engine.sweep(network, forcing, reservoir, plan.dt_sub, &mut state)?;
            for i in 0..n {
                let dz = state.elevation_rate[i] * plan.dt_sub + (reservoir[i] - before[i]);
                elevation[i] += dz;
                change[i] += dz;
            }
            eroded += state.total_generation() * plan.dt_sub;
            supplied += forcing.local_sediment_supply.iter().sum::<f64>() * plan.dt_sub;
            for outlet in network.outlets() {
                exported += (state.total_supply[outlet] + state.generation_rate[outlet]) * plan.dt_sub;
            }
            max_error = max_error.max(state.max_error());
        }

        // Stored sediment released and re-deposited within the increment nets out.
        let deposited: f64 = reservoir
            .iter()
            .zip(&initial)
            .zip(&forcing.cell_area)
            .map(|((&after, &start), &area)| (after - start) * area)
            .sum();
        let non_converged = state.count_above(CONVERGENCE_TOLERANCE);
        debug!(eroded, supplied, deposited, exported, max_error, non_converged, "substeps complete");

        Ok(SubstepOutcome {
            plan,
            state,
            elevation_change: change,
            eroded_volume: eroded,
            deposited_volume: deposited,
            supplied_volume: supplied,
            exported_volume: exported,
            max_error,
            non_converged,
        })
    }
}

fn check_len(field: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(SedFluxError::FieldLength { field: field.to_string(), expected, actual });
    }
    Ok(())
}
