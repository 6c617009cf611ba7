//! Downstream sweep over the drainage forest.
//!
//! Conventions:
//! - Nodes are visited headwaters first; a node's supply is the discharge of its
//!   donors, its local supply and whatever its channel reservoir releases.
//! - Volumes are bulk sediment volumes. Porosity `p` is the solid fraction: a
//!   rock volume `V` detached from the bed becomes a bulk volume `V / p`.
//! - `elevation_rate` is ≤ 0 (bed lowering); deposition is tracked as a volume
//!   rate and parked in the reservoir, not applied to the bed here.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Result, SedFluxError};
use crate::network::DrainageNetwork;
use crate::solver::{clamp01, next_up, NodeFluxSolver};

/// Per-node inputs for one sweep, refreshed by the erosion and transport laws.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeForcing {
    /// Cell area (> 0).
    pub cell_area: Vec<f64>,
    /// Detachment-limited bed-lowering rate (height per time, ≥ 0).
    pub erosion_capacity_rate: Vec<f64>,
    /// Volumetric transport capacity (≥ 0).
    pub transport_capacity: Vec<f64>,
    /// Exogenous bulk sediment input rate (≥ 0).
    pub local_sediment_supply: Vec<f64>,
    /// Nodes where no erosion is allowed this step.
    pub flooded: Vec<bool>,
}

impl NodeForcing {
    /// Forcing for `n` nodes with unit areas and everything else zero.
    pub fn new(n: usize) -> Self {
        Self {
            cell_area: vec![1.0; n],
            erosion_capacity_rate: vec![0.0; n],
            transport_capacity: vec![0.0; n],
            local_sediment_supply: vec![0.0; n],
            flooded: vec![false; n],
        }
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.cell_area.len()
    }

    /// True when empty.
    pub fn is_empty(&self) -> bool {
        self.cell_area.is_empty()
    }

    /// Check every array has `n` entries.
    pub fn check_len(&self, n: usize) -> Result<()> {
        let arrays = [
            ("cell_area", self.cell_area.len()),
            ("erosion_capacity_rate", self.erosion_capacity_rate.len()),
            ("transport_capacity", self.transport_capacity.len()),
            ("local_sediment_supply", self.local_sediment_supply.len()),
            ("flooded", self.flooded.len()),
        ];
        for (field, actual) in arrays {
            if actual != n {
                return Err(SedFluxError::FieldLength { field: field.to_string(), expected: n, actual });
            }
        }
        Ok(())
    }
}

/// How outlets (self-receivers) are resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutletPolicy {
    /// Same capacity, erosion and deposition rules as any other node.
    #[default]
    GeneralRule,
    /// Fixed base level: never erodes, reports its upstream inflow as
    /// discharge and deposits supply above capacity.
    BaseLevel,
}

/// Per-node sweep results, structure of arrays.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FluxState {
    /// Sediment leaving each node (volume rate).
    pub volumetric_discharge_out: Vec<f64>,
    /// Mean clamped in/out flux ratio.
    pub relative_sediment_flux: Vec<f64>,
    /// Relative flux is exactly 1.
    pub is_transport_limited: Vec<bool>,
    /// Volume rate left behind (≥ 0).
    pub deposition_rate: Vec<f64>,
    /// Bed-elevation rate (≤ 0).
    pub elevation_rate: Vec<f64>,
    /// Donor discharge + local supply + reservoir release.
    pub total_supply: Vec<f64>,
    /// Bulk volume rate detached from the bed.
    pub generation_rate: Vec<f64>,
    /// Residual of the per-node fixed point.
    pub error_in_sed_flux_fn: Vec<f64>,
}

impl FluxState {
    /// Zeroed state for `n` nodes.
    pub fn new(n: usize) -> Self {
        Self {
            volumetric_discharge_out: vec![0.0; n],
            relative_sediment_flux: vec![0.0; n],
            is_transport_limited: vec![false; n],
            deposition_rate: vec![0.0; n],
            elevation_rate: vec![0.0; n],
            total_supply: vec![0.0; n],
            generation_rate: vec![0.0; n],
            error_in_sed_flux_fn: vec![0.0; n],
        }
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.elevation_rate.len()
    }

    /// True when empty.
    pub fn is_empty(&self) -> bool {
        self.elevation_rate.is_empty()
    }

    fn resize(&mut self, n: usize) {
        if self.len() != n {
            *self = Self::new(n);
        }
    }

    /// Largest convergence residual.
    pub fn max_error(&self) -> f64 {
        self.error_in_sed_flux_fn.iter().copied().fold(0.0, f64::max)
    }

    /// Number of nodes whose residual exceeds `tol`.
    pub fn count_above(&self, tol: f64) -> usize {
        self.error_in_sed_flux_fn.iter().filter(|&&e| e > tol).count()
    }

    /// Total bulk volume rate detached.
    pub fn total_generation(&self) -> f64 {
        self.generation_rate.iter().sum()
    }

    /// Total volume rate deposited.
    pub fn total_deposition(&self) -> f64 {
        self.deposition_rate.iter().sum()
    }
}

/// Applies the per-node solver across a network.
#[derive(Clone, Copy, Debug)]
pub struct SweepEngine {
    solver: NodeFluxSolver,
    porosity: f64,
    outlet_policy: OutletPolicy,
}

impl SweepEngine {
    /// Build an engine; `porosity` must lie in (0, 1].
    pub fn new(solver: NodeFluxSolver, porosity: f64, outlet_policy: OutletPolicy) -> Result<Self> {
        if !(porosity > 0.0 && porosity <= 1.0) {
            return Err(SedFluxError::InvalidParameter(format!(
                "porosity must lie in (0, 1], got {porosity}"
            )));
        }
        Ok(Self { solver, porosity, outlet_policy })
    }

    /// Solver in use.
    pub fn solver(&self) -> &NodeFluxSolver {
        &self.solver
    }

    /// Solid fraction.
    pub fn porosity(&self) -> f64 {
        self.porosity
    }

    /// Outlet handling.
    pub fn outlet_policy(&self) -> OutletPolicy {
        self.outlet_policy
    }

    /// Sweep once and return fresh state.
    pub fn run(
        &self,
        network: &DrainageNetwork,
        forcing: &NodeForcing,
        reservoir: &mut [f64],
        dt: f64,
    ) -> Result<FluxState> {
        let mut state = FluxState::new(network.len());
        self.sweep(network, forcing, reservoir, dt, &mut state)?;
        Ok(state)
    }

    /// Sweep once into `state`.
    ///
    /// With `dt > 0` each non-outlet node's stored depth is released into its
    /// supply and replaced by what the node deposits over `dt`. Outlet entries
    /// are never touched, and with `dt <= 0` the reservoir is neither read nor
    /// written.
    pub fn sweep(
        &self,
        network: &DrainageNetwork,
        forcing: &NodeForcing,
        reservoir: &mut [f64],
        dt: f64,
        state: &mut FluxState,
    ) -> Result<()> {
        let n = network.len();
        forcing.check_len(n)?;
        if reservoir.len() != n {
            return Err(SedFluxError::FieldLength {
                field: "channel_sediment__depth".to_string(),
                expected: n,
                actual: reservoir.len(),
            });
        }
        state.resize(n);
        let exchange = dt > 0.0;

        for &node in network.order() {
            let area = forcing.cell_area[node];
            let cap = forcing.transport_capacity[node];
            let upstream: f64 =
                network.donors(node).iter().map(|&d| state.volumetric_discharge_out[d]).sum();
            let outlet = network.is_outlet(node);
            // Outlets pass sediment out of the domain and keep no store.
            let stores = exchange && !outlet;
            let release = if stores { reservoir[node] * area / dt } else { 0.0 };
            let supply = upstream + forcing.local_sediment_supply[node] + release;

            let mut err = 0.0;
            let mut generated = 0.0;
            let (rate, out, dep, rel) = if outlet && self.outlet_policy == OutletPolicy::BaseLevel {
                if cap > 0.0 {
                    let rel = 0.5 * (clamp01(supply / cap) + clamp01(supply.min(cap) / cap));
                    (0.0, upstream, (supply - cap).max(0.0), rel)
                } else {
                    (0.0, upstream, supply, 1.0)
                }
            } else if !(cap > 0.0) || supply >= cap {
                let (out, dep) = split_at_capacity(supply, cap.max(0.0));
                (0.0, out, dep, 1.0)
            } else {
                let per_lowering = area / self.porosity;
                let potential = if forcing.flooded[node] {
                    0.0
                } else {
                    forcing.erosion_capacity_rate[node] * per_lowering
                };
                let o = self.solver.solve(supply, cap, potential, per_lowering);
                err = o.error;
                generated = o.volume_generated;
                (-o.lowering_rate, o.discharge_out, 0.0, o.relative_flux)
            };

            state.total_supply[node] = supply;
            state.generation_rate[node] = generated;
            state.volumetric_discharge_out[node] = out;
            state.deposition_rate[node] = dep;
            state.elevation_rate[node] = rate;
            state.relative_sediment_flux[node] = rel;
            state.is_transport_limited[node] = rel == 1.0;
            state.error_in_sed_flux_fn[node] = err;

            if stores {
                // Zero-area nodes cannot store sediment.
                reservoir[node] = if area > 0.0 { (dep * dt / area).max(0.0) } else { 0.0 };
            }
        }

        trace!(
            nodes = n,
            generated = state.total_generation(),
            deposited = state.total_deposition(),
            "sediment sweep"
        );
        Ok(())
    }
}

/// Split `supply ≥ cap ≥ 0` into discharge and deposition with
/// `discharge ≤ cap` and `discharge + deposition == supply` exactly.
///
/// Either `supply − cap` is exact, or `deposition ≥ supply / 2` and
/// `supply − deposition` is exact; one ulp more deposition covers the rounding.
fn split_at_capacity(supply: f64, cap: f64) -> (f64, f64) {
    let mut dep = supply - cap;
    let mut out = supply - dep;
    if out > cap {
        dep = next_up(dep);
        out = supply - dep;
    }
    (out, dep)
}
