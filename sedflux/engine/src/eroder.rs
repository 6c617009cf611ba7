//! Sediment-flux-dependent channel incision component.
//!
//! Binds to a [`NodeFields`] store: reads the routing and geometry fields the
//! flow router and grid produce, owns nothing but its configuration, and writes
//! its diagnostics back as fields after every call. The channel sediment
//! reservoir lives in the store as `channel_sediment__depth` and is carried
//! from call to call there.

use tracing::{debug, warn};

use crate::cfl::CflStats;
use crate::closure::SedFluxClosure;
use crate::config::SedDepConfig;
use crate::error::{Result, SedFluxError};
use crate::fields::{names, FloodedNodes, NodeFields};
use crate::laws::{LawForcing, PowerLaw};
use crate::network::DrainageNetwork;
use crate::solver::NodeFluxSolver;
use crate::substep::SubstepController;
use crate::sweep::{NodeForcing, SweepEngine};

const ROUTER_HINT: &str = "run a single-receiver flow router (D8, D4 or steepest descent) first";
const GRID_HINT: &str = "it comes from the grid geometry";
const ELEVATION_HINT: &str = "add an elevation field to the grid first";
const RESERVOIR_HINT: &str = "it is created when the eroder is built";

/// Routing methods that give one receiver per node.
const SINGLE_RECEIVER_METHODS: [&str; 3] = ["D8", "D4", "STEEPEST"];

/// Diagnostic summary for one call to [`SedDepEroder::run_one_step`].
#[derive(Default, Clone, Copy, Debug, PartialEq)]
pub struct StepReport {
    /// Substeps taken.
    pub substeps: u32,
    /// Length of each substep.
    pub dt_sub: f64,
    /// Bulk volume detached from the bed.
    pub eroded_volume: f64,
    /// Net change in stored channel sediment volume.
    pub deposited_volume: f64,
    /// Exogenous sediment volume supplied through `channel_sediment__local_supply`.
    pub supplied_volume: f64,
    /// Bulk volume that left through outlets.
    pub exported_volume: f64,
    /// Largest fixed-point residual in any substep.
    pub max_error: f64,
    /// Nodes whose final residual exceeds the convergence tolerance.
    pub non_converged: usize,
}

/// The eroder component.
#[derive(Debug)]
pub struct SedDepEroder {
    config: SedDepConfig,
    closure: SedFluxClosure,
    erosion: PowerLaw,
    transport: PowerLaw,
    controller: SubstepController,
    stats: CflStats,
}

impl SedDepEroder {
    /// Validate configuration and inputs, and bind the sediment reservoir.
    ///
    /// Creates `channel_sediment__depth` filled with zeros if the store lacks it.
    pub fn new(fields: &mut NodeFields, config: SedDepConfig) -> Result<Self> {
        config.validate()?;
        check_router(fields)?;
        require_scalar(fields, names::ELEVATION, ELEVATION_HINT)?;
        require_index(fields, names::RECEIVER, ROUTER_HINT)?;
        require_index(fields, names::UPSTREAM_ORDER, ROUTER_HINT)?;
        require_scalar(fields, names::DRAINAGE_AREA, ROUTER_HINT)?;
        require_scalar(fields, names::STEEPEST_SLOPE, ROUTER_HINT)?;
        require_scalar(fields, names::LINK_LENGTH, ROUTER_HINT)?;
        require_scalar(fields, names::CELL_AREA, GRID_HINT)?;
        bind_reservoir(fields)?;

        let closure = config.closure()?;
        let solver = NodeFluxSolver::new(closure, config.pseudoimplicit_repeats);
        let engine = SweepEngine::new(solver, config.porosity, config.outlet_policy)?;
        let controller = SubstepController::new(engine, config.cfl())?;
        debug!(
            closure = closure.kind().name(),
            porosity = config.porosity,
            repeats = config.pseudoimplicit_repeats,
            "sediment-flux eroder ready"
        );
        Ok(Self {
            erosion: config.erosion()?,
            transport: config.transport()?,
            closure,
            controller,
            config,
            stats: CflStats::default(),
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &SedDepConfig {
        &self.config
    }

    /// Calibrated closure.
    pub fn closure(&self) -> &SedFluxClosure {
        &self.closure
    }

    /// Substep statistics across all calls so far.
    pub fn cfl_stats(&self) -> &CflStats {
        &self.stats
    }

    /// Erode for `dt`, updating elevation and reservoir in place and writing
    /// diagnostic fields.
    ///
    /// The network is rebuilt from the store on every call, so re-routing
    /// between calls is picked up.
    pub fn run_one_step(
        &mut self,
        fields: &mut NodeFields,
        dt: f64,
        flooded: Option<&FloodedNodes>,
    ) -> Result<StepReport> {
        check_router(fields)?;
        let n = fields.len();
        let receivers = require_index(fields, names::RECEIVER, ROUTER_HINT)?.to_vec();
        let order = require_index(fields, names::UPSTREAM_ORDER, ROUTER_HINT)?.to_vec();
        let network = DrainageNetwork::new(receivers, order)?;

        let drainage_area = require_scalar(fields, names::DRAINAGE_AREA, ROUTER_HINT)?.to_vec();
        let slope = require_scalar(fields, names::STEEPEST_SLOPE, ROUTER_HINT)?.to_vec();
        let link_length = require_scalar(fields, names::LINK_LENGTH, ROUTER_HINT)?.to_vec();
        let cell_area = require_scalar(fields, names::CELL_AREA, GRID_HINT)?.to_vec();
        let local_supply = match fields.scalar(names::LOCAL_SUPPLY) {
            Some(s) => s.to_vec(),
            None => vec![0.0; n],
        };
        let flooded = match flooded {
            Some(f) => f.resolve(fields)?,
            None => vec![false; n],
        };

        let mut forcing = NodeForcing {
            cell_area,
            erosion_capacity_rate: vec![0.0; n],
            transport_capacity: vec![0.0; n],
            local_sediment_supply: local_supply,
            flooded,
        };
        let mut laws =
            LawForcing::new(&self.erosion, &self.transport, &network, &drainage_area, &link_length);
        laws.apply(&slope, &mut forcing);

        bind_reservoir(fields)?;
        let mut elevation = require_scalar(fields, names::ELEVATION, ELEVATION_HINT)?.to_vec();
        let mut reservoir = require_scalar(fields, names::SEDIMENT_DEPTH, RESERVOIR_HINT)?.to_vec();

        let outcome =
            self.controller.advance(&network, &mut forcing, &mut laws, &mut elevation, &mut reservoir, dt)?;
        self.stats.update(&outcome.plan);

        write_back(fields, names::ELEVATION, &elevation)?;
        write_back(fields, names::SEDIMENT_DEPTH, &reservoir)?;

        let state = outcome.state;
        fields.add_scalar(names::DISCHARGE, state.volumetric_discharge_out)?;
        fields.add_scalar(names::RELATIVE_FLUX, state.relative_sediment_flux)?;
        fields.add_scalar(names::CAPACITY, forcing.transport_capacity)?;
        fields.add_scalar(names::DEPOSITION_RATE, state.deposition_rate)?;
        fields.add_flag(names::TRANSPORT_LIMITED, state.is_transport_limited)?;
        fields.add_scalar(names::FLUX_ERROR, state.error_in_sed_flux_fn)?;
        fields.add_scalar(names::ELEVATION_RATE, state.elevation_rate)?;
        fields.add_scalar(names::ELEVATION_CHANGE, outcome.elevation_change)?;

        if outcome.non_converged > 0 {
            warn!(
                nodes = outcome.non_converged,
                max_error = outcome.max_error,
                repeats = self.config.pseudoimplicit_repeats,
                "sediment flux did not converge at some nodes; raise pseudoimplicit_repeats"
            );
        }

        Ok(StepReport {
            substeps: outcome.plan.substeps,
            dt_sub: outcome.plan.dt_sub,
            eroded_volume: outcome.eroded_volume,
            deposited_volume: outcome.deposited_volume,
            supplied_volume: outcome.supplied_volume,
            exported_volume: outcome.exported_volume,
            max_error: outcome.max_error,
            non_converged: outcome.non_converged,
        })
    }
}

/// Reject routers that do not give exactly one receiver per node.
fn check_router(fields: &NodeFields) -> Result<()> {
    let Some(method) = fields.flow_director.as_deref() else {
        return Ok(());
    };
    let short = method.strip_prefix("FlowDirector").unwrap_or(method).to_ascii_uppercase();
    if SINGLE_RECEIVER_METHODS.contains(&short.as_str()) {
        Ok(())
    } else {
        Err(SedFluxError::UnsupportedRouting { method: method.to_string() })
    }
}

fn require_scalar<'f>(fields: &'f NodeFields, name: &str, hint: &'static str) -> Result<&'f [f64]> {
    fields.scalar(name).ok_or_else(|| SedFluxError::MissingField { field: name.to_string(), hint })
}

fn require_index<'f>(fields: &'f NodeFields, name: &str, hint: &'static str) -> Result<&'f [usize]> {
    fields.index(name).ok_or_else(|| SedFluxError::MissingField { field: name.to_string(), hint })
}

fn bind_reservoir(fields: &mut NodeFields) -> Result<()> {
    if fields.scalar(names::SEDIMENT_DEPTH).is_none() {
        let n = fields.len();
        fields.add_scalar(names::SEDIMENT_DEPTH, vec![0.0; n])?;
    }
    Ok(())
}

fn write_back(fields: &mut NodeFields, name: &str, values: &[f64]) -> Result<()> {
    match fields.scalar_mut(name) {
        Some(dst) => {
            dst.copy_from_slice(values);
            Ok(())
        }
        None => Err(SedFluxError::MissingField { field: name.to_string(), hint: RESERVOIR_HINT }),
    }
}
