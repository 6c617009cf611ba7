//! Configuration for the sediment-flux-dependent eroder.
//!
//! Every field has a default, so a partial JSON document only needs the keys it
//! changes. Parsing does not validate; [`SedDepConfig::validate`] does, and the
//! eroder calls it before any numerical work.

use serde::{Deserialize, Serialize};

use crate::cfl::CflConfig;
use crate::closure::SedFluxClosure;
use crate::error::{Result, SedFluxError};
use crate::laws::PowerLaw;
use crate::sweep::OutletPolicy;

/// Parameters of one eroder instance.
///
/// Units: lengths in meters, areas in m², time in years.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SedDepConfig {
    /// Closure family: `None`/`constant`, `linear_decline`, `almost_parabolic`
    /// or `generalized_humped`.
    pub sed_dependency_type: String,
    /// Humped closure amplitude κ.
    pub kappa_hump: f64,
    /// Humped closure rising-limb exponent ν.
    pub nu_hump: f64,
    /// Humped closure zero-flux offset c.
    pub c_hump: f64,
    /// Humped closure decay coefficient φ.
    pub phi_hump: f64,
    /// Erosion law name.
    pub erosion_law: String,
    /// Transport law name.
    pub transport_law: String,
    /// Erodibility K_sp (m^(1−2m) yr^(−1)).
    pub k_sp: f64,
    /// Erosion area exponent.
    pub m_sp: f64,
    /// Erosion slope exponent.
    pub n_sp: f64,
    /// Transport coefficient K_t.
    pub k_t: f64,
    /// Transport area exponent.
    pub m_t: f64,
    /// Transport slope exponent.
    pub n_t: f64,
    /// Solid fraction of deposited sediment, in (0, 1].
    pub porosity: f64,
    /// Fixed-point iteration budget per node.
    pub pseudoimplicit_repeats: u32,
    /// Courant bound per substep.
    pub max_cfl: f64,
    /// Hard cap on substeps per call.
    pub max_substeps: u32,
    /// Outlet handling.
    pub outlet_policy: OutletPolicy,
}

impl Default for SedDepConfig {
    fn default() -> Self {
        Self {
            sed_dependency_type: "generalized_humped".to_string(),
            kappa_hump: 13.683,
            nu_hump: 1.13,
            c_hump: 0.00181,
            phi_hump: 4.24,
            erosion_law: PowerLaw::NAME.to_string(),
            transport_law: PowerLaw::NAME.to_string(),
            k_sp: 1.0e-6,
            m_sp: 0.5,
            n_sp: 1.0,
            k_t: 1.0e-4,
            m_t: 1.5,
            n_t: 1.0,
            porosity: 1.0,
            pseudoimplicit_repeats: 50,
            max_cfl: 0.3,
            max_substeps: 128,
            outlet_policy: OutletPolicy::GeneralRule,
        }
    }
}

impl SedDepConfig {
    /// Parse from a JSON document; missing keys keep their defaults.
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check names and ranges.
    pub fn validate(&self) -> Result<()> {
        self.closure()?;
        self.erosion()?;
        self.transport()?;
        if !(self.porosity > 0.0 && self.porosity <= 1.0) {
            return Err(SedFluxError::InvalidParameter(format!(
                "porosity must lie in (0, 1], got {}",
                self.porosity
            )));
        }
        if self.pseudoimplicit_repeats == 0 {
            return Err(SedFluxError::InvalidParameter(
                "pseudoimplicit_repeats must be at least 1".into(),
            ));
        }
        if !(self.max_cfl > 0.0 && self.max_cfl.is_finite()) {
            return Err(SedFluxError::InvalidParameter(format!(
                "max_cfl must be positive and finite, got {}",
                self.max_cfl
            )));
        }
        if self.max_substeps == 0 {
            return Err(SedFluxError::InvalidParameter("max_substeps must be at least 1".into()));
        }
        Ok(())
    }

    /// Selected closure, calibrated.
    pub fn closure(&self) -> Result<SedFluxClosure> {
        SedFluxClosure::from_name(
            &self.sed_dependency_type,
            self.kappa_hump,
            self.nu_hump,
            self.c_hump,
            self.phi_hump,
        )
    }

    /// Erosion law.
    pub fn erosion(&self) -> Result<PowerLaw> {
        PowerLaw::erosion(&self.erosion_law, self.k_sp, self.m_sp, self.n_sp)
    }

    /// Transport law.
    pub fn transport(&self) -> Result<PowerLaw> {
        PowerLaw::transport(&self.transport_law, self.k_t, self.m_t, self.n_t)
    }

    /// Substep limiter settings.
    pub fn cfl(&self) -> CflConfig {
        CflConfig { max_cfl: self.max_cfl, max_substeps: self.max_substeps }
    }
}
