//! Erosion and transport laws that turn drainage area and slope into the two
//! per-node prefactors the sweep consumes.
//!
//! Only power laws are built in: `E = K · A^m · S^n` for the detachment-limited
//! lowering rate and `Qc = K · A^m · S^n` for volumetric transport capacity.

use crate::error::{Result, SedFluxError};
use crate::network::DrainageNetwork;
use crate::substep::ChannelForcing;
use crate::sweep::NodeForcing;

/// Detachment-limited bed-lowering rate from area and slope.
pub trait ErosionLaw {
    /// Lowering rate (height per time, ≥ 0).
    fn detachment_rate(&self, area: f64, slope: f64) -> f64;
}

/// Volumetric transport capacity from area and slope.
pub trait TransportLaw {
    /// Capacity (volume per time, ≥ 0).
    fn capacity(&self, area: f64, slope: f64) -> f64;
}

/// `K · A^m · S^n`, with negative slopes read as flat.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PowerLaw {
    /// Coefficient K.
    pub coefficient: f64,
    /// Drainage-area exponent m.
    pub area_exponent: f64,
    /// Slope exponent n.
    pub slope_exponent: f64,
}

impl PowerLaw {
    /// Name accepted for both law kinds.
    pub const NAME: &'static str = "power_law";

    /// New power law.
    pub fn new(coefficient: f64, area_exponent: f64, slope_exponent: f64) -> Self {
        Self { coefficient, area_exponent, slope_exponent }
    }

    /// Parse an erosion-law name.
    pub fn erosion(name: &str, coefficient: f64, area_exponent: f64, slope_exponent: f64) -> Result<Self> {
        if name != Self::NAME {
            return Err(SedFluxError::UnknownErosionLaw { name: name.to_string() });
        }
        Ok(Self::new(coefficient, area_exponent, slope_exponent))
    }

    /// Parse a transport-law name.
    pub fn transport(name: &str, coefficient: f64, area_exponent: f64, slope_exponent: f64) -> Result<Self> {
        if name != Self::NAME {
            return Err(SedFluxError::UnknownTransportLaw { name: name.to_string() });
        }
        Ok(Self::new(coefficient, area_exponent, slope_exponent))
    }

    /// Evaluate at `(area, slope)`.
    #[inline]
    pub fn eval(&self, area: f64, slope: f64) -> f64 {
        self.coefficient * area.max(0.0).powf(self.area_exponent) * slope.max(0.0).powf(self.slope_exponent)
    }
}

impl ErosionLaw for PowerLaw {
    fn detachment_rate(&self, area: f64, slope: f64) -> f64 {
        self.eval(area, slope)
    }
}

impl TransportLaw for PowerLaw {
    fn capacity(&self, area: f64, slope: f64) -> f64 {
        self.eval(area, slope)
    }
}

/// Refreshes sweep forcing from elevation through an erosion and a transport law.
///
/// Slope is the downhill drop to the receiver over the link length; outlets
/// and zero-length links get zero slope. Flooded nodes get no erosion.
pub struct LawForcing<'a, E, T> {
    erosion: &'a E,
    transport: &'a T,
    network: &'a DrainageNetwork,
    drainage_area: &'a [f64],
    link_length: &'a [f64],
    slope: Vec<f64>,
}

impl<'a, E: ErosionLaw, T: TransportLaw> LawForcing<'a, E, T> {
    /// Bind laws to a network and its geometry.
    pub fn new(
        erosion: &'a E,
        transport: &'a T,
        network: &'a DrainageNetwork,
        drainage_area: &'a [f64],
        link_length: &'a [f64],
    ) -> Self {
        Self {
            erosion,
            transport,
            network,
            drainage_area,
            link_length,
            slope: vec![0.0; network.len()],
        }
    }

    /// Slope used by the most recent refresh.
    pub fn slope(&self) -> &[f64] {
        &self.slope
    }

    /// Fill `erosion_capacity_rate` and `transport_capacity` from a slope field.
    pub fn apply(&mut self, slope: &[f64], forcing: &mut NodeForcing) {
        self.slope.copy_from_slice(slope);
        self.fill(forcing);
    }

    fn fill(&self, forcing: &mut NodeForcing) {
        for i in 0..self.network.len() {
            let a = self.drainage_area[i];
            let s = self.slope[i];
            forcing.erosion_capacity_rate[i] =
                if forcing.flooded[i] { 0.0 } else { self.erosion.detachment_rate(a, s) };
            forcing.transport_capacity[i] = self.transport.capacity(a, s);
        }
    }
}

impl<E: ErosionLaw, T: TransportLaw> ChannelForcing for LawForcing<'_, E, T> {
    fn refresh(&mut self, elevation: &[f64], forcing: &mut NodeForcing) {
        for i in 0..self.network.len() {
            let r = self.network.receiver(i);
            let len = self.link_length[i];
            self.slope[i] = if r == i || !(len > 0.0) {
                0.0
            } else {
                (elevation[i] - elevation[r]).max(0.0) / len
            };
        }
        self.fill(forcing);
    }
}
