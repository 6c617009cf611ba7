//! Sediment-flux closure functions.
//!
//! A closure maps relative sediment flux `x = qs/qc` (≥ 0) to a dimensionless
//! multiplier on the detachment-limited erosion rate. The family is chosen once
//! (by name, at construction) and dispatched through [`SedFluxClosure`].
//!
//! Forms:
//! - constant: `f(x) = 1` (stream-power end member)
//! - linear decline: `f(x) = 1 − x`, left unclamped above 1
//! - almost parabolic: `2.6x + 0.1` for `x < 0.1`, `1 − 4(x − 0.5)²` up to 1,
//!   inputs above 1 read as 1
//! - generalized humped: `norm · κ · (x^ν + c) · exp(−φx)`, with `norm` found by
//!   grid search so the sampled peak on `[0, 1]` is exactly 1

use std::str::FromStr;

use crate::error::{Result, SedFluxError};

/// Spacing of the calibration grid on `[0, 1]` for the humped family.
pub const HUMP_GRID_STEP: f64 = 0.001;

/// Number of intervals in the calibration grid (`1 / HUMP_GRID_STEP`).
const HUMP_GRID_INTERVALS: usize = 1000;

/// Closure family names accepted by configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClosureKind {
    /// `f = 1`.
    Constant,
    /// `f = 1 − x`.
    LinearDecline,
    /// Gasparini-style almost-parabolic hump.
    AlmostParabolic,
    /// Five-parameter skewed hump.
    GeneralizedHumped,
}

impl ClosureKind {
    /// Canonical configuration name.
    pub fn name(&self) -> &'static str {
        match self {
            ClosureKind::Constant => "None",
            ClosureKind::LinearDecline => "linear_decline",
            ClosureKind::AlmostParabolic => "almost_parabolic",
            ClosureKind::GeneralizedHumped => "generalized_humped",
        }
    }
}

impl FromStr for ClosureKind {
    type Err = SedFluxError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "None" | "constant" => Ok(ClosureKind::Constant),
            "linear_decline" => Ok(ClosureKind::LinearDecline),
            "almost_parabolic" => Ok(ClosureKind::AlmostParabolic),
            "generalized_humped" => Ok(ClosureKind::GeneralizedHumped),
            other => Err(SedFluxError::UnknownClosure { name: other.to_string() }),
        }
    }
}

/// Shape scalars of the generalized humped closure.
///
/// `kappa`, `nu`, `c` and `phi` are the raw shape; `norm` rescales the curve so
/// its maximum sampled on `[0, 1]` at [`HUMP_GRID_STEP`] equals 1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HumpShape {
    /// Amplitude κ.
    pub kappa: f64,
    /// Rising-limb exponent ν.
    pub nu: f64,
    /// Offset c, sets the value at zero flux.
    pub c: f64,
    /// Decay coefficient φ; larger values pull the peak toward zero.
    pub phi: f64,
    /// Normalization constant.
    pub norm: f64,
}

impl HumpShape {
    /// Default amplitude.
    pub const DEFAULT_KAPPA: f64 = 13.683;
    /// Default rising-limb exponent.
    pub const DEFAULT_NU: f64 = 1.13;
    /// Default zero-flux offset.
    pub const DEFAULT_C: f64 = 0.00181;
    /// Default decay coefficient.
    pub const DEFAULT_PHI: f64 = 4.24;

    /// Build a shape from fully specified scalars, `norm` included.
    pub fn with_norm(kappa: f64, nu: f64, c: f64, phi: f64, norm: f64) -> Self {
        Self { kappa, nu, c, phi, norm }
    }

    /// Calibrate `norm` for raw shape scalars by sampling `[0, 1]`.
    pub fn calibrate(kappa: f64, nu: f64, c: f64, phi: f64) -> Result<Self> {
        if !(kappa > 0.0 && nu > 0.0 && phi > 0.0) || !(c >= 0.0) {
            return Err(SedFluxError::InvalidParameter(format!(
                "humped closure needs kappa, nu, phi > 0 and c >= 0 \
                 (got kappa={kappa}, nu={nu}, c={c}, phi={phi})"
            )));
        }
        let raw = Self { kappa, nu, c, phi, norm: 1.0 };
        let (at, peak) = raw.grid_peak();
        if !(peak.is_finite() && peak > 0.0) {
            return Err(SedFluxError::InvalidParameter(format!(
                "humped closure has no positive peak on [0, 1] (max = {peak})"
            )));
        }
        // Still rising at x = 1: the true peak lies beyond the grid and would exceed 1.
        if at > 1.0 - 0.5 * HUMP_GRID_STEP {
            return Err(SedFluxError::InvalidParameter(format!(
                "humped closure peaks beyond x = 1 (nu={nu}, phi={phi}); raise phi"
            )));
        }
        Ok(Self { norm: 1.0 / peak, ..raw })
    }

    /// Evaluate the curve at `x` (negative inputs read as 0).
    pub fn value(&self, x: f64) -> f64 {
        let x = x.max(0.0);
        self.norm * self.kappa * (x.powf(self.nu) + self.c) * (-self.phi * x).exp()
    }

    /// Location and value of the largest sample on the calibration grid.
    ///
    /// Ties keep the first (lowest) location.
    pub fn grid_peak(&self) -> (f64, f64) {
        let mut at = 0.0;
        let mut best = f64::NEG_INFINITY;
        for i in 0..=HUMP_GRID_INTERVALS {
            let x = i as f64 * HUMP_GRID_STEP;
            let v = self.value(x);
            if v > best {
                best = v;
                at = x;
            }
        }
        (at, best)
    }
}

impl Default for HumpShape {
    fn default() -> Self {
        // Calibrating the defaults cannot fail; fall back to the published norm regardless.
        Self::calibrate(Self::DEFAULT_KAPPA, Self::DEFAULT_NU, Self::DEFAULT_C, Self::DEFAULT_PHI)
            .unwrap_or(Self {
                kappa: Self::DEFAULT_KAPPA,
                nu: Self::DEFAULT_NU,
                c: Self::DEFAULT_C,
                phi: Self::DEFAULT_PHI,
                norm: 1.000_027_804_137_3,
            })
    }
}

/// A selected closure, ready to evaluate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SedFluxClosure {
    /// Erosion unaffected by sediment load.
    Constant,
    /// Erosion declines linearly to zero at saturation.
    LinearDecline,
    /// Tools-and-cover hump with a 0.1 floor at zero flux.
    AlmostParabolic,
    /// Calibrated five-parameter hump.
    GeneralizedHumped(HumpShape),
}

impl SedFluxClosure {
    /// Build the closure for `kind`; `hump` is only consulted for the humped family.
    pub fn new(kind: ClosureKind, hump: HumpShape) -> Self {
        match kind {
            ClosureKind::Constant => SedFluxClosure::Constant,
            ClosureKind::LinearDecline => SedFluxClosure::LinearDecline,
            ClosureKind::AlmostParabolic => SedFluxClosure::AlmostParabolic,
            ClosureKind::GeneralizedHumped => SedFluxClosure::GeneralizedHumped(hump),
        }
    }

    /// Parse a configuration name and calibrate humped shape scalars if needed.
    pub fn from_name(name: &str, kappa: f64, nu: f64, c: f64, phi: f64) -> Result<Self> {
        let kind: ClosureKind = name.parse()?;
        match kind {
            ClosureKind::GeneralizedHumped => {
                Ok(SedFluxClosure::GeneralizedHumped(HumpShape::calibrate(kappa, nu, c, phi)?))
            }
            _ => Ok(Self::new(kind, HumpShape::default())),
        }
    }

    /// Which family this is.
    pub fn kind(&self) -> ClosureKind {
        match self {
            SedFluxClosure::Constant => ClosureKind::Constant,
            SedFluxClosure::LinearDecline => ClosureKind::LinearDecline,
            SedFluxClosure::AlmostParabolic => ClosureKind::AlmostParabolic,
            SedFluxClosure::GeneralizedHumped(_) => ClosureKind::GeneralizedHumped,
        }
    }

    /// Humped shape scalars, if this is the humped family.
    pub fn hump(&self) -> Option<&HumpShape> {
        match self {
            SedFluxClosure::GeneralizedHumped(shape) => Some(shape),
            _ => None,
        }
    }

    /// Erosion multiplier at relative sediment flux `x`.
    #[inline]
    pub fn eval(&self, x: f64) -> f64 {
        match self {
            SedFluxClosure::Constant => 1.0,
            SedFluxClosure::LinearDecline => 1.0 - x,
            SedFluxClosure::AlmostParabolic => almost_parabolic(x),
            SedFluxClosure::GeneralizedHumped(shape) => shape.value(x),
        }
    }

    /// `points` evenly spaced `(x, f(x))` samples on `[0, 1]`.
    pub fn sample_curve(&self, points: usize) -> Vec<(f64, f64)> {
        match points {
            0 => Vec::new(),
            1 => vec![(0.0, self.eval(0.0))],
            _ => {
                let last = (points - 1) as f64;
                (0..points)
                    .map(|i| {
                        let x = i as f64 / last;
                        (x, self.eval(x))
                    })
                    .collect()
            }
        }
    }
}

fn almost_parabolic(x: f64) -> f64 {
    let x = x.clamp(0.0, 1.0);
    if x < 0.1 {
        2.6 * x + 0.1
    } else {
        1.0 - 4.0 * (x - 0.5) * (x - 0.5)
    }
}
