//! Named per-node field store shared with grid, router and depression finder.
//!
//! Fields are plain structure-of-arrays columns keyed by name, split by element
//! type. The store also carries the name of the flow director that produced the
//! routing fields, so consumers can reject multiple-receiver routing.

use std::collections::BTreeMap;

use crate::error::{Result, SedFluxError};

/// Field names read and written by the eroder.
pub mod names {
    /// Bed/surface elevation (input, updated in place).
    pub const ELEVATION: &str = "topographic__elevation";
    /// Receiver node id per node.
    pub const RECEIVER: &str = "flow__receiver_node";
    /// Upstream-first visit order.
    pub const UPSTREAM_ORDER: &str = "flow__upstream_first_order";
    /// Drainage area.
    pub const DRAINAGE_AREA: &str = "drainage_area";
    /// Slope to the receiver as computed by the router.
    pub const STEEPEST_SLOPE: &str = "topographic__steepest_slope";
    /// Link length to the receiver.
    pub const LINK_LENGTH: &str = "flow__length_to_receiver";
    /// Cell area.
    pub const CELL_AREA: &str = "cell_area";
    /// Optional exogenous sediment supply rate.
    pub const LOCAL_SUPPLY: &str = "channel_sediment__local_supply";
    /// Persistent channel sediment thickness.
    pub const SEDIMENT_DEPTH: &str = "channel_sediment__depth";
    /// Sediment leaving each node.
    pub const DISCHARGE: &str = "channel_sediment__volumetric_discharge";
    /// Relative sediment flux.
    pub const RELATIVE_FLUX: &str = "channel_sediment__relative_flux";
    /// Transport capacity used by the final substep.
    pub const CAPACITY: &str = "channel_sediment__volumetric_transport_capacity";
    /// Deposition rate.
    pub const DEPOSITION_RATE: &str = "channel_sediment__deposition_rate";
    /// Transport-limited flag.
    pub const TRANSPORT_LIMITED: &str = "channel_sediment__is_transport_limited";
    /// Fixed-point residual.
    pub const FLUX_ERROR: &str = "channel_sediment__flux_function_error";
    /// Bed-elevation rate.
    pub const ELEVATION_RATE: &str = "channel_bed__elevation_rate";
    /// Net elevation change over the last step.
    pub const ELEVATION_CHANGE: &str = "topographic__elevation_change";
}

/// Per-node columns keyed by name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeFields {
    len: usize,
    scalars: BTreeMap<String, Vec<f64>>,
    indices: BTreeMap<String, Vec<usize>>,
    flags: BTreeMap<String, Vec<bool>>,
    /// Name of the flow-routing method that wrote the receiver fields, if known.
    pub flow_director: Option<String>,
}

impl NodeFields {
    /// Empty store for `len` nodes.
    pub fn new(len: usize) -> Self {
        Self { len, ..Default::default() }
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the store has no nodes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn check(&self, name: &str, actual: usize) -> Result<()> {
        if actual != self.len {
            return Err(SedFluxError::FieldLength { field: name.to_string(), expected: self.len, actual });
        }
        Ok(())
    }

    /// Insert or replace a real-valued field.
    pub fn add_scalar(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        self.check(name, values.len())?;
        self.scalars.insert(name.to_string(), values);
        Ok(())
    }

    /// Insert or replace a node-id field.
    pub fn add_index(&mut self, name: &str, values: Vec<usize>) -> Result<()> {
        self.check(name, values.len())?;
        self.indices.insert(name.to_string(), values);
        Ok(())
    }

    /// Insert or replace a boolean field.
    pub fn add_flag(&mut self, name: &str, values: Vec<bool>) -> Result<()> {
        self.check(name, values.len())?;
        self.flags.insert(name.to_string(), values);
        Ok(())
    }

    /// Real-valued field by name.
    pub fn scalar(&self, name: &str) -> Option<&[f64]> {
        self.scalars.get(name).map(Vec::as_slice)
    }

    /// Mutable real-valued field by name.
    pub fn scalar_mut(&mut self, name: &str) -> Option<&mut [f64]> {
        self.scalars.get_mut(name).map(Vec::as_mut_slice)
    }

    /// Node-id field by name.
    pub fn index(&self, name: &str) -> Option<&[usize]> {
        self.indices.get(name).map(Vec::as_slice)
    }

    /// Boolean field by name.
    pub fn flag(&self, name: &str) -> Option<&[bool]> {
        self.flags.get(name).map(Vec::as_slice)
    }

    /// Whether any field of any type has this name.
    pub fn contains(&self, name: &str) -> bool {
        self.scalars.contains_key(name) || self.indices.contains_key(name) || self.flags.contains_key(name)
    }

    /// Drop a field of any type; returns whether one existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let s = self.scalars.remove(name).is_some();
        let i = self.indices.remove(name).is_some();
        let f = self.flags.remove(name).is_some();
        s || i || f
    }

    /// Names of all fields, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut all: Vec<&str> = self
            .scalars
            .keys()
            .chain(self.indices.keys())
            .chain(self.flags.keys())
            .map(String::as_str)
            .collect();
        all.sort_unstable();
        all
    }
}

/// Accepted ways of naming flooded nodes.
#[derive(Clone, Debug, PartialEq)]
pub enum FloodedNodes {
    /// One flag per node.
    Mask(Vec<bool>),
    /// Ids of flooded nodes.
    Ids(Vec<usize>),
    /// Name of a boolean field in the store.
    Field(String),
}

impl FloodedNodes {
    /// Resolve to a per-node mask.
    pub fn resolve(&self, fields: &NodeFields) -> Result<Vec<bool>> {
        let n = fields.len();
        match self {
            FloodedNodes::Mask(mask) => {
                if mask.len() != n {
                    return Err(SedFluxError::FieldLength {
                        field: "flooded_nodes".to_string(),
                        expected: n,
                        actual: mask.len(),
                    });
                }
                Ok(mask.clone())
            }
            FloodedNodes::Ids(ids) => {
                let mut mask = vec![false; n];
                for &id in ids {
                    if id >= n {
                        return Err(SedFluxError::NodeOutOfRange { node: id, len: n });
                    }
                    mask[id] = true;
                }
                Ok(mask)
            }
            FloodedNodes::Field(name) => fields
                .flag(name)
                .map(<[bool]>::to_vec)
                .ok_or_else(|| SedFluxError::UnknownFlagField { name: name.clone() }),
        }
    }
}
