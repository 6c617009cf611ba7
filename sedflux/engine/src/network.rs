//! Drainage forest as a flat arena of node ids.
//!
//! Every node has exactly one receiver; a node that is its own receiver is an
//! outlet. The upstream-first visit order comes from the flow router and is
//! only checked here, never derived. Donor lists are the inverse of the
//! receiver map with self-loops removed.

use smallvec::SmallVec;

use crate::error::{Result, SedFluxError};

/// Donor ids of one node (most nodes have few).
pub type Donors = SmallVec<[usize; 6]>;

/// Receiver graph plus visit order, validated once.
#[derive(Clone, Debug, PartialEq)]
pub struct DrainageNetwork {
    receivers: Vec<usize>,
    order: Vec<usize>,
    donors: Vec<Donors>,
}

impl DrainageNetwork {
    /// Build and validate a network.
    ///
    /// Fails when a receiver is out of range, when `order` is not a
    /// permutation of `0..n`, or when a node is visited before one of its
    /// donors (which also rules out cycles among non-outlet nodes).
    pub fn new(receivers: Vec<usize>, order: Vec<usize>) -> Result<Self> {
        let n = receivers.len();
        if order.len() != n {
            return Err(SedFluxError::InvalidNetwork(format!(
                "visit order has {} entries for {} nodes",
                order.len(),
                n
            )));
        }
        for (node, &r) in receivers.iter().enumerate() {
            if r >= n {
                return Err(SedFluxError::InvalidNetwork(format!(
                    "node {node} drains to {r}, outside 0..{n}"
                )));
            }
        }

        let mut position = vec![usize::MAX; n];
        for (pos, &node) in order.iter().enumerate() {
            if node >= n {
                return Err(SedFluxError::NodeOutOfRange { node, len: n });
            }
            if position[node] != usize::MAX {
                return Err(SedFluxError::InvalidNetwork(format!(
                    "node {node} appears twice in the visit order"
                )));
            }
            position[node] = pos;
        }

        let mut donors: Vec<Donors> = vec![Donors::new(); n];
        for (node, &r) in receivers.iter().enumerate() {
            if r == node {
                continue;
            }
            if position[node] >= position[r] {
                return Err(SedFluxError::InvalidNetwork(format!(
                    "node {r} is visited before its donor {node}"
                )));
            }
            donors[r].push(node);
        }

        Ok(Self { receivers, order, donors })
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.receivers.len()
    }

    /// True when the network has no nodes.
    pub fn is_empty(&self) -> bool {
        self.receivers.is_empty()
    }

    /// Receiver of `node`.
    #[inline]
    pub fn receiver(&self, node: usize) -> usize {
        self.receivers[node]
    }

    /// Full receiver map.
    pub fn receivers(&self) -> &[usize] {
        &self.receivers
    }

    /// Upstream-first visit order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Nodes draining directly into `node`.
    #[inline]
    pub fn donors(&self, node: usize) -> &[usize] {
        &self.donors[node]
    }

    /// Whether `node` drains to itself.
    #[inline]
    pub fn is_outlet(&self, node: usize) -> bool {
        self.receivers[node] == node
    }

    /// Outlet ids in ascending order.
    pub fn outlets(&self) -> impl Iterator<Item = usize> + '_ {
        self.receivers.iter().enumerate().filter(|&(i, &r)| i == r).map(|(i, _)| i)
    }
}
