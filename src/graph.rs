
use crate::dataflow::Dataflow;
use crate::error::{Error, Result};

/// Positive ids are real graph nodes; `-id` is the shadow of real node `id`.
pub type NodeID = i64;

/// Returns the shadow counterpart of a real node.
#[inline]
pub fn shadow_of(node: NodeID) -> NodeID {
    -node
}

#[inline]
pub fn is_shadow(node: NodeID) -> bool {
    node < 0
}

/// Directed, weighted edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    pub source: NodeID,
    pub target: NodeID,
    pub weight: f64
}

impl Edge {
    pub fn new(source: NodeID, target: NodeID, weight: f64) -> Self {
        Edge { source, target, weight }
    }

    /// Weights must be strictly positive and finite.
    pub fn validate(&self) -> Result<()> {
        if self.weight > 0. && self.weight.is_finite() {
            Ok(())
        } else {
            Err(Error::InvalidWeight { from: self.source, to: self.target, weight: self.weight })
        }
    }
}

/// Compressed Sparse Row layout over sparse, signed node ids.  Rows exist only for nodes with
/// at least one outgoing edge; `sources` is sorted so a row can be found by binary search.
/// Parallel edges are kept: the graph is a multiset.
#[derive(Clone, Debug)]
pub struct WeightedGraph {
    sources: Vec<NodeID>,
    rows: Vec<usize>,
    targets: Vec<NodeID>,
    weights: Vec<f64>
}

impl WeightedGraph {
    pub fn construct_from_edges(mut edges: Vec<Edge>) -> Result<Self> {
        for edge in edges.iter() {
            edge.validate()?;
        }

        // Stable so parallel edges keep their input order
        edges.sort_by_key(|e| e.source);

        let mut sources = Vec::new();
        let mut rows = vec![0];
        let mut targets = Vec::with_capacity(edges.len());
        let mut weights = Vec::with_capacity(edges.len());
        for edge in edges.into_iter() {
            if sources.last() != Some(&edge.source) {
                if !sources.is_empty() {
                    rows.push(targets.len());
                }
                sources.push(edge.source);
            }
            targets.push(edge.target);
            weights.push(edge.weight);
        }
        if !sources.is_empty() {
            rows.push(targets.len());
        }

        Ok(WeightedGraph { sources, rows, targets, weights })
    }

    /// Number of nodes with outgoing edges
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn edges(&self) -> usize {
        self.weights.len()
    }

    pub fn degree(&self, node: NodeID) -> usize {
        self.get_edges(node).0.len()
    }

    /// Get outgoing edges and corresponding weights
    pub fn get_edges(&self, node: NodeID) -> (&[NodeID], &[f64]) {
        match self.sources.binary_search(&node) {
            Ok(idx) => {
                let start = self.rows[idx];
                let stop  = self.rows[idx+1];
                (&self.targets[start..stop], &self.weights[start..stop])
            },
            Err(_) => (&[], &[])
        }
    }

    pub fn iter(&self) -> impl Iterator<Item=Edge> + '_ {
        self.sources.iter().enumerate().flat_map(move |(idx, source)| {
            let start = self.rows[idx];
            let stop  = self.rows[idx+1];
            self.targets[start..stop].iter().zip(self.weights[start..stop].iter())
                .map(move |(target, weight)| Edge::new(*source, *target, *weight))
        })
    }

    /// Keyed by source, which is how the propagation step joins against labels.
    pub fn to_table<D: Dataflow>(&self, dataflow: &D) -> D::Table<NodeID, (NodeID, f64)> {
        dataflow.table(self.iter().map(|e| (e.source, (e.target, e.weight))).collect())
    }
}
