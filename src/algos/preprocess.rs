//! Shadow nodes.  Every seed `n` gets a shadow `-n` holding its label; the shadow feeds the seed
//! through an `update_constant` weighted edge each round and keeps its own value through a unit
//! self loop.  With no other incoming edge, a shadow's label is a fixed point from round one.
use crate::dataflow::Dataflow;
use crate::error::{Error, Result};
use crate::graph::{NodeID, shadow_of};
use crate::labels::LabelVector;

pub struct WeightPreprocessor {
    update_constant: f64
}

impl WeightPreprocessor {
    pub fn new(update_constant: f64) -> Result<Self> {
        if !(update_constant > 0. && update_constant.is_finite()) {
            return Err(Error::InvalidParameter(
                format!("update constant must be positive and finite, got {}", update_constant)));
        }
        Ok(WeightPreprocessor { update_constant })
    }

    pub fn update_constant(&self) -> f64 {
        self.update_constant
    }

    /// Original graph plus the two shadow edges of every seed.
    pub fn weights<D: Dataflow>(
        &self,
        dataflow: &D,
        weights: &D::Table<NodeID, (NodeID, f64)>,
        seeds: &D::Table<NodeID, LabelVector>
    ) -> Result<D::Table<NodeID, (NodeID, f64)>> {
        let update_constant = self.update_constant;
        let shadow_edges = dataflow.flat_map(seeds, move |node, _label, out| {
            if *node <= 0 {
                return Err(Error::InvalidNode(*node))
            }
            let shadow = shadow_of(*node);
            out.push((shadow, (*node, update_constant)));
            out.push((shadow, (shadow, 1.)));
            Ok(())
        })?;

        Ok(dataflow.union(weights, &shadow_edges))
    }

    /// Seed labels moved onto their shadow nodes; this is the labeling of round zero.
    pub fn labels<D: Dataflow>(
        &self,
        dataflow: &D,
        seeds: &D::Table<NodeID, LabelVector>
    ) -> Result<D::Table<NodeID, LabelVector>> {
        dataflow.map(seeds, |node, label| {
            if *node <= 0 {
                return Err(Error::InvalidNode(*node))
            }
            Ok((shadow_of(*node), label.clone()))
        })
    }
}
