use crate::dataflow::Dataflow;
use crate::error::Result;
use crate::graph::NodeID;
use crate::labels::LabelVector;

/// Edge keyed by source, paired with the source's label if it has one this round.
pub type Instance = ((NodeID, f64), Option<LabelVector>);

pub struct LabelPropagator;

impl LabelPropagator {

    /// Pairs every edge with the current label of its source.
    pub fn join<D: Dataflow>(
        dataflow: &D,
        weights: &D::Table<NodeID, (NodeID, f64)>,
        labels: &D::Table<NodeID, LabelVector>
    ) -> D::Table<NodeID, Instance> {
        dataflow.left_join(weights, labels)
    }

    /// Each labelled source sends its label, scaled by the edge weight, to the edge target.
    /// Unlabelled sources send nothing at all rather than a zero vector.
    pub fn emit<D: Dataflow>(
        dataflow: &D,
        instances: &D::Table<NodeID, Instance>
    ) -> Result<D::Table<NodeID, LabelVector>> {
        dataflow.flat_map(instances, |_source, ((target, weight), label), out| {
            if let Some(label) = label {
                out.push((*target, label.scale(*weight)));
            }
            Ok(())
        })
    }

    pub fn propagate<D: Dataflow>(
        dataflow: &D,
        weights: &D::Table<NodeID, (NodeID, f64)>,
        labels: &D::Table<NodeID, LabelVector>
    ) -> Result<D::Table<NodeID, LabelVector>> {
        let instances = LabelPropagator::join(dataflow, weights, labels);
        LabelPropagator::emit(dataflow, &instances)
    }
}
