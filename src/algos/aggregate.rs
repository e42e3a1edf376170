//! Per node aggregation of incoming label contributions.  A node can collect a very large number
//! of contributions, so they are summed with Kahan's compensated summation, then renormalized to
//! unit mass.
use crate::dataflow::{Combiner, Dataflow};
use crate::error::{Error, Result};
use crate::graph::NodeID;
use crate::labels::{LabelFactory, LabelVector, NormType};

/// Running sum plus the low order bits lost by the last addition.
#[derive(Clone, Debug)]
pub struct KahanSum {
    sum: Vec<f64>,
    c: Vec<f64>
}

impl KahanSum {
    pub fn new(num_classes: usize) -> Self {
        KahanSum { sum: vec![0.; num_classes], c: vec![0.; num_classes] }
    }

    pub fn add(&mut self, x: &[f64]) -> Result<()> {
        if x.len() != self.sum.len() {
            return Err(Error::DimensionMismatch { expected: self.sum.len(), found: x.len() });
        }
        self.sum.iter_mut().zip(self.c.iter_mut()).zip(x.iter()).for_each(|((si, ci), xi)| {
            let y = xi - *ci;
            let t = *si + y;
            *ci = (t - *si) - y;
            *si = t;
        });
        Ok(())
    }

    /// Folds in another partial sum, carrying over its outstanding correction.
    pub fn merge(&mut self, other: KahanSum) -> Result<()> {
        self.add(&other.sum)?;
        self.c.iter_mut().zip(other.c.iter()).for_each(|(ci, oi)| *ci += oi);
        Ok(())
    }

    /// The sum with any correction still outstanding from merged partials applied.
    pub fn total(&self) -> LabelVector {
        LabelVector::new(self.corrected().collect())
    }

    pub fn into_total(self) -> LabelVector {
        self.total()
    }

    fn corrected(&self) -> impl Iterator<Item=f64> + '_ {
        self.sum.iter().zip(self.c.iter()).map(|(si, ci)| si - ci)
    }
}

pub struct LabelAggregator {
    num_classes: usize
}

impl LabelAggregator {
    pub fn new(factory: &LabelFactory) -> Self {
        LabelAggregator { num_classes: factory.num_classes() }
    }

    /// Combines every contribution landing on a node into a unit mass label.  Nodes whose
    /// contributions sum to zero mass get no label this round.
    pub fn aggregate<D: Dataflow>(
        &self,
        dataflow: &D,
        contributions: &D::Table<NodeID, LabelVector>
    ) -> Result<D::Table<NodeID, LabelVector>> {
        dataflow.combine_by_key(contributions, self)
    }
}

impl Combiner<LabelVector> for LabelAggregator {
    type Acc = KahanSum;
    type Output = LabelVector;

    fn init(&self) -> KahanSum {
        KahanSum::new(self.num_classes)
    }

    fn update(&self, acc: &mut KahanSum, value: &LabelVector) -> Result<()> {
        acc.add(value.as_slice())
    }

    fn merge(&self, acc: &mut KahanSum, other: KahanSum) -> Result<()> {
        acc.merge(other)
    }

    fn finish(&self, acc: KahanSum) -> Option<LabelVector> {
        acc.into_total().normalize(NormType::Manhattan)
    }
}
