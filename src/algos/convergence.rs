//! Drift between consecutive rounds.  Labels live on the unit mass simplex, where no two points
//! are further than `sqrt(2)` apart; a node that just acquired its first label is reported at
//! that maximal distance.
use std::collections::BTreeMap;
use std::f64::consts::SQRT_2;

use float_ord::FloatOrd;

use crate::dataflow::Dataflow;
use crate::error::{Error, Result};
use crate::graph::NodeID;
use crate::labels::LabelVector;

pub const DEFAULT_THRESHOLD: f64 = 0.05;
pub const DEFAULT_CHECK_INTERVAL: usize = 5;

/// A node whose label moved more than the threshold at a checked round.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConvergenceEntry {
    pub iteration: usize,
    pub node: NodeID,
    pub distance: f64
}

pub struct ConvergenceMonitor {
    threshold: f64
}

impl ConvergenceMonitor {
    pub fn new(threshold: f64) -> Result<Self> {
        if !(threshold >= 0. && threshold <= SQRT_2) {
            return Err(Error::InvalidParameter(
                format!("convergence threshold must be within [0, sqrt(2)], got {}", threshold)));
        }
        Ok(ConvergenceMonitor { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Nodes labelled in `next` whose label drifted past the threshold since `previous`, keyed
    /// by `iteration`.
    pub fn compare<D: Dataflow>(
        &self,
        dataflow: &D,
        next: &D::Table<NodeID, LabelVector>,
        previous: &D::Table<NodeID, LabelVector>,
        iteration: usize
    ) -> Result<D::Table<usize, (NodeID, f64)>> {
        let distances = dataflow.map(&dataflow.left_join(next, previous), |node, (next, previous)| {
            let distance = match previous {
                Some(previous) => previous.subtract(next)?.euclidean_norm(),
                None => SQRT_2
            };
            Ok((*node, distance))
        })?;

        let threshold = self.threshold;
        let drifting = dataflow.filter(&distances, move |_node, distance| *distance > threshold);
        dataflow.map(&drifting, move |node, distance| Ok((iteration, (*node, *distance))))
    }
}

impl Default for ConvergenceMonitor {
    fn default() -> Self {
        ConvergenceMonitor { threshold: DEFAULT_THRESHOLD }
    }
}

/// Materialized convergence report, ordered by iteration then node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConvergenceReport {
    entries: Vec<ConvergenceEntry>
}

impl ConvergenceReport {
    pub fn materialize<D: Dataflow>(dataflow: &D, table: &D::Table<usize, (NodeID, f64)>) -> Self {
        ConvergenceReport::from_records(dataflow.collect(table))
    }

    pub fn from_records(records: Vec<(usize, (NodeID, f64))>) -> Self {
        let mut entries: Vec<_> = records.into_iter()
            .map(|(iteration, (node, distance))| ConvergenceEntry { iteration, node, distance })
            .collect();
        entries.sort_by_key(|e| (e.iteration, e.node, FloatOrd(e.distance)));
        ConvergenceReport { entries }
    }

    pub fn entries(&self) -> &[ConvergenceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_iteration(&self, iteration: usize) -> bool {
        self.entries.iter().any(|e| e.iteration == iteration)
    }

    /// Number of drifting nodes per checked iteration.  Iterations where nothing drifted are
    /// absent.
    pub fn counts(&self) -> BTreeMap<usize, usize> {
        let mut counts = BTreeMap::new();
        for e in self.entries.iter() {
            *counts.entry(e.iteration).or_insert(0) += 1;
        }
        counts
    }

    pub fn last_iteration(&self) -> Option<usize> {
        self.entries.last().map(|e| e.iteration)
    }
}
