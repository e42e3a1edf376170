//! Adsorption (Baluja et al., 2008): semi-supervised node classification by simulating a Markov
//! random walk.  Seed nodes carry known label distributions; on every round each node takes the
//! edge weighted average of its neighbours' labels.  Seeds are pinned through shadow nodes so
//! their labels keep re-entering the graph instead of washing out.
use std::fmt::Write;

use hashbrown::HashMap;

use crate::algos::aggregate::LabelAggregator;
use crate::algos::convergence::{
    ConvergenceMonitor, ConvergenceReport, DEFAULT_CHECK_INTERVAL, DEFAULT_THRESHOLD
};
use crate::algos::preprocess::WeightPreprocessor;
use crate::algos::propagate::{Instance, LabelPropagator};
use crate::dataflow::{Combiner, Dataflow};
use crate::error::{Error, Result};
use crate::graph::NodeID;
use crate::labels::{LabelFactory, LabelVector};
use crate::progress::CLProgressBar;

/// Counts records per key, keeping only keys seen more than once.
struct Repeats;

impl <V> Combiner<V> for Repeats {
    type Acc = usize;
    type Output = usize;

    fn init(&self) -> usize { 0 }

    fn update(&self, acc: &mut usize, _value: &V) -> Result<()> {
        *acc += 1;
        Ok(())
    }

    fn merge(&self, acc: &mut usize, other: usize) -> Result<()> {
        *acc += other;
        Ok(())
    }

    fn finish(&self, acc: usize) -> Option<usize> {
        if acc > 1 { Some(acc) } else { None }
    }
}

pub struct GraphAdsorption {
    /// Fixes the number of classes every label must have
    pub factory: LabelFactory,

    /// Weight of the edge from each shadow node to its seed
    pub update_constant: f64,

    /// Number of propagation rounds
    pub iterations: usize,

    /// Nodes drifting further than this between checked rounds are reported
    pub threshold: f64,

    /// Rounds between convergence checks
    pub check_interval: usize,

    /// Show a progress bar
    pub indicator: bool
}

/// Final labeling, covering real and shadow nodes, plus every convergence entry of the run
/// keyed by the round it was found in.
pub struct Assignment<D: Dataflow> {
    pub labels: D::Table<NodeID, LabelVector>,
    pub convergence: D::Table<usize, (NodeID, f64)>
}

impl <D: Dataflow> Assignment<D> {
    pub fn materialize(&self, dataflow: &D) -> (HashMap<NodeID, LabelVector>, ConvergenceReport) {
        (dataflow.materialize(&self.labels), ConvergenceReport::materialize(dataflow, &self.convergence))
    }
}

impl GraphAdsorption {
    pub fn new(factory: LabelFactory, update_constant: f64, iterations: usize) -> Self {
        GraphAdsorption {
            factory,
            update_constant,
            iterations,
            threshold: DEFAULT_THRESHOLD,
            check_interval: DEFAULT_CHECK_INTERVAL,
            indicator: false
        }
    }

    fn validate_params(&self) -> Result<()> {
        if self.iterations < 1 {
            return Err(Error::InvalidParameter("iterations must be at least 1".into()));
        }
        if self.check_interval < 1 {
            return Err(Error::InvalidParameter("check interval must be at least 1".into()));
        }
        Ok(())
    }

    /// Every seed must be a real node, seeded once, with a well formed label of the factory's
    /// class count.  Every edge must join real nodes with a positive weight.
    fn validate_inputs<D: Dataflow>(
        &self,
        dataflow: &D,
        weights: &D::Table<NodeID, (NodeID, f64)>,
        seeds: &D::Table<NodeID, LabelVector>
    ) -> Result<()> {
        let k = self.factory.num_classes();
        let bad_seeds = dataflow.filter(seeds, move |node, label| {
            *node <= 0 || label.len() != k || label.as_slice().iter().any(|c| !(c.is_finite() && *c >= 0.))
        });
        if let Some((node, label)) = dataflow.collect(&bad_seeds).into_iter().next() {
            if node <= 0 {
                return Err(Error::InvalidNode(node));
            }
            if label.len() != k {
                return Err(Error::DimensionMismatch { expected: k, found: label.len() });
            }
            return Err(Error::InvalidParameter(format!("seed {} has a malformed label {}", node, label)));
        }

        let repeated = dataflow.combine_by_key(seeds, &Repeats)?;
        if let Some((node, _count)) = dataflow.collect(&repeated).into_iter().next() {
            return Err(Error::DuplicateSeed(node));
        }

        let bad_edges = dataflow.filter(weights, |source, (target, weight)| {
            *source <= 0 || *target <= 0 || !(*weight > 0. && weight.is_finite())
        });
        if let Some((source, (target, weight))) = dataflow.collect(&bad_edges).into_iter().next() {
            if source <= 0 || target <= 0 {
                return Err(Error::InvalidNode(source.min(target)));
            }
            return Err(Error::InvalidWeight { from: source, to: target, weight });
        }
        Ok(())
    }

    /// Runs every round and returns the last labeling with the accumulated convergence report.
    /// All parameters and inputs are checked before the first round.
    pub fn run<D: Dataflow>(
        &self,
        dataflow: &D,
        weights: &D::Table<NodeID, (NodeID, f64)>,
        seeds: &D::Table<NodeID, LabelVector>
    ) -> Result<Assignment<D>> {
        self.validate_params()?;
        let preprocessor = WeightPreprocessor::new(self.update_constant)?;
        let monitor = ConvergenceMonitor::new(self.threshold)?;
        self.validate_inputs(dataflow, weights, seeds)?;

        if self.indicator {
            eprintln!("Seeds: {}, Edges: {}, Classes: {}",
                dataflow.len(seeds), dataflow.len(weights), self.factory.num_classes());
            eprintln!("Adding shadow nodes...");
        }

        let aggregator = LabelAggregator::new(&self.factory);
        let weights = preprocessor.weights(dataflow, weights, seeds)?;
        let mut labels = preprocessor.labels(dataflow, seeds)?;
        let mut convergence = dataflow.table::<usize, (NodeID, f64)>(Vec::new());

        let pb = CLProgressBar::new(self.iterations as u64, self.indicator);
        let mut drifting: Option<usize> = None;
        for iteration in 1..=self.iterations {
            pb.update_message(|msg| {
                msg.clear();
                match drifting {
                    Some(d) => write!(msg, "Round {}, Drifting: {}", iteration, d),
                    None => write!(msg, "Round {}", iteration)
                }.expect("Should never fail!");
            });

            let contributions = LabelPropagator::propagate(dataflow, &weights, &labels)?;
            let next = aggregator.aggregate(dataflow, &contributions)?;

            if iteration % self.check_interval == 0 {
                let flagged = monitor.compare(dataflow, &next, &labels, iteration)?;
                if pb.is_enabled() {
                    drifting = Some(dataflow.len(&flagged));
                }
                convergence = dataflow.union(&convergence, &flagged);
            }

            // Round barrier: the previous labeling is no longer needed
            labels = next;
            pb.inc(1);
        }
        pb.finish();

        Ok(Assignment { labels, convergence })
    }

    /// A single propagate and aggregate step over edges already joined with their source labels.
    pub fn compute_labels<D: Dataflow>(
        &self,
        dataflow: &D,
        instances: &D::Table<NodeID, Instance>
    ) -> Result<D::Table<NodeID, LabelVector>> {
        let contributions = LabelPropagator::emit(dataflow, instances)?;
        LabelAggregator::new(&self.factory).aggregate(dataflow, &contributions)
    }
}
