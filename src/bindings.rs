use pyo3::prelude::*;
use pyo3::exceptions::{PyValueError,PyIOError};

use crate::algos::adsorption::GraphAdsorption;
use crate::algos::convergence::{ConvergenceReport, DEFAULT_CHECK_INTERVAL, DEFAULT_THRESHOLD};
use crate::alphabet::Alphabet;
use crate::dataflow::{Dataflow, InMemory, DEFAULT_PARTITIONS};
use crate::error::Error;
use crate::graph::{is_shadow, Edge, NodeID, WeightedGraph};
use crate::io::{EdgeType as IOEdgeType, GraphReader, LabelWriter, SeedReader};
use crate::labels::{LabelFactory, LabelVector};

type Labels = Vec<(NodeID, Vec<f64>, Option<String>)>;
type Report = Vec<(usize, NodeID, f64)>;

fn convert_err(e: Error) -> PyErr {
    match e {
        Error::Io(e) => PyIOError::new_err(format!("{:?}", e)),
        e => PyValueError::new_err(e.to_string())
    }
}

fn convert_report(report: &ConvergenceReport) -> Report {
    report.entries().iter().map(|e| (e.iteration, e.node, e.distance)).collect()
}

#[pyclass]
#[derive(Clone)]
enum EdgeType {
    Directed,
    Undirected
}

impl From<EdgeType> for IOEdgeType {
    fn from(et: EdgeType) -> Self {
        match et {
            EdgeType::Directed => IOEdgeType::Directed,
            EdgeType::Undirected => IOEdgeType::Undirected
        }
    }
}

#[pyclass]
struct Adsorption {
    update_constant: f64,
    iterations: usize,
    threshold: f64,
    check_interval: usize,
    partitions: usize,
    indicator: bool
}

impl Adsorption {
    fn build(&self, factory: LabelFactory) -> GraphAdsorption {
        let mut ga = GraphAdsorption::new(factory, self.update_constant, self.iterations);
        ga.threshold = self.threshold;
        ga.check_interval = self.check_interval;
        ga.indicator = self.indicator;
        ga
    }

    /// Real node labels ordered by node id, alongside the convergence report.
    fn execute(
        &self,
        graph: &WeightedGraph,
        factory: LabelFactory,
        seeds: Vec<(NodeID, LabelVector)>
    ) -> Result<(Vec<(NodeID, LabelVector)>, ConvergenceReport), Error> {
        let df = InMemory::new(self.partitions);
        let ga = self.build(factory);
        let weights = graph.to_table(&df);
        let seeds = df.table(seeds);
        let assignment = ga.run(&df, &weights, &seeds)?;

        let mut labels = df.collect(&assignment.labels);
        labels.retain(|(node, _)| !is_shadow(*node));
        labels.sort_by_key(|(node, _)| *node);
        Ok((labels, ConvergenceReport::materialize(&df, &assignment.convergence)))
    }
}

#[pymethods]
impl Adsorption {
    #[new]
    pub fn new(
        update_constant: f64,
        iterations: usize,
        threshold: Option<f64>,
        check_interval: Option<usize>,
        partitions: Option<usize>,
        indicator: Option<bool>
    ) -> Self {
        Adsorption {
            update_constant,
            iterations,
            threshold: threshold.unwrap_or(DEFAULT_THRESHOLD),
            check_interval: check_interval.unwrap_or(DEFAULT_CHECK_INTERVAL),
            partitions: partitions.unwrap_or(DEFAULT_PARTITIONS),
            indicator: indicator.unwrap_or(true)
        }
    }

    /// Runs over in-memory lists.  Classes are named in `classes` order, or in first-seen seed
    /// order when omitted.
    pub fn run(
        &self,
        edges: Vec<(NodeID, NodeID, f64)>,
        seeds: Vec<(NodeID, String)>,
        classes: Option<Vec<String>>
    ) -> PyResult<(Labels, Report)> {
        let alphabet = match classes {
            Some(classes) => Alphabet::from_tokens(&classes),
            None => {
                let mut alphabet = Alphabet::new();
                seeds.iter().try_for_each(|(_, class)| alphabet.get(class).map(|_| ()))
                    .map(|_| { alphabet.seal(); alphabet })
            }
        }.map_err(convert_err)?;

        let factory = LabelFactory::from_alphabet(alphabet).map_err(convert_err)?;
        let seeds = seeds.into_iter()
            .map(|(node, class)| factory.create_named(&class).map(|l| (node, l)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(convert_err)?;

        let edges = edges.into_iter().map(|(f, t, w)| Edge::new(f, t, w)).collect();
        let graph = WeightedGraph::construct_from_edges(edges).map_err(convert_err)?;

        let (labels, report) = self.execute(&graph, factory.clone(), seeds).map_err(convert_err)?;
        let alphabet = factory.alphabet();
        let labels = labels.into_iter().map(|(node, label)| {
            let class = label.argmax()
                .and_then(|idx| alphabet.and_then(|a| a.get_token(idx as i64)))
                .map(|t| t.to_string());
            (node, label.as_slice().to_vec(), class)
        }).collect();

        Ok((labels, convert_report(&report)))
    }

    /// Loads edges and seeds from tab separated files, writes real node labels to `output` and
    /// returns the convergence report.
    pub fn run_files(
        &self,
        edges_path: String,
        seeds_path: String,
        output: String,
        edge_type: EdgeType,
        chunk_size: Option<usize>,
        skip_rows: Option<usize>,
        comp_level: Option<u32>
    ) -> PyResult<Report> {
        let chunk_size = chunk_size.unwrap_or(1_000);
        let skip_rows = skip_rows.unwrap_or(0);
        if self.indicator {
            eprintln!("Loading graph...");
        }
        let graph = GraphReader::load(&edges_path, edge_type.into(), chunk_size, skip_rows)
            .map_err(convert_err)?;

        if self.indicator {
            eprintln!("Loading seeds...");
        }
        let mut alphabet = Alphabet::new();
        let (factory, seeds) = SeedReader::load(&seeds_path, &mut alphabet, chunk_size, skip_rows)
            .map_err(convert_err)?;

        let (labels, report) = self.execute(&graph, factory, seeds).map_err(convert_err)?;

        let mut writer = LabelWriter::new(&output, Some(&alphabet), comp_level).map_err(convert_err)?;
        writer.stream(labels.iter().map(|(node, label)| (*node, label))).map_err(convert_err)?;
        writer.finish().map_err(convert_err)?;

        Ok(convert_report(&report))
    }
}

#[pymodule]
fn adsorption(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_class::<Adsorption>()?;
    m.add_class::<EdgeType>()?;
    Ok(())
}
