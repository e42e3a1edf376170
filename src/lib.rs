//! Adsorption label propagation over weighted graphs.
//!
//! Seed nodes carry known class distributions which are spread across the graph by repeated
//! weighted averaging.  Rounds are written against the [`dataflow::Dataflow`] collection
//! abstraction; [`dataflow::InMemory`] runs them on the rayon thread pool.

pub mod error;
pub mod graph;
pub mod dataflow;
pub mod alphabet;
pub mod info;
pub mod labels;
pub mod algos;
pub mod io;
mod progress;

#[cfg(feature = "python")]
mod bindings;

pub use crate::algos::adsorption::{Assignment, GraphAdsorption};
pub use crate::algos::convergence::{ConvergenceEntry, ConvergenceReport};
pub use crate::alphabet::Alphabet;
pub use crate::dataflow::{Dataflow, InMemory};
pub use crate::error::{Error, Result};
pub use crate::graph::{Edge, NodeID, WeightedGraph};
pub use crate::labels::{LabelFactory, LabelVector, NormType};
