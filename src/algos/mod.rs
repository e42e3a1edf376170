pub mod preprocess;
pub mod propagate;
pub mod aggregate;
pub mod convergence;
pub mod adsorption;
