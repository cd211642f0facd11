pub mod sparse;
pub mod linear;
pub mod potential;

pub use linear::{solve_linear, LinearSolveStats};
pub use potential::{BoltzmannReference, PotentialSolver, SolverConfig, SolverReport};
pub use sparse::SparseMatrix;
