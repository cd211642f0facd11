use thiserror::Error;

use crate::world_3d::BoundarySide;

#[derive(Error, Debug)]
pub enum PicError {
    #[error("invalid grid along {axis}: {message}")]
    InvalidGrid { axis: char, message: String },

    #[error("no boundary condition set on face {0:?}")]
    MissingBoundaryCondition(BoundarySide),

    #[error("axis {0} is periodic on one face only")]
    MismatchedPeriodic(char),

    #[error("no VHS reference properties for gas '{0}'")]
    UnknownGas(String),

    #[error("invalid species configuration: {0}")]
    InvalidSpecies(String),

    #[error("invalid particle source: {0}")]
    InvalidSource(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type PicResult<T> = Result<T, PicError>;
