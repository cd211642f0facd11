pub mod constants;
pub mod error;
pub mod world_3d;
pub mod solver;
pub mod particles;
pub mod collisions;
pub mod output;

pub use error::{PicError, PicResult};
