pub mod three_d_world_spec;
pub mod three_d_field;
pub mod boundary;
pub mod steady_state;

pub use three_d_world_spec::SingleDimSpec;
pub use three_d_world_spec::ThreeDWorld;
pub use three_d_field::ThreeDField;
pub use boundary::{BcValue, BoundaryCondition, BoundaryConditions, BoundarySide,
                   FieldBcType, ParticleBcType};
pub use steady_state::{ConservedTotals, SteadyStateDetector};
