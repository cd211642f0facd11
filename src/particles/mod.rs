pub mod particles;
pub mod source;

pub use particles::{maxwellian_speed, maxwellian_velocity, Particle, Species};
pub use source::WarmBeam;
