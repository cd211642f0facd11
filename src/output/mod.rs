pub mod diagnostic_output;
pub mod velocity_histogram;
pub mod vti_output;

pub use diagnostic_output::DiagnosticOutput;
pub use diagnostic_output::TimeInfo;
pub use diagnostic_output::SpeciesInfo;
pub use diagnostic_output::StatisticsWriter;
pub use velocity_histogram::{VelocityDistribution, VelocityHistogramWriter};
pub use vti_output::WriteVti;
