
pub const QE: f64    = 1.602176565e-19; // C, electron charge
pub const EPS0: f64  = 8.85418782e-12;  // C/V/m vac permittivity
pub const ME: f64    = 9.10938215e-31;  // kg electron mass
pub const AMU: f64   = 1.660538921e-27; // kg, atomic mass unit
pub const K: f64     = 1.380648e-23;    // J/K, Boltzmann constant
pub const HBAR: f64  = 1.054571817e-34; // J s, reduced Planck constant
pub const EV_TO_K: f64 = QE / K;        // 1eV in K -  approx 11604
pub const PI: f64    = std::f64::consts::PI;
