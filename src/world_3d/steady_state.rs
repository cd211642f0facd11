use glam::DVec3;

use crate::particles::Species;

/// Conserved quantities summed over all species.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ConservedTotals {
    pub real_count: f64,
    pub momentum: f64,
    pub kinetic_energy: f64,
}

impl ConservedTotals {
    pub fn from_species(species: &[Species]) -> Self {
        let mut totals = Self::default();
        for sp in species {
            totals.real_count += sp.get_real_count();
            totals.momentum += sp.get_momentum().length();
            totals.kinetic_energy += sp.get_kinetic_energy();
        }
        totals
    }

    pub fn new(real_count: f64, momentum: DVec3, kinetic_energy: f64) -> Self {
        Self { real_count, momentum: momentum.length(), kinetic_energy }
    }
}

fn relative_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        if current == 0.0 { 0.0 } else { f64::INFINITY }
    } else {
        ((current - previous) / previous).abs()
    }
}

/// Declares steady state once particle count, momentum and kinetic energy all
/// change by less than `tol` between consecutive checks. Never reverts.
#[derive(Clone, Debug, Default)]
pub struct SteadyStateDetector {
    is_steady: bool,
    previous: Option<ConservedTotals>,
}

impl SteadyStateDetector {
    pub fn is_steady(&self) -> bool {
        self.is_steady
    }

    pub fn update(&mut self, totals: ConservedTotals, tol: f64) -> bool {
        if self.is_steady {
            return true;
        }

        if let Some(prev) = self.previous {
            self.is_steady = relative_change(totals.real_count, prev.real_count) < tol
                && relative_change(totals.momentum, prev.momentum) < tol
                && relative_change(totals.kinetic_energy, prev.kinetic_energy) < tol;
        }
        self.previous = Some(totals);
        self.is_steady
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(n: f64, i: f64, e: f64) -> ConservedTotals {
        ConservedTotals { real_count: n, momentum: i, kinetic_energy: e }
    }

    #[test]
    fn first_check_is_never_steady() {
        let mut d = SteadyStateDetector::default();
        assert!(!d.update(totals(1.0, 1.0, 1.0), 0.01));
    }

    #[test]
    fn steady_after_small_changes() {
        let mut d = SteadyStateDetector::default();
        d.update(totals(100.0, 5.0, 2.0), 0.01);
        assert!(!d.update(totals(120.0, 5.0, 2.0), 0.01));
        assert!(d.update(totals(120.5, 5.01, 2.001), 0.01));
    }

    #[test]
    fn steady_state_is_monotonic() {
        let mut d = SteadyStateDetector::default();
        d.update(totals(10.0, 1.0, 1.0), 0.05);
        assert!(d.update(totals(10.0, 1.0, 1.0), 0.05));
        for scale in [100.0, 0.0, 1e-9, 7.5] {
            assert!(d.update(totals(10.0 * scale, scale, -scale), 0.05));
        }
        assert!(d.is_steady());
    }

    #[test]
    fn zero_momentum_history_counts_as_unchanged() {
        let mut d = SteadyStateDetector::default();
        d.update(totals(10.0, 0.0, 1.0), 0.01);
        assert!(d.update(totals(10.0, 0.0, 1.0), 0.01));
    }
}
