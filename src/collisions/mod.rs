pub mod vhs;
pub mod nanbu;

use glam::DVec3;
use rand::Rng;

use crate::particles::Species;
use crate::world_3d::ThreeDWorld;

pub use nanbu::DsmcNanbu;
pub use vhs::{vhs_gas, DsmcBird, VhsGas};

/// Collision model applied once per time step after the push.
pub enum Interaction {
    Vhs(DsmcBird),
    Coulomb(DsmcNanbu),
}

impl Interaction {
    /// Collides the particles of `species` cell by cell. Returns the number of
    /// collisions performed.
    pub fn apply<R: Rng + ?Sized>(
        &mut self,
        dt: f64,
        world: &ThreeDWorld,
        species: &mut [Species],
        rng: &mut R,
    ) -> usize {
        match self {
            Interaction::Vhs(model) => model.apply(dt, world, species, rng),
            Interaction::Coulomb(model) => model.apply(dt, world, species, rng),
        }
    }
}

/// Indices of the live particles of `sp` grouped by containing cell.
pub(crate) fn bin_by_cell(world: &ThreeDWorld, sp: &Species) -> Vec<Vec<usize>> {
    let mut cells = vec![Vec::new(); world.n_cells()];
    for (i, p) in sp.particles.iter().enumerate() {
        if !p.is_dead() {
            cells[world.x_to_c(p.pos)].push(i);
        }
    }
    cells
}

/// Post-collision velocities for a pair whose relative velocity `v1 - v2`
/// becomes `g_new`. The centre-of-mass velocity is unchanged.
pub(crate) fn scatter_pair(v1: DVec3, v2: DVec3, m1: f64, m2: f64, g_new: DVec3) -> (DVec3, DVec3) {
    let m_tot = m1 + m2;
    let cm = (m1 * v1 + m2 * v2) / m_tot;
    (cm + (m2 / m_tot) * g_new, cm - (m1 / m_tot) * g_new)
}
