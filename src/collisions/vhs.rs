use glam::DVec3;
use rand::Rng;

use super::{bin_by_cell, scatter_pair};
use crate::constants::{K, PI};
use crate::error::{PicError, PicResult};
use crate::particles::Species;
use crate::world_3d::ThreeDWorld;

/// Starting estimate of the largest `sigma * g` [m^3/s].
const SIGMA_CR_MAX_INIT: f64 = 1e-14;

/// Variable hard sphere reference properties.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VhsGas {
    pub d_ref: f64, // [m]
    pub t_ref: f64, // [K]
    /// viscosity index
    pub omega: f64,
}

/// Bird's reference values, looked up by species name. A trailing charge
/// sign is ignored so "Xe+" resolves to xenon.
pub fn vhs_gas(name: &str) -> PicResult<VhsGas> {
    let gas = |d_ref: f64, t_ref: f64, omega: f64| -> PicResult<VhsGas> {
        Ok(VhsGas { d_ref, t_ref, omega })
    };
    match name.trim_end_matches(['+', '-']) {
        "O" => gas(4.07e-10, 273.15, 0.77),
        "O2" => gas(4.07e-10, 273.0, 0.77),
        "N2" => gas(4.17e-10, 273.0, 0.74),
        "Ar" => gas(4.17e-10, 273.0, 0.81),
        "Xe" => gas(5.74e-10, 273.0, 0.85),
        "He" => gas(2.33e-10, 273.0, 0.66),
        _ => Err(PicError::UnknownGas(name.to_string())),
    }
}

impl VhsGas {
    /// Mixing rule for unlike pairs.
    fn mix(&self, other: &VhsGas) -> VhsGas {
        VhsGas {
            d_ref: 0.5 * (self.d_ref + other.d_ref),
            t_ref: 0.5 * (self.t_ref + other.t_ref),
            omega: 0.5 * (self.omega + other.omega),
        }
    }

    /// `sigma(g) * g` for reduced mass `mr` at relative speed `g`.
    pub fn sigma_cr(&self, mr: f64, g: f64) -> f64 {
        let omega = self.omega;
        let df = self.d_ref * self.d_ref * (2.0 * K * self.t_ref / mr).powf(omega - 0.5)
            / libm::tgamma(2.5 - omega);
        PI * df * g.powf(2.0 - 2.0 * omega)
    }
}

/// Direct simulation Monte Carlo with Bird's no-time-counter selection and
/// VHS cross sections.
pub struct DsmcBird {
    members: Vec<(usize, VhsGas)>,
    sigma_cr_max: f64,
    remainder: Vec<f64>,
}

impl DsmcBird {
    /// `members` are indices into `species` of the gases that collide with
    /// each other.
    pub fn new(species: &[Species], members: &[usize]) -> PicResult<Self> {
        let members = members.iter().map(|&s| -> PicResult<(usize, VhsGas)> {
            let sp = species.get(s)
                .ok_or_else(|| PicError::InvalidSpecies(format!("no species with index {s}")))?;
            Ok((s, vhs_gas(&sp.name)?))
        }).collect::<PicResult<Vec<_>>>()?;

        Ok(Self { members, sigma_cr_max: SIGMA_CR_MAX_INIT, remainder: Vec::new() })
    }

    pub fn sigma_cr_max(&self) -> f64 {
        self.sigma_cr_max
    }

    pub fn apply<R: Rng + ?Sized>(
        &mut self,
        dt: f64,
        world: &ThreeDWorld,
        species: &mut [Species],
        rng: &mut R,
    ) -> usize {
        let n_cells = world.n_cells();
        self.remainder.resize(n_cells, 0.0);

        // (member, particle) per cell
        let mut cells: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n_cells];
        for (m, &(s, _)) in self.members.iter().enumerate() {
            for (c, list) in bin_by_cell(world, &species[s]).into_iter().enumerate() {
                cells[c].extend(list.into_iter().map(|i| (m, i)));
            }
        }

        let v_cell = world.cell_volume();
        let mut sigma_cr_max_obs: f64 = 0.0;
        let mut n_collisions = 0;

        for (c, pool) in cells.iter().enumerate() {
            let n = pool.len();
            if n < 2 {
                continue;
            }
            let w_mean = pool.iter()
                .map(|&(m, i)| species[self.members[m].0].particles[i].w_mp)
                .sum::<f64>() / n as f64;

            let ng_f = 0.5 * (n * n) as f64 * w_mean * self.sigma_cr_max * dt / v_cell
                + self.remainder[c];
            let n_groups = ng_f as usize;
            self.remainder[c] = ng_f - n_groups as f64;

            for _ in 0..n_groups {
                let a = rng.gen_range(0..n);
                let mut b = rng.gen_range(0..n - 1);
                if b >= a {
                    b += 1;
                }
                let (ma, ia) = pool[a];
                let (mb, ib) = pool[b];
                let (sa, gas_a) = self.members[ma];
                let (sb, gas_b) = self.members[mb];

                let (m1, m2) = (species[sa].mass, species[sb].mass);
                let v1 = species[sa].particles[ia].vel;
                let v2 = species[sb].particles[ib].vel;
                let g = (v1 - v2).length();
                let mr = m1 * m2 / (m1 + m2);

                let sigma_cr = gas_a.mix(&gas_b).sigma_cr(mr, g);
                sigma_cr_max_obs = sigma_cr_max_obs.max(sigma_cr);

                if sigma_cr / self.sigma_cr_max > rng.gen::<f64>() {
                    let (w1, w2) = collide_isotropic(v1, v2, m1, m2, rng);
                    species[sa].particles[ia].vel = w1;
                    species[sb].particles[ib].vel = w2;
                    n_collisions += 1;
                }
            }
        }

        if sigma_cr_max_obs > 0.0 {
            self.sigma_cr_max = sigma_cr_max_obs;
        }
        n_collisions
    }
}

/// Elastic collision with an isotropically scattered relative velocity.
pub fn collide_isotropic<R: Rng + ?Sized>(
    v1: DVec3,
    v2: DVec3,
    m1: f64,
    m2: f64,
    rng: &mut R,
) -> (DVec3, DVec3) {
    let g = (v1 - v2).length();
    let cos_chi = 2.0 * rng.gen::<f64>() - 1.0;
    let sin_chi = (1.0 - cos_chi * cos_chi).sqrt();
    let eps = 2.0 * PI * rng.gen::<f64>();
    let g_new = g * DVec3::new(cos_chi, sin_chi * eps.cos(), sin_chi * eps.sin());
    scatter_pair(v1, v2, m1, m2, g_new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::AMU;
    use crate::world_3d::SingleDimSpec;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn gas_lookup_ignores_charge_sign() {
        assert_eq!(vhs_gas("Xe+").unwrap().d_ref, 5.74e-10);
        assert_eq!(vhs_gas("O").unwrap().t_ref, 273.15);
        assert!(matches!(vhs_gas("Kr"), Err(PicError::UnknownGas(_))));
    }

    #[test]
    fn cross_section_at_reference_energy() {
        let gas = vhs_gas("Ar").unwrap();
        let mr = 0.5 * 40.0 * AMU;
        // relative speed where mr g^2 / 2 = k T_ref
        let g = (2.0 * K * gas.t_ref / mr).sqrt();
        let sigma = gas.sigma_cr(mr, g) / g;
        let expected = PI * gas.d_ref * gas.d_ref / libm::tgamma(2.5 - gas.omega);
        assert!((sigma - expected).abs() / expected < 1e-12);
        assert_eq!(gas.sigma_cr(mr, 0.0), 0.0);
    }

    #[test]
    fn isotropic_collision_conserves_pair_invariants() {
        let mut rng = StdRng::seed_from_u64(11);
        let (m1, m2) = (16.0 * AMU, 40.0 * AMU);
        for _ in 0..100 {
            let v1 = DVec3::new(rng.gen_range(-1e3..1e3), rng.gen_range(-1e3..1e3), rng.gen_range(-1e3..1e3));
            let v2 = DVec3::new(rng.gen_range(-1e3..1e3), rng.gen_range(-1e3..1e3), rng.gen_range(-1e3..1e3));
            let (w1, w2) = collide_isotropic(v1, v2, m1, m2, &mut rng);
            let p0 = m1 * v1 + m2 * v2;
            let e0 = m1 * v1.length_squared() + m2 * v2.length_squared();
            assert!((m1 * w1 + m2 * w2 - p0).length() <= 1e-12 * p0.length().max(m2 * 1e3));
            assert!((m1 * w1.length_squared() + m2 * w2.length_squared() - e0).abs() <= 1e-12 * e0);
        }
    }

    #[test]
    fn unknown_member_gas_is_rejected() {
        let d = SingleDimSpec::init(2, 0.0, 0.01).unwrap();
        let world = ThreeDWorld::init("test", d, d, d).unwrap();
        let species = vec![Species::init("Kr", 84.0 * AMU, 0.0, 1.0, &world).unwrap()];
        assert!(matches!(DsmcBird::new(&species, &[0]), Err(PicError::UnknownGas(_))));
        assert!(matches!(DsmcBird::new(&species, &[3]), Err(PicError::InvalidSpecies(_))));
    }

    #[test]
    fn cell_collisions_conserve_totals() {
        let d = SingleDimSpec::init(2, 0.0, 0.01).unwrap();
        let world = ThreeDWorld::init("test", d, d, d).unwrap();
        let mut rng = StdRng::seed_from_u64(12);
        let mut species = vec![Species::init("Ar", 40.0 * AMU, 0.0, 1e12, &world).unwrap()];
        species[0].load_warm_box(&world, world.get_x_min(), world.get_x_max(), 1e21,
                                 DVec3::new(200.0, 0.0, 0.0), 300.0, &mut rng).unwrap();
        let p0 = species[0].get_momentum();
        let e0 = species[0].get_kinetic_energy();

        let mut dsmc = DsmcBird::new(&species, &[0]).unwrap();
        let mut total = 0;
        for _ in 0..5 {
            total += dsmc.apply(1e-7, &world, &mut species, &mut rng);
        }
        assert!(total > 0);
        assert!(dsmc.sigma_cr_max() < SIGMA_CR_MAX_INIT);
        assert!((species[0].get_momentum() - p0).length() < 1e-9 * p0.length());
        assert!((species[0].get_kinetic_energy() - e0).abs() < 1e-9 * e0);
    }
}
