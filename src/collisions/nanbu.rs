use glam::DVec3;
use rand::seq::SliceRandom;
use rand::Rng;

use super::{bin_by_cell, scatter_pair};
use crate::constants::{EPS0, HBAR, K, PI, QE};
use crate::error::{PicError, PicResult};
use crate::particles::Species;
use crate::world_3d::ThreeDWorld;

/// Smallest Coulomb logarithm used.
const LN_LAMBDA_MIN: f64 = 2.0;

/// Nanbu's binary Coulomb collision model. Every charged particle is paired
/// once per step and scattered by the accumulated small-angle deflection.
pub struct DsmcNanbu {
    members: Vec<usize>,
    lambda_d: f64,
}

impl DsmcNanbu {
    /// `members` index the charged species of `species`; the Debye length is
    /// taken from the electron temperature `te` [K] and density `ne` [1/m^3].
    pub fn new(species: &[Species], members: &[usize], te: f64, ne: f64) -> PicResult<Self> {
        for &s in members {
            let sp = species.get(s)
                .ok_or_else(|| PicError::InvalidSpecies(format!("no species with index {s}")))?;
            if sp.charge == 0.0 {
                return Err(PicError::InvalidSpecies(format!("{} is neutral", sp.name)));
            }
        }
        if !(te > 0.0 && ne > 0.0) {
            return Err(PicError::InvalidSpecies(format!("electron state T={te} K, n={ne} m^-3")));
        }
        Ok(Self { members: members.to_vec(), lambda_d: debye_length(te, ne) })
    }

    pub fn debye_length(&self) -> f64 {
        self.lambda_d
    }

    pub fn apply<R: Rng + ?Sized>(
        &mut self,
        dt: f64,
        world: &ThreeDWorld,
        species: &mut [Species],
        rng: &mut R,
    ) -> usize {
        let v_cell = world.cell_volume();
        let bins: Vec<Vec<Vec<usize>>> = self.members.iter()
            .map(|&s| bin_by_cell(world, &species[s]))
            .collect();

        let mut n_collisions = 0;
        for c in 0..world.n_cells() {
            for a in 0..self.members.len() {
                for b in a..self.members.len() {
                    let pairs = if a == b {
                        same_species_pairs(&bins[a][c], rng)
                    } else {
                        cross_species_pairs(&bins[a][c], &bins[b][c])
                    };
                    if pairs.is_empty() {
                        continue;
                    }

                    let (sa, sb) = (self.members[a], self.members[b]);
                    // density of the partner population seen by each pair
                    let partner = if a == b || bins[a][c].len() >= bins[b][c].len() { sb } else { sa };
                    let partner_bin = if partner == sb { &bins[b][c] } else { &bins[a][c] };
                    let n_partner = partner_bin.iter()
                        .map(|&i| species[partner].particles[i].w_mp)
                        .sum::<f64>() / v_cell;

                    let (m1, q1) = (species[sa].mass, species[sa].charge);
                    let (m2, q2) = (species[sb].mass, species[sb].charge);
                    for (i1, i2) in pairs {
                        let v1 = species[sa].particles[i1].vel;
                        let v2 = species[sb].particles[i2].vel;
                        let coupling = PairCoupling { m1, m2, q1, q2, n_partner };
                        if let Some((w1, w2)) = self.collide(v1, v2, &coupling, dt, rng) {
                            species[sa].particles[i1].vel = w1;
                            species[sb].particles[i2].vel = w2;
                            n_collisions += 1;
                        }
                    }
                }
            }
        }
        n_collisions
    }

    fn collide<R: Rng + ?Sized>(
        &self,
        v1: DVec3,
        v2: DVec3,
        c: &PairCoupling,
        dt: f64,
        rng: &mut R,
    ) -> Option<(DVec3, DVec3)> {
        let g_vec = v1 - v2;
        let g = g_vec.length();
        if g == 0.0 {
            return None;
        }
        let mr = c.m1 * c.m2 / (c.m1 + c.m2);
        let b_classical = (c.q1 * c.q2).abs() / (4.0 * PI * EPS0 * mr * g * g);
        let b_quantum = HBAR / (2.0 * mr * g);
        let ln_lambda = (self.lambda_d / b_classical.max(b_quantum)).ln().max(LN_LAMBDA_MIN);

        let s = ln_lambda / (4.0 * PI) * (c.q1 * c.q2 / (EPS0 * mr)).powi(2) * c.n_partner * dt
            / (g * g * g);
        let cos_chi = scattering_cosine(s, rng.gen());
        let sin_chi = (1.0 - cos_chi * cos_chi).max(0.0).sqrt();
        let eps = 2.0 * PI * rng.gen::<f64>();

        let g_new = cos_chi * g_vec + sin_chi * perpendicular(g_vec, eps);
        Some(scatter_pair(v1, v2, c.m1, c.m2, g_new))
    }
}

struct PairCoupling {
    m1: f64,
    m2: f64,
    q1: f64,
    q2: f64,
    n_partner: f64,
}

/// Electron Debye length for temperature `te` [K] and density `ne`.
pub fn debye_length(te: f64, ne: f64) -> f64 {
    (EPS0 * K * te / (ne * QE * QE)).sqrt()
}

/// Nanbu's `A(s)` parameter of the deflection distribution.
fn nanbu_a(s: f64) -> f64 {
    if s < 0.01 {
        1.0 / s
    } else if s < 3.0 {
        let inv = 0.0056958 + s * (0.9560202 + s * (-0.508139
            + s * (0.47913906 + s * (-0.12788975 + s * 0.02389567))));
        1.0 / inv
    } else {
        3.0 * (-s).exp()
    }
}

/// Samples `cos(chi)` for the accumulated collision parameter `s` from the
/// uniform deviate `u`. Above `s = 6` the scattering is isotropic.
pub fn scattering_cosine(s: f64, u: f64) -> f64 {
    if s > 6.0 {
        return 2.0 * u - 1.0;
    }
    let a = nanbu_a(s);
    let cos_chi = 1.0 + (u + (1.0 - u) * (-2.0 * a).exp()).ln() / a;
    cos_chi.clamp(-1.0, 1.0)
}

/// Vector of length |g| perpendicular to `g` at azimuth `eps`.
fn perpendicular(g: DVec3, eps: f64) -> DVec3 {
    let g_mag = g.length();
    let g_perp = (g.y * g.y + g.z * g.z).sqrt();
    let (ce, se) = (eps.cos(), eps.sin());
    if g_perp == 0.0 {
        return DVec3::new(0.0, g_mag * ce, g_mag * se);
    }
    DVec3::new(
        g_perp * ce,
        -(g.y * g.x * ce + g_mag * g.z * se) / g_perp,
        -(g.z * g.x * ce - g_mag * g.y * se) / g_perp,
    )
}

/// Shuffled consecutive pairs; with an odd count the last particle is paired
/// with a random other one.
fn same_species_pairs<R: Rng + ?Sized>(members: &[usize], rng: &mut R) -> Vec<(usize, usize)> {
    let n = members.len();
    if n < 2 {
        return Vec::new();
    }
    let mut order = members.to_vec();
    order.shuffle(rng);
    let mut pairs: Vec<(usize, usize)> = order.chunks_exact(2).map(|p| (p[0], p[1])).collect();
    if n % 2 == 1 {
        let last = order[n - 1];
        let other = order[rng.gen_range(0..n - 1)];
        pairs.push((last, other));
    }
    pairs
}

/// Every particle of the larger population meets one of the smaller,
/// cycling through the smaller one. Pairs are ordered `(first, second)`.
fn cross_species_pairs(first: &[usize], second: &[usize]) -> Vec<(usize, usize)> {
    if first.is_empty() || second.is_empty() {
        return Vec::new();
    }
    if first.len() >= second.len() {
        first.iter().enumerate().map(|(k, &i)| (i, second[k % second.len()])).collect()
    } else {
        second.iter().enumerate().map(|(k, &j)| (first[k % first.len()], j)).collect()
    }
}
