use glam::DVec3;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::constants::K;
use crate::error::{PicError, PicResult};
use crate::world_3d::{ThreeDField, ThreeDWorld};

/// Upper bound on the partial steps a particle may take in one time step
/// (one per diffuse wall hit).
const MAX_SUBSTEPS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub pos: DVec3,
    pub vel: DVec3,
    /// macroparticle weight, zero once the particle left the domain
    pub w_mp: f64,
    /// time remaining in the current push
    pub dt: f64,
}

impl Particle {
    pub fn new(pos: DVec3, vel: DVec3, w_mp: f64) -> Self {
        Self { pos, vel, w_mp, dt: 0.0 }
    }

    pub fn is_dead(&self) -> bool {
        self.w_mp <= 0.0
    }
}

/// Speed of a particle drawn from a Maxwellian at `temperature` [K].
pub fn maxwellian_speed<R: Rng + ?Sized>(mass: f64, temperature: f64, rng: &mut R) -> f64 {
    maxwellian_velocity(mass, temperature, rng).length()
}

/// Velocity vector drawn from a zero-mean Maxwellian at `temperature` [K].
pub fn maxwellian_velocity<R: Rng + ?Sized>(mass: f64, temperature: f64, rng: &mut R) -> DVec3 {
    let v_th = (K * temperature / mass).sqrt();
    let x: f64 = rng.sample(StandardNormal);
    let y: f64 = rng.sample(StandardNormal);
    let z: f64 = rng.sample(StandardNormal);
    v_th * DVec3::new(x, y, z)
}

pub struct Species {
    pub name: String,
    pub mass: f64,   // [kg]
    pub charge: f64, // [C]
    /// weight given to newly created macroparticles
    pub mpw0: f64,
    pub particles: Vec<Particle>,

    pub number_density: ThreeDField<f64>, // [1/m^3]
    pub n_mean: ThreeDField<f64>,         // time averaged number density
    pub v_stream: ThreeDField<DVec3>,     // [m/s]
    pub temperature: ThreeDField<f64>,    // [K]
    pub mp_count: ThreeDField<f64>,       // macroparticles per cell

    n_sum: ThreeDField<f64>,
    n_avg_samples: usize,
    averaging: bool,

    // velocity moment accumulators
    w_sum: ThreeDField<f64>,
    wv_sum: ThreeDField<DVec3>,
    wvv_sum: ThreeDField<DVec3>,
}

impl Species {
    pub fn init(
        name: impl Into<String>,
        mass: f64,
        charge: f64,
        mpw0: f64,
        world: &ThreeDWorld,
    ) -> PicResult<Self> {
        let name = name.into();
        if !(mass > 0.0) {
            return Err(PicError::InvalidSpecies(format!("{name}: mass must be positive")));
        }
        if !(mpw0 > 0.0) {
            return Err(PicError::InvalidSpecies(format!("{name}: macroparticle weight must be positive")));
        }

        let [ni, nj, nk] = world.nn();
        Ok(Self {
            name,
            mass,
            charge,
            mpw0,
            particles: Vec::new(),
            number_density: ThreeDField::init(ni, nj, nk, 0.0),
            n_mean: ThreeDField::init(ni, nj, nk, 0.0),
            v_stream: ThreeDField::init(ni, nj, nk, DVec3::ZERO),
            temperature: ThreeDField::init(ni, nj, nk, 0.0),
            mp_count: ThreeDField::init(ni - 1, nj - 1, nk - 1, 0.0),
            n_sum: ThreeDField::init(ni, nj, nk, 0.0),
            n_avg_samples: 0,
            averaging: false,
            w_sum: ThreeDField::init(ni, nj, nk, 0.0),
            wv_sum: ThreeDField::init(ni, nj, nk, DVec3::ZERO),
            wvv_sum: ThreeDField::init(ni, nj, nk, DVec3::ZERO),
        })
    }

    pub fn add_particle(&mut self, pos: DVec3, vel: DVec3, w_mp: f64) {
        self.particles.push(Particle::new(pos, vel, w_mp));
    }

    /// Number of macroparticles.
    pub fn get_sim_count(&self) -> usize {
        self.particles.len()
    }

    /// Number of real particles represented.
    pub fn get_real_count(&self) -> f64 {
        self.particles.iter().map(|p| p.w_mp).sum()
    }

    pub fn get_momentum(&self) -> DVec3 {
        self.mass * self.particles.iter().fold(DVec3::ZERO, |acc, p| acc + p.w_mp * p.vel)
    }

    pub fn get_kinetic_energy(&self) -> f64 {
        let sum: f64 = self.particles.iter().map(|p| p.w_mp * p.vel.length_squared()).sum();
        0.5 * self.mass * sum
    }

    pub fn maxwellian_speed<R: Rng + ?Sized>(&self, temperature: f64, rng: &mut R) -> f64 {
        maxwellian_speed(self.mass, temperature, rng)
    }

    /// Fills the box `[corner_min, corner_max]` with particles at rest
    /// (plus `v_drift`) at `density`.
    pub fn load_cold_box<R: Rng + ?Sized>(
        &mut self,
        world: &ThreeDWorld,
        corner_min: DVec3,
        corner_max: DVec3,
        density: f64,
        v_drift: DVec3,
        rng: &mut R,
    ) -> PicResult<()> {
        self.load_box(world, corner_min, corner_max, density, v_drift, 0.0, rng)
    }

    /// Like `load_cold_box` with Maxwellian velocities at `temperature` [K].
    pub fn load_warm_box<R: Rng + ?Sized>(
        &mut self,
        world: &ThreeDWorld,
        corner_min: DVec3,
        corner_max: DVec3,
        density: f64,
        v_drift: DVec3,
        temperature: f64,
        rng: &mut R,
    ) -> PicResult<()> {
        self.load_box(world, corner_min, corner_max, density, v_drift, temperature, rng)
    }

    #[allow(clippy::too_many_arguments)]
    fn load_box<R: Rng + ?Sized>(
        &mut self,
        world: &ThreeDWorld,
        corner_min: DVec3,
        corner_max: DVec3,
        density: f64,
        v_drift: DVec3,
        temperature: f64,
        rng: &mut R,
    ) -> PicResult<()> {
        if !corner_min.cmplt(corner_max).all() {
            return Err(PicError::InvalidSpecies(format!(
                "{}: empty loading box {corner_min} to {corner_max}", self.name)));
        }

        println!("Loading {} into box [{}, {}, {}] to [{}, {}, {}]", self.name,
                 corner_min.x, corner_min.y, corner_min.z,
                 corner_max.x, corner_max.y, corner_max.z);

        let extent = corner_max - corner_min;
        let num_real = density * extent.x * extent.y * extent.z;
        let num_sim = (num_real / self.mpw0).round() as usize;
        if num_sim == 0 {
            return Ok(());
        }
        let w_mp = num_real / num_sim as f64;

        // rewind velocities by half a step for the leapfrog
        let rewind = 0.5 * world.get_dt() * self.charge / self.mass;

        self.particles.reserve(num_sim);
        for _ in 0..num_sim {
            let r = DVec3::new(rng.gen(), rng.gen(), rng.gen());
            let pos = corner_min + r * extent;
            let mut vel = v_drift;
            if temperature > 0.0 {
                vel += maxwellian_velocity(self.mass, temperature, rng);
            }
            vel -= rewind * world.interpolate_ef(world.x_to_l(pos));
            self.add_particle(pos, vel, w_mp);
        }
        Ok(())
    }

    /// Deposits the macroparticle weights and divides by node volume. While
    /// time averaging is on, also updates `n_mean`.
    pub fn calc_number_density(&mut self, world: &ThreeDWorld) {
        self.number_density.set_all(0.0);
        for p in self.particles.iter() {
            self.number_density.scatter(world.x_to_l(p.pos), p.w_mp);
        }
        world.fold_periodic(&mut self.number_density);
        self.number_density.elementwise_inplace_div(&world.periodic_node_volume());

        if self.averaging {
            self.n_sum.elementwise_inplace_add(&self.number_density);
            self.n_avg_samples += 1;
            let inv = 1.0 / self.n_avg_samples as f64;
            for (mean, sum) in self.n_mean.data_mut().iter_mut().zip(self.n_sum.data()) {
                *mean = sum * inv;
            }
        } else {
            self.n_mean.data_mut().copy_from_slice(self.number_density.data());
        }
    }

    pub fn start_time_averaging(&mut self) {
        self.averaging = true;
        self.n_sum.set_all(0.0);
        self.n_avg_samples = 0;
    }

    /// Leapfrog push through the world's electric field. Particles that hit a
    /// diffuse wall finish the remaining fraction of the step from the wall.
    pub fn push_particles_leapfrog<R: Rng + ?Sized>(&mut self, world: &ThreeDWorld, rng: &mut R) {
        let dt = world.get_dt();
        let qm = self.charge / self.mass;

        for p in self.particles.iter_mut() {
            let mut dt_left = dt;
            let mut steps = 0;
            while dt_left > 0.0 && !p.is_dead() && steps < MAX_SUBSTEPS {
                steps += 1;
                p.dt = dt_left;
                let ef = world.interpolate_ef(world.x_to_l(p.pos));
                p.vel += ef * (qm * p.dt);

                let x_old = p.pos;
                p.pos += p.vel * p.dt;
                world.apply_boundary_conditions(self.mass, x_old, p, rng);
                dt_left -= p.dt;
            }
        }
    }

    pub fn remove_dead_particles(&mut self) {
        self.particles.retain(|p| !p.is_dead());
    }

    /// Accumulates weight, velocity and squared velocity on the nodes.
    pub fn sample_moments(&mut self, world: &ThreeDWorld) {
        let [ni, nj, nk] = world.nn();
        let mut w = ThreeDField::init(ni, nj, nk, 0.0);
        let mut wv = ThreeDField::init(ni, nj, nk, DVec3::ZERO);
        let mut wvv = ThreeDField::init(ni, nj, nk, DVec3::ZERO);
        for p in self.particles.iter() {
            let l = world.x_to_l(p.pos);
            w.scatter(l, p.w_mp);
            wv.scatter(l, p.vel * p.w_mp);
            wvv.scatter(l, p.vel * p.vel * p.w_mp);
        }
        world.fold_periodic(&mut w);
        world.fold_periodic(&mut wv);
        world.fold_periodic(&mut wvv);
        self.w_sum.elementwise_inplace_add(&w);
        self.wv_sum.elementwise_inplace_add(&wv);
        self.wvv_sum.elementwise_inplace_add(&wvv);
    }

    /// Turns the sampled moments into stream velocity and temperature, then
    /// clears the accumulators.
    pub fn calc_gas_properties(&mut self) {
        let t_scale = self.mass / (3.0 * K);
        for u in 0..self.w_sum.len() {
            let w = self.w_sum.data()[u];
            let (v, t) = if w > 0.0 {
                let v = self.wv_sum.data()[u] / w;
                let v2 = self.wvv_sum.data()[u] / w;
                (v, (t_scale * (v2 - v * v).element_sum()).max(0.0))
            } else {
                (DVec3::ZERO, 0.0)
            };
            self.v_stream.data_mut()[u] = v;
            self.temperature.data_mut()[u] = t;
        }
        self.w_sum.set_all(0.0);
        self.wv_sum.set_all(DVec3::ZERO);
        self.wvv_sum.set_all(DVec3::ZERO);
    }

    pub fn calc_macroparticle_count(&mut self, world: &ThreeDWorld) {
        self.mp_count.set_all(0.0);
        let counts = self.mp_count.data_mut();
        for p in self.particles.iter() {
            counts[world.x_to_c(p.pos)] += 1.0;
        }
    }
}
