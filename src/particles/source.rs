use glam::DVec3;
use rand::Rng;

use super::particles::{maxwellian_velocity, Species};
use crate::constants::{K, PI};
use crate::error::{PicError, PicResult};
use crate::world_3d::ThreeDWorld;

/// Injects a drifting Maxwellian population through a rectangle lying on one
/// of the domain faces.
#[derive(Clone, Debug)]
pub struct WarmBeam {
    x1: DVec3,
    x2: DVec3,
    normal: DVec3,
    v_drift: DVec3,
    density: f64,     // [1/m^3]
    temperature: f64, // [K]
    area: f64,
    remainder: f64,
}

impl WarmBeam {
    pub fn new(
        world: &ThreeDWorld,
        x1: DVec3,
        x2: DVec3,
        v_drift: DVec3,
        density: f64,
        temperature: f64,
    ) -> PicResult<Self> {
        let axis = (0..3).find(|&a| x1[a] == x2[a]).ok_or_else(|| {
            PicError::InvalidSource(format!("rectangle {x1} to {x2} is not planar"))
        })?;
        let normal = if x1[axis] == world.get_x_min()[axis] {
            DVec3::AXES[axis]
        } else if x1[axis] == world.get_x_max()[axis] {
            -DVec3::AXES[axis]
        } else {
            return Err(PicError::InvalidSource(format!("rectangle {x1} to {x2} is not on a domain face")));
        };

        let extent = (x2 - x1).abs();
        let area: f64 = (0..3).filter(|&a| a != axis).map(|a| extent[a]).product();

        Ok(Self { x1, x2, normal, v_drift, density, temperature, area, remainder: 0.0 })
    }

    /// One-sided flux [1/m^2/s] of the drifting Maxwellian through the face.
    fn flux(&self, mass: f64) -> f64 {
        let v_d = self.v_drift.dot(self.normal);
        if self.temperature <= 0.0 {
            return self.density * v_d.max(0.0);
        }
        let v_th = (2.0 * K * self.temperature / mass).sqrt();
        let s = v_d / v_th;
        self.density * (0.5 * v_d * (1.0 + libm::erf(s))
            + v_th / (2.0 * PI.sqrt()) * (-s * s).exp())
    }

    /// Adds this step's particles to `sp`. The fractional particle count is
    /// carried over to the next call.
    pub fn sample<R: Rng + ?Sized>(&mut self, world: &ThreeDWorld, sp: &mut Species, rng: &mut R) {
        let dt = world.get_dt();
        let num_real = self.flux(sp.mass) * self.area * dt;
        let num_sim_f = num_real / sp.mpw0 + self.remainder;
        let num_sim = num_sim_f as usize;
        self.remainder = num_sim_f - num_sim as f64;

        for _ in 0..num_sim {
            let r = DVec3::new(rng.gen(), rng.gen(), rng.gen());
            let mut pos = self.x1 + r * (self.x2 - self.x1);

            let vel = loop {
                let v = self.v_drift + maxwellian_velocity(sp.mass, self.temperature, rng);
                if v.dot(self.normal) > 0.0 {
                    break v;
                }
            };
            // spread the entry times over the step
            pos += vel * (rng.gen::<f64>() * dt);
            if world.is_inside(pos) {
                sp.add_particle(pos, vel, sp.mpw0);
            }
        }
    }
}
