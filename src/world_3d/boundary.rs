use glam::DVec3;
use rand::Rng;
use std::sync::Arc;

use super::ThreeDWorld;
use crate::constants::PI;
use crate::error::{PicError, PicResult};
use crate::particles::{maxwellian_speed, Particle};

/// Fraction of the crossing step a diffusely reflected particle is moved, so
/// it ends up just inside the wall.
const DIFFUSE_INSET: f64 = 0.999;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoundarySide {
    XMin,
    XMax,
    YMin,
    YMax,
    ZMin,
    ZMax,
}

impl BoundarySide {
    pub const ALL: [BoundarySide; 6] = [
        BoundarySide::XMin,
        BoundarySide::XMax,
        BoundarySide::YMin,
        BoundarySide::YMax,
        BoundarySide::ZMin,
        BoundarySide::ZMax,
    ];

    pub fn from_axis(axis: usize, is_min: bool) -> Self {
        Self::ALL[2 * axis + usize::from(!is_min)]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn axis(self) -> usize {
        self.index() / 2
    }

    pub fn is_min(self) -> bool {
        self.index() % 2 == 0
    }

    /// Unit normal pointing into the domain.
    pub fn inward_normal(self) -> DVec3 {
        let mut n = DVec3::ZERO;
        n[self.axis()] = if self.is_min() { 1.0 } else { -1.0 };
        n
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldBcType {
    Dirichlet,
    Neumann,
    Periodic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParticleBcType {
    Specular,
    Open,
    Diffuse,
    Symmetric,
    Periodic,
}

pub type PositionFn = Arc<dyn Fn(f64, f64, f64) -> f64 + Send + Sync>;
pub type PositionPredicate = Arc<dyn Fn(f64, f64, f64) -> bool + Send + Sync>;

/// Target value of a field boundary condition.
#[derive(Clone)]
pub enum BcValue {
    Constant(f64),
    Function(PositionFn),
}

impl BcValue {
    pub fn eval(&self, x: f64, y: f64, z: f64) -> f64 {
        match self {
            BcValue::Constant(v) => *v,
            BcValue::Function(f) => f(x, y, z),
        }
    }
}

#[derive(Clone)]
pub struct BoundaryCondition {
    pub particle: ParticleBcType,
    pub field: FieldBcType,
    pub value: BcValue,
    /// [K] wall surface temperature
    pub wall_temperature: f64,
    /// [-] thermal accommodation coefficient
    pub accommodation: f64,
    applies_to: Option<PositionPredicate>,
}

impl BoundaryCondition {
    pub fn new(particle: ParticleBcType, field: FieldBcType) -> Self {
        Self {
            particle,
            field,
            value: BcValue::Constant(0.0),
            wall_temperature: 1000.0,
            accommodation: 1.0,
            applies_to: None,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = BcValue::Constant(value);
        self
    }

    pub fn with_value_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(f64, f64, f64) -> f64 + Send + Sync + 'static,
    {
        self.value = BcValue::Function(Arc::new(f));
        self
    }

    pub fn with_wall(mut self, temperature: f64, accommodation: f64) -> Self {
        self.wall_temperature = temperature;
        self.accommodation = accommodation;
        self
    }

    /// Restricts the condition to the part of the face where `pred` holds.
    pub fn with_predicate<F>(mut self, pred: F) -> Self
    where
        F: Fn(f64, f64, f64) -> bool + Send + Sync + 'static,
    {
        self.applies_to = Some(Arc::new(pred));
        self
    }

    pub fn does_apply(&self, x: f64, y: f64, z: f64) -> bool {
        self.applies_to.as_ref().map_or(true, |p| p(x, y, z))
    }

    pub fn get_value(&self, x: f64, y: f64, z: f64) -> f64 {
        self.value.eval(x, y, z)
    }
}

/// Ordered boundary condition lists for the six faces. The first entry whose
/// predicate matches the evaluation point is the one used.
#[derive(Clone, Default)]
pub struct BoundaryConditions {
    faces: [Vec<BoundaryCondition>; 6],
}

impl BoundaryConditions {
    pub fn set(&mut self, side: BoundarySide, bc: BoundaryCondition) {
        self.faces[side.index()] = vec![bc];
    }

    pub fn add(&mut self, side: BoundarySide, bc: BoundaryCondition) {
        self.faces[side.index()].push(bc);
    }

    pub fn at(&self, side: BoundarySide) -> &[BoundaryCondition] {
        &self.faces[side.index()]
    }

    pub fn reverse(&mut self) {
        for list in self.faces.iter_mut() {
            list.reverse();
        }
    }

    pub fn check_complete(&self) -> PicResult<()> {
        for side in BoundarySide::ALL {
            if self.faces[side.index()].is_empty() {
                return Err(PicError::MissingBoundaryCondition(side));
            }
        }
        Ok(())
    }

    pub fn is_periodic(&self, side: BoundarySide) -> bool {
        self.faces[side.index()]
            .first()
            .is_some_and(|bc| bc.field == FieldBcType::Periodic)
    }

    pub fn select(&self, side: BoundarySide, pos: DVec3) -> &BoundaryCondition {
        self.faces[side.index()]
            .iter()
            .find(|bc| bc.does_apply(pos.x, pos.y, pos.z))
            .unwrap_or_else(|| {
                panic!("no boundary condition on {side:?} covers [{}, {}, {}]", pos.x, pos.y, pos.z)
            })
    }
}

/// Random unit vector about the inward normal `n` following the cosine law.
pub fn diffuse_vector<R: Rng + ?Sized>(n: DVec3, rng: &mut R) -> DVec3 {
    let sin_theta: f64 = rng.gen();
    let cos_theta = (1.0 - sin_theta * sin_theta).sqrt();
    let psi = 2.0 * PI * rng.gen::<f64>();

    let mut t1 = n.cross(DVec3::X);
    if t1.length_squared() == 0.0 {
        t1 = n.cross(DVec3::Y);
    }
    let t2 = n.cross(t1);

    sin_theta * (psi.cos() * t1 + psi.sin() * t2) + cos_theta * n
}

impl ThreeDWorld {
    /// Emits the matrix row for boundary node `u` (interior neighbour `v`)
    /// according to the field condition on `side` at node position `pos`.
    pub fn eval_field_bc(
        &self,
        side: BoundarySide,
        b: &mut [f64],
        coeffs: &mut Vec<(usize, usize, f64)>,
        u: usize,
        v: usize,
        pos: DVec3,
    ) {
        let bc = self.boundary_conditions().select(side, pos);
        match bc.field {
            FieldBcType::Dirichlet => {
                coeffs.push((u, u, 1.0));
                b[u] = bc.get_value(pos.x, pos.y, pos.z);
            }
            FieldBcType::Neumann => {
                coeffs.push((u, u, 1.0));
                coeffs.push((u, v, -1.0));
                b[u] = bc.get_value(pos.x, pos.y, pos.z) * self.get_del_x()[side.axis()];
            }
            FieldBcType::Periodic => {
                panic!("periodic face {side:?} has no boundary row; nodes are aliased by the solver");
            }
        }
    }

    /// Applies the particle conditions of every face the particle crossed
    /// while moving from `x_old` to its current position.
    pub fn apply_boundary_conditions<R: Rng + ?Sized>(
        &self,
        mass: f64,
        x_old: DVec3,
        p: &mut Particle,
        rng: &mut R,
    ) {
        let x_min = self.get_x_min();
        let x_max = self.get_x_max();
        for dim in 0..3 {
            if p.pos[dim] < x_min[dim] {
                self.eval_particle_bc(BoundarySide::from_axis(dim, true), x_min[dim],
                                      mass, x_old, p, rng);
            } else if x_max[dim] < p.pos[dim] {
                self.eval_particle_bc(BoundarySide::from_axis(dim, false), x_max[dim],
                                      mass, x_old, p, rng);
            }
            if p.is_dead() {
                break;
            }
        }
    }

    fn eval_particle_bc<R: Rng + ?Sized>(
        &self,
        side: BoundarySide,
        wall: f64,
        mass: f64,
        x_old: DVec3,
        p: &mut Particle,
        rng: &mut R,
    ) {
        let dim = side.axis();
        let t = (wall - x_old[dim]) / (p.pos[dim] - x_old[dim]);
        let hit = x_old + t * (p.pos - x_old);
        let bc = self.boundary_conditions().select(side, hit);

        match bc.particle {
            ParticleBcType::Specular | ParticleBcType::Symmetric => {
                p.pos[dim] = 2.0 * wall - p.pos[dim];
                p.vel[dim] *= -1.0;
            }
            ParticleBcType::Open => {
                p.w_mp = 0.0;
            }
            ParticleBcType::Diffuse => {
                let dt_rem = (1.0 - t) * p.dt;
                p.dt -= dt_rem;
                p.pos = x_old + DIFFUSE_INSET * t * (p.pos - x_old);

                let v_mag1 = p.vel.length();
                let v_th = maxwellian_speed(mass, bc.wall_temperature, rng);
                let v_mag2 = v_mag1 + bc.accommodation * (v_th - v_mag1);
                p.vel = v_mag2 * diffuse_vector(side.inward_normal(), rng);
            }
            ParticleBcType::Periodic => {
                let length = self.get_x_max()[dim] - self.get_x_min()[dim];
                p.pos[dim] += if side.is_min() { length } else { -length };
            }
        }
    }
}
