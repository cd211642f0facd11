use glam::DVec3;
use std::ops::{Add, AddAssign, Mul};
use std::time::Instant;

// internal
use super::boundary::{BoundaryCondition, BoundaryConditions, BoundarySide};
use super::steady_state::{ConservedTotals, SteadyStateDetector};
use super::ThreeDField;
use crate::constants::*;
use crate::error::{PicError, PicResult};
use crate::output::TimeInfo;
use crate::particles::Species;


#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SingleDimSpec {
    pub n: usize,
    pub min: f64,
    pub max: f64,
    // computed fields
    pub delta: f64,
}

impl SingleDimSpec {
    pub fn init(n: usize, min: f64, max: f64) -> PicResult<Self> {
        Self::init_axis('x', n, min, max)
    }

    fn init_axis(axis: char, n: usize, min: f64, max: f64) -> PicResult<Self> {
        if n < 2 {
            return Err(PicError::InvalidGrid { axis, message: format!("{n} nodes, need at least 2") });
        }
        if !(max > min) {
            return Err(PicError::InvalidGrid { axis, message: format!("empty extent [{min}, {max}]") });
        }
        Ok(Self { n, min, max, delta: (max - min) / (n - 1) as f64 })
    }

    pub fn center(&self) -> f64 {
        0.5 * (self.min + self.max)
    }

    pub fn length(&self) -> f64 {
        self.max - self.min
    }

    pub fn print(&self) {
        println!("Extent: [{:.4}, {:.4}], {} cells", self.min, self.max, self.n-1);
    }
}

/// Structured mesh, node fields and boundary conditions of the simulation.
pub struct ThreeDWorld {
    pub prefix: String,
    pub x_dim: SingleDimSpec,
    pub y_dim: SingleDimSpec,
    pub z_dim: SingleDimSpec,

    pub node_volume: ThreeDField<f64>, // [m^3]
    pub rho: ThreeDField<f64>,         // [C/m^3] charge density
    pub phi: ThreeDField<f64>,         // [V] potential
    pub ef: ThreeDField<DVec3>,        // [V/m] electric field
    pub n_e_br: ThreeDField<f64>,      // [1/m^3] Boltzmann-relation electron density
    pub t_tot: ThreeDField<f64>,       // [K] density-weighted mixture temperature
    pub ln_lambda: ThreeDField<f64>,   // Coulomb logarithm

    bcs: BoundaryConditions,
    steady: SteadyStateDetector,
    averaging_time: bool,

    dt: f64,
    time: f64,
    iteration: Option<usize>,
    iter_max: usize,
    wall_start: Instant,
}

pub fn get_time_info_from_world(world: &ThreeDWorld) -> TimeInfo {
    TimeInfo {
        iteration: world.get_iteration(),
        sim_time: world.get_sim_time(),
        wall_time: world.get_wtime(),
    }
}

impl ThreeDWorld {

    pub fn init(
        prefix: impl Into<String>,
        x_dim: SingleDimSpec,
        y_dim: SingleDimSpec,
        z_dim: SingleDimSpec,
    ) -> PicResult<Self> {
        let (ni, nj, nk) = (x_dim.n, y_dim.n, z_dim.n);
        let mut world = Self {
            prefix: prefix.into(),
            x_dim, y_dim, z_dim,
            node_volume: ThreeDField::init(ni, nj, nk, 0.0),
            rho: ThreeDField::init(ni, nj, nk, 0.0),
            phi: ThreeDField::init(ni, nj, nk, 0.0),
            ef: ThreeDField::init(ni, nj, nk, DVec3::ZERO),
            n_e_br: ThreeDField::init(ni, nj, nk, 0.0),
            t_tot: ThreeDField::init(ni, nj, nk, 0.0),
            ln_lambda: ThreeDField::init(ni, nj, nk, 0.0),
            bcs: BoundaryConditions::default(),
            steady: SteadyStateDetector::default(),
            averaging_time: false,
            dt: 0.0,
            time: 0.0,
            iteration: None,
            iter_max: 0,
            wall_start: Instant::now(),
        };
        world.calc_node_volume();
        Ok(world)
    }

    /// Rescales the mesh to the box `[x_min, x_max]` keeping the node counts.
    pub fn set_dimensions(&mut self, x_min: DVec3, x_max: DVec3) -> PicResult<()> {
        self.x_dim = SingleDimSpec::init_axis('x', self.x_dim.n, x_min.x, x_max.x)?;
        self.y_dim = SingleDimSpec::init_axis('y', self.y_dim.n, x_min.y, x_max.y)?;
        self.z_dim = SingleDimSpec::init_axis('z', self.z_dim.n, x_min.z, x_max.z)?;
        self.calc_node_volume();
        Ok(())
    }

    pub fn set_time_step(&mut self, dt: f64) {
        self.dt = dt;
    }

    pub fn set_iter_max(&mut self, iter_max: usize) {
        self.iter_max = iter_max;
    }

    pub fn set_bc_at(&mut self, side: BoundarySide, bc: BoundaryCondition) {
        self.bcs.set(side, bc);
    }

    /// Appends a patch condition behind the ones already set on `side`.
    pub fn add_bc_at(&mut self, side: BoundarySide, bc: BoundaryCondition) {
        self.bcs.add(side, bc);
    }

    pub fn reverse_boundary_conditions(&mut self) {
        self.bcs.reverse();
    }

    pub fn boundary_conditions(&self) -> &BoundaryConditions {
        &self.bcs
    }

    pub fn is_periodic(&self, side: BoundarySide) -> bool {
        self.bcs.is_periodic(side)
    }

    /// Fails unless every face carries a boundary condition.
    pub fn check_configuration(&self) -> PicResult<()> {
        self.bcs.check_complete()
    }

    pub fn get_dt(&self) -> f64 {
        self.dt
    }

    pub fn get_iteration(&self) -> usize {
        self.iteration.unwrap_or(0)
    }

    pub fn get_iter_max(&self) -> usize {
        self.iter_max
    }

    pub fn get_sim_time(&self) -> f64 {
        self.time
    }

    /// Wall-clock seconds since the world was created.
    pub fn get_wtime(&self) -> f64 {
        self.wall_start.elapsed().as_secs_f64()
    }

    pub fn is_last_iter(&self) -> bool {
        self.iteration == Some(self.iter_max)
    }

    /// Moves to the next iteration; returns whether the run should continue.
    pub fn advance_time(&mut self) -> bool {
        let next = self.iteration.map_or(0, |i| i + 1);
        self.iteration = Some(next);
        self.time += self.dt;
        next <= self.iter_max
    }

    pub fn nn(&self) -> [usize; 3] {
        [self.x_dim.n, self.y_dim.n, self.z_dim.n]
    }

    pub fn n_nodes(&self) -> usize {
        self.x_dim.n * self.y_dim.n * self.z_dim.n
    }

    pub fn n_cells(&self) -> usize {
        (self.x_dim.n - 1) * (self.y_dim.n - 1) * (self.z_dim.n - 1)
    }

    pub fn at(&self, i: usize, j: usize, k: usize) -> usize {
        i + j * self.x_dim.n + k * self.x_dim.n * self.y_dim.n
    }

    pub fn get_x_min(&self) -> DVec3 {
        DVec3::new(self.x_dim.min, self.y_dim.min, self.z_dim.min)
    }

    pub fn get_x_max(&self) -> DVec3 {
        DVec3::new(self.x_dim.max, self.y_dim.max, self.z_dim.max)
    }

    pub fn get_del_x(&self) -> DVec3 {
        DVec3::new(self.x_dim.delta, self.y_dim.delta, self.z_dim.delta)
    }

    pub fn get_center(&self) -> DVec3 {
        DVec3::new(self.x_dim.center(), self.y_dim.center(), self.z_dim.center())
    }

    pub fn node_position(&self, i: usize, j: usize, k: usize) -> DVec3 {
        self.get_x_min() + DVec3::new(i as f64, j as f64, k as f64) * self.get_del_x()
    }

    pub fn cell_volume(&self) -> f64 {
        self.x_dim.delta * self.y_dim.delta * self.z_dim.delta
    }

    pub fn is_inside(&self, x: DVec3) -> bool {
        self.get_x_min().cmplt(x).all() && x.cmplt(self.get_x_max()).all()
    }

    /// Physical position to fractional node coordinates.
    pub fn x_to_l(&self, x: DVec3) -> DVec3 {
        (x - self.get_x_min()) / self.get_del_x()
    }

    /// Physical position to the index of the containing cell.
    pub fn x_to_c(&self, x: DVec3) -> usize {
        let l = self.x_to_l(x);
        let cell = |l: f64, n: usize| (l.max(0.0) as usize).min(n - 2);
        let i = cell(l.x, self.x_dim.n);
        let j = cell(l.y, self.y_dim.n);
        let k = cell(l.z, self.z_dim.n);
        i + j * (self.x_dim.n - 1) + k * (self.x_dim.n - 1) * (self.y_dim.n - 1)
    }

    pub fn interpolate_ef(&self, l: DVec3) -> DVec3 {
        self.ef.gather(l)
    }

    fn calc_node_volume(&mut self) {
        let [ni, nj, nk] = self.nn();
        let v_cell = self.cell_volume();
        for i in 0..ni {
            for j in 0..nj {
                for k in 0..nk {
                    let mut v = v_cell;
                    if i == 0 || i == ni - 1 { v /= 2.0; }
                    if j == 0 || j == nj - 1 { v /= 2.0; }
                    if k == 0 || k == nk - 1 { v /= 2.0; }
                    self.node_volume.set(i, j, k, v);
                }
            }
        }
    }

    /// Merges the two images of every node on a periodic axis.
    pub fn fold_periodic<T>(&self, field: &mut ThreeDField<T>)
    where
        T: Copy + Add<Output = T> + AddAssign + Mul<f64, Output = T>,
    {
        for axis in 0..3 {
            if self.is_periodic(BoundarySide::from_axis(axis, true))
                && self.is_periodic(BoundarySide::from_axis(axis, false))
            {
                field.fold_axis(axis);
            }
        }
    }

    /// Node volumes with periodic seam nodes owning both half cells.
    pub fn periodic_node_volume(&self) -> ThreeDField<f64> {
        let mut volume = self.node_volume.clone();
        self.fold_periodic(&mut volume);
        volume
    }

    /// Sums `charge * number_density` of every kinetic species into `rho`.
    pub fn calc_charge_density(&mut self, species: &[Species]) {
        self.rho.set_all(0.0);
        for sp in species {
            if sp.charge == 0.0 {
                continue;
            }
            self.rho.elementwise_inplace_add_scaled(sp.charge, &sp.number_density);
        }
    }

    /// Density-weighted temperature `sum(n_s T_s) / sum(n_s)` of all species,
    /// zero on nodes no species reaches. Uses the sampled species temperatures.
    pub fn calc_total_temperature(&mut self, species: &[Species]) {
        for u in 0..self.t_tot.len() {
            let (nt, n) = species.iter().fold((0.0, 0.0), |(nt, n), sp| {
                let n_s = sp.number_density.data()[u];
                (nt + n_s * sp.temperature.data()[u], n + n_s)
            });
            self.t_tot.data_mut()[u] = if n > 0.0 { nt / n } else { 0.0 };
        }
    }

    /// Coulomb logarithm `ln(12 pi n lambda_D^3)` on every node, floored at 2.
    /// `t_e` [K] overrides the local `t_tot` when positive; nodes without
    /// density or temperature get zero.
    pub fn calc_coulomb_log(&mut self, t_e: f64, n_e: f64) {
        for u in 0..self.ln_lambda.len() {
            let t = if t_e > 0.0 { t_e } else { self.t_tot.data()[u] };
            self.ln_lambda.data_mut()[u] = if t > 0.0 && n_e > 0.0 {
                let lambda_d = (EPS0 * K * t / (n_e * QE * QE)).sqrt();
                (12.0 * PI * n_e * lambda_d.powi(3)).ln().max(2.0)
            } else {
                0.0
            };
        }
    }

    /// Electrostatic field energy `0.5 eps0 sum |E|^2 V`.
    pub fn get_potential_energy(&self) -> f64 {
        let sum: f64 = self.ef.data().iter().zip(self.node_volume.data())
            .map(|(e, v)| e.length_squared() * v)
            .sum();
        0.5 * EPS0 * sum
    }

    /// Checks (every `check_every` iterations) whether the conserved totals
    /// settled to within `tol`. Once reached, steady state sticks.
    pub fn steady_state(&mut self, species: &[Species], check_every: usize, tol: f64) -> bool {
        if self.steady.is_steady() {
            return true;
        }
        if check_every == 0 || self.get_iteration() % check_every != 0 {
            return false;
        }
        let reached = self.steady.update(ConservedTotals::from_species(species), tol);
        if reached {
            println!("Steady state reached at iteration {}", self.get_iteration());
        }
        reached
    }

    pub fn is_steady_state(&self) -> bool {
        self.steady.is_steady()
    }

    pub fn start_averaging_time(&mut self) {
        self.averaging_time = true;
    }

    pub fn is_averaging_time(&self) -> bool {
        self.averaging_time
    }

    /// Warns when the mesh does not resolve the Debye length or the time step
    /// does not resolve the electron plasma frequency.
    pub fn check_formulation(&self, n_e: f64, t_e: f64) {
        let del_x = self.get_del_x();
        if t_e > 0.0 && n_e > 0.0 {
            let lambda_d = (EPS0 * K * t_e / (n_e * QE * QE)).sqrt();
            if del_x.max_element() > lambda_d {
                eprintln!("Warning: cell spacing {:.3e} m exceeds Debye length {:.3e} m",
                          del_x.max_element(), lambda_d);
            }
        }
        if n_e > 0.0 {
            let omega_pe = (n_e * QE * QE / (EPS0 * ME)).sqrt();
            if omega_pe * self.dt > 0.2 {
                eprintln!("Warning: omega_pe*dt = {:.3} exceeds 0.2", omega_pe * self.dt);
            }
        }
    }

    pub fn print(&self) {
        println!("Three dimensional world mesh with dimensions:");
        print!("X: ");
        self.x_dim.print();
        print!("Y: ");
        self.y_dim.print();
        print!("Z: ");
        self.z_dim.print();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world_3d::{FieldBcType, ParticleBcType};

    fn world(n: [usize; 3], min: DVec3, max: DVec3) -> ThreeDWorld {
        let x = SingleDimSpec::init(n[0], min.x, max.x).unwrap();
        let y = SingleDimSpec::init(n[1], min.y, max.y).unwrap();
        let z = SingleDimSpec::init(n[2], min.z, max.z).unwrap();
        ThreeDWorld::init("test", x, y, z).unwrap()
    }

    #[test]
    fn node_volumes_sum_to_domain_volume() {
        let w = world([5, 3, 7], DVec3::new(-0.1, 0.0, 1.0), DVec3::new(0.1, 0.3, 1.6));
        let total = 0.2 * 0.3 * 0.6;
        assert!((w.node_volume.sum() - total).abs() < 1e-12 * total.max(1.0));
        assert!((w.node_volume.get(0, 0, 0) - w.cell_volume() / 8.0).abs() < 1e-18);
    }

    #[test]
    fn degenerate_grid_is_rejected() {
        assert!(SingleDimSpec::init(1, 0.0, 1.0).is_err());
        assert!(SingleDimSpec::init(4, 1.0, 1.0).is_err());
        let mut w = world([3, 3, 3], DVec3::ZERO, DVec3::ONE);
        let err = w.set_dimensions(DVec3::ZERO, DVec3::new(1.0, -1.0, 1.0)).unwrap_err();
        assert!(matches!(err, PicError::InvalidGrid { axis: 'y', .. }));
    }

    #[test]
    fn set_dimensions_recomputes_spacing_and_volume() {
        let mut w = world([3, 5, 2], DVec3::ZERO, DVec3::ONE);
        w.set_dimensions(DVec3::ZERO, DVec3::new(2.0, 4.0, 1.0)).unwrap();
        assert_eq!(w.get_del_x(), DVec3::new(1.0, 1.0, 1.0));
        assert!((w.node_volume.sum() - 8.0).abs() < 1e-12);
    }

    #[test]
    fn cell_index_clamps_upper_face() {
        let w = world([4, 4, 4], DVec3::ZERO, DVec3::splat(3.0));
        assert_eq!(w.x_to_c(DVec3::new(0.5, 0.5, 0.5)), 0);
        assert_eq!(w.x_to_c(DVec3::new(1.5, 2.5, 0.5)), 1 + 2 * 3);
        assert_eq!(w.x_to_c(DVec3::splat(3.0)), w.n_cells() - 1);
        assert_eq!(w.x_to_l(DVec3::new(1.5, 0.0, 3.0)), DVec3::new(1.5, 0.0, 3.0));
    }

    #[test]
    fn advance_time_counts_up_to_iter_max() {
        let mut w = world([2, 2, 2], DVec3::ZERO, DVec3::ONE);
        w.set_time_step(0.5);
        w.set_iter_max(2);
        let mut steps = 0;
        while w.advance_time() {
            steps += 1;
        }
        assert_eq!(steps, 3);
        assert!((w.get_sim_time() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn periodic_node_volume_gives_seam_a_full_cell() {
        let mut w = world([4, 5, 3], DVec3::ZERO, DVec3::new(3.0, 4.0, 2.0));
        for side in BoundarySide::ALL {
            w.set_bc_at(side, BoundaryCondition::new(ParticleBcType::Open, FieldBcType::Dirichlet));
        }
        for side in [BoundarySide::YMin, BoundarySide::YMax] {
            w.set_bc_at(side, BoundaryCondition::new(ParticleBcType::Periodic, FieldBcType::Periodic));
        }
        let v = w.periodic_node_volume();
        assert_eq!(v.get(1, 0, 1), w.cell_volume());
        assert_eq!(v.get(1, 4, 1), w.cell_volume());
        assert_eq!(v.get(1, 2, 1), w.cell_volume());
        // the non-periodic x faces keep their half volume
        assert_eq!(v.get(0, 0, 1), w.cell_volume() / 2.0);
        assert_eq!(w.node_volume.get(1, 0, 1), w.cell_volume() / 2.0);
    }

    #[test]
    fn total_temperature_weights_by_density() {
        let mut w = world([2, 2, 2], DVec3::ZERO, DVec3::ONE);
        let mut a = Species::init("a", AMU, 0.0, 1.0, &w).unwrap();
        let mut b = Species::init("b", AMU, 0.0, 1.0, &w).unwrap();
        a.number_density.set(0, 0, 0, 3.0);
        a.temperature.set(0, 0, 0, 100.0);
        b.number_density.set(0, 0, 0, 1.0);
        b.temperature.set(0, 0, 0, 500.0);
        w.calc_total_temperature(&[a, b]);
        assert!((w.t_tot.get(0, 0, 0) - 200.0).abs() < 1e-12);
        assert_eq!(w.t_tot.get(1, 1, 1), 0.0);
    }

    #[test]
    fn coulomb_log_matches_plasma_parameter() {
        let mut w = world([2, 2, 2], DVec3::ZERO, DVec3::ONE);
        let (t, n) = (2.0 * EV_TO_K, 1e16);
        w.calc_coulomb_log(t, n);
        let lambda_d = (EPS0 * K * t / (n * QE * QE)).sqrt();
        let expected = (12.0 * PI * n * lambda_d.powi(3)).ln();
        assert!(expected > 2.0);
        for l in w.ln_lambda.data() {
            assert!((l - expected).abs() < 1e-12);
        }

        // local temperature is used when no electron temperature is given
        w.t_tot.set_all(0.0);
        w.t_tot.set(1, 0, 0, 1.0);
        w.calc_coulomb_log(0.0, n);
        assert_eq!(w.ln_lambda.get(0, 0, 0), 0.0);
        assert_eq!(w.ln_lambda.get(1, 0, 0), 2.0);
    }
}
