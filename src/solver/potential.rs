use glam::DVec3;
use nalgebra::DVector;

use super::linear::{solve_linear, LinearSolveStats};
use super::sparse::SparseMatrix;
use crate::constants::{EPS0, QE};
use crate::error::{PicError, PicResult};
use crate::world_3d::{BoundarySide, ThreeDWorld};

/// Iteration limits and tolerances of the potential solve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverConfig {
    pub iter_max: usize,
    /// relative residual of the linear solve
    pub tol: f64,
    pub newton_iter_max: usize,
    /// [V] largest potential correction accepted as converged
    pub newton_tol: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self { iter_max: 10_000, tol: 1e-4, newton_iter_max: 20, newton_tol: 1e-4 }
    }
}

/// Reference state of the Boltzmann electron fluid,
/// `n_e = n0 exp((phi - phi0) / te0)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoltzmannReference {
    pub phi0: f64, // [V]
    pub te0: f64,  // [eV]
    pub n0: f64,   // [1/m^3]
}

impl Default for BoltzmannReference {
    fn default() -> Self {
        Self { phi0: 0.0, te0: 1.0, n0: 0.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverReport {
    /// final relative residual of the last linear solve
    pub residual: f64,
    pub newton_iterations: usize,
    pub converged: bool,
}

/// Finite-difference Poisson solver on the world's node grid.
///
/// The coefficient matrix is assembled once from the boundary conditions set
/// on the world; the interior right-hand side is refreshed on every solve.
pub struct PotentialSolver {
    a: SparseMatrix,
    b0: DVector<f64>,
    is_regular: Vec<bool>,
    periodic: [bool; 3],
    config: SolverConfig,
    reference: BoltzmannReference,
}

fn periodic_axes(world: &ThreeDWorld) -> PicResult<[bool; 3]> {
    let mut periodic = [false; 3];
    for (axis, name) in ['x', 'y', 'z'].into_iter().enumerate() {
        let lo = world.is_periodic(BoundarySide::from_axis(axis, true));
        let hi = world.is_periodic(BoundarySide::from_axis(axis, false));
        if lo != hi {
            return Err(PicError::MismatchedPeriodic(name));
        }
        periodic[axis] = lo;
    }
    Ok(periodic)
}

impl PotentialSolver {
    pub fn new(world: &ThreeDWorld, config: SolverConfig) -> PicResult<Self> {
        world.check_configuration()?;
        let periodic = periodic_axes(world)?;

        let nn = world.nn();
        let n = world.n_nodes();
        let del_x = world.get_del_x();
        let idx2 = [1.0 / (del_x.x * del_x.x), 1.0 / (del_x.y * del_x.y), 1.0 / (del_x.z * del_x.z)];
        let at = |c: [usize; 3]| world.at(c[0], c[1], c[2]);

        let mut coeffs: Vec<(usize, usize, f64)> = Vec::with_capacity(7 * n);
        let mut b0 = DVector::zeros(n);
        let mut is_regular = vec![false; n];

        for k in 0..nn[2] {
            for j in 0..nn[1] {
                for i in 0..nn[0] {
                    let node = [i, j, k];
                    let u = at(node);
                    let pos = world.node_position(i, j, k);

                    // non-periodic faces, first face in side order wins on edges
                    let face = BoundarySide::ALL.into_iter().find(|side| {
                        let axis = side.axis();
                        let on_face = if side.is_min() { node[axis] == 0 } else { node[axis] == nn[axis] - 1 };
                        on_face && !periodic[axis]
                    });
                    if let Some(side) = face {
                        let axis = side.axis();
                        let mut inner = node;
                        inner[axis] = if side.is_min() { 1 } else { nn[axis] - 2 };
                        world.eval_field_bc(side, b0.as_mut_slice(), &mut coeffs, u, at(inner), pos);
                        continue;
                    }

                    // periodic max-face nodes are copies of the min-face node
                    if let Some(axis) = (0..3).find(|&a| periodic[a] && node[a] == nn[a] - 1) {
                        let mut alias = node;
                        alias[axis] = 0;
                        coeffs.push((u, u, 1.0));
                        coeffs.push((u, at(alias), -1.0));
                        continue;
                    }

                    is_regular[u] = true;
                    let mut diag = 0.0;
                    for axis in 0..3 {
                        let mut lo = node;
                        let mut hi = node;
                        lo[axis] = if node[axis] == 0 { nn[axis] - 2 } else { node[axis] - 1 };
                        hi[axis] = node[axis] + 1;
                        coeffs.push((u, at(lo), idx2[axis]));
                        coeffs.push((u, at(hi), idx2[axis]));
                        diag -= 2.0 * idx2[axis];
                    }
                    coeffs.push((u, u, diag));
                }
            }
        }

        Ok(Self {
            a: SparseMatrix::from_triplets(n, &coeffs),
            b0,
            is_regular,
            periodic,
            config,
            reference: BoltzmannReference::default(),
        })
    }

    pub fn set_reference_values(&mut self, phi0: f64, te0: f64, n0: f64) {
        self.reference = BoltzmannReference { phi0, te0, n0 };
    }

    fn rhs(&self, world: &ThreeDWorld) -> DVector<f64> {
        let mut b = self.b0.clone();
        for (u, rho) in world.rho.data().iter().enumerate() {
            if self.is_regular[u] {
                b[u] = -rho / EPS0;
            }
        }
        b
    }

    /// Solves the linear Poisson equation for `world.phi`.
    pub fn calc_potential(&self, world: &mut ThreeDWorld) -> SolverReport {
        let b = self.rhs(world);
        let mut phi = DVector::from_column_slice(world.phi.data());
        let stats = solve_linear(&self.a, &b, &mut phi, self.config.tol, self.config.iter_max);
        world.phi.data_mut().copy_from_slice(phi.as_slice());

        if !stats.converged {
            warn_linear(&stats);
        }
        SolverReport {
            residual: stats.residual,
            newton_iterations: 0,
            converged: stats.converged,
        }
    }

    /// Solves Poisson's equation with Boltzmann-relation electrons by Newton
    /// iteration. The best iterate is kept when Newton does not converge.
    pub fn calc_potential_br(&self, world: &mut ThreeDWorld) -> SolverReport {
        let BoltzmannReference { phi0, te0, n0 } = self.reference;
        let n = world.n_nodes();
        let rho_b = self.rhs(world);
        let mut phi = DVector::from_column_slice(world.phi.data());

        let mut report = SolverReport { residual: 0.0, newton_iterations: 0, converged: false };
        for it in 1..=self.config.newton_iter_max {
            report.newton_iterations = it;

            let mut b = rho_b.clone();
            let mut shift = DVector::zeros(n);
            for u in (0..n).filter(|&u| self.is_regular[u]) {
                let n_e = n0 * ((phi[u] - phi0) / te0).exp();
                b[u] += QE * n_e / EPS0;
                shift[u] = -QE * n_e / (EPS0 * te0);
            }

            let f = self.a.mul_vec(&phi) - b;
            let jacobian = self.a.with_diagonal_shift(&shift);
            let mut delta = DVector::zeros(n);
            let stats = solve_linear(
                &jacobian,
                &(-f),
                &mut delta,
                self.config.tol,
                self.config.iter_max,
            );
            report.residual = stats.residual;
            if !stats.converged {
                warn_linear(&stats);
            }

            phi += &delta;
            if delta.amax() < self.config.newton_tol {
                report.converged = true;
                break;
            }
        }

        if !report.converged {
            eprintln!("Newton solver didn't converge after {} iterations", report.newton_iterations);
        }

        world.phi.data_mut().copy_from_slice(phi.as_slice());
        for (ne, p) in world.n_e_br.data_mut().iter_mut().zip(phi.iter()) {
            *ne = n0 * ((p - phi0) / te0).exp();
        }
        report
    }

    /// `E = -grad(phi) + e_ext`; central differences inside, second-order
    /// one-sided on non-periodic faces.
    pub fn calc_electric_field(&self, world: &mut ThreeDWorld, e_ext: DVec3) {
        let nn = world.nn();
        let del_x = world.get_del_x();

        for k in 0..nn[2] {
            for j in 0..nn[1] {
                for i in 0..nn[0] {
                    let node = [i, j, k];
                    let mut grad = DVec3::ZERO;
                    for axis in 0..3 {
                        let phi = |idx: usize| {
                            let mut c = node;
                            c[axis] = idx;
                            world.phi.get(c[0], c[1], c[2])
                        };
                        let (m, d, idx) = (nn[axis], del_x[axis], node[axis]);
                        grad[axis] = if self.periodic[axis] {
                            let lo = if idx == 0 { m - 2 } else { idx - 1 };
                            let hi = if idx == m - 1 { 1 } else { idx + 1 };
                            (phi(hi) - phi(lo)) / (2.0 * d)
                        } else if m == 2 {
                            (phi(1) - phi(0)) / d
                        } else if idx == 0 {
                            (-3.0 * phi(0) + 4.0 * phi(1) - phi(2)) / (2.0 * d)
                        } else if idx == m - 1 {
                            (3.0 * phi(m - 1) - 4.0 * phi(m - 2) + phi(m - 3)) / (2.0 * d)
                        } else {
                            (phi(idx + 1) - phi(idx - 1)) / (2.0 * d)
                        };
                    }
                    world.ef.set(i, j, k, e_ext - grad);
                }
            }
        }
    }
}

fn warn_linear(stats: &LinearSolveStats) {
    eprintln!("BiCGSTAB didn't converge.  Relative residual {:.6e}", stats.residual);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world_3d::{BoundaryCondition, FieldBcType, ParticleBcType, SingleDimSpec};

    fn cube(n: usize) -> ThreeDWorld {
        let d = SingleDimSpec::init(n, 0.0, 1.0).unwrap();
        ThreeDWorld::init("test", d, d, d).unwrap()
    }

    #[test]
    fn missing_boundary_condition_prevents_solver() {
        let world = cube(4);
        assert!(matches!(PotentialSolver::new(&world, SolverConfig::default()),
                         Err(PicError::MissingBoundaryCondition(BoundarySide::XMin))));
    }

    #[test]
    fn one_sided_periodic_axis_is_rejected() {
        let mut world = cube(4);
        for side in BoundarySide::ALL {
            world.set_bc_at(side, BoundaryCondition::new(ParticleBcType::Open, FieldBcType::Dirichlet));
        }
        world.set_bc_at(BoundarySide::ZMax,
                        BoundaryCondition::new(ParticleBcType::Periodic, FieldBcType::Periodic));
        assert!(matches!(PotentialSolver::new(&world, SolverConfig::default()),
                         Err(PicError::MismatchedPeriodic('z'))));
    }

    #[test]
    fn electric_field_of_linear_potential_is_uniform() {
        let mut world = cube(5);
        for side in BoundarySide::ALL {
            world.set_bc_at(side, BoundaryCondition::new(ParticleBcType::Open, FieldBcType::Dirichlet));
        }
        for k in 0..5 {
            for j in 0..5 {
                for i in 0..5 {
                    world.phi.set(i, j, k, 3.0 * world.node_position(i, j, k).y);
                }
            }
        }
        let solver = PotentialSolver::new(&world, SolverConfig::default()).unwrap();
        solver.calc_electric_field(&mut world, DVec3::new(1.0, 0.0, 0.0));
        for e in world.ef.data() {
            assert!((*e - DVec3::new(1.0, -3.0, 0.0)).length() < 1e-12);
        }
    }

    #[test]
    fn periodic_rows_alias_opposite_face() {
        let mut world = cube(3);
        for side in BoundarySide::ALL {
            world.set_bc_at(side, BoundaryCondition::new(ParticleBcType::Open, FieldBcType::Dirichlet));
        }
        world.set_bc_at(BoundarySide::YMin,
                        BoundaryCondition::new(ParticleBcType::Periodic, FieldBcType::Periodic));
        world.set_bc_at(BoundarySide::YMax,
                        BoundaryCondition::new(ParticleBcType::Periodic, FieldBcType::Periodic));
        let solver = PotentialSolver::new(&world, SolverConfig::default()).unwrap();
        // interior node on the y-min face is a regular node with wrapped neighbours
        assert!(solver.is_regular[world.at(1, 0, 1)]);
        assert!(!solver.is_regular[world.at(1, 2, 1)]);
        let mut phi = DVector::zeros(world.n_nodes());
        phi[world.at(1, 2, 1)] = 1.0;
        phi[world.at(1, 0, 1)] = 1.0;
        let row = solver.a.mul_vec(&phi);
        assert_eq!(row[world.at(1, 2, 1)], 0.0);
    }
}
