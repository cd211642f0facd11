use glam::DVec3;
use rand::rngs::StdRng;
use rand::SeedableRng;

use kinetic_pic_dsmc_3d::constants::*;
use kinetic_pic_dsmc_3d::particles::Species;
use kinetic_pic_dsmc_3d::solver::{PotentialSolver, SolverConfig};
use kinetic_pic_dsmc_3d::world_3d::{BoundaryCondition, BoundarySide, FieldBcType,
                                    ParticleBcType, SingleDimSpec, ThreeDWorld};

#[test]
fn closed_box_keeps_every_particle() {
    let dim = SingleDimSpec::init(11, 0.0, 0.1).unwrap();
    let mut world = ThreeDWorld::init("box_test", dim, dim, dim).unwrap();
    world.set_time_step(1e-9);
    world.set_iter_max(20);
    for side in BoundarySide::ALL {
        world.set_bc_at(side, BoundaryCondition::new(ParticleBcType::Symmetric, FieldBcType::Dirichlet));
    }
    world.check_configuration().unwrap();

    let mut rng = StdRng::seed_from_u64(31);
    let (lo, hi) = (world.get_x_min(), world.get_x_max());
    let mid = world.get_center();
    let mut species = vec![
        Species::init("Xe+", 131.0 * AMU, QE, 1e5, &world).unwrap(),
        Species::init("e-", ME, -QE, 1e5, &world).unwrap(),
    ];
    species[0].load_cold_box(&world, lo, hi, 1e11, DVec3::ZERO, &mut rng).unwrap();
    species[1].load_cold_box(&world, lo, mid, 1e11, DVec3::ZERO, &mut rng).unwrap();
    let counts: Vec<f64> = species.iter().map(|sp| sp.get_real_count()).collect();

    let solver = PotentialSolver::new(&world, SolverConfig::default()).unwrap();
    let mut steps = 0;
    let mut saw_last = false;
    while world.advance_time() {
        world.calc_charge_density(&species);
        solver.calc_potential(&mut world);
        solver.calc_electric_field(&mut world, DVec3::ZERO);
        for sp in species.iter_mut() {
            sp.push_particles_leapfrog(&world, &mut rng);
            sp.remove_dead_particles();
            sp.calc_number_density(&world);
        }
        steps += 1;
        saw_last |= world.is_last_iter();
    }

    assert_eq!(steps, 21);
    assert!(saw_last);
    // the final call that ends the loop advances the clock too
    assert!((world.get_sim_time() - 22e-9).abs() < 1e-15);

    for (sp, n0) in species.iter().zip(&counts) {
        assert!((sp.get_real_count() - n0).abs() <= 1e-9 * n0);
        for p in &sp.particles {
            assert!(p.pos.cmpge(lo).all() && p.pos.cmple(hi).all(), "{} escaped to {}", sp.name, p.pos);
        }
    }
    // electrons were pulled toward the uncovered ions
    assert!(species[1].get_kinetic_energy() > 0.0);
    assert!(species[1].get_momentum().length() > 0.0);
}
