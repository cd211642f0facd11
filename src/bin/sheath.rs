use anyhow::Result;
use glam::DVec3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

use kinetic_pic_dsmc_3d::constants::*;
use kinetic_pic_dsmc_3d::output::{DiagnosticOutput, StatisticsWriter, WriteVti};
use kinetic_pic_dsmc_3d::particles::{Species, WarmBeam};
use kinetic_pic_dsmc_3d::solver::{PotentialSolver, SolverConfig};
use kinetic_pic_dsmc_3d::world_3d::{BoundaryCondition, BoundarySide, FieldBcType,
                                    ParticleBcType, SingleDimSpec, ThreeDWorld};


// Quasi one-dimensional sheath: ions and electrons stream in through x-min
// and leave through either end. The transverse axes are periodic.
fn main() -> Result <()> {
    use BoundarySide::*;

    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let prefix = root.join("images").join("sheath").join("sheath");

    let x_min = DVec3::new(0.00, -0.00075, -0.00075);
    let x_max = DVec3::new(0.03,  0.00075,  0.00075);

    let mut world = ThreeDWorld::init(prefix.to_string_lossy(),
                                      SingleDimSpec::init(21, 0.0, 1.0)?,
                                      SingleDimSpec::init(2, 0.0, 1.0)?,
                                      SingleDimSpec::init(2, 0.0, 1.0)?)?;
    world.set_dimensions(x_min, x_max)?;
    world.set_time_step(2e-10);
    world.set_iter_max(100_000);

    world.set_bc_at(XMin, BoundaryCondition::new(ParticleBcType::Open, FieldBcType::Dirichlet));
    world.set_bc_at(XMax, BoundaryCondition::new(ParticleBcType::Open, FieldBcType::Dirichlet)
                    .with_value(-0.18011));
    for side in [YMin, YMax, ZMin, ZMax] {
        world.set_bc_at(side, BoundaryCondition::new(ParticleBcType::Periodic, FieldBcType::Periodic));
    }
    world.print();

    let mut rng = StdRng::seed_from_u64(2);
    let mut species = vec![
        Species::init("Xe+", 54.0 * AMU, QE, 10.0, &world)?,
        Species::init("e-", ME, -QE, 10.0, &world)?,
    ];

    let n = 1e12;
    let t = 1000.0;
    let x1 = DVec3::new(0.0, -0.00075, -0.00075);
    let x2 = DVec3::new(0.0,  0.00075,  0.00075);
    let mut sources = vec![
        WarmBeam::new(&world, x1, x2, DVec3::new(11492.19, 0.0, 0.0), n, t)?,
        WarmBeam::new(&world, x1, x2, DVec3::ZERO, n, t)?,
    ];

    let solver = PotentialSolver::new(&world, SolverConfig { iter_max: 1000, ..SolverConfig::default() })?;

    world.check_formulation(n, t);

    let mut stats = StatisticsWriter::new(&world.prefix);
    let diag = DiagnosticOutput;

    while world.advance_time() {
        world.calc_charge_density(&species);
        solver.calc_potential(&mut world);
        solver.calc_electric_field(&mut world, DVec3::ZERO);

        for (source, sp) in sources.iter_mut().zip(species.iter_mut()) {
            source.sample(&world, sp, &mut rng);
        }

        for sp in species.iter_mut() {
            sp.push_particles_leapfrog(&world, &mut rng);
            sp.remove_dead_particles();
            sp.calc_number_density(&world);
        }

        if !world.is_averaging_time() && world.steady_state(&species, 5000, 0.01) {
            world.start_averaging_time();
            for sp in species.iter_mut() {
                sp.start_time_averaging();
            }
        }

        if world.get_iteration() % 1000 == 0 || world.is_last_iter() {
            for sp in species.iter_mut() {
                sp.sample_moments(&world);
                sp.calc_gas_properties();
                sp.calc_macroparticle_count(&world);
            }

            diag.print_info(&world, &species);
            stats.write(&world, &species)?;
            WriteVti.save_fields(&world, &species)?;
        }
    }
    WriteVti.save_particles(&world, &species, 1000)?;
    stats.flush()?;

    Ok(())
}
