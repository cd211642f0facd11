use anyhow::Result;
use glam::DVec3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

use kinetic_pic_dsmc_3d::collisions::{DsmcNanbu, Interaction};
use kinetic_pic_dsmc_3d::constants::*;
use kinetic_pic_dsmc_3d::output::{DiagnosticOutput, StatisticsWriter, VelocityHistogramWriter,
                                  WriteVti};
use kinetic_pic_dsmc_3d::particles::Species;
use kinetic_pic_dsmc_3d::solver::{PotentialSolver, SolverConfig};
use kinetic_pic_dsmc_3d::world_3d::{BoundaryCondition, BoundarySide, FieldBcType,
                                    ParticleBcType, SingleDimSpec, ThreeDWorld};


// Ions fill the box, electrons only its lower half; the electrons oscillate
// through the ion background. Symmetric walls at zero potential.
fn main() -> Result <()> {

    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let prefix = root.join("images").join("box").join("box");

    let x_min = DVec3::ZERO;
    let x_max = DVec3::splat(0.1);
    let x_mid = 0.5 * (x_min + x_max);

    let dim = SingleDimSpec::init(21, 0.0, 1.0)?;
    let mut world = ThreeDWorld::init(prefix.to_string_lossy(), dim, dim, dim)?;
    world.set_dimensions(x_min, x_max)?;
    world.set_time_step(1e-9);
    world.set_iter_max(2000);

    for side in BoundarySide::ALL {
        world.set_bc_at(side, BoundaryCondition::new(ParticleBcType::Symmetric, FieldBcType::Dirichlet));
    }
    world.print();

    let mut rng = StdRng::seed_from_u64(1);
    let mut species = vec![
        Species::init("Xe+", 54.0 * AMU, QE, 1000.0, &world)?,
        Species::init("e-", ME, -QE, 1000.0, &world)?,
    ];

    let n = 1e11;
    species[0].load_cold_box(&world, x_min, x_max, n, DVec3::ZERO, &mut rng)?;
    species[1].load_cold_box(&world, x_min, x_mid, n, DVec3::ZERO, &mut rng)?;
    println!("Now have {} ions and {} electrons loaded",
             species[0].get_sim_count(), species[1].get_sim_count());

    for sp in species.iter_mut() {
        sp.calc_number_density(&world);
    }

    let solver = PotentialSolver::new(&world, SolverConfig::default())?;
    let mut coulomb = Interaction::Coulomb(DsmcNanbu::new(&species, &[0, 1], 1.0 * EV_TO_K, n)?);

    world.check_formulation(n, 0.0);

    let mut stats = StatisticsWriter::new(&world.prefix);
    let diag = DiagnosticOutput;
    let vdf = VelocityHistogramWriter { n_bins: 80 };

    while world.advance_time() {
        world.calc_charge_density(&species);
        let report = solver.calc_potential(&mut world);
        if !report.converged {
            eprintln!("iter {}: potential solve stopped at residual {:.3e}",
                      world.get_iteration(), report.residual);
        }
        solver.calc_electric_field(&mut world, DVec3::ZERO);

        for sp in species.iter_mut() {
            sp.push_particles_leapfrog(&world, &mut rng);
        }
        coulomb.apply(world.get_dt(), &world, &mut species, &mut rng);
        for sp in species.iter_mut() {
            sp.calc_number_density(&world);
        }

        if world.get_iteration() % 10 == 0 || world.is_last_iter() {
            for sp in species.iter_mut() {
                sp.sample_moments(&world);
                sp.calc_gas_properties();
                sp.calc_macroparticle_count(&world);
            }
            world.calc_total_temperature(&species);
            world.calc_coulomb_log(0.0, n);

            diag.print_info(&world, &species);
            stats.write(&world, &species)?;
            WriteVti.save_fields(&world, &species)?;
            if world.is_last_iter() {
                vdf.save(&world, &species)?;
            }
        }
    }
    stats.flush()?;

    Ok(())
}
