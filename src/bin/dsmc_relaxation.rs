use anyhow::Result;
use glam::DVec3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

use kinetic_pic_dsmc_3d::collisions::{DsmcBird, Interaction};
use kinetic_pic_dsmc_3d::constants::*;
use kinetic_pic_dsmc_3d::output::{DiagnosticOutput, StatisticsWriter, VelocityHistogramWriter,
                                  WriteVti};
use kinetic_pic_dsmc_3d::particles::Species;
use kinetic_pic_dsmc_3d::world_3d::{BoundaryCondition, BoundarySide, FieldBcType,
                                    ParticleBcType, SingleDimSpec, ThreeDWorld};


// Two counter-streaming cold argon beams in a closed box thermalise through
// VHS collisions. Walls are diffuse at 300 K.
fn main() -> Result <()> {

    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let prefix = root.join("images").join("relaxation").join("relaxation");

    let dim = SingleDimSpec::init(11, 0.0, 0.01)?;
    let mut world = ThreeDWorld::init(prefix.to_string_lossy(), dim, dim, dim)?;
    world.set_time_step(1e-7);
    world.set_iter_max(500);
    for side in BoundarySide::ALL {
        world.set_bc_at(side, BoundaryCondition::new(ParticleBcType::Diffuse, FieldBcType::Neumann)
                        .with_wall(300.0, 1.0));
    }
    world.check_configuration()?;
    world.print();

    let mut rng = StdRng::seed_from_u64(3);
    let mut species = vec![Species::init("Ar", 40.0 * AMU, 0.0, 1e11, &world)?];
    let n = 1e21;
    let v = 500.0;
    species[0].load_cold_box(&world, world.get_x_min(), world.get_x_max(), 0.5 * n,
                             DVec3::new(v, 0.0, 0.0), &mut rng)?;
    species[0].load_cold_box(&world, world.get_x_min(), world.get_x_max(), 0.5 * n,
                             DVec3::new(-v, 0.0, 0.0), &mut rng)?;

    let mut dsmc = Interaction::Vhs(DsmcBird::new(&species, &[0])?);

    let mut stats = StatisticsWriter::new(&world.prefix);
    let diag = DiagnosticOutput;
    let vdf = VelocityHistogramWriter::default();

    while world.advance_time() {
        for sp in species.iter_mut() {
            sp.push_particles_leapfrog(&world, &mut rng);
        }
        let n_coll = dsmc.apply(world.get_dt(), &world, &mut species, &mut rng);

        if world.get_iteration() % 50 == 0 || world.is_last_iter() {
            for sp in species.iter_mut() {
                sp.calc_number_density(&world);
                sp.sample_moments(&world);
                sp.calc_gas_properties();
                sp.calc_macroparticle_count(&world);
            }
            let c = world.at(5, 5, 5);
            println!("collisions: {n_coll}, T at center: {:.1} K", species[0].temperature.data()[c]);
            diag.print_info(&world, &species);
            stats.write(&world, &species)?;
            WriteVti.save_fields(&world, &species)?;
            // the two beams relax into a single Maxwellian
            vdf.save(&world, &species)?;
        }

        if world.steady_state(&species, 50, 1e-3) {
            break;
        }
    }
    stats.flush()?;

    Ok(())
}
