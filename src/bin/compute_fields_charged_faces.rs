use anyhow::Result;
use glam::DVec3;
use std::path::PathBuf;

use kinetic_pic_dsmc_3d::output::WriteVti;
use kinetic_pic_dsmc_3d::solver::{PotentialSolver, SolverConfig};
use kinetic_pic_dsmc_3d::world_3d::{BoundaryCondition, BoundarySide, FieldBcType,
                                    ParticleBcType, SingleDimSpec, ThreeDWorld};


// Two charged faces: x-min held at 1 V, z-min at 2 V. The remaining faces are
// grounded except a patch of x-max whose potential varies along y.
fn set_charged_faces(world: &mut ThreeDWorld) {
    use BoundarySide::*;
    for side in BoundarySide::ALL {
        world.set_bc_at(side, BoundaryCondition::new(ParticleBcType::Open, FieldBcType::Dirichlet));
    }
    world.set_bc_at(XMin, BoundaryCondition::new(ParticleBcType::Open, FieldBcType::Dirichlet)
                    .with_value(1.0));
    world.set_bc_at(ZMin, BoundaryCondition::new(ParticleBcType::Open, FieldBcType::Dirichlet)
                    .with_value(2.0));
    world.set_bc_at(XMax, BoundaryCondition::new(ParticleBcType::Open, FieldBcType::Dirichlet)
                    .with_value_fn(|_, y, _| 5.0 * y)
                    .with_predicate(|_, y, _| y > 0.0));
    world.add_bc_at(XMax, BoundaryCondition::new(ParticleBcType::Open, FieldBcType::Dirichlet));
}


fn main() -> Result <()> {

    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let prefix = root.join("images").join("charged_faces");

    let x_dim = SingleDimSpec::init(21, -0.1, 0.1)?;
    let y_dim = SingleDimSpec::init(21, -0.1, 0.1)?;
    let z_dim = SingleDimSpec::init(21, -0.0, 0.2)?;
    let mut world = ThreeDWorld::init(prefix.to_string_lossy(), x_dim, y_dim, z_dim)?;
    world.print();

    set_charged_faces(&mut world);

    let solver = PotentialSolver::new(&world, SolverConfig { tol: 1e-8, ..SolverConfig::default() })?;
    let report = solver.calc_potential(&mut world);
    println!("Potential solve: residual {:.3e}", report.residual);
    solver.calc_electric_field(&mut world, DVec3::ZERO);
    println!("Field energy: {:.6e} J", world.get_potential_energy());

    let path = WriteVti.save_fields(&world, &[])?;
    println!("Wrote {}", path.display());

    Ok(())
}
