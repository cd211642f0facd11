use anyhow::Result;
use std::fs::{File, OpenOptions};
use std::io::BufWriter;
use std::path::PathBuf;

use crate::particles::Species;
use crate::world_3d::ThreeDWorld;
use crate::world_3d::three_d_world_spec::get_time_info_from_world;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeInfo {
    pub iteration: usize,
    pub sim_time: f64,
    pub wall_time: f64,
}

/// Per-species totals written to the statistics file.
#[derive(Debug)]
pub struct SpeciesInfo<'a> {
    pub name: &'a str,
    pub sim_count: usize,
    pub real_count: f64,
    pub momentum_x: f64,
    pub momentum_y: f64,
    pub momentum_z: f64,
    pub kinetic_e: f64,
}

pub fn get_species_info_from_species(sp: &Species) -> SpeciesInfo<'_> {
    let momentum = sp.get_momentum();
    SpeciesInfo {
        name: sp.name.as_str(),
        sim_count: sp.get_sim_count(),
        real_count: sp.get_real_count(),
        momentum_x: momentum.x,
        momentum_y: momentum.y,
        momentum_z: momentum.z,
        kinetic_e: sp.get_kinetic_energy(),
    }
}

/// Time series of particle counts, momentum and energy, one row per call.
/// The file is `{prefix}_statistics.csv`; the header is written on the first
/// row since its columns depend on the species.
pub struct StatisticsWriter {
    path: PathBuf,
    wtr: Option<csv::Writer<BufWriter<File>>>,
    flush_every: usize,
}

impl StatisticsWriter {
    pub fn new(prefix: &str) -> Self {
        Self { path: PathBuf::from(format!("{prefix}_statistics.csv")), wtr: None, flush_every: 25 }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn open(&self, species: &[Species]) -> Result<csv::Writer<BufWriter<File>>> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&self.path)?;
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::new(file));

        let mut header = vec!["iter".to_string(), "time".to_string(), "wtime".to_string()];
        for sp in species {
            for col in ["n_sim", "n_real", "Ix", "Iy", "Iz", "E_kin"] {
                header.push(format!("{col}.{}", sp.name));
            }
        }
        header.push("E_pot".to_string());
        header.push("E_tot".to_string());
        wtr.write_record(&header)?;
        Ok(wtr)
    }

    pub fn write(&mut self, world: &ThreeDWorld, species: &[Species]) -> Result<()> {
        if self.wtr.is_none() {
            self.wtr = Some(self.open(species)?);
        }
        let t_info = get_time_info_from_world(world);

        let mut row = vec![t_info.iteration.to_string(), t_info.sim_time.to_string(),
                           t_info.wall_time.to_string()];
        let mut e_kin_tot = 0.0;
        for sp in species {
            let s_info = get_species_info_from_species(sp);
            e_kin_tot += s_info.kinetic_e;
            row.push(s_info.sim_count.to_string());
            row.push(s_info.real_count.to_string());
            row.push(s_info.momentum_x.to_string());
            row.push(s_info.momentum_y.to_string());
            row.push(s_info.momentum_z.to_string());
            row.push(s_info.kinetic_e.to_string());
        }
        let e_pot = world.get_potential_energy();
        row.push(e_pot.to_string());
        row.push((e_pot + e_kin_tot).to_string());

        if let Some(wtr) = self.wtr.as_mut() {
            wtr.write_record(&row)?;
            if t_info.iteration % self.flush_every == 0 {
                wtr.flush()?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(wtr) = self.wtr.as_mut() {
            wtr.flush()?;
        }
        Ok(())
    }
}

pub struct DiagnosticOutput;

impl DiagnosticOutput {

    /// One status line: iteration and macroparticle count of every species.
    pub fn print_info(&self, world: &ThreeDWorld, species: &[Species]) {
        print!("iter: {:6}", world.get_iteration());
        for sp in species {
            print!("\t{}: {:6}", sp.name, sp.get_sim_count());
        }
        println!();
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{AMU, ME, QE};
    use crate::world_3d::SingleDimSpec;
    use glam::DVec3;

    #[test]
    fn statistics_header_names_every_species() {
        let dir = std::env::temp_dir().join(format!("pic_stats_{}", std::process::id()));
        let prefix = dir.join("run");
        let d = SingleDimSpec::init(3, 0.0, 1.0).unwrap();
        let mut world = ThreeDWorld::init(prefix.to_string_lossy(), d, d, d).unwrap();
        world.set_iter_max(1);
        let mut species = vec![
            Species::init("O+", 16.0 * AMU, QE, 1.0, &world).unwrap(),
            Species::init("e-", ME, -QE, 1.0, &world).unwrap(),
        ];
        species[0].add_particle(DVec3::splat(0.5), DVec3::new(1.0, 0.0, 0.0), 2.0);

        let mut stats = StatisticsWriter::new(&world.prefix);
        while world.advance_time() {
            stats.write(&world, &species).unwrap();
        }
        stats.flush().unwrap();

        let text = std::fs::read_to_string(stats.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "iter,time,wtime,n_sim.O+,n_real.O+,Ix.O+,Iy.O+,Iz.O+,E_kin.O+,\
                              n_sim.e-,n_real.e-,Ix.e-,Iy.e-,Iz.e-,E_kin.e-,E_pot,E_tot");
        let fields: Vec<&str> = lines[2].split(',').collect();
        assert_eq!(fields.len(), 17);
        assert_eq!(fields[0], "1");
        assert_eq!(fields[3], "1");
        assert_eq!(fields[4], "2");
        std::fs::remove_dir_all(dir).ok();
    }
}
