use anyhow::Result;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::BufWriter;
use std::path::PathBuf;

use crate::particles::Species;
use crate::world_3d::ThreeDWorld;

#[derive(Debug, Serialize)]
struct VdfRow {
    pub v: f64,
    pub f_vx: f64,
    pub f_vy: f64,
    pub f_vz: f64,
    pub speed: f64,
    pub f_speed: f64,
}

/// Weighted velocity distribution of one species: three component
/// histograms on `[-v_max, v_max]` and a speed histogram on `[0, c_max]`,
/// each normalised to unit area.
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityDistribution {
    pub v: Vec<f64>,
    pub f: [Vec<f64>; 3],
    pub speed: Vec<f64>,
    pub f_speed: Vec<f64>,
}

fn bin(x: f64, lo: f64, width: f64, n_bins: usize) -> usize {
    (((x - lo) / width) as usize).min(n_bins - 1)
}

impl VelocityDistribution {
    /// Returns `None` for a species without particles.
    pub fn from_species(sp: &Species, n_bins: usize) -> Option<Self> {
        let w_tot: f64 = sp.particles.iter().map(|p| p.w_mp).sum();
        if sp.particles.is_empty() || n_bins == 0 || w_tot <= 0.0 {
            return None;
        }
        let v_max = sp.particles.iter()
            .map(|p| p.vel.abs().max_element())
            .fold(0.0, f64::max)
            .max(f64::MIN_POSITIVE);
        let c_max = sp.particles.iter()
            .map(|p| p.vel.length())
            .fold(0.0, f64::max)
            .max(f64::MIN_POSITIVE);
        let dv = 2.0 * v_max / n_bins as f64;
        let dc = c_max / n_bins as f64;

        let mut f = [vec![0.0; n_bins], vec![0.0; n_bins], vec![0.0; n_bins]];
        let mut f_speed = vec![0.0; n_bins];
        for p in sp.particles.iter() {
            for (axis, hist) in f.iter_mut().enumerate() {
                hist[bin(p.vel[axis], -v_max, dv, n_bins)] += p.w_mp;
            }
            f_speed[bin(p.vel.length(), 0.0, dc, n_bins)] += p.w_mp;
        }
        for hist in f.iter_mut() {
            hist.iter_mut().for_each(|h| *h /= w_tot * dv);
        }
        f_speed.iter_mut().for_each(|h| *h /= w_tot * dc);

        Some(Self {
            v: (0..n_bins).map(|b| -v_max + (b as f64 + 0.5) * dv).collect(),
            f,
            speed: (0..n_bins).map(|b| (b as f64 + 0.5) * dc).collect(),
            f_speed,
        })
    }
}

/// Writes `{prefix}_vdf_{sp}_{iter:06}.csv` for every species with particles.
pub struct VelocityHistogramWriter {
    pub n_bins: usize,
}

impl Default for VelocityHistogramWriter {
    fn default() -> Self {
        Self { n_bins: 100 }
    }
}

impl VelocityHistogramWriter {
    pub fn save(&self, world: &ThreeDWorld, species: &[Species]) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(species.len());
        for sp in species {
            let Some(vdf) = VelocityDistribution::from_species(sp, self.n_bins) else {
                continue;
            };
            let path = PathBuf::from(format!("{}_vdf_{}_{:06}.csv", world.prefix, sp.name,
                                             world.get_iteration()));
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&path)?;
            let mut wtr: csv::Writer<BufWriter<File>> = csv::WriterBuilder::new()
                .has_headers(true)
                .from_writer(BufWriter::new(file));

            for b in 0..self.n_bins {
                wtr.serialize(VdfRow {
                    v: vdf.v[b],
                    f_vx: vdf.f[0][b],
                    f_vy: vdf.f[1][b],
                    f_vz: vdf.f[2][b],
                    speed: vdf.speed[b],
                    f_speed: vdf.f_speed[b],
                })?;
            }
            wtr.flush()?;
            written.push(path);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::AMU;
    use crate::world_3d::SingleDimSpec;
    use glam::DVec3;

    fn world(prefix: &str) -> ThreeDWorld {
        let d = SingleDimSpec::init(3, 0.0, 1.0).unwrap();
        ThreeDWorld::init(prefix, d, d, d).unwrap()
    }

    #[test]
    fn histograms_have_unit_area_and_honour_weights() {
        let w = world("vdf");
        let mut sp = Species::init("Ar", 40.0 * AMU, 0.0, 1.0, &w).unwrap();
        sp.add_particle(DVec3::splat(0.5), DVec3::new(-4.0, 0.0, 3.0), 1.0);
        sp.add_particle(DVec3::splat(0.5), DVec3::new(4.0, 0.0, 0.0), 3.0);

        let vdf = VelocityDistribution::from_species(&sp, 8).unwrap();
        let dv = vdf.v[1] - vdf.v[0];
        let dc = vdf.speed[1] - vdf.speed[0];
        for hist in vdf.f.iter() {
            assert!((hist.iter().sum::<f64>() * dv - 1.0).abs() < 1e-12);
        }
        assert!((vdf.f_speed.iter().sum::<f64>() * dc - 1.0).abs() < 1e-12);

        // +4 lands in the top bin with three quarters of the weight
        assert!((vdf.f[0][7] * dv - 0.75).abs() < 1e-12);
        assert!((vdf.f[0][0] * dv - 0.25).abs() < 1e-12);
        // speeds are 5 and 4; only the lighter particle reaches the top speed bin
        assert!((vdf.f_speed[7] * dc - 0.25).abs() < 1e-12);
    }

    #[test]
    fn empty_species_writes_nothing() {
        let w = world("vdf");
        let sp = Species::init("e", 1.0, 0.0, 1.0, &w).unwrap();
        assert!(VelocityDistribution::from_species(&sp, 10).is_none());
    }

    #[test]
    fn csv_has_one_row_per_bin() {
        let dir = std::env::temp_dir().join(format!("pic_vdf_{}", std::process::id()));
        let w = world(&dir.join("run").to_string_lossy());
        let mut sp = Species::init("O", 16.0 * AMU, 0.0, 1.0, &w).unwrap();
        sp.add_particle(DVec3::splat(0.5), DVec3::new(1.0, 2.0, -2.0), 1.0);

        let writer = VelocityHistogramWriter { n_bins: 5 };
        let paths = writer.save(&w, std::slice::from_ref(&sp)).unwrap();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].to_string_lossy().ends_with("run_vdf_O_000000.csv"));

        let text = std::fs::read_to_string(&paths[0]).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "v,f_vx,f_vy,f_vz,speed,f_speed");
        assert_eq!(lines.len(), 6);
        std::fs::remove_dir_all(dir).ok();
    }
}
