use std::path::{Path, PathBuf};
use glam::DVec3;
use vtkio::model::{Attribute, Attributes, ByteOrder, DataArray, DataSet, ElementType, Extent,
                   IOBuffer, ImageDataPiece, Piece, PolyDataPiece, Version, VertexNumbers, Vtk};

use crate::particles::Species;
use crate::world_3d::ThreeDWorld;


fn vectors(name: impl Into<String>, data: &[DVec3]) -> Attribute {
    Attribute::DataArray(DataArray {
        name: name.into(),
        elem: ElementType::Vectors,
        data: IOBuffer::F64(data.iter().flat_map(|v| v.to_array()).collect()),
    })
}

fn scalars(name: impl Into<String>, data: &[f64]) -> Attribute {
    Attribute::scalars(name.into(), 1).with_data(data.to_vec())
}

fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

pub struct WriteVti;

impl WriteVti {

    /// Writes the node fields of `world` and the moments of every species to
    /// `{prefix}_{iter:06}.vti`.
    pub fn save_fields(&self, world: &ThreeDWorld, species: &[Species]) -> anyhow::Result<PathBuf> {
        let path = PathBuf::from(format!("{}_{:06}.vti", world.prefix, world.get_iteration()));
        ensure_parent_dir(&path)?;

        let npts = world.n_nodes();
        let mut attrs = Attributes::new();
        attrs.point.push(scalars("V_node", world.node_volume.data()));
        attrs.point.push(scalars("rho", world.rho.data()));
        attrs.point.push(scalars("phi", world.phi.data()));
        attrs.point.push(vectors("E", world.ef.data()));
        attrs.point.push(scalars("n.fluid_e-", world.n_e_br.data()));
        attrs.point.push(scalars("T_tot", world.t_tot.data()));
        attrs.point.push(scalars("ln_Lambda", world.ln_lambda.data()));

        for sp in species {
            anyhow::ensure!(sp.number_density.len() == npts,
                            "{} density: wrong length", sp.name);
            attrs.point.push(scalars(format!("n.{}", sp.name), sp.number_density.data()));
            attrs.point.push(scalars(format!("n_mean.{}", sp.name), sp.n_mean.data()));
            attrs.point.push(vectors(format!("v_stream.{}", sp.name), sp.v_stream.data()));
            attrs.point.push(scalars(format!("T.{}", sp.name), sp.temperature.data()));
        }
        for sp in species {
            attrs.cell.push(scalars(format!("mp_count.{}", sp.name), sp.mp_count.data()));
        }

        // ImageData uses inclusive ranges, so 0..20 includes 21 points.
        let [ni, nj, nk] = world.nn();
        let extent = Extent::Ranges([0..=(ni as i32 - 1), 0..=(nj as i32 - 1), 0..=(nk as i32 - 1)]);

        let piece = ImageDataPiece {
            extent: extent.clone(),
            data: attrs,
        };

        let x_min = world.get_x_min();
        let del_x = world.get_del_x();
        let vtk = Vtk {
            version: Version::new((2, 3)),
            byte_order: ByteOrder::LittleEndian,
            title: format!("{} fields", world.prefix),
            file_path: None,
            data: DataSet::ImageData {
                extent,
                origin: [x_min.x as f32, x_min.y as f32, x_min.z as f32],
                spacing: [del_x.x as f32, del_x.y as f32, del_x.z as f32],
                meta: None,
                pieces: vec![Piece::Inline(Box::new(piece))],
            },
        };

        vtk.export(&path)?;
        Ok(path)
    }

    /// Writes about `n_particles` particles of every species to
    /// `{prefix}_{sp}_{iter:06}.vtp`. Sampling accumulates the fractional
    /// stride so the output is not biased toward the start of the buffer.
    pub fn save_particles(
        &self,
        world: &ThreeDWorld,
        species: &[Species],
        n_particles: usize,
    ) -> anyhow::Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(species.len());
        for sp in species {
            let path = PathBuf::from(format!("{}_{}_{:06}.vtp", world.prefix, sp.name,
                                             world.get_iteration()));
            ensure_parent_dir(&path)?;

            let sampled = sample_particles(sp, n_particles);
            let positions: Vec<DVec3> = sampled.iter().map(|p| p.pos).collect();
            let velocities: Vec<DVec3> = sampled.iter().map(|p| p.vel).collect();

            let mut attrs = Attributes::new();
            attrs.point.push(vectors(format!("v.{}", sp.name), &velocities));

            let num = positions.len() as u32;
            let piece = PolyDataPiece {
                points: IOBuffer::F64(positions.iter().flat_map(|x| x.to_array()).collect()),
                verts: Some(VertexNumbers::Legacy {
                    num_cells: num,
                    vertices: (0..num).flat_map(|i| [1, i]).collect(),
                }),
                lines: None,
                polys: None,
                strips: None,
                data: attrs,
            };

            let vtk = Vtk {
                version: Version::new((2, 3)),
                byte_order: ByteOrder::LittleEndian,
                title: format!("{} particles", sp.name),
                file_path: None,
                data: DataSet::PolyData {
                    meta: None,
                    pieces: vec![Piece::Inline(Box::new(piece))],
                },
            };
            vtk.export(&path)?;
            written.push(path);
        }
        Ok(written)
    }
}

fn sample_particles(sp: &Species, n_particles: usize) -> Vec<crate::particles::Particle> {
    let count = sp.get_sim_count();
    if count == 0 {
        return Vec::new();
    }
    let dp = n_particles as f64 / count as f64;
    let mut np = 0.0;
    let mut out = Vec::with_capacity(n_particles.min(count));
    for p in sp.particles.iter() {
        np += dp;
        if np > 1.0 {
            out.push(*p);
            np -= 1.0;
        }
    }
    out
}
