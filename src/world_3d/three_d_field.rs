use glam::DVec3;
use std::ops::{Add, AddAssign, Mul};

/// Dense storage for a quantity sampled on every node (or cell) of the mesh.
///
/// Values are laid out with `i` fastest: `i + j*ni + k*ni*nj`.
#[derive(Clone, Debug)]
pub struct ThreeDField <T> {
    nx: usize,
    ny: usize,
    nz: usize,
    data: Vec<T>,
}

/// Splits a fractional node coordinate into the lower node index and the
/// offset inside the cell. Coordinates on (or past) the upper face land in the
/// last cell with offset 1 so the `+1` neighbour stays in bounds.
fn split_coord(l: f64, n: usize) -> (usize, f64) {
    let l = l.clamp(0.0, (n - 1) as f64);
    let i = (l as usize).min(n - 2);
    (i, l - i as f64)
}

impl<T> ThreeDField <T>
    where
    T: Copy + Add<Output = T> + AddAssign + Mul<f64, Output = T>
{

    pub fn init(nx: usize, ny: usize, nz: usize, val: T) -> Self {
        ThreeDField {nx, ny, nz, data: vec![val; nx * ny * nz],}
    }

    pub fn set_all(&mut self, val : T) {
        self.data.fill(val);
    }

    pub fn dims(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    pub fn idx(&self, ix: usize, iy: usize, iz: usize) -> usize {
        assert!(ix < self.nx, "x index ({ix}) out of bounds [0, {})", self.nx);
        assert!(iy < self.ny, "y index ({iy}) out of bounds [0, {})", self.ny);
        assert!(iz < self.nz, "z index ({iz}) out of bounds [0, {})", self.nz);

        iz * self.nx * self.ny + iy * self.nx + ix
    }

    pub fn get(&self, ix: usize, iy: usize, iz: usize) ->  T {
        self.data[self.idx(ix, iy, iz)]
    }

    pub fn set(&mut self, ix: usize, iy: usize, iz: usize, val: T) {
        let idx = self.idx(ix, iy, iz);
        self.data[idx] = val;
    }

    pub fn add(&mut self, ix: usize, iy: usize, iz: usize, val: T) {
        let idx = self.idx(ix, iy, iz);
        self.data[idx] += val;
    }

    /// Deposits `value` on the eight nodes surrounding the fractional node
    /// coordinate `l` with trilinear weights. The weights sum to one.
    pub fn scatter(&mut self, l: DVec3, value: T) {
        let (i, di) = split_coord(l.x, self.nx);
        let (j, dj) = split_coord(l.y, self.ny);
        let (k, dk) = split_coord(l.z, self.nz);

        self.add(i,   j,   k,   value * ((1.0 - di) * (1.0 - dj) * (1.0 - dk)));
        self.add(i+1, j,   k,   value * (di         * (1.0 - dj) * (1.0 - dk)));
        self.add(i,   j+1, k,   value * ((1.0 - di) * dj         * (1.0 - dk)));
        self.add(i+1, j+1, k,   value * (di         * dj         * (1.0 - dk)));
        self.add(i,   j,   k+1, value * ((1.0 - di) * (1.0 - dj) * dk));
        self.add(i+1, j,   k+1, value * (di         * (1.0 - dj) * dk));
        self.add(i,   j+1, k+1, value * ((1.0 - di) * dj         * dk));
        self.add(i+1, j+1, k+1, value * (di         * dj         * dk));
    }

    /// Trilinear interpolation of the node values at fractional coordinate `l`.
    pub fn gather(&self, l: DVec3) -> T {
        let (i, di) = split_coord(l.x, self.nx);
        let (j, dj) = split_coord(l.y, self.ny);
        let (k, dk) = split_coord(l.z, self.nz);

        self.get(i,   j,   k)   * ((1.0 - di) * (1.0 - dj) * (1.0 - dk)) +
        self.get(i+1, j,   k)   * (di         * (1.0 - dj) * (1.0 - dk)) +
        self.get(i,   j+1, k)   * ((1.0 - di) * dj         * (1.0 - dk)) +
        self.get(i+1, j+1, k)   * (di         * dj         * (1.0 - dk)) +
        self.get(i,   j,   k+1) * ((1.0 - di) * (1.0 - dj) * dk) +
        self.get(i+1, j,   k+1) * (di         * (1.0 - dj) * dk) +
        self.get(i,   j+1, k+1) * ((1.0 - di) * dj         * dk) +
        self.get(i+1, j+1, k+1) * (di         * dj         * dk)
    }

    pub fn len(&self) -> usize { self.data.len() }

    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    pub fn data(&self) -> &[T] { &self.data }

    pub fn data_mut(&mut self) -> &mut [T] { &mut self.data }

    pub fn elementwise_inplace_add(&mut self, other: &ThreeDField<T>) {
        for (x,y) in self.data.iter_mut().zip(&other.data) {
            *x += *y;
        }
    }

    pub fn elementwise_inplace_add_scaled(&mut self, scale: f64, other: &ThreeDField<T>) {
        for (x,y) in self.data.iter_mut().zip(&other.data) {
            *x += *y * scale;
        }
    }

    /// Sums each node on the min face of `axis` with its image on the max
    /// face and stores the total on both, so a periodic seam sees every
    /// contribution deposited on either side.
    pub fn fold_axis(&mut self, axis: usize) {
        let dims = self.dims();
        let last = dims[axis] - 1;
        for k in 0..dims[2] {
            for j in 0..dims[1] {
                for i in 0..dims[0] {
                    let lo = [i, j, k];
                    if lo[axis] != 0 {
                        continue;
                    }
                    let mut hi = lo;
                    hi[axis] = last;
                    let sum = self.get(lo[0], lo[1], lo[2]) + self.get(hi[0], hi[1], hi[2]);
                    self.set(lo[0], lo[1], lo[2], sum);
                    self.set(hi[0], hi[1], hi[2], sum);
                }
            }
        }
    }
}

impl ThreeDField<f64> {
    pub fn elementwise_inplace_div(&mut self, other: &ThreeDField<f64>) {
        for (x,y) in self.data.iter_mut().zip(&other.data) {
            *x /= *y;
        }
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scatter_conserves_deposited_value() {
        let mut f = ThreeDField::init(5, 4, 6, 0.0);
        f.scatter(DVec3::new(1.3, 2.7, 0.45), 2.5);
        assert!((f.sum() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn gather_of_uniform_field_is_uniform() {
        let f = ThreeDField::init(4, 4, 4, 1.0);
        for l in [DVec3::new(0.1, 0.2, 0.3), DVec3::new(2.9, 1.5, 0.0), DVec3::splat(1.0)] {
            assert!((f.gather(l) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn upper_face_coordinate_stays_in_bounds() {
        let mut f = ThreeDField::init(3, 3, 3, 0.0);
        f.scatter(DVec3::new(2.0, 2.0, 2.0), 1.0);
        assert_eq!(f.get(2, 2, 2), 1.0);
        assert!((f.gather(DVec3::splat(2.0)) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn vector_gather_interpolates_linearly() {
        let mut f = ThreeDField::init(2, 2, 2, DVec3::ZERO);
        for k in 0..2 {
            for j in 0..2 {
                f.set(1, j, k, DVec3::new(2.0, 0.0, -2.0));
            }
        }
        let v = f.gather(DVec3::new(0.25, 0.5, 0.5));
        assert!((v - DVec3::new(0.5, 0.0, -0.5)).length() < 1e-12);
    }

    #[test]
    fn fold_axis_merges_seam_nodes() {
        let mut f = ThreeDField::init(3, 4, 2, 0.0);
        f.set(1, 0, 1, 2.0);
        f.set(1, 3, 1, 0.5);
        f.set(2, 1, 0, 7.0);
        f.fold_axis(1);
        assert_eq!(f.get(1, 0, 1), 2.5);
        assert_eq!(f.get(1, 3, 1), 2.5);
        // interior nodes are untouched
        assert_eq!(f.get(2, 1, 0), 7.0);
        assert_eq!(f.get(0, 0, 0), 0.0);
    }
}
