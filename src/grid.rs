//! Regular 3-D grids.
//!
//! Grid points live at `min + (iX, iY, iZ) * step` and are addressed by the
//! flat index `iXYZ = iX + iY*NX + iZ*NX*NY`. `RealGrid` stores a dense f32
//! tensor with trilinear sampling; `ListGrid` stores a payload list per cell
//! and backs the interaction / non-bonded indexing grids.

use serde::{Deserialize, Serialize};

use crate::geometry::Vec3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDims {
    pub min: Vec3,
    pub step: Vec3,
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    #[serde(default)]
    pub pad: usize,
}

impl GridDims {
    pub fn new(min: Vec3, step: Vec3, nx: usize, ny: usize, nz: usize) -> GridDims {
        GridDims { min, step, nx, ny, nz, pad: 0 }
    }

    /// Grid sized to cover [min_coord, max_coord] extended by `border` at the
    /// given step.
    pub fn covering(min_coord: Vec3, max_coord: Vec3, border: f64, step: f64) -> GridDims {
        let min = min_coord - Vec3::new(border, border, border);
        let max = max_coord + Vec3::new(border, border, border);
        let extent = max - min;
        let nx = (extent.x / step) as usize + 1;
        let ny = (extent.y / step) as usize + 1;
        let nz = (extent.z / step) as usize + 1;
        GridDims::new(min, Vec3::new(step, step, step), nx, ny, nz)
    }

    pub fn len(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max(&self) -> Vec3 {
        self.min
            + Vec3::new(
                self.step.x * (self.nx - 1) as f64,
                self.step.y * (self.ny - 1) as f64,
                self.step.z * (self.nz - 1) as f64,
            )
    }

    pub fn index(&self, ix: usize, iy: usize, iz: usize) -> usize {
        ix + iy * self.nx + iz * self.nx * self.ny
    }

    pub fn is_valid(&self, ix: usize, iy: usize, iz: usize) -> bool {
        ix >= self.pad
            && ix < self.nx - self.pad
            && iy >= self.pad
            && iy < self.ny - self.pad
            && iz >= self.pad
            && iz < self.nz - self.pad
    }

    pub fn is_valid_index(&self, ixyz: usize) -> bool {
        ixyz < self.len()
    }

    pub fn is_valid_coord(&self, c: Vec3) -> bool {
        let max = self.max();
        c.x >= self.min.x
            && c.x <= max.x
            && c.y >= self.min.y
            && c.y <= max.y
            && c.z >= self.min.z
            && c.z <= max.z
    }

    fn axis_index(c: f64, min: f64, step: f64, n: usize) -> usize {
        let i = ((c - min) / step).floor();
        (i.max(0.0) as usize).min(n - 1)
    }

    pub fn ix(&self, c: Vec3) -> usize {
        Self::axis_index(c.x, self.min.x, self.step.x, self.nx)
    }

    pub fn iy(&self, c: Vec3) -> usize {
        Self::axis_index(c.y, self.min.y, self.step.y, self.ny)
    }

    pub fn iz(&self, c: Vec3) -> usize {
        Self::axis_index(c.z, self.min.z, self.step.z, self.nz)
    }

    /// Flat index of the cell containing `c`, or None if off-grid.
    pub fn coord_to_index(&self, c: Vec3) -> Option<usize> {
        if self.is_valid_coord(c) {
            Some(self.index(self.ix(c), self.iy(c), self.iz(c)))
        } else {
            None
        }
    }

    pub fn index_to_coord(&self, ixyz: usize) -> Vec3 {
        let ix = ixyz % self.nx;
        let iy = (ixyz / self.nx) % self.ny;
        let iz = ixyz / (self.nx * self.ny);
        self.min
            + Vec3::new(
                self.step.x * ix as f64,
                self.step.y * iy as f64,
                self.step.z * iz as f64,
            )
    }

    /// Indices of all grid points within `radius` of `center`. Unique and
    /// all inside the grid.
    pub fn sphere_indices(&self, center: Vec3, radius: f64) -> Vec<usize> {
        let mut out = Vec::new();
        let lo = center - Vec3::new(radius, radius, radius);
        let hi = center + Vec3::new(radius, radius, radius);
        let ix0 = GridDims::axis_index(lo.x, self.min.x, self.step.x, self.nx);
        let ix1 = GridDims::axis_index(hi.x.min(self.max().x), self.min.x, self.step.x, self.nx);
        let iy0 = GridDims::axis_index(lo.y, self.min.y, self.step.y, self.ny);
        let iy1 = GridDims::axis_index(hi.y.min(self.max().y), self.min.y, self.step.y, self.ny);
        let iz0 = GridDims::axis_index(lo.z, self.min.z, self.step.z, self.nz);
        let iz1 = GridDims::axis_index(hi.z.min(self.max().z), self.min.z, self.step.z, self.nz);
        let r2 = radius * radius;
        for iz in iz0..=iz1 {
            for iy in iy0..=iy1 {
                for ix in ix0..=ix1 {
                    if !self.is_valid(ix, iy, iz) {
                        continue;
                    }
                    let p = self.min
                        + Vec3::new(
                            self.step.x * ix as f64,
                            self.step.y * iy as f64,
                            self.step.z * iz as f64,
                        );
                    if p.distance2(center) <= r2 {
                        out.push(self.index(ix, iy, iz));
                    }
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealGrid {
    dims: GridDims,
    data: Vec<f32>,
    tol: f64,
}

impl RealGrid {
    pub fn new(dims: GridDims) -> RealGrid {
        let n = dims.len();
        RealGrid {
            dims,
            data: vec![0.0; n],
            tol: 0.001,
        }
    }

    pub fn from_data(dims: GridDims, data: Vec<f32>) -> Option<RealGrid> {
        if data.len() != dims.len() {
            return None;
        }
        Some(RealGrid { dims, data, tol: 0.001 })
    }

    pub fn dims(&self) -> &GridDims {
        &self.dims
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn tolerance(&self) -> f64 {
        self.tol
    }

    pub fn set_tolerance(&mut self, tol: f64) {
        self.tol = tol;
    }

    pub fn get(&self, ixyz: usize) -> f64 {
        if self.dims.is_valid_index(ixyz) {
            self.data[ixyz] as f64
        } else {
            0.0
        }
    }

    pub fn get_coord(&self, c: Vec3) -> f64 {
        match self.dims.coord_to_index(c) {
            Some(i) => self.data[i] as f64,
            None => 0.0,
        }
    }

    pub fn set(&mut self, ixyz: usize, val: f64) {
        if self.dims.is_valid_index(ixyz) {
            self.data[ixyz] = val as f32;
        }
    }

    pub fn set_all(&mut self, val: f64) {
        for v in &mut self.data {
            *v = val as f32;
        }
    }

    /// Trilinear interpolation (Oberlin & Scheraga). At a grid node this
    /// returns the stored value.
    pub fn get_smoothed(&self, c: Vec3) -> f64 {
        if !self.dims.is_valid_coord(c) {
            return 0.0;
        }
        let d = &self.dims;
        let px = (c.x - d.min.x) / d.step.x;
        let py = (c.y - d.min.y) / d.step.y;
        let pz = (c.z - d.min.z) / d.step.z;
        let ix = (px.floor() as usize).min(d.nx.saturating_sub(2));
        let iy = (py.floor() as usize).min(d.ny.saturating_sub(2));
        let iz = (pz.floor() as usize).min(d.nz.saturating_sub(2));
        let fx = px - ix as f64;
        let fy = py - iy as f64;
        let fz = pz - iz as f64;
        let mut val = 0.0;
        for (dz, wz) in [(0usize, 1.0 - fz), (1, fz)] {
            for (dy, wy) in [(0usize, 1.0 - fy), (1, fy)] {
                for (dx, wx) in [(0usize, 1.0 - fx), (1, fx)] {
                    let w = wx * wy * wz;
                    if w > 0.0 {
                        val += w * self.data[d.index(ix + dx, iy + dy, iz + dz)] as f64;
                    }
                }
            }
        }
        val
    }

    /// Sets all grid points within `radius` of `c` to `val`. If `overwrite`
    /// is false, non-zero values are kept.
    pub fn set_sphere(&mut self, c: Vec3, radius: f64, val: f64, overwrite: bool) {
        for i in self.dims.sphere_indices(c, radius) {
            if overwrite || self.data[i] == 0.0 {
                self.data[i] = val as f32;
            }
        }
    }

    /// Sets all grid points in the shell [inner, outer] around `c` to `val`.
    pub fn set_surface(&mut self, c: Vec3, inner: f64, outer: f64, val: f64, overwrite: bool) {
        let inner2 = inner * inner;
        for i in self.dims.sphere_indices(c, outer) {
            let p = self.dims.index_to_coord(i);
            if p.distance2(c) >= inner2 && (overwrite || self.data[i] == 0.0) {
                self.data[i] = val as f32;
            }
        }
    }

    pub fn replace_value(&mut self, old: f64, new: f64) {
        self.replace_value_range(old - self.tol, old + self.tol, new);
    }

    pub fn replace_value_range(&mut self, old_min: f64, old_max: f64, new: f64) {
        for v in &mut self.data {
            let val = *v as f64;
            if val >= old_min && val <= old_max {
                *v = new as f32;
            }
        }
    }

    /// True if any grid point within `radius` of `c` holds `val` (within
    /// tolerance).
    pub fn is_value_within_sphere(&self, c: Vec3, radius: f64, val: f64) -> bool {
        self.dims
            .sphere_indices(c, radius)
            .into_iter()
            .any(|i| (self.data[i] as f64 - val).abs() <= self.tol)
    }

    pub fn count_value(&self, val: f64) -> usize {
        self.data
            .iter()
            .filter(|&&v| (v as f64 - val).abs() <= self.tol)
            .count()
    }

    pub fn min_value(&self) -> f64 {
        self.data.iter().cloned().fold(f32::INFINITY, f32::min) as f64
    }

    pub fn max_value(&self) -> f64 {
        self.data.iter().cloned().fold(f32::NEG_INFINITY, f32::max) as f64
    }
}

/// Grid holding a list of payload items per cell; used to index receptor
/// atoms and interaction centres for O(1) neighbourhood lookup.
#[derive(Debug, Clone)]
pub struct ListGrid<T: Copy + Ord> {
    dims: GridDims,
    cells: Vec<Vec<T>>,
}

impl<T: Copy + Ord> ListGrid<T> {
    pub fn new(dims: GridDims) -> ListGrid<T> {
        let n = dims.len();
        ListGrid {
            dims,
            cells: vec![Vec::new(); n],
        }
    }

    pub fn dims(&self) -> &GridDims {
        &self.dims
    }

    /// Stamps `item` into every cell within `radius` of `center`.
    pub fn insert_sphere(&mut self, center: Vec3, radius: f64, item: T) {
        for i in self.dims.sphere_indices(center, radius) {
            self.cells[i].push(item);
        }
    }

    pub fn cell(&self, ixyz: usize) -> &[T] {
        if self.dims.is_valid_index(ixyz) {
            &self.cells[ixyz]
        } else {
            &[]
        }
    }

    /// Payload list of the cell containing `c`; empty if off-grid.
    pub fn cell_at(&self, c: Vec3) -> &[T] {
        match self.dims.coord_to_index(c) {
            Some(i) => &self.cells[i],
            None => &[],
        }
    }

    /// Deduplicates every cell list (needed after indexing more than one
    /// receptor conformation).
    pub fn unique_lists(&mut self) {
        for cell in &mut self.cells {
            cell.sort_unstable();
            cell.dedup();
        }
    }

    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims() -> GridDims {
        GridDims::new(Vec3::new(-2.0, -2.0, -2.0), Vec3::new(0.5, 0.5, 0.5), 9, 9, 9)
    }

    #[test]
    fn index_round_trip() {
        let d = dims();
        for &(ix, iy, iz) in &[(0, 0, 0), (3, 1, 7), (8, 8, 8)] {
            let i = d.index(ix, iy, iz);
            let c = d.index_to_coord(i);
            assert_eq!(d.coord_to_index(c), Some(i));
        }
    }

    #[test]
    fn off_grid_coord_is_none() {
        let d = dims();
        assert_eq!(d.coord_to_index(Vec3::new(5.0, 0.0, 0.0)), None);
        assert_eq!(d.coord_to_index(Vec3::new(-2.1, 0.0, 0.0)), None);
    }

    #[test]
    fn sphere_indices_unique_and_in_range(){
        let d = dims();
        let idx = d.sphere_indices(Vec3::new(0.1, 0.0, -0.2), 1.2);
        assert!(!idx.is_empty());
        let mut sorted = idx.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), idx.len());
        for i in idx {
            assert!(d.is_valid_index(i));
            assert!(d.index_to_coord(i).distance(Vec3::new(0.1, 0.0, -0.2)) <= 1.2);
        }
    }

    #[test]
    fn trilinear_matches_node_value() {
        let mut g = RealGrid::new(dims());
        for i in 0..g.dims().len() {
            let c = g.dims().index_to_coord(i);
            g.set(i, c.x + 2.0 * c.y - c.z);
        }
        let node = g.dims().index_to_coord(g.dims().index(4, 2, 6));
        assert!((g.get_smoothed(node) - g.get_coord(node)).abs() < 1e-5);
    }

    #[test]
    fn trilinear_is_exact_for_linear_fields() {
        let mut g = RealGrid::new(dims());
        for i in 0..g.dims().len() {
            let c = g.dims().index_to_coord(i);
            g.set(i, 0.5 * c.x - c.y + 2.0 * c.z);
        }
        let p = Vec3::new(0.13, -0.72, 1.04);
        let expected = 0.5 * p.x - p.y + 2.0 * p.z;
        assert!((g.get_smoothed(p) - expected).abs() < 1e-5);
    }

    #[test]
    fn sphere_stamp_and_replace() {
        let mut g = RealGrid::new(dims());
        g.set_sphere(Vec3::zero(), 1.0, 3.0, true);
        assert!(g.count_value(3.0) > 0);
        g.replace_value(3.0, 7.0);
        assert_eq!(g.count_value(3.0), 0);
        assert!(g.is_value_within_sphere(Vec3::zero(), 1.0, 7.0));
    }

    #[test]
    fn list_grid_stamping() {
        let mut g: ListGrid<usize> = ListGrid::new(dims());
        g.insert_sphere(Vec3::zero(), 1.0, 42);
        g.insert_sphere(Vec3::zero(), 1.0, 42);
        let cell = g.cell_at(Vec3::zero());
        assert_eq!(cell, &[42, 42]);
        g.unique_lists();
        assert_eq!(g.cell_at(Vec3::zero()), &[42]);
        assert!(g.cell_at(Vec3::new(10.0, 0.0, 0.0)).is_empty());
    }
}
