use serde::{Deserialize, Serialize};

/// A dense 3D array laid out like the mesh meshgrid: `[j, i, k]` where
/// `j` walks the n (y) axis, `i` the m (x) axis and `k` the p (z) axis.
///
/// Storage is row-major over `(j, i, k)`, so flattening matches the voxel
/// order of a C-ordered `(n, m, p)` meshgrid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid3 {
    shape: [usize; 3],
    data: Vec<f64>,
}

impl Grid3 {
    /// A grid of the given `(rows, cols, layers)` shape filled with `value`.
    pub fn filled(shape: [usize; 3], value: f64) -> Self {
        Grid3 { shape, data: vec![value; shape[0] * shape[1] * shape[2]] }
    }

    /// A grid whose cell `[j, i, k]` holds `f(j, i, k)`.
    pub fn from_fn(shape: [usize; 3], mut f: impl FnMut(usize, usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(shape[0] * shape[1] * shape[2]);
        for j in 0..shape[0] {
            for i in 0..shape[1] {
                for k in 0..shape[2] {
                    data.push(f(j, i, k));
                }
            }
        }
        Grid3 { shape, data }
    }

    /// `(rows, cols, layers)` = `(len n, len m, len p)`.
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Calculates the flat index for [j, i, k], or None outside the grid
    #[inline(always)]
    fn flat_idx(&self, j: usize, i: usize, k: usize) -> Option<usize> {
        let [rows, cols, layers] = self.shape;
        if j < rows && i < cols && k < layers {
            Some((j * cols + i) * layers + k)
        } else {
            None
        }
    }

    pub fn get(&self, j: usize, i: usize, k: usize) -> Option<f64> {
        self.flat_idx(j, i, k).map(|idx| self.data[idx])
    }

    /// Stores `value` at `[j, i, k]`; returns false if the index is outside the grid.
    pub fn set(&mut self, j: usize, i: usize, k: usize, value: f64) -> bool {
        match self.flat_idx(j, i, k) {
            Some(idx) => {
                self.data[idx] = value;
                true
            }
            None => false,
        }
    }

    /// The single xy-plane at layer `k`, as a grid of shape `(rows, cols, 1)`.
    pub fn layer(&self, k: usize) -> Option<Grid3> {
        let [rows, cols, layers] = self.shape;
        if k >= layers {
            return None;
        }
        Some(Grid3::from_fn([rows, cols, 1], |j, i, _| self.data[(j * cols + i) * layers + k]))
    }

    /// Values in storage order.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// `([j, i, k], value)` pairs in storage order.
    pub fn indexed_iter(&self) -> impl Iterator<Item = ([usize; 3], f64)> + '_ {
        let [_, cols, layers] = self.shape;
        self.data.iter().enumerate().map(move |(idx, &v)| {
            let k = idx % layers;
            let i = (idx / layers) % cols;
            let j = idx / (layers * cols);
            ([j, i, k], v)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_respect_bounds() {
        let mut g = Grid3::filled([2, 3, 4], 0.0);
        assert_eq!(g.len(), 24);
        assert!(g.set(1, 2, 3, 5.0));
        assert_eq!(g.get(1, 2, 3), Some(5.0));
        assert!(!g.set(2, 0, 0, 1.0));
        assert_eq!(g.get(0, 3, 0), None);
    }

    #[test]
    fn storage_order_is_j_then_i_then_k() {
        let g = Grid3::from_fn([2, 2, 2], |j, i, k| (100 * j + 10 * i + k) as f64);
        assert_eq!(g.as_slice(), &[0.0, 1.0, 10.0, 11.0, 100.0, 101.0, 110.0, 111.0]);
        let pairs: Vec<_> = g.indexed_iter().collect();
        assert_eq!(pairs[3], ([0, 1, 1], 11.0));
        assert_eq!(pairs[6], ([1, 1, 0], 110.0));
    }

    #[test]
    fn layer_extracts_one_plane() {
        let g = Grid3::from_fn([2, 3, 2], |j, i, k| (j * 3 + i) as f64 + 0.5 * k as f64);
        let top = g.layer(1).unwrap();
        assert_eq!(top.shape(), [2, 3, 1]);
        assert_eq!(top.get(1, 2, 0), Some(5.5));
        assert!(g.layer(2).is_none());
    }
}
