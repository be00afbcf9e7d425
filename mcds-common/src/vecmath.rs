use serde::{Deserialize, Serialize};

/// A position in simulation space (spatial units of the snapshot).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Creates a new Vec3.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Vec3 { x, y, z }
    }

    /// Coordinates in x, y, z order, handy for per-axis loops.
    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(a: [f64; 3]) -> Self {
        Vec3::new(a[0], a[1], a[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_round_trip_keeps_axis_order() {
        let p = Vec3::from([1.0, -2.0, 3.5]);
        assert_eq!(p.to_array(), [1.0, -2.0, 3.5]);
        assert_eq!(p, Vec3::new(1.0, -2.0, 3.5));
    }
}
