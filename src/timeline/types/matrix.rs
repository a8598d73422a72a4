//! Tracking matrix buffers
//!
//! A matrix timeline stores one homogeneous 4x4 transform per tracked tool,
//! sampled together. Tools that were not visible at a given timestamp are
//! simply absent from that buffer.
//!
//! # Example
//!
//! ```
//! use sight_timeline::timeline::{matrix, MatrixTimeline, SlotLayout, Matrix4};
//!
//! let timeline = MatrixTimeline::new();
//! timeline.init_pool_size(SlotLayout::of::<Matrix4>(3), 50)?;
//!
//! let mut sample = timeline.create_buffer(100.0)?;
//! sample.set_element(matrix::translation(10.0, 0.0, -5.0), 0)?;
//! timeline.push(sample)?;
//!
//! let closest = timeline.get_closest_object(104.0, Default::default()).unwrap();
//! assert!(closest.is_present(0));
//! assert!(!closest.is_present(2));
//! # Ok::<(), sight_timeline::TimelineError>(())
//! ```

use super::slots::GenericBuffer;

/// Row-major 4x4 transform
pub type Matrix4 = [f32; 16];

/// Array of tracking matrices sampled at one timestamp
pub type MatrixBuffer = GenericBuffer<Matrix4>;

/// Identity transform
pub const IDENTITY: Matrix4 = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Transform with only a translation part
pub fn translation(x: f32, y: f32, z: f32) -> Matrix4 {
    let mut matrix = IDENTITY;
    matrix[3] = x;
    matrix[7] = y;
    matrix[11] = z;
    matrix
}

/// Split a row-major matrix into rows
pub fn to_rows(matrix: &Matrix4) -> [[f32; 4]; 4] {
    let mut rows = [[0.0f32; 4]; 4];
    for (i, row) in rows.iter_mut().enumerate() {
        row.copy_from_slice(&matrix[i * 4..i * 4 + 4]);
    }
    rows
}

impl MatrixBuffer {
    /// Matrix of tool `index` as rows, or `None` when the tool is absent
    pub fn matrix_rows(&self, index: usize) -> Option<[[f32; 4]; 4]> {
        self.try_get_element(index).map(|m| to_rows(&m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let rows = to_rows(&IDENTITY);
        for (i, row) in rows.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((value - expected).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_translation() {
        let rows = to_rows(&translation(10.0, 20.0, 30.0));
        assert!((rows[0][3] - 10.0).abs() < 1e-6);
        assert!((rows[1][3] - 20.0).abs() < 1e-6);
        assert!((rows[2][3] - 30.0).abs() < 1e-6);
        assert_eq!(rows[3], [0.0, 0.0, 0.0, 1.0]);
    }
}
