//! Initial particle placement.

use crate::error::{Result, SimError};
use nalgebra::Vector3;

/// Place `n` particles on a simple cubic grid centred in the box.
///
/// Sites start at `-(box_size - edge_margin)/2` and advance by `spacing` while
/// they stay below `(box_size - edge_margin)/2`. The z axis varies fastest.
pub fn cubic_lattice(
    n: usize,
    box_size: f64,
    spacing: f64,
    edge_margin: f64,
) -> Result<Vec<Vector3<f64>>> {
    if !(spacing > 0.0 && spacing.is_finite()) {
        return Err(SimError::InvalidConfig(format!(
            "lattice spacing must be positive, got {spacing}"
        )));
    }
    let start = -(box_size - edge_margin) / 2.0;
    let end = (box_size - edge_margin) / 2.0;

    // sites per axis, computed by index so rounding cannot drift;
    // never more than n of them are used
    let axis: Vec<f64> = (0..)
        .map(|k| start + k as f64 * spacing)
        .take_while(|&c| c < end)
        .take(n)
        .collect();

    let mut positions = Vec::with_capacity(n);
    'fill: for &x in &axis {
        for &y in &axis {
            for &z in &axis {
                if positions.len() == n {
                    break 'fill;
                }
                positions.push(Vector3::new(x, y, z));
            }
        }
    }

    if positions.len() < n {
        return Err(SimError::LatticeOverflow {
            placed: positions.len(),
            requested: n,
        });
    }
    Ok(positions)
}

/// Alternating unit charges: `+1` on odd indices, `-1` on even ones.
pub fn alternating_charges(n: usize) -> Vec<i32> {
    (0..n).map(|i| if i % 2 == 1 { 1 } else { -1 }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fills_in_order() {
        let positions = cubic_lattice(5, 4.0, 1.0, 0.0).unwrap();
        assert_eq!(positions.len(), 5);
        assert_relative_eq!(positions[0], Vector3::new(-2.0, -2.0, -2.0));
        assert_relative_eq!(positions[1], Vector3::new(-2.0, -2.0, -1.0));
        assert_relative_eq!(positions[4], Vector3::new(-2.0, -1.0, -2.0));
    }

    #[test]
    fn test_stays_inside_margin() {
        let (box_size, margin) = (6.0, 1.0);
        let positions = cubic_lattice(64, box_size, 1.2, margin).unwrap();
        let end = (box_size - margin) / 2.0;
        for p in &positions {
            for k in 0..3 {
                assert!(p[k] >= -end - 1e-12 && p[k] < end);
            }
        }
    }

    #[test]
    fn test_overflow_is_reported() {
        // 4 sites per axis fit: 64 < 65
        match cubic_lattice(65, 4.0, 1.0, 0.0) {
            Err(SimError::LatticeOverflow { placed, requested }) => {
                assert_eq!(placed, 64);
                assert_eq!(requested, 65);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_bad_spacing() {
        assert!(matches!(
            cubic_lattice(8, 4.0, 0.0, 0.0),
            Err(SimError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_wide_box_places_only_requested_sites() {
        let positions = cubic_lattice(8, 1e12, 1.0, 0.0).unwrap();
        assert_eq!(positions.len(), 8);
        assert_eq!(positions[0], Vector3::new(-5e11, -5e11, -5e11));
        assert_eq!(positions[7], Vector3::new(-5e11, -5e11, -5e11 + 7.0));
    }

    #[test]
    fn test_zero_particles() {
        assert!(cubic_lattice(0, 4.0, 1.0, 0.0).unwrap().is_empty());
    }

    #[test]
    fn test_alternating_charges() {
        assert_eq!(alternating_charges(5), vec![-1, 1, -1, 1, -1]);
        let total: i32 = alternating_charges(8).iter().sum();
        assert_eq!(total, 0);
    }
}
