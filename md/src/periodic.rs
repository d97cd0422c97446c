//! Cubic periodic box and the two-step minimum-image scheme.
//!
//! Every particle is folded once per evaluation into the primary cell
//! `[-L/2, L/2]` (the nearest-image cache), and each pairwise displacement
//! between folded positions is then corrected by at most one box length per
//! component. Together the two steps yield the minimum-image vector as long
//! as the box is at least twice the interaction cutoff.

use crate::error::{ensure_len, Result, SimError};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodicBox {
    size: f64,
    half: f64,
}

impl PeriodicBox {
    pub fn new(size: f64) -> Result<Self> {
        if !(size.is_finite() && size > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "box size must be positive and finite, got {size}"
            )));
        }
        Ok(Self {
            size,
            half: 0.5 * size,
        })
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn half(&self) -> f64 {
        self.half
    }

    pub fn volume(&self) -> f64 {
        self.size * self.size * self.size
    }

    /// Fold a single coordinate into the primary cell.
    ///
    /// `%` on `f64` truncates toward zero like C `fmod`, so the two branches
    /// land in `[-L/2, L/2)` for positive input and `(-L/2, L/2]` otherwise.
    #[inline]
    pub fn fold_coordinate(&self, c: f64) -> f64 {
        if c > 0.0 {
            (c + self.half) % self.size - self.half
        } else {
            (c - self.half) % self.size + self.half
        }
    }

    #[inline]
    pub fn fold(&self, position: &Vector3<f64>) -> Vector3<f64> {
        position.map(|c| self.fold_coordinate(c))
    }

    /// Fill the nearest-image cache for one evaluation.
    pub fn fold_into(&self, positions: &[Vector3<f64>], folded: &mut [Vector3<f64>]) -> Result<()> {
        ensure_len(positions.len(), folded.len())?;
        for (dst, src) in folded.iter_mut().zip(positions) {
            *dst = self.fold(src);
        }
        Ok(())
    }

    /// Pairwise correction of one displacement component of two folded positions.
    #[inline]
    pub fn correct(&self, d: f64) -> f64 {
        if d > self.half {
            d - self.size
        } else if d < -self.half {
            d + self.size
        } else {
            d
        }
    }

    #[inline]
    pub fn minimum_image(&self, d: Vector3<f64>) -> Vector3<f64> {
        d.map(|c| self.correct(c))
    }

    /// Minimum-image displacement `to - from` between two folded positions.
    #[inline]
    pub fn displacement(&self, from: &Vector3<f64>, to: &Vector3<f64>) -> Vector3<f64> {
        self.minimum_image(to - from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use itertools::iproduct;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn brute_force_image(pbox: &PeriodicBox, a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
        let l = pbox.size();
        iproduct!(-1..=1, -1..=1, -1..=1)
            .map(|(i, j, k)| {
                let shift = Vector3::new(i as f64, j as f64, k as f64) * l;
                (b + shift - a).norm()
            })
            .fold(f64::INFINITY, f64::min)
    }

    #[test]
    fn test_rejects_non_positive_box() {
        assert!(PeriodicBox::new(0.0).is_err());
        assert!(PeriodicBox::new(-3.0).is_err());
        assert!(PeriodicBox::new(f64::NAN).is_err());
    }

    #[test]
    fn test_fold_coordinate() {
        let pbox = PeriodicBox::new(4.0).unwrap();
        assert_relative_eq!(pbox.fold_coordinate(0.5), 0.5);
        assert_relative_eq!(pbox.fold_coordinate(-0.5), -0.5);
        assert_relative_eq!(pbox.fold_coordinate(3.0), -1.0);
        assert_relative_eq!(pbox.fold_coordinate(-3.0), 1.0);
        assert_relative_eq!(pbox.fold_coordinate(9.5), 1.5);
        assert_relative_eq!(pbox.fold_coordinate(-9.5), -1.5);
        assert_relative_eq!(pbox.fold_coordinate(0.0), 0.0);
    }

    #[test]
    fn test_folded_positions_stay_in_primary_cell() {
        let pbox = PeriodicBox::new(5.0).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let p = Vector3::new(
                rng.gen_range(-20.0..20.0),
                rng.gen_range(-20.0..20.0),
                rng.gen_range(-20.0..20.0),
            );
            let f = pbox.fold(&p);
            for k in 0..3 {
                assert!(f[k] >= -pbox.half() && f[k] <= pbox.half());
                // folding only ever shifts by whole box lengths
                let shift = (p[k] - f[k]) / pbox.size();
                assert_relative_eq!(shift, shift.round(), epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_correct_wraps_once() {
        let pbox = PeriodicBox::new(4.0).unwrap();
        assert_relative_eq!(pbox.correct(3.0), -1.0);
        assert_relative_eq!(pbox.correct(-3.0), 1.0);
        assert_relative_eq!(pbox.correct(1.5), 1.5);
        assert_relative_eq!(pbox.correct(2.0), 2.0);
    }

    #[test]
    fn test_minimum_image_matches_27_images() {
        let pbox = PeriodicBox::new(3.7).unwrap();
        let bound = pbox.size() * 3.0_f64.sqrt() / 2.0;
        let mut rng = StdRng::seed_from_u64(2024);
        for _ in 0..2000 {
            let a = Vector3::new(
                rng.gen_range(-11.0..11.0),
                rng.gen_range(-11.0..11.0),
                rng.gen_range(-11.0..11.0),
            );
            let b = Vector3::new(
                rng.gen_range(-11.0..11.0),
                rng.gen_range(-11.0..11.0),
                rng.gen_range(-11.0..11.0),
            );
            let (fa, fb) = (pbox.fold(&a), pbox.fold(&b));
            let d = pbox.displacement(&fa, &fb).norm();
            assert!(d <= bound + 1e-12);
            assert_relative_eq!(d, brute_force_image(&pbox, &fa, &fb), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_fold_into_checks_length() {
        let pbox = PeriodicBox::new(4.0).unwrap();
        let positions = vec![Vector3::new(3.0, -3.0, 0.5); 2];
        let mut folded = vec![Vector3::zeros(); 3];
        assert!(pbox.fold_into(&positions, &mut folded).is_err());

        let mut folded = vec![Vector3::zeros(); 2];
        pbox.fold_into(&positions, &mut folded).unwrap();
        assert_relative_eq!(folded[1], Vector3::new(-1.0, 1.0, 0.5));
    }
}
