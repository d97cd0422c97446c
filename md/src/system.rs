use crate::error::{ensure_len, Result};
use nalgebra::Vector3;

/// Particles of one run. Index order is fixed at creation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleSet {
    pub positions: Vec<Vector3<f64>>,
    pub velocities: Vec<Vector3<f64>>,
    charges: Option<Vec<i32>>,
}

impl ParticleSet {
    /// Particles at rest.
    pub fn at_rest(positions: Vec<Vector3<f64>>) -> Self {
        let velocities = vec![Vector3::zeros(); positions.len()];
        ParticleSet {
            positions,
            velocities,
            charges: None,
        }
    }

    pub fn with_charges(mut self, charges: Vec<i32>) -> Result<Self> {
        ensure_len(self.positions.len(), charges.len())?;
        self.charges = Some(charges);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn charges(&self) -> Option<&[i32]> {
        self.charges.as_deref()
    }

    /// Kinetic energy with unit masses.
    #[inline]
    pub fn kinetic_energy(&self) -> f64 {
        self.velocities.iter().map(|v| 0.5 * v.dot(v)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_at_rest() {
        let set = ParticleSet::at_rest(vec![Vector3::zeros(); 3]);
        assert_eq!(set.len(), 3);
        assert_eq!(set.velocities.len(), 3);
        assert_eq!(set.kinetic_energy(), 0.0);
        assert!(set.charges().is_none());
    }

    #[test]
    fn test_charges_length_checked() {
        let set = ParticleSet::at_rest(vec![Vector3::zeros(); 3]);
        assert!(set.clone().with_charges(vec![1, -1]).is_err());
        let set = set.with_charges(vec![1, -1, 1]).unwrap();
        assert_eq!(set.charges(), Some(&[1, -1, 1][..]));
    }

    #[test]
    fn test_kinetic_energy() {
        let mut set = ParticleSet::at_rest(vec![Vector3::zeros(); 2]);
        set.velocities[0] = Vector3::new(1.0, 0.0, 0.0);
        set.velocities[1] = Vector3::new(0.0, 2.0, 2.0);
        assert_relative_eq!(set.kinetic_energy(), 0.5 + 4.0);
    }
}
