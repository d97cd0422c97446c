//! All-pairs force/energy reduction.
//!
//! Every ordered pair `(i, j)`, `i != j`, is visited, so each unordered pair
//! contributes twice to the summed per-particle energies. The total energy is
//! halved exactly once, after the full sum.

use crate::backend::{BackendStats, ComputeBackend};
use crate::error::{ensure_len, Result};
use crate::periodic::PeriodicBox;
use crate::potential::PairPotential;
use nalgebra::Vector3;
use rayon::prelude::*;

/// Per-call force and energy slots, one per particle.
#[derive(Debug, Clone, Default)]
pub struct InteractionBuffers {
    pub forces: Vec<Vector3<f64>>,
    pub energies: Vec<f64>,
}

impl InteractionBuffers {
    pub fn new(n_particles: usize) -> Self {
        Self {
            forces: vec![Vector3::zeros(); n_particles],
            energies: vec![0.0; n_particles],
        }
    }

    pub fn len(&self) -> usize {
        self.energies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energies.is_empty()
    }

    pub fn zero(&mut self) {
        self.forces.iter_mut().for_each(|f| *f = Vector3::zeros());
        self.energies.iter_mut().for_each(|e| *e = 0.0);
    }

    /// Sum of per-particle energies with the double-count correction applied.
    pub fn total_energy(&self) -> f64 {
        self.energies.iter().sum::<f64>() / 2.0
    }
}

/// Overwrite `buffers` with the forces and ordered-pair energy sums of every
/// particle. The outer loop runs in parallel; each task writes only its own slot.
pub fn reduce_pairs<P: PairPotential>(
    pbox: &PeriodicBox,
    potential: &P,
    folded: &[Vector3<f64>],
    charges: Option<&[i32]>,
    buffers: &mut InteractionBuffers,
) {
    let n = folded.len();
    buffers
        .forces
        .par_iter_mut()
        .zip(buffers.energies.par_iter_mut())
        .enumerate()
        .for_each(|(i, (force, energy))| {
            let mut f_i = Vector3::zeros();
            let mut e_i = 0.0;
            let q_i = charges.map_or(0, |q| q[i]);
            for j in 0..n {
                if j == i {
                    continue;
                }
                let d = pbox.displacement(&folded[i], &folded[j]);
                let q_j = charges.map_or(0, |q| q[j]);
                if let Some(term) = potential.pair(d.norm_squared(), q_i, q_j) {
                    f_i -= d * term.force;
                    e_i += term.energy;
                }
            }
            *force = f_i;
            *energy = e_i;
        });
}

/// Drives one backend: folds positions into the nearest-image cache, hands
/// them to the backend and returns the halved total energy.
///
/// The cache and the force/energy buffers are owned here and reused across
/// calls; only one evaluation is ever in flight.
#[derive(Debug)]
pub struct InteractionEngine<B: ComputeBackend> {
    pbox: PeriodicBox,
    backend: B,
    folded: Vec<Vector3<f64>>,
    buffers: InteractionBuffers,
}

impl<B: ComputeBackend> InteractionEngine<B> {
    pub fn new(pbox: PeriodicBox, backend: B, n_particles: usize) -> Self {
        Self {
            pbox,
            backend,
            folded: vec![Vector3::zeros(); n_particles],
            buffers: InteractionBuffers::new(n_particles),
        }
    }

    /// Evaluate forces and energies for `positions`, returning the total energy.
    pub fn evaluate(&mut self, positions: &[Vector3<f64>], charges: Option<&[i32]>) -> Result<f64> {
        ensure_len(self.folded.len(), positions.len())?;
        if let Some(q) = charges {
            ensure_len(positions.len(), q.len())?;
        }
        self.pbox.fold_into(positions, &mut self.folded)?;
        self.buffers.zero();
        self.backend.compute(&self.folded, charges, &mut self.buffers)?;
        Ok(self.buffers.total_energy())
    }

    pub fn n_particles(&self) -> usize {
        self.folded.len()
    }

    pub fn periodic_box(&self) -> &PeriodicBox {
        &self.pbox
    }

    pub fn forces(&self) -> &[Vector3<f64>] {
        &self.buffers.forces
    }

    pub fn energies(&self) -> &[f64] {
        &self.buffers.energies
    }

    pub fn folded(&self) -> &[Vector3<f64>] {
        &self.folded
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn stats(&self) -> BackendStats {
        self.backend.stats()
    }
}
