//! Molecular dynamics driver.

use crate::backend::ComputeBackend;
use crate::error::{Result, SimError};
use crate::reduction::InteractionEngine;
use crate::report::MdReport;
use crate::system::ParticleSet;
use itertools::izip;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub trait Integrator {
    /// Advance the system by dt
    fn step(&mut self, dt: f64) -> Result<()>;

    /// Compute the instantaneous temperature
    fn temperature(&self) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MdParams {
    pub time_step: f64,
    pub total_it: u64,
    /// Log the normalized energy every this many iterations; 0 disables.
    #[serde(default = "default_report_interval")]
    pub report_interval: u64,
}

fn default_report_interval() -> u64 {
    1000
}

impl MdParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.time_step > 0.0 && self.time_step.is_finite()) {
            return Err(SimError::InvalidConfig("time step must be positive".to_string()));
        }
        if self.total_it == 0 {
            return Err(SimError::InvalidConfig("total_it must be positive".to_string()));
        }
        Ok(())
    }
}

/// Symplectic Euler with unit masses: forces are evaluated for the current
/// positions, then `v += f dt` and `r += v dt` for every particle.
#[derive(Debug)]
pub struct SymplecticEuler<B: ComputeBackend> {
    pub particles: ParticleSet,
    engine: InteractionEngine<B>,
    energy: f64,
}

impl<B: ComputeBackend> SymplecticEuler<B> {
    pub fn new(particles: ParticleSet, engine: InteractionEngine<B>) -> Result<Self> {
        if engine.n_particles() != particles.len() {
            return Err(SimError::SizeMismatch {
                expected: engine.n_particles(),
                found: particles.len(),
            });
        }
        Ok(SymplecticEuler {
            particles,
            engine,
            energy: 0.0,
        })
    }

    /// Total potential energy of the configuration the last step started from.
    pub fn energy(&self) -> f64 {
        self.energy
    }

    pub fn engine(&self) -> &InteractionEngine<B> {
        &self.engine
    }

    pub fn into_parts(self) -> (ParticleSet, InteractionEngine<B>) {
        (self.particles, self.engine)
    }

    /// Run `params.total_it` steps and report the last evaluated energy.
    pub fn run(&mut self, params: &MdParams) -> Result<MdReport> {
        params.validate()?;
        let n = self.particles.len() as f64;
        info!(
            "MD: {} particles, dt = {}, {} iterations on backend '{}'",
            self.particles.len(),
            params.time_step,
            params.total_it,
            self.engine.backend().name()
        );

        for it in 0..params.total_it {
            self.step(params.time_step)?;
            if params.report_interval > 0 && it % params.report_interval == 0 {
                info!("iteration {:>8}: E/N = {:.8}", it, self.energy / n);
            }
            debug!(
                "iteration {}: E = {:.10e}, T = {:.6}",
                it,
                self.energy,
                self.temperature()
            );
        }

        Ok(MdReport {
            energy_per_particle: self.energy / n,
            iterations: params.total_it,
            temperature: self.temperature(),
            stats: self.engine.stats(),
        })
    }
}

impl<B: ComputeBackend> Integrator for SymplecticEuler<B> {
    fn step(&mut self, dt: f64) -> Result<()> {
        self.energy = self
            .engine
            .evaluate(&self.particles.positions, self.particles.charges())?;

        // velocity first, then position with the new velocity
        for (r, v, f) in izip!(
            &mut self.particles.positions,
            &mut self.particles.velocities,
            self.engine.forces()
        ) {
            *v += f * dt;
            *r += *v * dt;
        }
        Ok(())
    }

    fn temperature(&self) -> f64 {
        let dof = 3 * self.particles.len();
        if dof == 0 {
            return 0.0;
        }
        2.0 * self.particles.kinetic_energy() / dof as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;
    use crate::periodic::PeriodicBox;
    use crate::potential::{LennardJones, Potential};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn integrator(positions: Vec<Vector3<f64>>, box_size: f64) -> SymplecticEuler<CpuBackend<Potential>> {
        let pbox = PeriodicBox::new(box_size).unwrap();
        let n = positions.len();
        let engine = InteractionEngine::new(pbox, CpuBackend::new(pbox, LennardJones::new(2.5).into()), n);
        SymplecticEuler::new(ParticleSet::at_rest(positions), engine).unwrap()
    }

    #[test]
    fn test_repulsive_pair_separates() {
        let mut md = integrator(
            vec![Vector3::new(-0.45, 0.0, 0.0), Vector3::new(0.45, 0.0, 0.0)],
            8.0,
        );
        let mut last = 0.9;
        for _ in 0..20 {
            md.step(1e-4).unwrap();
            let sep = (md.particles.positions[1] - md.particles.positions[0]).norm();
            assert!(sep > last);
            last = sep;
        }
        // momentum stays zero
        let p: Vector3<f64> = md.particles.velocities.iter().sum();
        assert!(p.norm() < 1e-12);
    }

    #[test]
    fn test_velocity_updated_before_position() {
        let mut md = integrator(
            vec![Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0)],
            8.0,
        );
        let dt = 0.01;
        md.step(dt).unwrap();
        let f0 = md.engine().forces()[0];
        assert_relative_eq!(md.particles.velocities[0], f0 * dt, epsilon = 1e-14);
        assert_relative_eq!(md.particles.positions[0], f0 * dt * dt, epsilon = 1e-14);
    }

    #[test]
    fn test_run_reports_last_energy() {
        let positions = crate::lattice::cubic_lattice(27, 6.0, 1.2, 1.0).unwrap();
        let mut md = integrator(positions, 6.0);
        let params = MdParams {
            time_step: 1e-3,
            total_it: 10,
            report_interval: 5,
        };
        let report = md.run(&params).unwrap();
        assert_eq!(report.iterations, 10);
        assert_eq!(report.stats.calls, 10);
        assert_relative_eq!(report.energy_per_particle, md.energy() / 27.0);
        assert!(report.temperature > 0.0);
    }

    #[test]
    fn test_rejects_bad_params() {
        let mut md = integrator(vec![Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0)], 8.0);
        let bad = MdParams {
            time_step: 0.0,
            total_it: 10,
            report_interval: 0,
        };
        assert!(md.run(&bad).is_err());
    }
}
