//! Scalar results handed from the drivers to the reporting layer.

use crate::backend::BackendStats;
use crate::error::Result;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MdReport {
    /// Energy of the last evaluated configuration divided by N.
    pub energy_per_particle: f64,
    pub iterations: u64,
    pub temperature: f64,
    pub stats: BackendStats,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct McReport {
    /// Last accepted energy divided by N.
    pub energy_per_particle: f64,
    pub acceptance_ratio: f64,
    pub accepted: u64,
    pub trials: u64,
    pub stats: BackendStats,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunOutcome {
    Md(MdReport),
    Mc(McReport),
}

impl RunOutcome {
    pub fn energy_per_particle(&self) -> f64 {
        match self {
            RunOutcome::Md(r) => r.energy_per_particle,
            RunOutcome::Mc(r) => r.energy_per_particle,
        }
    }

    pub fn stats(&self) -> BackendStats {
        match self {
            RunOutcome::Md(r) => r.stats,
            RunOutcome::Mc(r) => r.stats,
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            RunOutcome::Md(_) => "md",
            RunOutcome::Mc(_) => "mc",
        }
    }
}

/// Everything a sink receives once a run has finished.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub potential: &'static str,
    pub backend: String,
    pub n_particles: usize,
    pub elapsed: Duration,
    pub outcome: RunOutcome,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.outcome.stats();
        write!(
            f,
            "{} {} {} N={} E/N={:.8}",
            self.outcome.method(),
            self.potential,
            self.backend,
            self.n_particles,
            self.outcome.energy_per_particle()
        )?;
        if let RunOutcome::Mc(mc) = &self.outcome {
            write!(f, " acceptance={:.6}", mc.acceptance_ratio)?;
        }
        write!(
            f,
            " elapsed={:.6}s kernel={:.6}s per_call={:.3e}s",
            self.elapsed.as_secs_f64(),
            stats.kernel_time.as_secs_f64(),
            stats.per_call().as_secs_f64()
        )
    }
}

/// Destination of finished runs.
pub trait ReportSink {
    fn report(&mut self, summary: &RunSummary) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_line() {
        let summary = RunSummary {
            potential: "lennard-jones",
            backend: "cpu".to_string(),
            n_particles: 8,
            elapsed: Duration::from_millis(1500),
            outcome: RunOutcome::Mc(McReport {
                energy_per_particle: -1.25,
                acceptance_ratio: 0.5,
                accepted: 10,
                trials: 20,
                stats: BackendStats::default(),
            }),
        };
        let line = summary.to_string();
        assert!(line.starts_with("mc lennard-jones cpu N=8 E/N=-1.25000000 acceptance=0.500000"));
        assert!(line.contains("elapsed=1.500000s"));
    }
}
