use pbc_md::{ReportSink, RunOutcome, RunSummary};
use tracing::info;

/// Writes the final results to the log.
#[derive(Debug, Default)]
pub struct TracingReport;

impl ReportSink for TracingReport {
    fn report(&mut self, summary: &RunSummary) -> pbc_md::Result<()> {
        info!("\nSimulation finished.");
        info!(
            "  {} particles, {} potential, backend '{}'",
            summary.n_particles, summary.potential, summary.backend
        );
        match &summary.outcome {
            RunOutcome::Md(md) => {
                info!("  Iterations:        {}", md.iterations);
                info!("  Final energy / N:  {:.10}", md.energy_per_particle);
                info!("  Temperature:       {:.6}", md.temperature);
            }
            RunOutcome::Mc(mc) => {
                info!(
                    "  Accepted moves:    {} / {} ({:.2}%)",
                    mc.accepted,
                    mc.trials,
                    100.0 * mc.acceptance_ratio
                );
                info!("  Final energy / N:  {:.10}", mc.energy_per_particle);
            }
        }

        let stats = summary.outcome.stats();
        info!("  Elapsed time:      {:.6} s", summary.elapsed.as_secs_f64());
        info!(
            "  Kernel time:       {:.6} s over {} calls ({:.3e} s per call)",
            stats.kernel_time.as_secs_f64(),
            stats.calls,
            stats.per_call().as_secs_f64()
        );
        Ok(())
    }
}
