mod report;
mod runner;

use report::TracingReport;
use runner::{compare_backends, run_simulation, BACKEND_TOLERANCE};

use crate::config::{load_config, Args};
use crate::io::{setup_output, ResultsFile};
use clap::Parser;
use color_eyre::eyre::{bail, Result, WrapErr};
use pbc_md::ReportSink;
use tracing::info;

pub struct SimApplication {
    args: Args,
}

impl SimApplication {
    pub fn from_cli() -> Self {
        Self { args: Args::parse() }
    }

    pub fn run(self) -> Result<()> {
        // before load_config: validation warns through tracing
        setup_output(self.args.output.as_ref());
        self.execute()
    }

    fn execute(&self) -> Result<()> {
        let config = load_config(&self.args)?;
        info!("Configuration loaded from {}:\n{:?}", self.args.config_file, config);

        if self.args.check_backends {
            let cmp = compare_backends(&config)?;
            info!(
                "Backend check: cpu E = {:.10}, device E = {:.10}, relative difference {:.3e}",
                cmp.cpu_energy, cmp.device_energy, cmp.relative_difference
            );
            if !cmp.within_tolerance() {
                bail!(
                    "backends disagree: relative difference {:.3e} exceeds {:.0e}",
                    cmp.relative_difference,
                    BACKEND_TOLERANCE
                );
            }
        }

        let summary = run_simulation(&config)?;

        TracingReport.report(&summary)?;
        if let Some(path) = &self.args.results {
            ResultsFile::new(path)
                .report(&summary)
                .wrap_err_with(|| format!("Unable to append results to {}", path))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::log_layer;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::{layer::SubscriberExt, Registry};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    // box of edge 4 with the default LJ cutoff of 2.5
    const SMALL_BOX: &str = "\
system:
  n_particles: 8
  box_size: 4.0
  lattice_spacing: 1.0
  edge_margin: 2.0
potential:
  type: lennard_jones
  cutoff: 2.5
method:
  type: md
  time_step: 0.001
  total_it: 2
  report_interval: 0
";

    #[test]
    fn test_config_warnings_reach_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let config_file = dir.path().join("small_box.yaml");
        std::fs::write(&config_file, SMALL_BOX).unwrap();
        let results = dir.path().join("results.txt");

        let app = SimApplication {
            args: Args {
                config_file: config_file.display().to_string(),
                results: Some(results.display().to_string()),
                seed: Some(3),
                ..Args::default()
            },
        };

        let buffer = SharedBuffer::default();
        let captured = buffer.clone();
        let subscriber = Registry::default().with(log_layer(move || captured.clone(), false));
        tracing::subscriber::with_default(subscriber, || app.execute()).unwrap();

        let log = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(log.contains("WARN"), "{log}");
        assert!(log.contains("smaller than twice the cutoff"), "{log}");
        assert!(log.contains("--seed is ignored"), "{log}");
        assert!(log.contains("Simulation finished"), "{log}");

        let lines = std::fs::read_to_string(&results).unwrap();
        assert_eq!(lines.lines().count(), 1);
    }
}
