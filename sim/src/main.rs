//! Periodic-box simulation command-line interface
//!
//! Runs molecular dynamics or Metropolis Monte Carlo from a YAML configuration.

use color_eyre::eyre::Result;

mod app;
mod config;
mod io;

use app::SimApplication;

fn main() -> Result<()> {
    color_eyre::install()?;
    SimApplication::from_cli().run()
}
