use tracing::instrument;

use super::{Context, list, terminal::Colorize};

/// Search the store with the registry's linear filters.
#[derive(Debug, clap::Parser)]
pub struct Find {
    #[command(subcommand)]
    target: Target,
}

#[derive(Debug, clap::Parser)]
enum Target {
    /// Search pipes
    Pipes {
        /// Substring the name must contain (case-sensitive)
        #[arg(long, conflicts_with = "in_repair")]
        name: Option<String>,

        /// Match on the repair flag instead
        #[arg(long)]
        in_repair: Option<bool>,
    },

    /// Search stations
    Stations {
        /// Substring the name must contain (case-sensitive)
        #[arg(long, conflicts_with = "min_idle")]
        name: Option<String>,

        /// Keep stations whose idle percentage is at least this (inclusive)
        #[arg(long)]
        min_idle: Option<f64>,
    },
}

impl Find {
    #[instrument]
    pub fn run(self, context: &Context) -> anyhow::Result<()> {
        let registry = context.open_registry()?;

        match self.target {
            Target::Pipes { name, in_repair } => {
                let matches = match (name, in_repair) {
                    (Some(substring), None) => registry.pipes_by_name(&substring),
                    (None, Some(flag)) => registry.pipes_in_repair(flag),
                    _ => anyhow::bail!("choose a filter: --name or --in-repair"),
                };
                if matches.is_empty() {
                    println!("{}", "No pipes matched.".warning());
                    return Ok(());
                }
                println!("Found {} pipes:", matches.len());
                for pipe in matches {
                    println!("{}", list::pipe_row(pipe));
                }
            }
            Target::Stations { name, min_idle } => {
                let matches = match (name, min_idle) {
                    (Some(substring), None) => registry.stations_by_name(&substring),
                    (None, Some(min_percent)) => registry.stations_by_min_idle(min_percent),
                    _ => anyhow::bail!("choose a filter: --name or --min-idle"),
                };
                if matches.is_empty() {
                    println!("{}", "No stations matched.".warning());
                    return Ok(());
                }
                println!("Found {} stations:", matches.len());
                for station in matches {
                    println!("{}", list::station_row(station));
                }
            }
        }

        Ok(())
    }
}
