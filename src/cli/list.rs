use pipenet::{Pipe, Registry, Station};
use tracing::instrument;

use super::{Context, terminal, terminal::Colorize};

/// List records from the store.
#[derive(Debug, Default, clap::Parser)]
pub struct List {
    /// Which collection to list
    #[arg(value_enum, default_value = "all")]
    what: What,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: Format,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum What {
    /// Pipes and stations
    #[default]
    All,
    /// Pipes only
    Pipes,
    /// Stations only
    Stations,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum Format {
    /// Human-readable rows
    #[default]
    Table,
    /// A JSON document
    Json,
}

impl List {
    #[instrument]
    pub fn run(self, context: &Context) -> anyhow::Result<()> {
        let registry = context.open_registry()?;
        match self.format {
            Format::Json => self.output_json(&registry)?,
            Format::Table => self.output_table(&registry),
        }
        Ok(())
    }

    fn output_table(&self, registry: &Registry) {
        if matches!(self.what, What::All | What::Pipes) {
            println!("Total pipes: {}", registry.pipes().len());
            for pipe in registry.pipes() {
                println!("{}", pipe_row(pipe));
            }
        }
        if matches!(self.what, What::All | What::Stations) {
            if self.what == What::All {
                println!();
            }
            println!("Total stations: {}", registry.stations().len());
            for station in registry.stations() {
                println!("{}", station_row(station));
            }
        }
        if self.what == What::All && registry.pipes().is_empty() && registry.stations().is_empty()
        {
            println!("{}", "Store is empty. Run 'pnet demo' for sample data.".dim());
        }
    }

    fn output_json(&self, registry: &Registry) -> anyhow::Result<()> {
        use serde_json::json;

        let pipes: Vec<_> = registry.pipes().iter().map(pipe_json).collect();
        let stations: Vec<_> = registry.stations().iter().map(station_json).collect();

        let output = match self.what {
            What::All => json!({ "pipes": pipes, "stations": stations }),
            What::Pipes => json!({ "pipes": pipes }),
            What::Stations => json!({ "stations": stations }),
        };

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}

/// One human-readable row for a pipe, compacted on narrow terminals.
pub fn pipe_row(pipe: &Pipe) -> String {
    if terminal::is_narrow() {
        let repair = if pipe.in_repair() { "R" } else { "-" };
        format!("{} {} {} {repair}", pipe.id(), pipe.name(), pipe.diameter())
    } else {
        let repair = if pipe.in_repair() { "YES" } else { "NO" };
        format!(
            "ID={} | Name=\"{}\" | Diameter={} | InRepair={repair}",
            pipe.id(),
            pipe.name(),
            pipe.diameter()
        )
    }
}

/// One human-readable row for a station, compacted on narrow terminals.
pub fn station_row(station: &Station) -> String {
    if terminal::is_narrow() {
        format!(
            "{} {} {}/{} {:.1}%",
            station.id(),
            station.name(),
            station.working_workshops(),
            station.total_workshops(),
            station.percent_idle()
        )
    } else {
        format!(
            "ID={} | Name=\"{}\" | Total={} | Working={} | Idle%={:.1} | Class=\"{}\"",
            station.id(),
            station.name(),
            station.total_workshops(),
            station.working_workshops(),
            station.percent_idle(),
            station.classification()
        )
    }
}

fn pipe_json(pipe: &Pipe) -> serde_json::Value {
    serde_json::json!({
        "id": pipe.id(),
        "name": pipe.name(),
        "diameter": pipe.diameter(),
        "in_repair": pipe.in_repair(),
    })
}

fn station_json(station: &Station) -> serde_json::Value {
    serde_json::json!({
        "id": station.id(),
        "name": station.name(),
        "total_workshops": station.total_workshops(),
        "working_workshops": station.working_workshops(),
        "classification": station.classification(),
        "percent_idle": station.percent_idle(),
    })
}
