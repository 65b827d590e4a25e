use std::path::{Path, PathBuf};

mod find;
mod list;
mod terminal;

use clap::ArgAction;
use find::Find;
use list::List;
use pipenet::{AuditLog, Config, PipeBatchUpdate, Registry, RepairUpdate};
use terminal::Colorize;
use tracing::instrument;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Path of the configuration file
    #[arg(long, default_value = "pipenet.toml", global = true)]
    config: PathBuf,

    /// Path of the flat-file store (overrides the configuration)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Path of the action log (overrides the configuration)
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        let config = load_config(&self.config);
        let context = Context {
            store: self
                .store
                .unwrap_or_else(|| PathBuf::from(&config.data_file)),
            log: self.log.unwrap_or_else(|| PathBuf::from(&config.log_file)),
        };

        self.command
            .unwrap_or_else(|| Command::List(List::default()))
            .run(&context)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

/// Resolved paths shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    /// The flat-file store commands load from and save back to.
    store: PathBuf,
    /// The append-only action log.
    log: PathBuf,
}

impl Context {
    /// Build a registry over the resolved paths, loading the store if it
    /// already exists.
    fn open_registry(&self) -> anyhow::Result<Registry> {
        let mut registry = Registry::new(AuditLog::new(&self.log));
        if self.store.exists() && !registry.load_from_file(&self.store) {
            anyhow::bail!("failed to load store from {}", self.store.display());
        }
        Ok(registry)
    }

    fn persist(&self, registry: &Registry) -> anyhow::Result<()> {
        if registry.save_to_file(&self.store) {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "failed to save store to {}",
                self.store.display()
            ))
        }
    }
}

fn load_config(path: &Path) -> Config {
    if !path.exists() {
        return Config::default();
    }
    Config::load(path).unwrap_or_else(|e| {
        tracing::debug!("Failed to load config: {e}");
        Config::default()
    })
}

/// Ask for confirmation on stdin, defaulting to "no".
fn confirm() -> anyhow::Result<bool> {
    use std::io::{self, BufRead};

    eprint!("\nProceed? (y/N) ");
    let stdin = io::stdin();
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    Ok(line.trim().eq_ignore_ascii_case("y"))
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// List records (default)
    List(List),

    /// Add a pipeline segment
    AddPipe(AddPipe),

    /// Add a compressor station
    AddStation(AddStation),

    /// Edit a single pipe field by field
    EditPipe(EditPipe),

    /// Edit a single station field by field
    EditStation(EditStation),

    /// Remove a pipe
    RemovePipe(RemovePipe),

    /// Remove a station
    RemoveStation(RemoveStation),

    /// Search pipes or stations
    Find(Find),

    /// Edit a batch of pipes in one pass
    ///
    /// Fields left out (or given their sentinel value) are not changed;
    /// missing ids are reported in the action log and skipped.
    BatchEdit(BatchEdit),

    /// Write a snapshot of the store to an explicit path
    Export(Export),

    /// Replace the store with the contents of another file
    Import(Import),

    /// Seed the store with demonstration data
    Demo,
}

impl Command {
    fn run(self, context: &Context) -> anyhow::Result<()> {
        match self {
            Self::List(command) => command.run(context),
            Self::AddPipe(command) => command.run(context),
            Self::AddStation(command) => command.run(context),
            Self::EditPipe(command) => command.run(context),
            Self::EditStation(command) => command.run(context),
            Self::RemovePipe(command) => command.run(context),
            Self::RemoveStation(command) => command.run(context),
            Self::Find(command) => command.run(context),
            Self::BatchEdit(command) => command.run(context),
            Self::Export(command) => command.run(context),
            Self::Import(command) => command.run(context),
            Self::Demo => run_demo(context),
        }
    }
}

#[derive(Debug, clap::Parser)]
pub struct AddPipe {
    /// Name of the segment
    name: String,

    /// Diameter (any number is accepted)
    diameter: f64,

    /// Mark the new segment as under repair
    #[arg(long)]
    in_repair: bool,
}

impl AddPipe {
    #[instrument]
    fn run(self, context: &Context) -> anyhow::Result<()> {
        let mut registry = context.open_registry()?;
        let id = registry.add_pipe(&self.name, self.diameter, self.in_repair);
        context.persist(&registry)?;

        println!("Added pipe with ID={id}");
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct AddStation {
    /// Name of the station
    name: String,

    /// Total number of workshops
    total: i32,

    /// Number of working workshops
    working: i32,

    /// Classification label
    classification: String,
}

impl AddStation {
    #[instrument]
    fn run(self, context: &Context) -> anyhow::Result<()> {
        let mut registry = context.open_registry()?;
        let id = registry.add_station(&self.name, self.total, self.working, &self.classification);
        context.persist(&registry)?;

        println!("Added station with ID={id}");
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct EditPipe {
    /// The id of the pipe to edit
    id: u64,

    /// New name
    #[arg(long)]
    name: Option<String>,

    /// New diameter
    #[arg(long)]
    diameter: Option<f64>,

    /// Set or clear the repair flag
    #[arg(long)]
    repair: Option<bool>,
}

impl EditPipe {
    #[instrument]
    fn run(self, context: &Context) -> anyhow::Result<()> {
        let mut registry = context.open_registry()?;
        let Some(pipe) = registry.pipe_mut(self.id) else {
            anyhow::bail!("Pipe {} not found", self.id);
        };

        if let Some(name) = self.name {
            pipe.set_name(name);
        }
        if let Some(diameter) = self.diameter {
            pipe.set_diameter(diameter);
        }
        if let Some(repair) = self.repair {
            pipe.set_in_repair(repair);
        }
        let row = list::pipe_row(pipe);

        registry.record_note(&format!("Edited pipe id={}", self.id));
        context.persist(&registry)?;

        println!("{row}");
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct EditStation {
    /// The id of the station to edit
    id: u64,

    /// New name
    #[arg(long)]
    name: Option<String>,

    /// New total workshop count
    #[arg(long)]
    total: Option<i32>,

    /// New working workshop count
    #[arg(long)]
    working: Option<i32>,

    /// New classification label
    #[arg(long)]
    classification: Option<String>,
}

impl EditStation {
    #[instrument]
    fn run(self, context: &Context) -> anyhow::Result<()> {
        let mut registry = context.open_registry()?;
        let Some(station) = registry.station_mut(self.id) else {
            anyhow::bail!("Station {} not found", self.id);
        };

        if let Some(name) = self.name {
            station.set_name(name);
        }
        if let Some(total) = self.total {
            station.set_total_workshops(total);
        }
        if let Some(working) = self.working {
            station.set_working_workshops(working);
        }
        if let Some(classification) = self.classification {
            station.set_classification(classification);
        }
        let row = list::station_row(station);

        registry.record_note(&format!("Edited station id={}", self.id));
        context.persist(&registry)?;

        println!("{row}");
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct RemovePipe {
    /// The id of the pipe to remove
    id: u64,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    yes: bool,
}

impl RemovePipe {
    #[instrument]
    fn run(self, context: &Context) -> anyhow::Result<()> {
        let mut registry = context.open_registry()?;
        let Some(pipe) = registry.pipe(self.id) else {
            anyhow::bail!("Pipe {} not found", self.id);
        };

        if !self.yes {
            println!("Will remove {}", list::pipe_row(pipe));
            if !confirm()? {
                println!("Cancelled");
                std::process::exit(130);
            }
        }

        registry.remove_pipe(self.id);
        context.persist(&registry)?;

        println!("{}", format!("Removed pipe {}", self.id).success());
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct RemoveStation {
    /// The id of the station to remove
    id: u64,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    yes: bool,
}

impl RemoveStation {
    #[instrument]
    fn run(self, context: &Context) -> anyhow::Result<()> {
        let mut registry = context.open_registry()?;
        let Some(station) = registry.station(self.id) else {
            anyhow::bail!("Station {} not found", self.id);
        };

        if !self.yes {
            println!("Will remove {}", list::station_row(station));
            if !confirm()? {
                println!("Cancelled");
                std::process::exit(130);
            }
        }

        registry.remove_station(self.id);
        context.persist(&registry)?;

        println!("{}", format!("Removed station {}", self.id).success());
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct BatchEdit {
    /// Ids of the pipes to edit
    #[arg(
        value_delimiter = ',',
        required_unless_present = "match_name",
        conflicts_with = "match_name"
    )]
    ids: Vec<u64>,

    /// Select pipes by name substring instead of explicit ids
    #[arg(long)]
    match_name: Option<String>,

    /// New name for the selected pipes (empty means no change)
    #[arg(long)]
    name: Option<String>,

    /// New diameter for the selected pipes (non-positive means no change)
    #[arg(long)]
    diameter: Option<f64>,

    /// Set or clear the repair flag on the selected pipes
    #[arg(long, value_enum)]
    repair: Option<RepairFlag>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum RepairFlag {
    /// Mark as under repair
    Set,
    /// Mark as not under repair
    Clear,
}

impl From<RepairFlag> for RepairUpdate {
    fn from(flag: RepairFlag) -> Self {
        match flag {
            RepairFlag::Set => Self::Set,
            RepairFlag::Clear => Self::Clear,
        }
    }
}

impl BatchEdit {
    #[instrument]
    fn run(self, context: &Context) -> anyhow::Result<()> {
        let mut registry = context.open_registry()?;

        let ids: Vec<u64> = match &self.match_name {
            Some(substring) => registry
                .pipes_by_name(substring)
                .iter()
                .map(|pipe| pipe.id())
                .collect(),
            None => self.ids.clone(),
        };
        if ids.is_empty() {
            println!("{}", "Nothing to edit.".warning());
            return Ok(());
        }

        let mut update = PipeBatchUpdate::new();
        if let Some(name) = &self.name {
            update = update.with_name(name);
        }
        if let Some(diameter) = self.diameter {
            update = update.with_diameter(diameter);
        }
        if let Some(repair) = self.repair {
            update = update.with_repair(repair.into());
        }

        let edited = registry.batch_edit_pipes(&ids, &update);
        context.persist(&registry)?;

        println!("Edited {edited} of {} selected pipes", ids.len());
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Export {
    /// Where to write the snapshot
    path: PathBuf,
}

impl Export {
    #[instrument]
    fn run(self, context: &Context) -> anyhow::Result<()> {
        let registry = context.open_registry()?;
        if !registry.save_to_file(&self.path) {
            anyhow::bail!("failed to save to {}", self.path.display());
        }

        println!(
            "Saved {} pipes and {} stations to {}",
            registry.pipes().len(),
            registry.stations().len(),
            self.path.display()
        );
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Import {
    /// The snapshot to load
    path: PathBuf,
}

impl Import {
    #[instrument]
    fn run(self, context: &Context) -> anyhow::Result<()> {
        let mut registry = Registry::new(AuditLog::new(&context.log));
        if !registry.load_from_file(&self.path) {
            anyhow::bail!("failed to load from {}", self.path.display());
        }
        context.persist(&registry)?;

        println!(
            "{}",
            format!(
                "Loaded {} pipes and {} stations from {}",
                registry.pipes().len(),
                registry.stations().len(),
                self.path.display()
            )
            .success()
        );
        Ok(())
    }
}

#[instrument]
fn run_demo(context: &Context) -> anyhow::Result<()> {
    let mut registry = context.open_registry()?;

    registry.add_pipe("MainLine-1", 500.0, false);
    registry.add_pipe("Feeder-A", 250.0, true);
    registry.add_pipe("Bypass-02", 300.0, false);
    registry.add_station("CS-North", 10, 8, "A");
    registry.add_station("CS-South", 6, 2, "B");
    registry.add_station("CS-East", 12, 12, "A+");

    context.persist(&registry)?;
    println!("Demo data added.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn test_context(tmp: &tempfile::TempDir) -> Context {
        Context {
            store: tmp.path().join("inventory.db"),
            log: tmp.path().join("actions.log"),
        }
    }

    #[test]
    fn add_pipe_run_persists_to_the_store() {
        let tmp = tempdir().unwrap();
        let context = test_context(&tmp);

        AddPipe {
            name: "MainLine-1".to_string(),
            diameter: 500.0,
            in_repair: false,
        }
        .run(&context)
        .expect("add-pipe should succeed");

        let registry = context.open_registry().unwrap();
        assert_eq!(registry.pipes().len(), 1);
        assert_eq!(registry.pipes()[0].id(), 1);
        assert_eq!(registry.next_id(), 2);
    }

    #[test]
    fn demo_seeds_sample_data() {
        let tmp = tempdir().unwrap();
        let context = test_context(&tmp);

        run_demo(&context).expect("demo should succeed");

        let registry = context.open_registry().unwrap();
        assert_eq!(registry.pipes().len(), 3);
        assert_eq!(registry.stations().len(), 3);
        assert_eq!(registry.next_id(), 7);
    }

    #[test]
    fn edit_pipe_applies_only_the_given_fields() {
        let tmp = tempdir().unwrap();
        let context = test_context(&tmp);
        run_demo(&context).unwrap();

        EditPipe {
            id: 1,
            name: None,
            diameter: Some(650.0),
            repair: None,
        }
        .run(&context)
        .expect("edit-pipe should succeed");

        let registry = context.open_registry().unwrap();
        let pipe = registry.pipe(1).unwrap();
        assert_eq!(pipe.name(), "MainLine-1");
        assert!((pipe.diameter() - 650.0).abs() < f64::EPSILON);
        assert!(!pipe.in_repair());
    }

    #[test]
    fn edit_pipe_rejects_an_unknown_id() {
        let tmp = tempdir().unwrap();
        let context = test_context(&tmp);

        let error = EditPipe {
            id: 9,
            name: None,
            diameter: None,
            repair: None,
        }
        .run(&context)
        .unwrap_err();

        assert!(error.to_string().contains("not found"));
    }

    #[test]
    fn remove_pipe_with_yes_skips_the_prompt() {
        let tmp = tempdir().unwrap();
        let context = test_context(&tmp);
        run_demo(&context).unwrap();

        RemovePipe { id: 2, yes: true }
            .run(&context)
            .expect("remove-pipe should succeed");

        let registry = context.open_registry().unwrap();
        assert!(registry.pipe(2).is_none());
        assert_eq!(registry.pipes().len(), 2);
    }

    #[test]
    fn batch_edit_can_select_by_name_substring() {
        let tmp = tempdir().unwrap();
        let context = test_context(&tmp);
        run_demo(&context).unwrap();

        BatchEdit {
            ids: Vec::new(),
            match_name: Some("Line".to_string()),
            name: Some("Renamed".to_string()),
            diameter: None,
            repair: Some(RepairFlag::Set),
        }
        .run(&context)
        .expect("batch-edit should succeed");

        let registry = context.open_registry().unwrap();
        assert_eq!(registry.pipe(1).unwrap().name(), "Renamed");
        assert!(registry.pipe(1).unwrap().in_repair());
        assert_eq!(registry.pipe(2).unwrap().name(), "Feeder-A");
    }

    #[test]
    fn export_then_import_round_trips() {
        let tmp = tempdir().unwrap();
        let context = test_context(&tmp);
        run_demo(&context).unwrap();

        let snapshot = tmp.path().join("snapshot.db");
        Export {
            path: snapshot.clone(),
        }
        .run(&context)
        .expect("export should succeed");

        let other = Context {
            store: tmp.path().join("other.db"),
            log: tmp.path().join("other.log"),
        };
        Import { path: snapshot }
            .run(&other)
            .expect("import should succeed");

        let registry = other.open_registry().unwrap();
        assert_eq!(registry.pipes().len(), 3);
        assert_eq!(registry.stations().len(), 3);
    }
}
