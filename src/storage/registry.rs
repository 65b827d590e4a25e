//! The owning registry of pipes and stations.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::{
    Pipe, Station,
    storage::{audit::AuditLog, flatfile},
};

/// Sole owner of the record collections and the shared id counter.
///
/// Both collections keep insertion order, which is the only ordering
/// guarantee the registry makes; removal takes out exactly the matching
/// record without reordering the survivors. Pipe and station identifiers are
/// drawn from one shared monotonically increasing sequence and never
/// collide. Every structural mutation and every search is recorded in the
/// audit trail; exact-key lookups and the bulk accessors are not.
#[derive(Debug)]
pub struct Registry {
    pipes: Vec<Pipe>,
    stations: Vec<Station>,
    next_id: u64,
    audit: AuditLog,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(AuditLog::default())
    }
}

impl Registry {
    /// Create an empty registry writing its trail to `audit`.
    #[must_use]
    pub const fn new(audit: AuditLog) -> Self {
        Self {
            pipes: Vec::new(),
            stations: Vec::new(),
            next_id: 1,
            audit,
        }
    }

    /// Redirect the audit sink; the change itself is recorded in the new
    /// log, so a trail never ends silently.
    pub fn set_audit_path(&mut self, path: impl Into<PathBuf>) {
        self.audit = AuditLog::new(path);
        self.audit.record(&format!(
            "Log file changed to: {}",
            self.audit.path().display()
        ));
    }

    /// The audit sink currently in use.
    #[must_use]
    pub const fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Record a caller-supplied note in the audit trail.
    ///
    /// This lets the command layer document edits it performs through
    /// [`pipe_mut`](Self::pipe_mut) / [`station_mut`](Self::station_mut),
    /// which are themselves silent.
    pub fn record_note(&self, message: &str) {
        self.audit.record(message);
    }

    /// The identifier the next add operation will assign.
    ///
    /// Strictly greater than every id currently held by any record.
    #[must_use]
    pub const fn next_id(&self) -> u64 {
        self.next_id
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Add a pipe and return its freshly allocated identifier.
    pub fn add_pipe(&mut self, name: &str, diameter: f64, in_repair: bool) -> u64 {
        let id = self.allocate_id();
        self.audit.record(&format!(
            "Added pipe id={id} name=\"{name}\" diameter={diameter} in_repair={}",
            u8::from(in_repair)
        ));
        self.pipes.push(Pipe::new(id, name, diameter, in_repair));
        id
    }

    /// Remove the pipe with the given id.
    ///
    /// Returns `false`, without touching the audit trail, if no pipe
    /// matches.
    pub fn remove_pipe(&mut self, id: u64) -> bool {
        let Some(index) = self.pipes.iter().position(|pipe| pipe.id() == id) else {
            return false;
        };
        self.audit.record(&format!(
            "Removed pipe id={id} name=\"{}\"",
            self.pipes[index].name()
        ));
        self.pipes.remove(index);
        true
    }

    /// Look up a pipe by exact id.
    #[must_use]
    pub fn pipe(&self, id: u64) -> Option<&Pipe> {
        self.pipes.iter().find(|pipe| pipe.id() == id)
    }

    /// Look up a pipe by exact id for in-place editing.
    ///
    /// The lookup re-resolves the id on every call rather than handing out a
    /// long-lived handle; callers that edit through it should leave a
    /// [`record_note`](Self::record_note).
    pub fn pipe_mut(&mut self, id: u64) -> Option<&mut Pipe> {
        self.pipes.iter_mut().find(|pipe| pipe.id() == id)
    }

    /// All pipes whose name contains `substring`, in insertion order.
    ///
    /// Matching is case-sensitive; the empty substring matches every pipe.
    #[must_use]
    pub fn pipes_by_name(&self, substring: &str) -> Vec<&Pipe> {
        let matches: Vec<&Pipe> = self
            .pipes
            .iter()
            .filter(|pipe| pipe.name().contains(substring))
            .collect();
        self.audit.record(&format!(
            "Searched pipes by name=\"{substring}\" -> {} found",
            matches.len()
        ));
        matches
    }

    /// All pipes whose repair flag equals `in_repair`, in insertion order.
    #[must_use]
    pub fn pipes_in_repair(&self, in_repair: bool) -> Vec<&Pipe> {
        let matches: Vec<&Pipe> = self
            .pipes
            .iter()
            .filter(|pipe| pipe.in_repair() == in_repair)
            .collect();
        self.audit.record(&format!(
            "Searched pipes by in_repair={} -> {} found",
            u8::from(in_repair),
            matches.len()
        ));
        matches
    }

    /// Read-only view of every pipe in insertion order.
    #[must_use]
    pub fn pipes(&self) -> &[Pipe] {
        &self.pipes
    }

    /// Add a station and return its freshly allocated identifier.
    ///
    /// Station ids come from the same sequence as pipe ids.
    pub fn add_station(
        &mut self,
        name: &str,
        total_workshops: i32,
        working_workshops: i32,
        classification: &str,
    ) -> u64 {
        let id = self.allocate_id();
        self.audit.record(&format!(
            "Added station id={id} name=\"{name}\" total={total_workshops} working={working_workshops}"
        ));
        self.stations.push(Station::new(
            id,
            name,
            total_workshops,
            working_workshops,
            classification,
        ));
        id
    }

    /// Remove the station with the given id.
    ///
    /// Returns `false`, without touching the audit trail, if no station
    /// matches.
    pub fn remove_station(&mut self, id: u64) -> bool {
        let Some(index) = self
            .stations
            .iter()
            .position(|station| station.id() == id)
        else {
            return false;
        };
        self.audit.record(&format!(
            "Removed station id={id} name=\"{}\"",
            self.stations[index].name()
        ));
        self.stations.remove(index);
        true
    }

    /// Look up a station by exact id.
    #[must_use]
    pub fn station(&self, id: u64) -> Option<&Station> {
        self.stations.iter().find(|station| station.id() == id)
    }

    /// Look up a station by exact id for in-place editing.
    ///
    /// Same discipline as [`pipe_mut`](Self::pipe_mut).
    pub fn station_mut(&mut self, id: u64) -> Option<&mut Station> {
        self.stations.iter_mut().find(|station| station.id() == id)
    }

    /// All stations whose name contains `substring`, in insertion order.
    #[must_use]
    pub fn stations_by_name(&self, substring: &str) -> Vec<&Station> {
        let matches: Vec<&Station> = self
            .stations
            .iter()
            .filter(|station| station.name().contains(substring))
            .collect();
        self.audit.record(&format!(
            "Searched stations by name=\"{substring}\" -> {} found",
            matches.len()
        ));
        matches
    }

    /// All stations whose idle percentage is at least `min_percent`
    /// (inclusive), in insertion order.
    #[must_use]
    pub fn stations_by_min_idle(&self, min_percent: f64) -> Vec<&Station> {
        let matches: Vec<&Station> = self
            .stations
            .iter()
            .filter(|station| station.percent_idle() >= min_percent)
            .collect();
        self.audit.record(&format!(
            "Searched stations by min_idle_percent={min_percent} -> {} found",
            matches.len()
        ));
        matches
    }

    /// Read-only view of every station in insertion order.
    #[must_use]
    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// Apply `update` to every pipe named in `ids`, independently.
    ///
    /// The batch request is recorded once up front. An id with no matching
    /// pipe leaves a warning in the trail and the batch moves on to the next
    /// id; a matching pipe has the requested changes applied and its edit
    /// recorded individually. Returns how many pipes were edited.
    pub fn batch_edit_pipes(&mut self, ids: &[u64], update: &PipeBatchUpdate) -> usize {
        self.audit.record(&format!(
            "Batch edit pipes count={} {}",
            ids.len(),
            update.describe()
        ));

        let mut edited = 0;
        for &id in ids {
            let Some(index) = self.pipes.iter().position(|pipe| pipe.id() == id) else {
                self.audit
                    .record(&format!("Batch edit: cannot find pipe id={id}"));
                continue;
            };
            update.apply(&mut self.pipes[index]);
            self.audit.record(&format!("Batch edited pipe id={id}"));
            edited += 1;
        }
        edited
    }

    /// Write the whole store to `path`, replacing any existing file.
    ///
    /// Returns `false`, leaving a record in the audit trail, if the file
    /// cannot be created or written.
    pub fn save_to_file(&self, path: &Path) -> bool {
        match self.try_save(path) {
            Ok(()) => {
                self.audit.record(&format!(
                    "Saved to file: {} pipes={} stations={}",
                    path.display(),
                    self.pipes.len(),
                    self.stations.len()
                ));
                true
            }
            Err(e) => {
                tracing::warn!("saving store to {} failed: {e}", path.display());
                self.audit
                    .record(&format!("Failed to save to file: {}", path.display()));
                false
            }
        }
    }

    fn try_save(&self, path: &Path) -> io::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        flatfile::write_store(&mut writer, self.next_id, &self.pipes, &self.stations)?;
        writer.flush()
    }

    /// Replace the in-memory collections with the contents of `path`.
    ///
    /// Returns `false`, with the current collections untouched, if the file
    /// cannot be opened or reading fails part-way: the scan parses into
    /// temporary buffers and the registry swaps them in only once the whole
    /// file has been read. Record lines that fail to parse are skipped with
    /// a warning in the trail and never abort the load; the id counter
    /// becomes the larger of the persisted header and one past the highest
    /// id actually loaded, which covers stale or missing headers. A load
    /// with skipped lines still returns `true`.
    pub fn load_from_file(&mut self, path: &Path) -> bool {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!("opening store {} failed: {e}", path.display());
                self.audit
                    .record(&format!("Failed to load from file: {}", path.display()));
                return false;
            }
        };

        let contents = match flatfile::read_store(BufReader::new(file)) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!("reading store {} failed: {e}", path.display());
                self.audit
                    .record(&format!("Failed to load from file: {}", path.display()));
                return false;
            }
        };

        for skipped in &contents.skipped {
            self.audit.record(&format!(
                "Warning: failed to parse line during load: {} line=[{}]",
                skipped.reason, skipped.line
            ));
        }

        let max_seen = contents
            .pipes
            .iter()
            .map(Pipe::id)
            .chain(contents.stations.iter().map(Station::id))
            .max()
            .unwrap_or(0);
        self.pipes = contents.pipes;
        self.stations = contents.stations;
        self.next_id = contents.next_id_hint.max(max_seen + 1);

        self.audit.record(&format!(
            "Loaded from file: {} pipes={} stations={} next_id={}",
            path.display(),
            self.pipes.len(),
            self.stations.len(),
            self.next_id
        ));
        true
    }
}

/// How a batch edit treats the repair flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RepairUpdate {
    /// Leave the flag untouched.
    #[default]
    Keep,
    /// Mark every selected pipe as under repair.
    Set,
    /// Mark every selected pipe as not under repair.
    Clear,
}

/// Field changes applied by [`Registry::batch_edit_pipes`].
///
/// Each field is optional, and the builders encode the sentinel rules of the
/// batch protocol: an empty name and a non-positive diameter both mean "no
/// change". A batch edit therefore cannot clear a name or set a zero or
/// negative diameter; the per-record setters remain the way to do that.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipeBatchUpdate {
    name: Option<String>,
    diameter: Option<f64>,
    repair: RepairUpdate,
}

impl PipeBatchUpdate {
    /// An update that changes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a rename. Ignored if `name` is empty.
    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        if !name.is_empty() {
            self.name = Some(name.to_string());
        }
        self
    }

    /// Request a new diameter. Ignored unless strictly positive.
    #[must_use]
    pub fn with_diameter(mut self, diameter: f64) -> Self {
        if diameter > 0.0 {
            self.diameter = Some(diameter);
        }
        self
    }

    /// Choose how the repair flag is treated.
    #[must_use]
    pub const fn with_repair(mut self, repair: RepairUpdate) -> Self {
        self.repair = repair;
        self
    }

    fn apply(&self, pipe: &mut Pipe) {
        if let Some(name) = &self.name {
            pipe.set_name(name.clone());
        }
        if let Some(diameter) = self.diameter {
            pipe.set_diameter(diameter);
        }
        match self.repair {
            RepairUpdate::Keep => {}
            RepairUpdate::Set => pipe.set_in_repair(true),
            RepairUpdate::Clear => pipe.set_in_repair(false),
        }
    }

    fn describe(&self) -> String {
        let name = self.name.as_deref().unwrap_or("");
        let diameter = self.diameter.unwrap_or(-1.0);
        let repair = match self.repair {
            RepairUpdate::Keep => "keep",
            RepairUpdate::Set => "set",
            RepairUpdate::Clear => "clear",
        };
        format!("new_name=\"{name}\" new_diameter={diameter} repair={repair}")
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn registry(tmp: &TempDir) -> Registry {
        Registry::new(AuditLog::new(tmp.path().join("actions.log")))
    }

    fn audit_contents(registry: &Registry) -> String {
        std::fs::read_to_string(registry.audit().path()).unwrap_or_default()
    }

    #[test]
    fn interleaved_adds_share_one_id_sequence() {
        let tmp = TempDir::new().unwrap();
        let mut registry = registry(&tmp);

        let a = registry.add_pipe("A", 100.0, false);
        let b = registry.add_station("S", 5, 5, "X");
        let c = registry.add_pipe("B", 200.0, true);

        assert_eq!((a, b, c), (1, 2, 3));
        assert_eq!(registry.next_id(), 4);
    }

    #[test]
    fn remove_pipe_takes_out_exactly_the_match() {
        let tmp = TempDir::new().unwrap();
        let mut registry = registry(&tmp);

        registry.add_pipe("A", 100.0, false);
        registry.add_pipe("B", 200.0, true);
        registry.add_station("S", 5, 5, "X");

        assert!(registry.remove_pipe(1));
        assert!(registry.pipe(1).is_none());

        let remaining = registry.pipes();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id(), 2);
        assert_eq!(remaining[0].name(), "B");
        assert!((remaining[0].diameter() - 200.0).abs() < f64::EPSILON);
        assert!(remaining[0].in_repair());
    }

    #[test]
    fn removing_an_absent_id_is_a_silent_no_op() {
        let tmp = TempDir::new().unwrap();
        let mut registry = registry(&tmp);
        registry.add_pipe("A", 100.0, false);

        assert!(!registry.remove_pipe(99));
        assert!(!registry.remove_station(99));
        assert!(!audit_contents(&registry).contains("Removed"));
    }

    #[test]
    fn empty_substring_matches_every_pipe() {
        let tmp = TempDir::new().unwrap();
        let mut registry = registry(&tmp);
        registry.add_pipe("MainLine-1", 500.0, false);
        registry.add_pipe("Feeder-A", 250.0, true);

        assert_eq!(registry.pipes_by_name("").len(), 2);
    }

    #[test]
    fn name_search_is_case_sensitive_substring_containment() {
        let tmp = TempDir::new().unwrap();
        let mut registry = registry(&tmp);
        registry.add_pipe("MainLine-1", 500.0, false);
        registry.add_pipe("mainline-2", 300.0, false);

        let matches = registry.pipes_by_name("Main");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name(), "MainLine-1");

        let trail = audit_contents(&registry);
        assert!(trail.contains("Searched pipes by name=\"Main\" -> 1 found"));
    }

    #[test]
    fn repair_flag_filter_matches_exactly() {
        let tmp = TempDir::new().unwrap();
        let mut registry = registry(&tmp);
        registry.add_pipe("A", 100.0, false);
        registry.add_pipe("B", 200.0, true);
        registry.add_pipe("C", 300.0, true);

        assert_eq!(registry.pipes_in_repair(true).len(), 2);
        assert_eq!(registry.pipes_in_repair(false).len(), 1);
    }

    #[test]
    fn idle_percent_threshold_is_inclusive() {
        let tmp = TempDir::new().unwrap();
        let mut registry = registry(&tmp);
        registry.add_station("CS-North", 10, 8, "A");
        registry.add_station("CS-East", 12, 12, "A+");

        let at_threshold = registry.stations_by_min_idle(20.0);
        assert_eq!(at_threshold.len(), 1);
        assert_eq!(at_threshold[0].name(), "CS-North");

        assert!(registry.stations_by_min_idle(20.1).is_empty());
        assert_eq!(registry.stations_by_min_idle(0.0).len(), 2);
    }

    #[test]
    fn batch_edit_mutates_found_ids_and_warns_on_missing() {
        let tmp = TempDir::new().unwrap();
        let mut registry = registry(&tmp);
        registry.add_pipe("A", 100.0, false);

        let update = PipeBatchUpdate::new()
            .with_name("Renamed")
            .with_diameter(300.0)
            .with_repair(RepairUpdate::Set);
        let edited = registry.batch_edit_pipes(&[1, 42], &update);

        assert_eq!(edited, 1);
        let pipe = registry.pipe(1).unwrap();
        assert_eq!(pipe.name(), "Renamed");
        assert!((pipe.diameter() - 300.0).abs() < f64::EPSILON);
        assert!(pipe.in_repair());

        let trail = audit_contents(&registry);
        assert!(trail.contains("Batch edit pipes count=2"));
        assert!(trail.contains("Batch edit: cannot find pipe id=42"));
        assert!(trail.contains("Batch edited pipe id=1"));
    }

    #[test]
    fn batch_edit_sentinels_mean_no_change() {
        let tmp = TempDir::new().unwrap();
        let mut registry = registry(&tmp);
        registry.add_pipe("A", 100.0, true);

        let update = PipeBatchUpdate::new()
            .with_name("")
            .with_diameter(0.0)
            .with_diameter(-5.0);
        registry.batch_edit_pipes(&[1], &update);

        let pipe = registry.pipe(1).unwrap();
        assert_eq!(pipe.name(), "A");
        assert!((pipe.diameter() - 100.0).abs() < f64::EPSILON);
        assert!(pipe.in_repair());
    }

    #[test]
    fn save_then_load_round_trips_records_and_counter() {
        let tmp = TempDir::new().unwrap();
        let store = tmp.path().join("inventory.db");

        let mut original = registry(&tmp);
        original.add_pipe("MainLine-1", 500.0, false);
        original.add_pipe("Feeder-A", 250.5, true);
        original.add_station("CS-North", 10, 8, "A");
        assert!(original.save_to_file(&store));

        let mut reloaded = Registry::new(AuditLog::new(tmp.path().join("other.log")));
        assert!(reloaded.load_from_file(&store));

        assert_eq!(reloaded.pipes(), original.pipes());
        assert_eq!(reloaded.stations(), original.stations());
        assert_eq!(reloaded.next_id(), original.next_id());
    }

    #[test]
    fn ids_keep_advancing_after_a_reload() {
        let tmp = TempDir::new().unwrap();
        let store = tmp.path().join("inventory.db");

        let mut registry = registry(&tmp);
        registry.add_pipe("A", 100.0, false);
        registry.add_station("S", 5, 5, "X");
        assert!(registry.save_to_file(&store));
        assert!(registry.load_from_file(&store));

        assert_eq!(registry.add_pipe("B", 200.0, false), 3);
    }

    #[test]
    fn load_failure_leaves_state_untouched() {
        let tmp = TempDir::new().unwrap();
        let mut registry = registry(&tmp);
        registry.add_pipe("A", 100.0, false);

        assert!(!registry.load_from_file(&tmp.path().join("missing.db")));

        assert_eq!(registry.pipes().len(), 1);
        assert_eq!(registry.next_id(), 2);
        assert!(audit_contents(&registry).contains("Failed to load from file:"));
    }

    #[test]
    fn load_skips_malformed_lines_and_continues() {
        let tmp = TempDir::new().unwrap();
        let store = tmp.path().join("inventory.db");
        std::fs::write(
            &store,
            "NEXT_ID|10\n#PIPES\n1|BadName\n2|Good|300|0\n#STATIONS\n3|CS-North|10|8|A\n",
        )
        .unwrap();

        let mut registry = registry(&tmp);
        assert!(registry.load_from_file(&store));

        assert_eq!(registry.pipes().len(), 1);
        assert_eq!(registry.pipes()[0].name(), "Good");
        assert_eq!(registry.stations().len(), 1);

        let trail = audit_contents(&registry);
        assert!(trail.contains("Warning: failed to parse line during load:"));
        assert!(trail.contains("line=[1|BadName]"));
    }

    #[test]
    fn stale_next_id_header_is_repaired_from_loaded_ids() {
        let tmp = TempDir::new().unwrap();
        let store = tmp.path().join("inventory.db");
        std::fs::write(&store, "NEXT_ID|1\n#PIPES\n7|Old|100|0\n").unwrap();

        let mut registry = registry(&tmp);
        assert!(registry.load_from_file(&store));
        assert_eq!(registry.next_id(), 8);
    }

    #[test]
    fn larger_next_id_header_wins_over_loaded_ids() {
        let tmp = TempDir::new().unwrap();
        let store = tmp.path().join("inventory.db");
        std::fs::write(&store, "NEXT_ID|50\n#PIPES\n7|Old|100|0\n").unwrap();

        let mut registry = registry(&tmp);
        assert!(registry.load_from_file(&store));
        assert_eq!(registry.next_id(), 50);
    }

    #[test]
    fn load_replaces_prior_contents_wholesale() {
        let tmp = TempDir::new().unwrap();
        let store = tmp.path().join("inventory.db");
        std::fs::write(&store, "NEXT_ID|3\n#PIPES\n1|FromFile|100|0\n#STATIONS\n").unwrap();

        let mut registry = registry(&tmp);
        registry.add_pipe("InMemory", 500.0, false);
        registry.add_station("S", 5, 5, "X");

        assert!(registry.load_from_file(&store));
        assert_eq!(registry.pipes().len(), 1);
        assert_eq!(registry.pipes()[0].name(), "FromFile");
        assert!(registry.stations().is_empty());
    }

    #[test]
    fn every_mutating_and_searching_operation_is_audited() {
        let tmp = TempDir::new().unwrap();
        let mut registry = registry(&tmp);

        registry.add_pipe("A", 100.0, false);
        registry.add_station("S", 5, 4, "X");
        let _ = registry.pipes_by_name("A");
        let _ = registry.pipes_in_repair(false);
        let _ = registry.stations_by_name("S");
        let _ = registry.stations_by_min_idle(10.0);
        registry.remove_pipe(1);
        registry.remove_station(2);

        let trail = audit_contents(&registry);
        for needle in [
            "Added pipe id=1",
            "Added station id=2",
            "Searched pipes by name=\"A\" -> 1 found",
            "Searched pipes by in_repair=0 -> 1 found",
            "Searched stations by name=\"S\" -> 1 found",
            "Searched stations by min_idle_percent=10 -> 1 found",
            "Removed pipe id=1",
            "Removed station id=2",
        ] {
            assert!(trail.contains(needle), "missing audit entry: {needle}");
        }
    }

    #[test]
    fn exact_key_lookups_are_not_audited() {
        let tmp = TempDir::new().unwrap();
        let mut registry = registry(&tmp);
        registry.add_pipe("A", 100.0, false);
        let before = audit_contents(&registry);

        assert!(registry.pipe(1).is_some());
        assert!(registry.pipe_mut(1).is_some());
        assert!(registry.station(1).is_none());
        let _ = registry.pipes();
        let _ = registry.stations();

        assert_eq!(audit_contents(&registry), before);
    }

    #[test]
    fn set_audit_path_announces_itself_in_the_new_log() {
        let tmp = TempDir::new().unwrap();
        let mut registry = registry(&tmp);
        let new_log = tmp.path().join("fresh.log");

        registry.set_audit_path(&new_log);

        let contents = std::fs::read_to_string(&new_log).unwrap();
        assert!(contents.contains("Log file changed to:"));
    }
}
