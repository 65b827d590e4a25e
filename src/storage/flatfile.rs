//! Line-oriented codec for the flat-file store.
//!
//! The store is a single text file: a `NEXT_ID|<n>` header followed by
//! `#PIPES` and `#STATIONS` sections, one record per line with fields joined
//! by a literal `|`. Field values are not escaped, so a name containing `|`
//! corrupts its line on the way back in. That is a documented limitation of
//! the format, not something the codec tries to repair.

use std::{
    io::{self, BufRead, Write},
    num::{ParseFloatError, ParseIntError},
};

use crate::{Pipe, Station};

/// Header prefix carrying the persisted id counter.
pub const NEXT_ID_PREFIX: &str = "NEXT_ID|";

/// Marker line opening the pipe section.
pub const PIPES_MARKER: &str = "#PIPES";

/// Marker line opening the station section.
pub const STATIONS_MARKER: &str = "#STATIONS";

/// A record that serializes to and from one `|`-separated line.
pub trait LineRecord: Sized {
    /// Number of fields a well-formed line must contain.
    const FIELD_COUNT: usize;

    /// Render the record as a single line, without a trailing newline.
    fn to_line(&self) -> String;

    /// Parse a record from one line.
    ///
    /// # Errors
    ///
    /// Returns [`ParseLineError::FieldCount`] if splitting on `|` does not
    /// yield exactly [`Self::FIELD_COUNT`] fields, or an
    /// [`Int`](ParseLineError::Int) / [`Float`](ParseLineError::Float)
    /// failure if a numeric field does not parse.
    fn from_line(line: &str) -> Result<Self, ParseLineError>;
}

/// Why a record line could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum ParseLineError {
    /// The line split into the wrong number of fields for its section.
    #[error("expected {expected} fields, found {found}")]
    FieldCount {
        /// Field count a well-formed line would have.
        expected: usize,
        /// Field count actually present.
        found: usize,
    },

    /// An integer field did not parse.
    #[error("invalid integer in field `{field}`")]
    Int {
        /// Name of the offending field.
        field: &'static str,
        /// The underlying parse failure.
        source: ParseIntError,
    },

    /// A floating-point field did not parse.
    #[error("invalid number in field `{field}`")]
    Float {
        /// Name of the offending field.
        field: &'static str,
        /// The underlying parse failure.
        source: ParseFloatError,
    },
}

impl LineRecord for Pipe {
    const FIELD_COUNT: usize = 4;

    fn to_line(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.id(),
            self.name(),
            self.diameter(),
            u8::from(self.in_repair())
        )
    }

    fn from_line(line: &str) -> Result<Self, ParseLineError> {
        let fields = split_fields(line, Self::FIELD_COUNT)?;
        let id = parse_int::<u64>(fields[0], "id")?;
        let diameter: f64 = fields[2].parse().map_err(|source| ParseLineError::Float {
            field: "diameter",
            source,
        })?;
        // anything other than "0" counts as in repair
        let in_repair = fields[3] != "0";
        Ok(Self::new(id, fields[1], diameter, in_repair))
    }
}

impl LineRecord for Station {
    const FIELD_COUNT: usize = 5;

    fn to_line(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.id(),
            self.name(),
            self.total_workshops(),
            self.working_workshops(),
            self.classification()
        )
    }

    fn from_line(line: &str) -> Result<Self, ParseLineError> {
        let fields = split_fields(line, Self::FIELD_COUNT)?;
        let id = parse_int::<u64>(fields[0], "id")?;
        let total = parse_int::<i32>(fields[2], "total_workshops")?;
        let working = parse_int::<i32>(fields[3], "working_workshops")?;
        Ok(Self::new(id, fields[1], total, working, fields[4]))
    }
}

fn split_fields(line: &str, expected: usize) -> Result<Vec<&str>, ParseLineError> {
    let fields: Vec<&str> = line.split('|').collect();
    if fields.len() == expected {
        Ok(fields)
    } else {
        Err(ParseLineError::FieldCount {
            expected,
            found: fields.len(),
        })
    }
}

fn parse_int<T: std::str::FromStr<Err = ParseIntError>>(
    value: &str,
    field: &'static str,
) -> Result<T, ParseLineError> {
    value
        .parse()
        .map_err(|source| ParseLineError::Int { field, source })
}

/// Everything recovered from one pass over a store file.
#[derive(Debug)]
pub struct StoreContents {
    /// Value of the last `NEXT_ID|` header seen; `1` if none parsed.
    pub next_id_hint: u64,
    /// Pipes in file order.
    pub pipes: Vec<Pipe>,
    /// Stations in file order.
    pub stations: Vec<Station>,
    /// Record lines that failed to parse, in file order.
    pub skipped: Vec<SkippedLine>,
}

/// A record line the reader had to skip, kept for the caller to report.
#[derive(Debug)]
pub struct SkippedLine {
    /// The offending line, verbatim.
    pub line: String,
    /// Why it failed to parse.
    pub reason: ParseLineError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Pipes,
    Stations,
}

/// Scan a whole store from `reader`.
///
/// The reader is a small state machine over the section markers and accepts
/// the sections in any order. Blank lines are skipped, record lines that
/// fail to parse are collected in [`StoreContents::skipped`] without
/// aborting the scan, and lines before the first marker are ignored. A
/// `NEXT_ID|` header is honoured in any state; an unparsable header value is
/// swallowed and the previous hint kept.
///
/// # Errors
///
/// Fails only if reading from the underlying source fails.
pub fn read_store<R: BufRead>(reader: R) -> io::Result<StoreContents> {
    let mut contents = StoreContents {
        next_id_hint: 1,
        pipes: Vec::new(),
        stations: Vec::new(),
        skipped: Vec::new(),
    };
    let mut section = Section::None;

    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        if let Some(value) = line.strip_prefix(NEXT_ID_PREFIX) {
            if let Ok(next_id) = value.parse() {
                contents.next_id_hint = next_id;
            }
            continue;
        }
        if line == PIPES_MARKER {
            section = Section::Pipes;
            continue;
        }
        if line == STATIONS_MARKER {
            section = Section::Stations;
            continue;
        }
        match section {
            Section::None => {}
            Section::Pipes => match Pipe::from_line(&line) {
                Ok(pipe) => contents.pipes.push(pipe),
                Err(reason) => contents.skipped.push(SkippedLine { line, reason }),
            },
            Section::Stations => match Station::from_line(&line) {
                Ok(station) => contents.stations.push(station),
                Err(reason) => contents.skipped.push(SkippedLine { line, reason }),
            },
        }
    }

    Ok(contents)
}

/// Write a whole store: the id-counter header, then the pipe and station
/// sections in insertion order.
///
/// # Errors
///
/// Fails if writing to `writer` fails.
pub fn write_store<W: Write>(
    writer: &mut W,
    next_id: u64,
    pipes: &[Pipe],
    stations: &[Station],
) -> io::Result<()> {
    writeln!(writer, "{NEXT_ID_PREFIX}{next_id}")?;
    writeln!(writer, "{PIPES_MARKER}")?;
    for pipe in pipes {
        writeln!(writer, "{}", pipe.to_line())?;
    }
    writeln!(writer, "{STATIONS_MARKER}")?;
    for station in stations {
        writeln!(writer, "{}", station.to_line())?;
    }
    Ok(())
}
