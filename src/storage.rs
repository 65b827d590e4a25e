//! Flat-file persistence and the owning registry.
//!
//! The [`Registry`] is the sole owner of both record collections and the
//! shared identifier counter; every structural mutation and every search
//! passes through it so the [`AuditLog`] sees a complete trail.

pub mod audit;
pub use audit::AuditLog;

/// Line-oriented store codec.
pub mod flatfile;
pub use flatfile::{LineRecord, ParseLineError};

mod registry;
pub use registry::{PipeBatchUpdate, Registry, RepairUpdate};
