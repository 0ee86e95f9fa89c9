//! **leaktrail** is a library for post-mortem memory-leak analysis.
//!
//! It consumes the event log written by an allocation tracer (one
//! `m`/`f` record per `malloc`/`free`, each with the raw call stack of
//! the caller) together with a snapshot of the traced process' memory
//! map, and reports every allocation that was never freed, with its
//! call stack resolved to `function+offset` locations inside the
//! owning binary or shared object.
//!
//! The pieces compose as follows:
//!
//! - [`maps`] parses the memory-map snapshot into executable
//!   [`Segment`][maps::Segment]s.
//! - [`symtab`] loads and caches per-file symbol tables, including the
//!   load-bias computation for position-independent binaries.
//! - [`resolver`] turns absolute instruction addresses into
//!   [`Resolved`][resolver::Resolved] locations.
//! - [`trace`] replays the event log and yields the surviving
//!   allocations.
//! - [`report`] renders the human-readable leak report.
//!
//! Access to the binaries themselves goes through the narrow
//! collaborator traits in [`tools`], so tests (and alternative
//! backends) can substitute canned symbol data.

pub mod maps;
pub mod report;
pub mod resolver;
pub mod symtab;
pub mod tools;
pub mod trace;

/// A type identifying an address in a process' virtual address space.
pub type Addr = u64;
