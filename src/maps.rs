//! Parsing of process memory-map snapshots.
//!
//! A snapshot is text in `/proc/<pid>/maps` format, one mapping per
//! line. Only executable mappings backed by a path are of interest for
//! symbolization; everything else is discarded up front.

use std::io::BufRead;
use std::io::BufReader;
use std::io::Error;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Result;
use std::ops::Range;
use std::path::PathBuf;

use tracing::debug;

use crate::Addr;


/// An executable address range backed by a file.
///
/// Ranges are half-open (`start..end`). They are derived only from map
/// entries whose permission flags include execute. Process maps are
/// disjoint by construction, but nothing downstream relies on that:
/// lookups take the first containing range in stored order.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    /// The virtual address range covered by this segment.
    pub range: Range<Addr>,
    /// The path to the file backing the mapping.
    pub path: PathBuf,
}

impl Segment {
    /// Check whether `addr` falls into this segment.
    pub fn contains(&self, addr: Addr) -> bool {
        self.range.start <= addr && addr < self.range.end
    }
}


#[derive(Debug)]
pub(crate) struct MapsEntry {
    /// The virtual address range covered by this entry.
    pub range: Range<Addr>,
    pub mode: u8,
    pub path: PathBuf,
}

impl MapsEntry {
    pub fn is_executable(&self) -> bool {
        self.mode & 0b0010 != 0
    }
}


/// Parse a line of a maps snapshot.
fn parse_maps_line<'line>(line: &'line str) -> Result<MapsEntry> {
    let full_line = line;

    let split_once = |line: &'line str, component| -> Result<(&'line str, &'line str)> {
        line.split_once(|c: char| c.is_ascii_whitespace())
            .map(|(token, rest)| (token, rest.trim_start()))
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidData,
                    format!("failed to find {component} in maps line: {full_line}"),
                )
            })
    };

    // Lines have the following format:
    // address           perms offset  dev   inode      pathname
    // 08048000-08049000 r-xp 00000000 03:00 8312       /opt/test
    // 0804a000-0806b000 rw-p 00000000 00:00 0          [heap]
    // a7cb1000-a7cb2000 ---p 00000000 00:00 0
    // a7ed5000-a8008000 r-xp 00000000 03:00 4222       /lib/libc.so.6
    let (address_str, line) = split_once(line, "address range")?;
    let (start_str, end_str) = address_str.split_once('-').ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidData,
            format!("encountered malformed address range in maps line: {full_line}"),
        )
    })?;
    let start = Addr::from_str_radix(start_str, 16).map_err(|err| {
        Error::new(
            ErrorKind::InvalidData,
            format!("encountered malformed start address in maps line: {full_line}: {err}"),
        )
    })?;
    let end = Addr::from_str_radix(end_str, 16).map_err(|err| {
        Error::new(
            ErrorKind::InvalidData,
            format!("encountered malformed end address in maps line: {full_line}: {err}"),
        )
    })?;

    let (mode_str, line) = split_once(line, "permissions component")?;
    let mode = mode_str
        .chars()
        .fold(0, |mode, c| (mode << 1) | u8::from(c != '-'));

    let (_offset, line) = split_once(line, "offset component")?;
    let (_dev, line) = split_once(line, "device component")?;
    // A path may not be present, in which case there is nothing left to
    // split and the entry is anonymous.
    let path_str = split_once(line, "inode component")
        .map(|(_inode, line)| line.trim())
        .unwrap_or("");
    let path = PathBuf::from(path_str);

    let entry = MapsEntry {
        range: (start..end),
        mode,
        path,
    };
    Ok(entry)
}


#[derive(Debug)]
struct MapsEntryIter<R> {
    reader: R,
    line: String,
}

impl<R> Iterator for MapsEntryIter<R>
where
    R: BufRead,
{
    type Item = Result<MapsEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let () = self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Err(err) => return Some(Err(err)),
                Ok(0) => break None,
                Ok(_) => {
                    let line_str = self.line.trim();
                    // There shouldn't be any empty lines, but we'd just
                    // ignore them. We need to trim anyway.
                    if !line_str.is_empty() {
                        let result = parse_maps_line(line_str);
                        break Some(result)
                    }
                }
            }
        }
    }
}


/// Parse a maps snapshot from the provided reader.
pub(crate) fn parse_file<R>(reader: R) -> impl Iterator<Item = Result<MapsEntry>>
where
    R: Read,
{
    MapsEntryIter {
        reader: BufReader::new(reader),
        line: String::new(),
    }
}

/// Build the list of executable [`Segment`]s from a maps snapshot.
///
/// Entries without execute permission or without a backing path are
/// discarded. Lines that do not parse are skipped rather than treated
/// as fatal; each skip emits a `debug` diagnostic.
pub fn executable_segments<R>(reader: R) -> Result<Vec<Segment>>
where
    R: Read,
{
    let mut segments = Vec::new();
    for result in parse_file(reader) {
        match result {
            Ok(entry) if entry.is_executable() && !entry.path.as_os_str().is_empty() => {
                segments.push(Segment {
                    range: entry.range,
                    path: entry.path,
                })
            }
            Ok(_entry) => (),
            Err(err) if err.kind() == ErrorKind::InvalidData => {
                debug!("skipping unparsable maps line: {err}")
            }
            Err(err) => return Err(err),
        }
    }
    Ok(segments)
}
