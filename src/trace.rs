//! Replay of allocation-tracer event logs.
//!
//! The log is whitespace-delimited text, one event per line:
//! `type address size caller1 caller2 ...`, with `m` marking an
//! allocation and `f` a free. Address, size, and caller tokens are
//! hexadecimal; they are carried as opaque tokens and only parsed
//! numerically where a numeric interpretation is needed.

use std::io::BufRead;
use std::io::Result;

use tracing::debug;
use tracing::warn;


/// A single live allocation as recorded by the tracer.
#[derive(Clone, Debug, PartialEq)]
pub struct Allocation {
    /// The allocated address, as the raw token from the log.
    pub addr: String,
    /// The allocation size, as the raw (hexadecimal) token from the
    /// log.
    pub size: String,
    /// The caller addresses of the allocation site, innermost frame
    /// first, as raw tokens from the log.
    pub callstack: Vec<String>,
}


/// Replay an event log and return the allocations never freed.
///
/// A `m` event pushes a new [`Allocation`]; a `f` event removes the
/// *most recently added* allocation with a string-equal address token
/// (LIFO among duplicates, which supports reuse of an address by
/// nested allocations) and is a silent no-op when nothing matches.
/// Unrecognized event types are reported and skipped; lines too short
/// to carry an event are skipped. Survivors come back in their
/// original insertion order.
pub fn find_leaks<R>(reader: R) -> Result<Vec<Allocation>>
where
    R: BufRead,
{
    let mut live = Vec::<Allocation>::new();

    for line in reader.lines() {
        let line = line?;
        let mut tokens = line.split_whitespace();
        let Some(event) = tokens.next() else { continue };

        match event {
            "m" => {
                let (Some(addr), Some(size)) = (tokens.next(), tokens.next()) else {
                    debug!("skipping truncated allocation event: {line}");
                    continue
                };
                live.push(Allocation {
                    addr: addr.to_string(),
                    size: size.to_string(),
                    callstack: tokens.map(str::to_string).collect(),
                })
            }
            "f" => {
                let Some(addr) = tokens.next() else {
                    debug!("skipping truncated free event: {line}");
                    continue
                };
                if let Some(idx) = live.iter().rposition(|alloc| alloc.addr == addr) {
                    let _freed = live.remove(idx);
                }
            }
            other => warn!("unknown operation type found: {other}"),
        }
    }
    Ok(live)
}
