//! Per-file symbol tables and the cache that owns them.
//!
//! A [`SymTab`] is built from two pieces of external-tool output: the
//! program-header listing (for the load-bias computation) and the
//! text-segment symbol listing (for the ordered `(offset, name)`
//! entries). Tables are loaded lazily on first lookup for a path and
//! cached for the lifetime of the owning [`SymTabCache`]; the
//! underlying binary is assumed immutable during a run, so there is no
//! invalidation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use tracing::debug;
use tracing::warn;

use crate::tools::SymSource;
use crate::Addr;


/// A single function symbol inside a file's text segment.
#[derive(Clone, Debug, PartialEq)]
pub struct Sym {
    /// The symbol's address relative to the file's load bias, i.e., as
    /// it appears in the file's own symbol table.
    pub offset: Addr,
    /// The symbol's name.
    pub name: String,
}


/// Parse a hexadecimal token, with or without `0x` prefix.
pub(crate) fn parse_hex(token: &str) -> Option<Addr> {
    Addr::from_str_radix(token.trim_start_matches("0x"), 16).ok()
}


/// Compute the load bias from a program-header listing.
///
/// Rows are `type offset vaddr paddr filesz memsz flags... align`,
/// with the flags potentially spanning multiple whitespace-separated
/// tokens (`R E`). Of every `LOAD` row with an execute flag the base
/// is `vaddr` rounded down to `align`; the last qualifying row wins.
/// No qualifying row leaves the bias at 0.
fn load_bias(listing: &str) -> Addr {
    let mut base = 0;
    for line in listing.lines() {
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("LOAD") {
            continue
        }
        // Skip the file offset, keep the virtual address.
        let Some(vaddr) = tokens.nth(1) else { continue };
        let rest = tokens.collect::<Vec<_>>();
        // Still expected: paddr, filesz, memsz, flags..., align.
        if rest.len() < 5 {
            continue
        }
        let flags = &rest[3..rest.len() - 1];
        if !flags.iter().any(|flag| flag.contains('E')) {
            continue
        }
        let (Some(vaddr), Some(align)) = (parse_hex(vaddr), rest.last().and_then(|a| parse_hex(a)))
        else {
            continue
        };
        if align == 0 {
            // A zero alignment cannot round; the row does not qualify.
            continue
        }
        base = vaddr - vaddr % align;
    }
    base
}


/// Parse a text-segment symbol listing into bias-relative entries.
///
/// Symbol boundaries are lines of the form `<hex-addr> <name>:`; all
/// other lines (instructions, section headers) are ignored. Source
/// order is preserved, which is the tool's increasing-address order
/// within the text segment.
fn parse_syms(listing: &str, bias: Addr) -> Vec<Sym> {
    let mut syms = Vec::new();
    for line in listing.lines() {
        let line = line.trim_end();
        if !line.ends_with(':') {
            continue
        }
        let Some((addr_str, rest)) = line.split_once(|c: char| c.is_ascii_whitespace()) else {
            continue
        };
        if addr_str.is_empty() || !addr_str.bytes().all(|b| b.is_ascii_hexdigit()) {
            continue
        }
        let name = match (rest.find('<'), rest.rfind('>')) {
            (Some(open), Some(close)) if open + 1 <= close => &rest[open + 1..close],
            _ => continue,
        };
        if name.is_empty() {
            continue
        }
        let Some(addr) = parse_hex(addr_str) else { continue };
        let Some(offset) = addr.checked_sub(bias) else {
            debug!("symbol {name} at {addr:#x} lies below the load bias {bias:#x}; ignoring");
            continue
        };
        syms.push(Sym {
            offset,
            name: name.to_string(),
        });
    }
    syms
}


/// The symbol table of one file's text segment.
#[derive(Debug, Default)]
pub struct SymTab {
    bias: Addr,
    syms: Vec<Sym>,
}

impl SymTab {
    /// Build a table from raw program-header and symbol listings.
    pub(crate) fn parse(phdrs: &str, listing: &str) -> Self {
        let bias = load_bias(phdrs);
        let syms = parse_syms(listing, bias);
        Self { bias, syms }
    }

    /// Find the name and start offset of the symbol bracketing
    /// `offset` from below.
    ///
    /// Entry `i` matches iff `syms[i].offset < offset` and `i` is the
    /// last entry or `syms[i + 1].offset > offset`. The comparison is
    /// strict on both sides, so an offset exactly at a symbol's own
    /// start matches neither that symbol nor its predecessor.
    pub fn find_sym(&self, offset: Addr) -> Option<(&str, Addr)> {
        for (idx, sym) in self.syms.iter().enumerate() {
            if sym.offset < offset
                && self
                    .syms
                    .get(idx + 1)
                    .map_or(true, |next| next.offset > offset)
            {
                return Some((&sym.name, sym.offset))
            }
        }
        None
    }
}


/// A per-path cache of symbol tables.
///
/// The cache is owned, not ambient: independent instances (e.g., in
/// tests) do not share or contaminate each other's state.
#[derive(Debug, Default)]
pub struct SymTabCache {
    tabs: RefCell<HashMap<PathBuf, Rc<SymTab>>>,
}

impl SymTabCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            tabs: RefCell::new(HashMap::new()),
        }
    }

    /// Retrieve the table for `path`, loading it through `source` on
    /// first use.
    ///
    /// A failing collaborator degrades to an empty table (which is
    /// cached as well; invocations are fire-once), never an error.
    pub fn get_or_load(&self, path: &Path, source: &dyn SymSource) -> Rc<SymTab> {
        if let Some(tab) = self.tabs.borrow().get(path) {
            return Rc::clone(tab)
        }

        let phdrs = source.program_headers(path).unwrap_or_else(|err| {
            warn!(
                "failed to list program headers of {}: {err}; assuming zero bias",
                path.display()
            );
            String::new()
        });
        let listing = source.text_symbols(path).unwrap_or_else(|err| {
            warn!(
                "failed to list text symbols of {}: {err}; assuming empty symbol table",
                path.display()
            );
            String::new()
        });

        let tab = Rc::new(SymTab::parse(&phdrs, &listing));
        let _prev = self
            .tabs
            .borrow_mut()
            .insert(path.to_path_buf(), Rc::clone(&tab));
        tab
    }
}
