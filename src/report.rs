//! Rendering of the human-readable leak report.

use std::io::Result;
use std::io::Write;

use tracing::warn;

use crate::resolver::Resolved;
use crate::resolver::Resolver;
use crate::symtab::parse_hex;
use crate::tools::LineResolver;
use crate::tools::SymSource;
use crate::trace::Allocation;


/// Write the per-leak report blocks, rendering each call-stack token
/// through `frame`.
fn write_leaks<W>(
    w: &mut W,
    leaks: &[Allocation],
    mut frame: impl FnMut(&str) -> String,
) -> Result<()>
where
    W: Write,
{
    if leaks.is_empty() {
        let () = writeln!(w, "no memory leaks found.")?;
        return Ok(())
    }

    let () = writeln!(w, "{} leaks found...", leaks.len())?;
    let () = writeln!(w)?;

    for (idx, leak) in leaks.iter().enumerate() {
        let () = writeln!(w, "memory leak {idx}:")?;
        let () = writeln!(w, "  address  : {}", leak.addr)?;
        let () = match parse_hex(&leak.size) {
            Some(size) => writeln!(w, "  size     : {} ({size} bytes)", leak.size)?,
            None => writeln!(w, "  size     : {}", leak.size)?,
        };
        let () = writeln!(w, "  callstack:")?;
        for caller in &leak.callstack {
            let () = writeln!(w, "    {caller} {}", frame(caller))?;
        }
        let () = writeln!(w)?;
    }
    Ok(())
}

/// Write the leak report, resolving call stacks through the symbol
/// engine.
///
/// Every frame renders as `<token> <func>+0x<offset> in <path>`, with
/// `?` for any unresolved field. An empty leak set renders a single
/// confirmation line.
pub fn write_report<W, S>(w: &mut W, leaks: &[Allocation], resolver: &Resolver<S>) -> Result<()>
where
    W: Write,
    S: SymSource,
{
    write_leaks(w, leaks, |caller| {
        let resolved = match parse_hex(caller) {
            Some(addr) => resolver.resolve(addr),
            None => Resolved::default(),
        };
        resolved.to_string()
    })
}

/// Write the leak report, resolving call stacks through an external
/// line resolver against a single target binary.
///
/// Every frame renders as `<token> <func> <line-info>`; a failing
/// resolver invocation renders `?` fields.
pub fn write_line_report<W, L>(w: &mut W, leaks: &[Allocation], resolver: &L) -> Result<()>
where
    W: Write,
    L: LineResolver,
{
    write_leaks(w, leaks, |caller| {
        match resolver.resolve_line(caller) {
            Ok((func, line)) => format!("{func} {line}"),
            Err(err) => {
                let () = warn!("failed to resolve {caller}: {err}");
                "? ?".to_string()
            }
        }
    })
}
