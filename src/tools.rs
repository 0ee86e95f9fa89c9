//! Collaborator seams for external binary-inspection tools.
//!
//! The symbol engine does not parse ELF itself; it consumes the text
//! output of a program-header lister and a text-segment disassembler.
//! Both are modeled as narrow traits so that tests can substitute
//! canned listings and so that an ELF-parsing library could be slotted
//! in behind the same seam later.
//!
//! All invocations are synchronous, blocking, and fire-once: a failed
//! or empty invocation degrades to an empty listing and is never
//! retried.

use std::io::Error;
use std::io::ErrorKind;
use std::io::Result;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;

use tracing::debug;


/// A source of raw symbol information for a binary.
pub trait SymSource {
    /// Produce the program-header listing for `path`, one segment per
    /// line: `type offset vaddr paddr filesz memsz flags... align`.
    fn program_headers(&self, path: &Path) -> Result<String>;

    /// Produce the text-segment symbol listing for `path`, with symbol
    /// boundaries marked by lines of the form `<hex-addr> <name>:`.
    fn text_symbols(&self, path: &Path) -> Result<String>;
}


/// A resolver mapping an address inside one known binary to a
/// `function line-info` pair, as an alternative backend to the symbol
/// engine.
pub trait LineResolver {
    /// Resolve the (hex) address token `addr` to a function name and
    /// source-line information.
    fn resolve_line(&self, addr: &str) -> Result<(String, String)>;
}


/// Run `command` and hand back its stdout as text.
///
/// A spawn failure, a nonzero exit, or undecodable output all surface
/// as errors here; callers are expected to degrade rather than abort.
fn run(command: &mut Command) -> Result<String> {
    let output = command.output()?;
    if !output.status.success() {
        return Err(Error::new(
            ErrorKind::Other,
            format!("{command:?} exited with {}", output.status),
        ))
    }
    String::from_utf8(output.stdout)
        .map_err(|err| Error::new(ErrorKind::InvalidData, format!("{command:?}: {err}")))
}


/// The production [`SymSource`], shelling out to `readelf` and
/// `objdump`.
#[derive(Debug, Default)]
pub struct SystemTools;

impl SymSource for SystemTools {
    fn program_headers(&self, path: &Path) -> Result<String> {
        debug!("invoking readelf -W -l {}", path.display());
        run(Command::new("readelf").args(["-W", "-l"]).arg(path))
    }

    fn text_symbols(&self, path: &Path) -> Result<String> {
        debug!("invoking objdump -d -j .text {}", path.display());
        run(Command::new("objdump").args(["-d", "-j", ".text"]).arg(path))
    }
}


/// The production [`LineResolver`], shelling out to
/// `addr2line -Cife <target> <addr>`.
#[derive(Debug)]
pub struct Addr2Line {
    target: PathBuf,
}

impl Addr2Line {
    /// Create an `Addr2Line` resolving addresses against `target`.
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

impl LineResolver for Addr2Line {
    fn resolve_line(&self, addr: &str) -> Result<(String, String)> {
        debug!("invoking addr2line -Cife {} {addr}", self.target.display());
        let output = run(Command::new("addr2line")
            .arg("-Cife")
            .arg(&self.target)
            .arg(addr))?;
        let mut tokens = output.split_whitespace();
        let func = tokens.next().unwrap_or("?").to_string();
        let line = tokens.next().unwrap_or("?").to_string();
        Ok((func, line))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;


    /// Check that a nonzero exit status is reported as an error and
    /// not as tool output.
    #[test]
    fn nonzero_exit_is_an_error() {
        let result = run(&mut Command::new("false"));
        assert!(result.is_err());
    }

    #[test]
    fn stdout_is_captured() {
        let output = run(Command::new("echo").arg("LOAD 0x0 0x0")).unwrap();
        assert_eq!(output.trim(), "LOAD 0x0 0x0");
    }

    /// A missing executable must fail cleanly.
    #[test]
    fn missing_tool_is_an_error() {
        let result = run(&mut Command::new("leaktrail-no-such-tool"));
        assert!(result.is_err());
    }
}
