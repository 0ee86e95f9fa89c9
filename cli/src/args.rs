use std::path::PathBuf;

use clap::ArgAction;
use clap::ArgGroup;
use clap::Parser;


/// A command line interface for post-mortem memory-leak analysis.
///
/// Exactly one resolution mode must be selected: a memory-map snapshot
/// of the traced process (call stacks are resolved through the symbol
/// engine) or a single target binary (call stacks are resolved through
/// an external line resolver).
#[derive(Debug, Parser)]
#[command(version)]
#[clap(group = ArgGroup::new("mode").required(true).multiple(false))]
pub struct Args {
    /// The memory-map snapshot of the traced process.
    #[clap(short = 'm', long = "map-file", group = "mode")]
    pub map_file: Option<PathBuf>,
    /// The single target binary to resolve call stacks against.
    #[clap(short = 't', long = "target", group = "mode")]
    pub target: Option<PathBuf>,
    /// The event-log file to analyze.
    pub log: PathBuf,
    /// Increase verbosity (can be supplied multiple times).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbosity: u8,
}


#[cfg(test)]
mod tests {
    use super::*;


    /// Supplying neither or both resolution modes is a usage error.
    #[test]
    fn exactly_one_mode_is_required() {
        let result = Args::try_parse_from(["leaktrail", "trace.log"]);
        assert!(result.is_err());

        let result =
            Args::try_parse_from(["leaktrail", "-m", "maps", "-t", "app", "trace.log"]);
        assert!(result.is_err());

        let args = Args::try_parse_from(["leaktrail", "-m", "maps", "trace.log"]).unwrap();
        assert_eq!(args.map_file, Some(PathBuf::from("maps")));
        assert_eq!(args.log, PathBuf::from("trace.log"));

        let args = Args::try_parse_from(["leaktrail", "-t", "app", "trace.log"]).unwrap();
        assert_eq!(args.target, Some(PathBuf::from("app")));
    }

    #[test]
    fn verbosity_accumulates() {
        let args = Args::try_parse_from(["leaktrail", "-t", "app", "-vv", "trace.log"]).unwrap();
        assert_eq!(args.verbosity, 2);
    }
}
