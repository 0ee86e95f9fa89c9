#![allow(clippy::let_and_return, clippy::let_unit_value)]

mod args;

use std::fs::File;
use std::io::stdout;
use std::io::BufReader;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;

use clap::Parser as _;

use leaktrail::maps::executable_segments;
use leaktrail::report;
use leaktrail::resolver::Resolver;
use leaktrail::tools::Addr2Line;
use leaktrail::tools::SystemTools;
use leaktrail::trace::find_leaks;

use tracing::subscriber::set_global_default as set_global_subscriber;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::time::SystemTime;
use tracing_subscriber::FmtSubscriber;


fn main() -> Result<()> {
    let args = args::Args::parse();
    let level = match args.verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_timer(SystemTime)
        .finish();

    let () =
        set_global_subscriber(subscriber).with_context(|| "failed to set tracing subscriber")?;

    println!("reading '{}' ...", args.log.display());
    let log = File::open(&args.log)
        .with_context(|| format!("failed to open event log {}", args.log.display()))?;
    let leaks = find_leaks(BufReader::new(log))
        .with_context(|| format!("failed to read event log {}", args.log.display()))?;

    let mut stdout = stdout().lock();
    if let Some(map_file) = &args.map_file {
        let maps = File::open(map_file)
            .with_context(|| format!("failed to open map file {}", map_file.display()))?;
        let segments = executable_segments(maps)
            .with_context(|| format!("failed to read map file {}", map_file.display()))?;
        let resolver = Resolver::new(segments, SystemTools);
        let () = report::write_report(&mut stdout, &leaks, &resolver)
            .context("failed to write leak report")?;
    } else if let Some(target) = &args.target {
        let resolver = Addr2Line::new(target);
        let () = report::write_line_report(&mut stdout, &leaks, &resolver)
            .context("failed to write leak report")?;
    } else {
        // The argument group guarantees one mode is present.
        bail!("either a map file or a target binary must be given")
    }
    Ok(())
}
