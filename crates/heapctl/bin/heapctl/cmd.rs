mod ctl;

use clap::{Args, Subcommand};
use ctl::CtlArgs;
use eyre::Result;
use heapctl::exports::{BACKEND_KEY, HEAP_USAGE};
use heapctl::Exports;
use serde_json::{json, Value};

#[derive(Subcommand, Debug)]
pub enum HCSubcommand {
    #[command(about = "Print the detected allocator backend")]
    Backend,
    #[command(about = "Print backend-agnostic heap usage (used / total bytes)")]
    Usage,
    #[command(about = "Print the malloc_info XML report")]
    Info,
    #[command(about = "Run malloc_stats (glibc writes the report to stderr)")]
    Dump,
    #[command(about = "Print the mallinfo statistics")]
    Stats,
    #[command(about = "Release free memory from the top of the heap")]
    Trim(TrimArgs),
    #[command(about = "Read and write jemalloc properties (control-channel backend only)")]
    Ctl(CtlArgs),
}

#[derive(Args, Debug)]
pub struct TrimArgs {
    #[arg(default_value_t = 0, help = "Bytes to leave untrimmed at the top of the heap")]
    pub pad: u64,
}

impl HCSubcommand {
    pub fn title(&self) -> &'static str {
        match self {
            HCSubcommand::Backend => "backend",
            HCSubcommand::Usage => "heap usage",
            HCSubcommand::Info => "malloc_info",
            HCSubcommand::Dump => "malloc_stats",
            HCSubcommand::Stats => heapctl::standard::STATS_LAYOUT,
            HCSubcommand::Trim(_) => "malloc_trim",
            HCSubcommand::Ctl(args) => args.title(),
        }
    }

    pub fn run(&self, exports: &Exports) -> Result<Value> {
        let value = match self {
            HCSubcommand::Backend => exports.call(BACKEND_KEY, &[])?,
            HCSubcommand::Usage => exports.call(HEAP_USAGE, &[])?,
            HCSubcommand::Info => exports.call("standard.diagnostic_report", &[])?,
            HCSubcommand::Dump => exports.call("standard.dump_stats", &[])?,
            HCSubcommand::Stats => exports.call("standard.snapshot_stats", &[])?,
            HCSubcommand::Trim(args) => {
                let released = exports.call("standard.trim", &[json!(args.pad)])?;
                json!({ "pad": args.pad, "released": released })
            }
            HCSubcommand::Ctl(args) => args.run(exports)?,
        };
        Ok(value)
    }
}
