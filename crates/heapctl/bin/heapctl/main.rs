mod cmd;
mod render;

use clap::Parser;
use cmd::HCSubcommand;
use eyre::Result;
use heapctl::{Exports, Format};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

// Lets the control-channel backend be exercised end to end.
#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "heapctl: inspect and control the process heap allocator (glibc malloc or jemalloc)"
)]
pub struct HCArgs {
    #[arg(
        long,
        global = true,
        env = "HEAPCTL_FORMAT",
        default_value_t = Format::Table,
        help = "Output format: table, json or json-pretty"
    )]
    pub format: Format,

    #[command(subcommand)]
    pub cmd: HCSubcommand,
}

fn main() -> Result<()> {
    init_logging()?;

    let root_args = HCArgs::parse();
    let exports = Exports::global();
    tracing::debug!(backend = exports.backend(), "heapctl starting");

    let title = root_args.cmd.title();
    let value = root_args.cmd.run(&exports)?;
    render::print(title, &value, root_args.format)?;

    Ok(())
}

fn init_logging() -> Result<()> {
    let offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let time_format =
        time::format_description::parse("[year]-[month]-[day]T[hour]:[minute]:[second]")?;
    let timer = tracing_subscriber::fmt::time::OffsetTime::new(offset, time_format);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("error"));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(timer)
        .with_target(false)
        .with_thread_ids(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()?;

    Ok(())
}
