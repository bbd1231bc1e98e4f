use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use common::{DEFAULT_MAX_IMAGE_SIZE, DEFAULT_OUTPUT, output::OutputFormat};
use eyre::{ContextCompat, Result};
use tracing::error;
use tracing_subscriber::{
    EnvFilter,
    fmt::{layer, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

mod extract;

/// Collects perf counters from benchmark logs into a single result file.
#[derive(Parser)]
#[command(name = "perflog", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    #[command(flatten)]
    run: RunArgs,
    /// Extra tracing filter directives, e.g. `common=debug`
    #[arg(short, long)]
    log: Vec<String>,
    /// Also write logs to this file
    #[arg(long)]
    trace_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the records stored in a result file
    Show {
        #[arg(short, long, default_value = DEFAULT_OUTPUT)]
        input: PathBuf,
        #[arg(short, long, default_value_t = OutputFormat::Bincode)]
        format: OutputFormat,
    },
}

/// Extraction settings, used when no subcommand is given.
#[derive(Args)]
pub struct RunArgs {
    /// Directory holding the `*.log` files
    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,
    /// Result file, overwritten if present
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,
    #[arg(short, long, default_value_t = OutputFormat::Bincode)]
    pub format: OutputFormat,
    /// Records with a larger image size are left out
    #[arg(long, default_value_t = DEFAULT_MAX_IMAGE_SIZE)]
    pub max_image_size: u32,
    /// Drop blocks that are missing counters instead of recording 0
    #[arg(long, default_value_t = false)]
    pub drop_incomplete: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or("info".to_owned());
    let args = Cli::parse();

    let mut env_filter = EnvFilter::new(format!("perflog={log_level}"));
    if !args.log.iter().any(|x| x.starts_with("common")) {
        env_filter = env_filter.add_directive(format!("common={log_level}").parse()?);
    }
    for log in &args.log {
        env_filter = env_filter.add_directive(log.parse()?);
    }

    let (file_layer, _guard) = match &args.trace_file {
        Some(path) => {
            let file_name = path
                .file_name()
                .context("Trace file path has no file name")?;
            let dir = path.parent().unwrap_or(Path::new("."));
            let file_appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            (
                Some(layer().with_writer(non_blocking).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            layer()
                .with_timer(ChronoLocal::new("%v %k:%M:%S %z".to_owned()))
                .compact(),
        )
        .with(file_layer)
        .init();

    let result = match args.command {
        None => extract::run_extraction(&args.run).await,
        Some(Commands::Show { input, format }) => extract::show(&input, format).await,
    };
    if let Err(err) = &result {
        error!("{err:#?}");
    }
    result
}
