use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use geoscan::{
    config::{self, DEFAULT_WORKERS},
    crawl::{self, ListWindow},
    elasticsearch::{ElasticsearchClient, ExtentFilter, load_schema},
    logging,
    pipeline::{ExecutionMode, ExtractionPipeline},
};

#[derive(Parser)]
#[command(
    name = "geoscan",
    version,
    about = "Crawl scientific data archives and index per-file spatial and temporal metadata"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract metadata from files and bulk index it.
    Scan(ScanArgs),
    /// Print the Elasticsearch query built from an extent filter.
    Query {
        /// Filter such as `t=[2009,2010] x=[170,-170] y=[-10,10]`.
        extents: String,
    },
    /// Search the index and print matching file paths.
    Search {
        /// Filter such as `t=[2009-06] y=[50,60]`.
        extents: String,
        /// Maximum number of paths to print.
        #[arg(long, default_value_t = 100)]
        size: usize,
    },
}

#[derive(Args)]
struct ScanArgs {
    /// Walk this directory for regular files.
    #[arg(long, conflicts_with = "file_list", required_unless_present = "file_list")]
    dir: Option<PathBuf>,
    /// Read paths from this list file, one per line.
    #[arg(long)]
    file_list: Option<PathBuf>,
    /// First list entry to process.
    #[arg(long, default_value_t = 0, requires = "file_list")]
    start: usize,
    /// Number of list entries to process.
    #[arg(long, requires = "file_list")]
    count: Option<usize>,
    /// `sequential` or `pool`; overrides SCAN_MODE.
    #[arg(long)]
    mode: Option<String>,
    /// Pool width; overrides SCAN_WORKERS.
    #[arg(long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Query { extents } => {
            let filter = ExtentFilter::parse(&extents).context("invalid extent filter")?;
            println!("{}", serde_json::to_string_pretty(&filter.to_query())?);
            Ok(())
        }
        Command::Search { extents, size } => search(&extents, size).await,
        Command::Scan(args) => scan(args).await,
    }
}

async fn search(extents: &str, size: usize) -> Result<()> {
    let filter = ExtentFilter::parse(extents).context("invalid extent filter")?;
    let config = config::init_config().context("failed to load configuration")?;
    logging::init_tracing();

    let client =
        ElasticsearchClient::from_config().context("failed to create Elasticsearch client")?;
    let paths = client
        .search_paths(&config.elasticsearch_index, filter.to_query(), size)
        .await
        .context("search request failed")?;
    for path in paths {
        println!("{path}");
    }
    Ok(())
}

async fn scan(args: ScanArgs) -> Result<()> {
    let mut config = config::init_config()
        .context("failed to load configuration")?
        .clone();
    logging::init_tracing();

    if args.mode.is_some() || args.workers.is_some() {
        let workers = args.workers.unwrap_or(match config.execution_mode {
            ExecutionMode::Pool { workers } => workers,
            ExecutionMode::Sequential => DEFAULT_WORKERS,
        });
        let mode = match args.mode.as_deref() {
            Some(mode) => ExecutionMode::parse(mode, workers)
                .ok_or_else(|| anyhow!("unknown scan mode `{mode}`"))?,
            None => match config.execution_mode {
                ExecutionMode::Sequential => ExecutionMode::Sequential,
                ExecutionMode::Pool { .. } => ExecutionMode::Pool { workers: workers.max(1) },
            },
        };
        config.execution_mode = mode;
    }

    let files = match (&args.dir, &args.file_list) {
        (Some(dir), _) => crawl::walk_directory(dir)
            .with_context(|| format!("failed to walk {}", dir.display()))?,
        (None, Some(list)) => {
            let window = ListWindow {
                start: args.start,
                count: args.count,
            };
            crawl::read_file_list(list, window)
                .with_context(|| format!("failed to read {}", list.display()))?
        }
        (None, None) => return Err(anyhow!("either --dir or --file-list is required")),
    };

    let schema = load_schema(config.index_schema_path.as_deref())
        .context("failed to load index schema")?;
    let pipeline = ExtractionPipeline::from_config(&config).context("failed to set up pipeline")?;
    tracing::info!(
        mode = ?pipeline.mode(),
        workers = pipeline.mode().workers(),
        handlers = ?pipeline.selector().registry().ids(),
        "Pipeline configured"
    );
    pipeline
        .bootstrap(&schema)
        .await
        .context("index bootstrap failed")?;

    let statistics = pipeline.run(files).await;
    println!("{}", serde_json::to_string_pretty(&statistics)?);
    Ok(())
}
