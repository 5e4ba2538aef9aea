use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use nextspin::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Crate-digging recommendations for record collectors
#[derive(Parser, Debug)]
#[command(name = "nextspin", version)]
#[command(about = "Pick the next records worth digging for", long_about = None)]
struct Cli {
    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score the dataset and pick a crate
    Crate(CrateArgs),
    /// Records most similar to one record
    Similar(SimilarArgs),
    /// Records closest to the collection's overall taste
    Taste(TasteArgs),
    /// Fill in catalog metadata for every record in the dataset
    Enrich(EnrichArgs),
    /// Import a user's public collection, then enrich it
    Import(ImportArgs),
    /// Serve the JSON HTTP API
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct DataArgs {
    /// Working dataset (CSV)
    #[arg(short, long)]
    data: PathBuf,

    /// Similarity metric
    #[arg(long, value_enum, default_value_t = MetricArg::Cosine)]
    metric: MetricArg,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum MetricArg {
    Cosine,
    Euclidean,
}

impl From<MetricArg> for Metric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Cosine => Metric::Cosine,
            MetricArg::Euclidean => Metric::Euclidean,
        }
    }
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Case-insensitive substring of artist or title
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    min_price: Option<f64>,
    #[arg(long)]
    max_price: Option<f64>,
    #[arg(long)]
    min_year: Option<f64>,
    #[arg(long)]
    max_year: Option<f64>,
    /// Comma-separated genres; a record matches if it has any of them
    #[arg(long)]
    genres: Option<String>,
}

impl From<FilterArgs> for FilterParams {
    fn from(args: FilterArgs) -> Self {
        FilterParams {
            search: args.search,
            min_price: args.min_price,
            max_price: args.max_price,
            min_year: args.min_year,
            max_year: args.max_year,
            genres: args.genres,
        }
    }
}

#[derive(Args, Debug)]
struct CrateArgs {
    #[command(flatten)]
    data: DataArgs,

    /// Score to rank by: value, smart_buy, essential or deep_cut
    #[arg(long, default_value = "value", conflicts_with = "blend")]
    score: String,

    /// Weighted blend of scores, e.g. "value=0.7,deep_cut=0.3"
    #[arg(long)]
    blend: Option<String>,

    /// Crate size
    #[arg(short, default_value_t = DEFAULT_K)]
    k: usize,

    /// Price sensitivity of the value score
    #[arg(long, default_value_t = 1.0)]
    price_weight: f64,

    /// Minimum known fields among price, want and have
    #[arg(long)]
    min_known: Option<usize>,

    #[command(flatten)]
    filter: FilterArgs,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct SimilarArgs {
    #[command(flatten)]
    data: DataArgs,
    #[arg(long)]
    artist: String,
    #[arg(long)]
    title: String,
    #[arg(short, default_value_t = DEFAULT_K)]
    k: usize,
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct TasteArgs {
    #[command(flatten)]
    data: DataArgs,
    #[arg(short, default_value_t = DEFAULT_K)]
    k: usize,
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct CatalogArgs {
    /// Catalog API token
    #[arg(long, env = "DISCOGS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Minimum delay between catalog requests
    #[arg(long, default_value_t = 1000)]
    delay_ms: u64,

    /// Per-request timeout
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    #[arg(long, default_value = nextspin_catalog::config::DEFAULT_USER_AGENT)]
    user_agent: String,

    #[arg(long, default_value = nextspin_catalog::config::DEFAULT_API_BASE)]
    api_base: String,

    /// Records enriched in parallel
    #[arg(long, default_value_t = 1)]
    concurrency: usize,
}

impl From<CatalogArgs> for CatalogConfig {
    fn from(args: CatalogArgs) -> Self {
        CatalogConfig {
            token: args.token,
            api_base: args.api_base,
            user_agent: args.user_agent,
            delay: Duration::from_millis(args.delay_ms),
            timeout: Duration::from_secs(args.timeout_secs),
            concurrency: args.concurrency,
        }
    }
}

#[derive(Args, Debug)]
struct EnrichArgs {
    /// Working dataset (CSV)
    #[arg(short, long)]
    data: PathBuf,

    /// Where to write the enriched dataset; defaults to replacing --data
    #[arg(long)]
    out: Option<PathBuf>,

    #[command(flatten)]
    catalog: CatalogArgs,
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// Collection owner
    #[arg(long)]
    username: String,

    /// Working dataset (CSV); created if missing
    #[arg(short, long)]
    data: PathBuf,

    /// Only import the listing, do not look up details
    #[arg(long)]
    skip_enrich: bool,

    #[command(flatten)]
    catalog: CatalogArgs,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[command(flatten)]
    data: DataArgs,

    /// HTTP API port
    #[arg(long, default_value_t = 6333)]
    http_port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Command::Crate(args) => run_crate(args),
        Command::Similar(args) => run_similar(args),
        Command::Taste(args) => run_taste(args),
        Command::Enrich(args) => run_enrich(args).await,
        Command::Import(args) => run_import(args).await,
        Command::Serve(args) => run_serve(args).await,
    }
}

fn load_snapshot(args: &DataArgs) -> anyhow::Result<Snapshot> {
    let dataset = Dataset::load(&args.data)?;
    Ok(Snapshot::build(
        dataset.into_store(),
        &FeatureEncoder::default(),
        args.metric.into(),
    ))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn format_price(price: Option<f64>) -> String {
    price.map_or_else(|| "-".to_string(), |p| format!("{p:.2}"))
}

fn run_crate(args: CrateArgs) -> anyhow::Result<()> {
    let ranking = match &args.blend {
        Some(weights) => Ranking::Blend(BlendWeights::parse(weights)?),
        None => Ranking::Score(args.score.parse()?),
    };
    let builder = CrateBuilder::from_params(args.k, args.price_weight, args.min_known)?;

    let snapshot = load_snapshot(&args.data)?;
    let filter = FilterParams::from(args.filter).into_filter();
    let records = snapshot.store().filtered(&filter);
    let report = builder.build(&records, &ranking);

    if args.json {
        return print_json(&report);
    }

    if report.status == CrateStatus::InsufficientData {
        println!("Not enough data to rank by {}; showing the most wanted records instead.", report.ranking);
    } else {
        println!("Your next crate, ranked by {}:", report.ranking);
    }
    for pick in report.shown() {
        println!(
            "{:>2}. {} - {}  score={:.4}  price={}  want={}  have={}",
            pick.rank,
            pick.record.artist,
            pick.record.title,
            pick.score,
            format_price(pick.record.numeric(NumericAttr::LowestPrice)),
            pick.record.numeric(NumericAttr::WantCount).map_or_else(|| "-".into(), |v| v.to_string()),
            pick.record.numeric(NumericAttr::HaveCount).map_or_else(|| "-".into(), |v| v.to_string()),
        );
    }
    println!(
        "{} records, total {} ({} priced), average {}",
        report.summary.count,
        format_price(Some(report.summary.total_cost)),
        report.summary.priced,
        format_price(report.summary.avg_price),
    );
    Ok(())
}

fn print_neighbors(snapshot: &Snapshot, neighbors: &[Neighbor]) {
    for (i, neighbor) in neighbors.iter().enumerate() {
        match snapshot.store().get(&neighbor.key) {
            Some(record) => println!("{:>2}. {} - {}  ({:.4})", i + 1, record.artist, record.title, neighbor.score),
            None => println!("{:>2}. {}  ({:.4})", i + 1, neighbor.key, neighbor.score),
        }
    }
}

fn run_similar(args: SimilarArgs) -> anyhow::Result<()> {
    let snapshot = load_snapshot(&args.data)?;
    let key = IdentityKey::new(&args.artist, &args.title);
    let neighbors = snapshot.similar(&key, args.k)?;
    if args.json {
        return print_json(&neighbors);
    }
    println!("Records like {} - {}:", args.artist, args.title);
    print_neighbors(&snapshot, &neighbors);
    Ok(())
}

fn run_taste(args: TasteArgs) -> anyhow::Result<()> {
    let snapshot = load_snapshot(&args.data)?;
    let neighbors = snapshot.taste(args.k)?;
    if args.json {
        return print_json(&neighbors);
    }
    println!("Closest to your overall taste:");
    print_neighbors(&snapshot, &neighbors);
    Ok(())
}

fn catalog_client(args: CatalogArgs) -> anyhow::Result<(DiscogsClient, usize)> {
    let config = CatalogConfig::from(args);
    let concurrency = config.concurrency;
    let client = DiscogsClient::new(config).context("catalog client not configured")?;
    Ok((client, concurrency))
}

async fn enrich_and_save(
    client: DiscogsClient,
    concurrency: usize,
    dataset: &mut Dataset,
    out: &Path,
) -> anyhow::Result<()> {
    let enricher = Enricher::new(client, concurrency);
    let report = enricher.enrich_store(dataset.store_mut()).await;
    println!("Enrichment: {report}");
    dataset.save(out)
}

async fn run_enrich(args: EnrichArgs) -> anyhow::Result<()> {
    let (client, concurrency) = catalog_client(args.catalog)?;
    let mut dataset = Dataset::load(&args.data)?;
    let out = args.out.unwrap_or_else(|| args.data.clone());
    enrich_and_save(client, concurrency, &mut dataset, &out).await?;
    info!(path = %out.display(), "enriched dataset written");
    Ok(())
}

async fn run_import(args: ImportArgs) -> anyhow::Result<()> {
    let (client, concurrency) = catalog_client(args.catalog)?;
    let mut dataset = Dataset::load_or_default(&args.data)?;

    let entries = client
        .collection(&args.username)
        .await
        .with_context(|| format!("failed to fetch collection of '{}'", args.username))?;
    let report = ingest_collection(dataset.store_mut(), entries);
    println!(
        "Imported {} entries: {} added or updated, {} unchanged, {} skipped",
        report.entries, report.added_or_updated, report.unchanged, report.skipped
    );

    if args.skip_enrich {
        dataset.save(&args.data)?;
    } else {
        enrich_and_save(client, concurrency, &mut dataset, &args.data).await?;
    }
    Ok(())
}

async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    info!("Starting NextSpin v{}", env!("CARGO_PKG_VERSION"));
    info!("Dataset: {:?}", args.data.data);

    let metric: Metric = args.data.metric.into();
    let dataset = Dataset::load(&args.data.data)?;
    let state = Arc::new(
        AppState::from_store(dataset.into_store(), FeatureEncoder::default(), metric).with_data_path(&args.data.data),
    );
    info!(records = state.cell().load().store().len(), "snapshot ready");

    let http_port = args.http_port;
    let http_handle = std::thread::spawn(move || {
        let sys = actix_web::rt::System::new();
        sys.block_on(async {
            if let Err(e) = RestApi::start(state, http_port).await {
                tracing::error!(error = %e, "HTTP server error");
            }
        })
    });
    info!("HTTP API: http://localhost:{}/", http_port);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = tokio::task::spawn_blocking(move || {
            http_handle.join().ok();
        }) => {
            info!("HTTP server stopped");
        }
    }

    info!("Shutting down...");
    Ok(())
}
