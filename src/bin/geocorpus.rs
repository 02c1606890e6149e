use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use geocorpus_core::{
    ActivityScan, Closeable, CorpusError, CorpusFilter, CorpusStream, DeleteSet, ExportOptions,
    ExportState, FeatureExporter, GeoPlaceMatcher, IngestMode, IngestOptions, Ingestor,
    PipelineContext, RecordField, Region, Result, ShutdownSignal, SmoothingOptions,
    TantivyStore, UserTimelines, UserWhitelist, attach_timelines, default_regions, load_regions,
};
use tracing_subscriber::{filter::LevelFilter, fmt};

/// Geotagged message corpus indexing and feature export.
#[derive(Debug, Parser)]
#[command(name = "geocorpus", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Increase logging verbosity (-v, -vv).
    #[arg(global = true, short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Stream a corpus into the index, appending every admitted record.
    Index(IngestArgs),
    /// Reprocess a corpus, overwriting documents by id; placed records only.
    Upsert(IngestArgs),
    /// Attach per-author timelines from a secondary corpus to matched documents.
    AttachTimelines(AttachArgs),
    /// Match regions and write line-aligned feature files.
    ///
    /// Opens the index read-only. Term vectors are rebuilt by re-analyzing stored
    /// fields, so indexing needs no term-vector option.
    Export(ExportArgs),
    /// Count per-author posts related to one region.
    Activity(ActivityArgs),
    /// Count records and report the id range of a corpus.
    Summary(CorpusArgs),
}

#[derive(Debug, Args)]
struct CorpusArgs {
    /// Directory holding the compressed corpus blocks.
    #[arg(long, value_name = "DIR")]
    corpus: PathBuf,
    /// Only blocks whose file name contains this substring.
    #[arg(long)]
    pattern: Option<String>,
    /// Block file extension.
    #[arg(long, default_value = geocorpus_core::DEFAULT_BLOCK_EXTENSION)]
    extension: String,
}

impl CorpusArgs {
    fn filter(&self) -> CorpusFilter {
        CorpusFilter::default()
            .with_extension(self.extension.clone())
            .with_pattern(self.pattern.clone())
    }
}

#[derive(Debug, Args)]
struct IngestArgs {
    #[command(flatten)]
    corpus: CorpusArgs,
    /// Index directory; created when missing.
    #[arg(long, value_name = "DIR")]
    index: PathBuf,
    /// Skip records with a larger id.
    #[arg(long)]
    max_id: Option<u64>,
    /// File of message ids to exclude (first column).
    #[arg(long, value_name = "FILE")]
    deletes: Option<PathBuf>,
    #[arg(long, default_value_t = geocorpus_core::DEFAULT_COMMIT_INTERVAL)]
    commit_interval: u64,
    /// Required language; ignored by `upsert`.
    #[arg(long, default_value = geocorpus_core::DEFAULT_LANG)]
    lang: String,
    /// Accept every language.
    #[arg(long)]
    any_lang: bool,
    /// Merge the index into one segment when done.
    #[arg(long)]
    force_merge: bool,
}

#[derive(Debug, Args)]
struct RegionArgs {
    /// JSON region table; defaults to the built-in city table.
    #[arg(long, value_name = "FILE")]
    regions: Option<PathBuf>,
}

impl RegionArgs {
    fn load(&self) -> Result<Vec<Region>> {
        match &self.regions {
            Some(path) => load_regions(path),
            None => Ok(default_regions()),
        }
    }
}

#[derive(Debug, Args)]
struct AttachArgs {
    #[arg(long, value_name = "DIR")]
    index: PathBuf,
    #[command(flatten)]
    timelines: CorpusArgs,
    #[command(flatten)]
    regions: RegionArgs,
    /// Only authors listed in this file receive timelines.
    #[arg(long, value_name = "FILE")]
    whitelist: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ExportArgs {
    #[arg(long, value_name = "DIR")]
    index: PathBuf,
    #[arg(long, value_name = "DIR")]
    output: PathBuf,
    #[command(flatten)]
    regions: RegionArgs,
    /// Candidate authors; each contributes at most one document.
    #[arg(long, value_name = "FILE")]
    whitelist: Option<PathBuf>,
    /// Analyzed fields feeding the dictionary.
    #[arg(long = "text-field", value_name = "FIELD")]
    text_fields: Vec<String>,
    /// Enable timeline smoothing towards this region.
    #[arg(long, value_name = "REGION")]
    smooth_target: Option<String>,
    /// Expansion weights, one output file each.
    #[arg(long = "discount", value_name = "WEIGHT")]
    discounts: Vec<f64>,
    #[arg(long, default_value_t = geocorpus_core::DEFAULT_SMOOTHING_THRESHOLD)]
    threshold: f64,
}

#[derive(Debug, Args)]
struct ActivityArgs {
    #[command(flatten)]
    corpus: CorpusArgs,
    #[command(flatten)]
    regions: RegionArgs,
    /// Region name (or short name) to count.
    #[arg(long)]
    region: String,
    /// Output file; stdout when omitted.
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(match cli.verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    });

    let shutdown = ShutdownSignal::new();
    let handler_signal = shutdown.clone();
    if let Err(err) = ctrlc::set_handler(move || handler_signal.raise()) {
        tracing::warn!(error = %err, "cannot install termination signal handler");
    }

    if let Err(err) = run(cli.command, &shutdown) {
        eprintln!("error: {err}");
        if matches!(
            err,
            CorpusError::Configuration { .. } | CorpusError::UnknownField { .. }
        ) {
            let _ = Cli::command().print_help();
            println!();
            process::exit(2);
        }
        process::exit(1);
    }
}

fn init_tracing(level: LevelFilter) {
    let subscriber = fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("tracing subscriber already set");
    }
}

fn run(command: Commands, shutdown: &ShutdownSignal) -> Result<()> {
    match command {
        Commands::Index(args) => run_ingest(&args, IngestMode::Append, shutdown),
        Commands::Upsert(args) => run_ingest(&args, IngestMode::Upsert, shutdown),
        Commands::AttachTimelines(args) => run_attach(&args, shutdown),
        Commands::Export(args) => run_export(&args, shutdown),
        Commands::Activity(args) => run_activity(&args, shutdown),
        Commands::Summary(args) => run_summary(&args),
    }
}

fn run_ingest(args: &IngestArgs, mode: IngestMode, shutdown: &ShutdownSignal) -> Result<()> {
    let options = match mode {
        IngestMode::Append => IngestOptions::builder()
            .require_lang((!args.any_lang).then(|| args.lang.clone())),
        IngestMode::Upsert => {
            let preset = IngestOptions::update_place();
            IngestOptions::builder()
                .mode(preset.mode)
                .require_lang(preset.require_lang)
                .require_location(preset.require_location)
                .require_place(preset.require_place)
        }
    }
    .commit_interval(args.commit_interval)
    .max_id(args.max_id)
    .force_merge(args.force_merge)
    .build();

    let deletes = match &args.deletes {
        Some(path) => DeleteSet::load(path)?,
        None => DeleteSet::empty(),
    };
    let mut stream = CorpusStream::open(&args.corpus.corpus, &args.corpus.filter())?;
    let store = TantivyStore::open(&args.index)?;
    let mut ctx = PipelineContext::with_shutdown(store, shutdown.clone());

    let stats = Ingestor::new(&deletes, options).run(&mut ctx, &mut stream)?;
    println!(
        "indexed {} skipped {} deletes {} geotagged {} place-only {}{}",
        stats.indexed,
        stats.skipped(),
        stats.deletes_applied,
        stats.geotagged,
        stats.place_only,
        if stats.cancelled { " (interrupted)" } else { "" }
    );
    Ok(())
}

fn load_whitelist(path: Option<&Path>) -> Result<Option<UserWhitelist>> {
    path.map(UserWhitelist::load).transpose()
}

fn run_attach(args: &AttachArgs, shutdown: &ShutdownSignal) -> Result<()> {
    let matcher = GeoPlaceMatcher::new(args.regions.load()?);
    let whitelist = load_whitelist(args.whitelist.as_deref())?;
    let mut stream = CorpusStream::open(&args.timelines.corpus, &args.timelines.filter())?;
    let store = TantivyStore::open_existing(&args.index)?;
    let mut ctx = PipelineContext::with_shutdown(store, shutdown.clone());

    let timelines = UserTimelines::collect(&mut stream);
    let outcome = timelines
        .and_then(|timelines| attach_timelines(&mut ctx, &matcher, &timelines, whitelist.as_ref()));
    let report = ctx.close(&mut [&mut stream as &mut dyn Closeable]);
    let stats = outcome?;
    if let Some(err) = report.failures.into_iter().next() {
        return Err(err);
    }
    println!(
        "regions {} candidates {} attached {}",
        stats.regions, stats.candidates, stats.attached
    );
    Ok(())
}

fn run_export(args: &ExportArgs, shutdown: &ShutdownSignal) -> Result<()> {
    let matcher = GeoPlaceMatcher::new(args.regions.load()?);
    let mut options = ExportOptions::new(&args.output);
    if !args.text_fields.is_empty() {
        let fields = args
            .text_fields
            .iter()
            .map(|name| name.parse::<RecordField>())
            .collect::<Result<Vec<_>>>()?;
        options = options.with_text_fields(fields);
    }
    if let Some(target) = &args.smooth_target {
        let mut smoothing = SmoothingOptions::for_region(target.clone());
        if !args.discounts.is_empty() {
            smoothing.discounts = args.discounts.clone();
        }
        smoothing.threshold = args.threshold;
        options = options.with_smoothing(smoothing);
    }

    let mut state = match load_whitelist(args.whitelist.as_deref())? {
        Some(whitelist) => ExportState::with_whitelist(whitelist),
        None => ExportState::new(),
    };
    let store = TantivyStore::open_read_only(&args.index)?;
    let mut ctx = PipelineContext::with_shutdown(store, shutdown.clone());

    let outcome = FeatureExporter::new(matcher, options).run(&ctx, &mut state);
    let report = ctx.close(&mut []);
    let summary = outcome?;
    if let Some(err) = report.failures.into_iter().next() {
        return Err(err);
    }
    println!(
        "regions {} documents {} duplicates {} terms {} expanded {}",
        summary.regions,
        summary.documents,
        summary.duplicates,
        summary.terms,
        summary.expanded_documents
    );
    Ok(())
}

fn run_activity(args: &ActivityArgs, shutdown: &ShutdownSignal) -> Result<()> {
    let region = args
        .regions
        .load()?
        .into_iter()
        .find(|r| r.name == args.region || r.short_name() == args.region)
        .ok_or_else(|| {
            CorpusError::Configuration {
                reason: format!("region '{}' is not in the region table", args.region),
            }
        })?;
    let mut stream = CorpusStream::open(&args.corpus.corpus, &args.corpus.filter())?;
    let outcome = ActivityScan::new(region).run(&mut stream, Some(shutdown));
    let closed = stream.close();
    let activity = outcome?;
    closed?;

    match &args.output {
        Some(path) => activity.write_to(BufWriter::new(File::create(path)?))?,
        None => activity.write_to(io::stdout().lock())?,
    }
    Ok(())
}

fn run_summary(args: &CorpusArgs) -> Result<()> {
    let summary = CorpusStream::open(&args.corpus, &args.filter())?.summarize()?;
    let range = match (summary.min_id, summary.max_id) {
        (Some(min), Some(max)) => format!("{min}..={max}"),
        _ => "empty".to_string(),
    };
    println!(
        "records {} deletes {} decode failures {} ids {range}",
        summary.records, summary.deletes, summary.decode_failures
    );
    Ok(())
}
