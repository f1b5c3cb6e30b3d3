use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use ejercita_core::config::{Config, resolve_config_path};
use ejercita_core::{IngestionReport, KnowledgeBase};
use ejercita_memory::document::{ChunkAnalysis, Severity, validate_layout};
use ejercita_memory::{SearchParams, SearchResult};

#[derive(Debug, Parser)]
#[command(name = "ejercita", version, about = "Index and search course material")]
struct Cli {
    /// Configuration file (defaults to `EJERCITA_CONFIG` or config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load, chunk and index every supported file under a directory
    Ingest {
        directory: PathBuf,
        /// Drop the existing index first
        #[arg(long)]
        reset: bool,
    },
    /// Retrieve indexed chunks relevant to a query
    Search {
        query: String,
        #[arg(long)]
        materia: Option<String>,
        #[arg(long)]
        unidad: Option<String>,
        /// Exercise type used to bias the query (`multiple_choice`, `practico`, `desarrollo`)
        #[arg(long)]
        tipo: Option<String>,
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Show collection name, location, size and embedding model
    Info,
    /// Check a documents tree against the expected subject/unit/type layout
    Validate { directory: PathBuf },
    /// Chunk a directory without indexing it and print chunk statistics
    Analyze { directory: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)?;
    init_subscriber(&config);
    tracing::debug!(path = %config_path.display(), "configuration loaded");

    match cli.command {
        Command::Ingest { directory, reset } => ingest(&config, &directory, reset).await,
        Command::Search {
            query,
            materia,
            unidad,
            tipo,
            k,
        } => {
            let mut params = SearchParams::new(query);
            params.materia = materia;
            params.unidad = unidad;
            params.tipo_ejercicio = tipo;
            search(&config, &params, k).await
        }
        Command::Info => info(&config).await,
        Command::Validate { directory } => validate(&directory),
        Command::Analyze { directory } => analyze(&config, &directory).await,
    }
}

fn init_subscriber(config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log.level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn ingest(config: &Config, directory: &Path, reset: bool) -> anyhow::Result<()> {
    let kb = KnowledgeBase::from_config(config).await?;
    if reset {
        kb.reset().await.context("failed to reset index")?;
    }
    let report = kb
        .load(directory)
        .await
        .with_context(|| format!("failed to ingest {}", directory.display()))?;
    print!("{}", render_report(&report));
    Ok(())
}

async fn search(config: &Config, params: &SearchParams, k: Option<usize>) -> anyhow::Result<()> {
    let kb = KnowledgeBase::from_config(config).await?;
    let results = kb.search_materials(params, k).await?;
    if results.is_empty() {
        println!("no results");
    }
    for (rank, result) in results.iter().enumerate() {
        print!("{}", render_result(rank + 1, result));
    }
    Ok(())
}

async fn info(config: &Config) -> anyhow::Result<()> {
    let kb = KnowledgeBase::from_config(config).await?;
    let info = kb.info().await?;
    println!("collection:      {}", info.name);
    println!("location:        {}", info.location);
    println!("chunks:          {}", info.count);
    println!("embedding model: {}", info.embedding_model);
    Ok(())
}

fn validate(directory: &Path) -> anyhow::Result<()> {
    let report = validate_layout(directory)?;
    println!("subjects: {}", join(&report.subjects));
    println!("units:    {}", join(&report.units));
    println!("types:    {}", join(&report.document_types));
    println!("files:    {}", report.total_files);
    for (subject, count) in &report.files_per_subject {
        println!("  {subject}: {count}");
    }
    if let Some(coverage) = report.coverage() {
        println!("full structure: {coverage:.1}%");
    }
    for issue in &report.issues {
        let label = match issue.severity() {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        println!("{label}: {issue}");
    }
    if !report.is_valid() {
        bail!("layout has {} error(s)", report.errors().count());
    }
    Ok(())
}

async fn analyze(config: &Config, directory: &Path) -> anyhow::Result<()> {
    let kb = KnowledgeBase::from_config(config).await?;
    let analysis = kb.analyze_directory(directory).await?;
    print!("{}", render_analysis(&analysis));
    Ok(())
}

fn join<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    let items: Vec<&str> = items.into_iter().map(String::as_str).collect();
    if items.is_empty() {
        "-".to_owned()
    } else {
        items.join(", ")
    }
}

fn render_report(report: &IngestionReport) -> String {
    let mut out = format!(
        "status: {}\nfiles: {} found, {} loaded, {} skipped, {} failed\n\
         chunks: {} created, {} indexed, {} failed, {} split failures\n\
         existing chunks: {}\nduration: {} ms\n",
        report.status,
        report.files_found,
        report.documents_loaded,
        report.files_skipped,
        report.files_failed,
        report.chunks_created,
        report.chunks_indexed,
        report.chunks_failed,
        report.split_failures,
        report.existing_chunks,
        report.duration_ms,
    );
    for error in &report.errors {
        out.push_str("  ");
        out.push_str(error);
        out.push('\n');
    }
    out
}

fn render_analysis(analysis: &ChunkAnalysis) -> String {
    if analysis.total_chunks == 0 {
        return "no chunks\n".to_owned();
    }
    let mut out = format!(
        "chunks: {}\nlength: avg {:.1}, min {}, max {}\n\
         with math: {}\nwith definitions: {}\nwith exercises: {}\n",
        analysis.total_chunks,
        analysis.avg_length,
        analysis.min_length,
        analysis.max_length,
        analysis.with_math,
        analysis.with_definitions,
        analysis.with_exercises,
    );
    for (difficulty, count) in &analysis.difficulty {
        out.push_str(&format!("  {difficulty}: {count}\n"));
    }
    out
}

fn render_result(rank: usize, result: &SearchResult) -> String {
    let meta = &result.metadata;
    let mut header = format!("[{rank}] {} / {}", meta.materia, meta.tipo_documento);
    if let Some(unit) = meta.unidad_numero() {
        header.push_str(&format!(" / unidad {unit}"));
    }
    let preview: String = result.content.chars().take(200).collect();
    format!("{header}\n    {}\n    {}\n", meta.source, preview.replace('\n', " "))
}
