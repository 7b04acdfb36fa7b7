use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use ragdb_core::config::{Config, Settings};
use ragdb_core::logging::init_tracing;
use ragdb_core::traits::{ChunkWriter, Embedder};
use ragdb_core::types::{Chunk, FusionWeights, Scope, SearchRequest};
use ragdb_embed::get_default_embedder;
use ragdb_hybrid::{generate_context, ContextOptions, HybridSearchOrchestrator};
use ragdb_text::TantivyIndexer;
use ragdb_vector::LanceStore;

#[derive(Parser)]
#[command(name = "ragdb", about = "Hybrid (dense + full-text) retrieval over tenant-scoped chunks")]
struct Cli {
    /// Base directory for relative storage paths (defaults to the current directory).
    #[arg(long, global = true, env = "RAGDB_BASE_DIR")]
    base_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest pre-chunked JSONL (one chunk per line); chunks without an embedding are embedded first.
    Ingest {
        file: PathBuf,
        #[arg(long, default_value_t = 64)]
        batch_size: usize,
    },
    /// Run a hybrid search and print ranked results.
    Query {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Fusion weights as `vector,sparse,full_text`, e.g. `0.7,0,0.3`.
        #[arg(long, value_parser = parse_weights)]
        weights: Option<FusionWeights>,
        /// Print results as JSON lines.
        #[arg(long)]
        json: bool,
        query: String,
    },
    /// Print the prompt context block generated for a query.
    Context {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long, default_value_t = 5)]
        limit: usize,
        #[arg(long, default_value_t = 0.5)]
        min_relevance: f32,
        #[arg(long)]
        max_chars: Option<usize>,
        query: String,
    },
    /// Delete every chunk of a tenant namespace.
    Delete {
        #[command(flatten)]
        scope: ScopeArgs,
    },
}

#[derive(Args)]
struct ScopeArgs {
    #[arg(long)]
    tenant: String,
    #[arg(long)]
    namespace: String,
}

fn parse_weights(s: &str) -> Result<FusionWeights, String> {
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>().map_err(|e| format!("'{p}': {e}")))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        [vector, sparse, full_text] => Ok(FusionWeights::new(*vector, *sparse, *full_text)),
        _ => Err(format!("expected three comma-separated weights, got {}", parts.len())),
    }
}

async fn open_store(settings: &Settings, base: &Path, dim: usize) -> anyhow::Result<LanceStore> {
    let lancedb_path = settings.storage.lancedb_path(base);
    let tantivy_path = settings.storage.tantivy_path(base);
    std::fs::create_dir_all(&lancedb_path).with_context(|| format!("creating {}", lancedb_path.display()))?;
    let text = TantivyIndexer::open_or_create(&tantivy_path)?;
    tracing::debug!(lancedb = %lancedb_path.display(), tantivy = %tantivy_path.display(), "opening stores");
    Ok(LanceStore::new(&lancedb_path, &settings.storage.table, dim).await?.with_text_index(Arc::new(text)))
}

fn read_chunks(file: &Path) -> anyhow::Result<Vec<Chunk>> {
    let raw = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| serde_json::from_str::<Chunk>(line).with_context(|| format!("{}:{}: invalid chunk", file.display(), i + 1)))
        .collect()
}

async fn ingest(store: &LanceStore, embedder: &dyn Embedder, file: &Path, batch_size: usize) -> anyhow::Result<()> {
    let mut chunks = read_chunks(file)?;
    if chunks.is_empty() {
        println!("No chunks to ingest");
        return Ok(());
    }
    for c in &chunks {
        Scope::new(c.tenant_id.clone(), c.namespace.clone()).with_context(|| format!("chunk '{}'", c.id))?;
    }
    println!("Ingesting {} chunks from {}", chunks.len(), file.display());
    let pb = ProgressBar::new(chunks.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?
            .progress_chars("#>-"),
    );
    for batch in chunks.chunks_mut(batch_size.max(1)) {
        let missing: Vec<usize> = batch.iter().enumerate().filter(|(_, c)| c.embedding.is_empty()).map(|(i, _)| i).collect();
        if !missing.is_empty() {
            let texts: Vec<String> = missing.iter().map(|&i| batch[i].text.clone()).collect();
            let vectors = embedder.embed_batch(&texts).await?;
            for (&i, v) in missing.iter().zip(vectors) {
                batch[i].embedding = v;
            }
        }
        store.upsert(batch).await?;
        pb.inc(batch.len() as u64);
    }
    pb.finish_with_message("done");
    println!("✅ Ingest complete ({} chunks)", chunks.len());
    Ok(())
}

/// Ctrl-C cancels the in-flight search.
fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    token
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;
    let settings = config.settings()?;
    init_tracing(&settings.logging.level);

    let base = match cli.base_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let embedder = get_default_embedder(&settings.embedding)?;
    let store = open_store(&settings, &base, embedder.dim()).await?;

    match cli.command {
        Command::Ingest { file, batch_size } => ingest(&store, embedder.as_ref(), &file, batch_size).await?,
        Command::Query { scope, limit, weights, json, query } => {
            let orchestrator = HybridSearchOrchestrator::from_settings(&settings, embedder, Arc::new(store))?;
            let mut request = SearchRequest::new(scope.tenant, scope.namespace, query, limit);
            request.weights = weights;
            let cancel = ctrl_c_token();
            let results = orchestrator.search_cancellable(&request, &cancel).await?;
            if json {
                for r in &results {
                    println!("{}", serde_json::to_string(r)?);
                }
            } else {
                println!("\n🔍 Found {} results for: \"{}\"", results.len(), request.query);
                for (i, r) in results.iter().enumerate() {
                    println!(
                        "\n  {}. score={:.4}  vector={:.3}  full_text={:.3}  sparse={:.3}  id={}  source={}",
                        i + 1,
                        r.scores.combined,
                        r.scores.vector,
                        r.scores.full_text,
                        r.scores.sparse,
                        r.id,
                        r.source_type
                    );
                    println!("     📝 {}", r.text);
                }
            }
        }
        Command::Context { scope, limit, min_relevance, max_chars, query } => {
            if !(0.0..=1.0).contains(&min_relevance) {
                bail!("--min-relevance must lie in [0, 1]");
            }
            let orchestrator = HybridSearchOrchestrator::from_settings(&settings, embedder, Arc::new(store))?;
            let options = ContextOptions { limit, min_relevance, max_chars, weights: None };
            let context = generate_context(&orchestrator, &scope.tenant, &scope.namespace, &query, &options).await?;
            if context.is_empty() {
                eprintln!("No sufficiently relevant context found");
            } else {
                println!("{context}");
            }
        }
        Command::Delete { scope } => {
            let scope = Scope::new(scope.tenant, scope.namespace)?;
            store.delete_scope(&scope).await?;
            println!("🗑️  Deleted all chunks for {scope}");
        }
    }
    Ok(())
}
