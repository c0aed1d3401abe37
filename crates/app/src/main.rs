use chrono::Utc;
use clap::{Parser, Subcommand};
use prospectus_search_core::{
    BackendConfig, BackendConnectionCache, DocumentResolver, EmbeddingEndpoint, OracleEndpoint,
    OrchestratorConfig, RangeBounds, SearchOrchestrator, SearchRequest,
};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "prospectus-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// OpenSearch base URL
    #[arg(long, env = "OPENSEARCH_URL", default_value = "http://localhost:9200")]
    opensearch_url: String,

    /// Chunk index name
    #[arg(long, default_value = "prospectus_chunks")]
    opensearch_index: String,

    /// Documents catalog index name
    #[arg(long, default_value = "prospectus_catalog")]
    catalog_index: String,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(long, default_value = "prospectus_chunks")]
    qdrant_collection: String,

    /// Treat vector scores as distances (lower is closer)
    #[arg(long, default_value_t = false)]
    qdrant_distance_scores: bool,

    /// OpenAI-compatible embeddings base URL; the local deterministic
    /// embedder is used when absent
    #[arg(long, env = "EMBEDDING_URL")]
    embedding_url: Option<String>,

    /// Embedding model name
    #[arg(long, default_value = "embedding-3")]
    embedding_model: String,

    #[arg(long, env = "EMBEDDING_API_KEY")]
    embedding_api_key: Option<String>,

    /// Embedding vector dimensions
    #[arg(long, default_value = "1024")]
    embedding_dimensions: usize,

    /// OpenAI-compatible chat base URL for the judgment oracle
    #[arg(long, env = "ORACLE_URL", default_value = "http://localhost:8000/v1")]
    oracle_url: String,

    /// Oracle model name
    #[arg(long, default_value = "deepseek-v3")]
    oracle_model: String,

    #[arg(long, env = "ORACLE_API_KEY")]
    oracle_api_key: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a fund code to its stored prospectus document id.
    Resolve {
        /// Fund code, e.g. 180301.SZ
        #[arg(long)]
        fund_code: String,
        /// Resolve the expanded-offering prospectus instead of the initial one.
        #[arg(long, default_value_t = false)]
        is_expansion: bool,
    },
    /// Run one retrieval call and print the citable result as JSON.
    Search {
        /// Fund code, e.g. 180301.SZ
        #[arg(long)]
        fund_code: String,
        /// Retrieval instruction: "目录", "章节标题检索：<标题>",
        /// "内容检索：<内容>", or empty for range-only retrieval.
        #[arg(long, default_value = "")]
        search_info: String,
        /// Search the expanded-offering prospectus instead of the initial one.
        #[arg(long, default_value_t = false)]
        is_expansion: bool,
        #[arg(long)]
        start_page: Option<u32>,
        #[arg(long)]
        end_page: Option<u32>,
        #[arg(long)]
        start_chunk_id: Option<u64>,
        #[arg(long)]
        end_chunk_id: Option<u64>,
        /// Extra chunks of context before the hit.
        #[arg(long, default_value = "0")]
        expand_before: u64,
        /// Extra chunks of context after the hit.
        #[arg(long, default_value = "0")]
        expand_after: u64,
        /// Wall-clock budget for the whole call, in seconds.
        #[arg(long, default_value = "30")]
        deadline_secs: u64,
    },
}

fn backend_config(cli: &Cli) -> BackendConfig {
    BackendConfig {
        opensearch_url: cli.opensearch_url.clone(),
        opensearch_index: cli.opensearch_index.clone(),
        catalog_index: cli.catalog_index.clone(),
        qdrant_url: cli.qdrant_url.clone(),
        qdrant_collection: cli.qdrant_collection.clone(),
        qdrant_distance_scores: cli.qdrant_distance_scores,
        embedding: cli.embedding_url.as_ref().map(|url| EmbeddingEndpoint {
            url: url.clone(),
            model: cli.embedding_model.clone(),
            api_key: cli.embedding_api_key.clone(),
            dimensions: cli.embedding_dimensions,
        }),
        oracle: OracleEndpoint {
            url: cli.oracle_url.clone(),
            model: cli.oracle_model.clone(),
            api_key: cli.oracle_api_key.clone(),
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let backends = BackendConnectionCache::get_or_init(&backend_config(&cli))
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "prospectus-search boot"
    );

    match cli.command {
        Command::Resolve {
            fund_code,
            is_expansion,
        } => {
            let document_id = backends
                .resolver
                .resolve(&fund_code, is_expansion)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("{document_id}");
        }
        Command::Search {
            fund_code,
            search_info,
            is_expansion,
            start_page,
            end_page,
            start_chunk_id,
            end_chunk_id,
            expand_before,
            expand_after,
            deadline_secs,
        } => {
            let document_id = backends
                .resolver
                .resolve(&fund_code, is_expansion)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            info!(fund_code = %fund_code, document_id = %document_id, "document resolved");

            let request = SearchRequest::from_instruction(
                document_id,
                &search_info,
                RangeBounds {
                    start_page,
                    end_page,
                    start_chunk_id,
                    end_chunk_id,
                },
                expand_before,
                expand_after,
            );

            let config = OrchestratorConfig {
                deadline: Duration::from_secs(deadline_secs),
                ..OrchestratorConfig::default()
            };
            let orchestrator = SearchOrchestrator::with_config(
                backends.lexical.clone(),
                backends.vector.clone(),
                backends.oracle.clone(),
                config,
            );

            let outcome = orchestrator
                .search(&request)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}
