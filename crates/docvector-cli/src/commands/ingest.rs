//! `docvector ingest`: crawl a source's start URL and run it through the
//! ingestion orchestrator (spec §4.2, §4.9).

use docvector_common::error::{DocVectorError, Result};
use docvector_common::types::ChunkingStrategy;
use docvector_crawler::{CrawlConfig, Crawler};
use docvector_ingestion::{IngestionConfig, IngestionOrchestrator};
use docvector_storage::SourceRepository;
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;

pub async fn run(ctx: &AppContext, source_name: String, max_pages: u32, max_depth: u32) -> Result<()> {
    let sources = SourceRepository::new(&ctx.pool);
    let source = sources
        .get_by_name(&source_name)
        .await?
        .ok_or_else(|| DocVectorError::SourceNotFound(source_name.clone()))?;

    let start_url = source
        .config
        .get("start_url")
        .and_then(|v| v.as_str())
        .ok_or_else(|| DocVectorError::Configuration(format!("source {source_name} has no start_url")))?
        .to_string();

    let crawler = Crawler::new(&ctx.config.crawler.user_agent, ctx.config.crawler.request_timeout_secs)
        .map_err(|e| DocVectorError::FetchFailed(e.to_string()))?;

    let url_pattern = source.config.get("url_pattern").and_then(|v| v.as_str()).map(str::to_string);

    let crawl_config = CrawlConfig {
        start_url: start_url.clone(),
        max_depth,
        max_pages,
        allowed_hosts: Vec::new(),
        respect_robots: ctx.config.crawler.respect_robots_txt,
        concurrency: ctx.config.crawler.concurrent_requests,
        user_agent: ctx.config.crawler.user_agent.clone(),
        request_timeout_secs: ctx.config.crawler.request_timeout_secs,
        url_pattern,
    };

    println!("crawling {start_url} (max_pages={max_pages}, max_depth={max_depth})");
    let fetched = crawler.crawl(&crawl_config).await?;
    println!("fetched {} documents, starting ingestion", fetched.len());

    let strategy = match ctx.config.chunking.strategy {
        docvector_common::config::ChunkingStrategyKind::Fixed => ChunkingStrategy::Fixed,
        docvector_common::config::ChunkingStrategyKind::Semantic => ChunkingStrategy::Semantic,
    };

    let ingestion_config = IngestionConfig {
        collection_name: "docvector_chunks".to_string(),
        embedding_dimension: ctx.config.embedding.dimension as u64,
        chunk_size: ctx.config.chunking.chunk_size,
        chunk_overlap: ctx.config.chunking.chunk_overlap,
        chunking_strategy: strategy,
        embedding_batch_size: ctx.config.embedding.batch_size,
        document_concurrency: 4,
    };

    let orchestrator =
        IngestionOrchestrator::new(ctx.pool.clone(), ctx.vector_index.clone(), ctx.embedder.clone(), ingestion_config);

    let job = orchestrator.ingest_source(source.id, fetched, CancellationToken::new()).await?;
    println!(
        "job {} finished: status={} processed={} failed={} chunks={}",
        job.id, job.status, job.processed_documents, job.failed_documents, job.total_chunks
    );
    Ok(())
}
