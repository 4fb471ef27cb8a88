//! `docvector search`: run one query through the search orchestrator and
//! print the ranked results (spec §4.11).

use docvector_common::error::Result;
use docvector_search::{SearchOrchestrator, SearchRequest};

use crate::context::AppContext;

pub async fn run(ctx: &AppContext, query: String, limit: usize, no_rerank: bool) -> Result<()> {
    let orchestrator =
        SearchOrchestrator::new(ctx.vector_index.clone(), ctx.embedder.clone(), "docvector_chunks");

    let mut request = SearchRequest::new(query, limit);
    request.use_reranking = !no_rerank;
    request.score_threshold = Some(ctx.config.search.min_score);

    let response = orchestrator.search(request).await?;
    println!("{} result(s) of {} candidates", response.results.len(), response.total);
    for (rank, result) in response.results.iter().enumerate() {
        let title = result.title.as_deref().unwrap_or("(untitled)");
        let url = result.url.as_deref().unwrap_or("");
        println!("{:>2}. [{:.3}] {title}  {url}", rank + 1, result.score);
        let snippet: String = result.content.chars().take(160).collect();
        println!("    {snippet}");
        if result.truncated {
            println!("    (truncated to fit token budget)");
        }
    }
    Ok(())
}
