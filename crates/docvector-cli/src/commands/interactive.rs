//! `docvector interactive`: a REPL over the search orchestrator, matching
//! the teacher's own `rustyline`-based `interactive::run` loop.

use docvector_common::error::{DocVectorError, Result};
use rustyline::DefaultEditor;

use crate::context::AppContext;

use super::search;

pub async fn run(ctx: &AppContext) -> Result<()> {
    let mut editor = DefaultEditor::new().map_err(|e| DocVectorError::Configuration(e.to_string()))?;

    println!("docvector interactive search — type a query, or 'exit' to quit");

    loop {
        let readline = editor.readline("docvector> ");
        match readline {
            Ok(line) => {
                let query = line.trim();
                if query.is_empty() {
                    continue;
                }
                if query == "exit" || query == "quit" {
                    break;
                }
                let _ = editor.add_history_entry(query);
                if let Err(err) = search::run(ctx, query.to_string(), 10, false).await {
                    eprintln!("search failed: {err}");
                }
            }
            Err(_) => break,
        }
    }

    Ok(())
}
