use super::{Env, Exit};
use recall_retrieve::{render_item, Retrieval, Retriever, SessionContext};
use recall_store::{Reader, SearchHit};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Serialize)]
pub struct QueryResult {
    pub items: Vec<serde_json::Value>,
    pub hits: Vec<SearchHit>,
    pub fallback: bool,
    pub degraded: Vec<String>,
    #[serde(skip)]
    pub rendered: String,
}

impl QueryResult {
    fn from_retrieval(retrieval: Retrieval, hits: Vec<SearchHit>) -> Self {
        let items = retrieval
            .items
            .iter()
            .map(|item| {
                json!({
                    "kind": item.kind_name(),
                    "session_id": item.session_id(),
                    "score": item.score(),
                    "text": render_item(item),
                })
            })
            .collect();
        Self {
            items,
            hits,
            fallback: retrieval.fallback,
            degraded: retrieval.degraded,
            rendered: retrieval.rendered,
        }
    }
}

/// Retrieval plus raw full-text hits for `text`
pub fn query(
    env: &Env,
    reader: &Reader,
    ctx: &SessionContext,
    text: &str,
    limit: usize,
) -> QueryResult {
    let mut config = env.config.retrieval.clone();
    config.max_items = limit;
    let retrieval = Retriever::new(&config).retrieve(reader, ctx);

    let mut degraded = Vec::new();
    let hits = reader.search(text, limit).unwrap_or_else(|e| {
        degraded.push(format!("search: {e}"));
        Vec::new()
    });
    let mut result = QueryResult::from_retrieval(retrieval, hits);
    result.degraded.extend(degraded);
    result
}

pub fn run(text: &str, files: &[String], limit: usize, json: bool) -> anyhow::Result<Exit> {
    let env = Env::load()?;
    let reader = match env.open_reader() {
        Ok(reader) => reader,
        Err(e) => {
            eprintln!("recall: store unavailable: {e}");
            return Ok(Exit::Refused);
        }
    };

    let mut ctx = SessionContext::new()
        .with_query(text)
        .with_files(files.iter().cloned());
    if let Ok(cwd) = std::env::current_dir() {
        ctx = ctx.with_project(cwd.to_string_lossy());
    }
    let result = query(&env, &reader, &ctx, text, limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        if result.rendered.is_empty() {
            println!("No recalled context.");
        } else {
            print!("{}", result.rendered);
        }
        if !result.hits.is_empty() {
            println!("\n# Search hits");
            for hit in &result.hits {
                println!(
                    "- [{:?} #{}] {} ({:.2}): {}",
                    hit.source, hit.id, hit.session_id, hit.score, hit.text
                );
            }
        }
        for layer in &result.degraded {
            eprintln!("recall: degraded: {layer}");
        }
    }

    Ok(if result.degraded.is_empty() {
        Exit::Ok
    } else {
        Exit::Problem
    })
}
