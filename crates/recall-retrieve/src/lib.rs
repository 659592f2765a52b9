//! Retrieval: join live per-session signals with past session summaries

mod context;
mod micro;
mod rank;
mod render;
mod retrieve;

pub use context::SessionContext;
pub use micro::{terms, MicroView};
pub use rank::{rank_by_recency, recency, score_summary, ContextItem};
pub use render::render_item;
pub use retrieve::{Retrieval, Retriever};
