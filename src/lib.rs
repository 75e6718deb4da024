//! Credit card recommendations over a fixed catalogue: a query is embedded,
//! matched against precomputed card embeddings, and the closest cards are handed
//! to a chat model whose answer is checked against them.

pub mod cards;
pub mod core;
pub mod llm;
pub mod pipeline;
pub mod rag;
pub mod recommend;
pub mod server;
pub mod state;
