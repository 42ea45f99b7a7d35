pub mod clients;
pub mod config;
pub mod error;
pub mod executor;
pub mod extract;
pub mod image;
pub mod pipeline;
pub mod prompts;
pub mod questions;
pub mod writer;

pub use pipeline::{Pipeline, Question, RunSummary};
