pub mod analyzer;
pub mod chunker;
pub mod llm;
pub mod merger;
pub mod notifier;
pub mod processor;
pub mod source;
