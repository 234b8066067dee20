pub mod compensation;
pub mod documents;
pub mod handlers;
pub mod models;
pub mod notifier;
pub mod pipeline;
pub mod policy;
pub mod prompts;
pub mod ranker;
pub mod scorer;
