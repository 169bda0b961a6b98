pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod providers;
pub mod skills;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{
    PipelineContext, ResearchPipeline, ResearchReport, ResearchRequest, ResearchState, launch,
    run_research,
};
