pub mod job_ctx;
pub mod scrape_engine;

pub use job_ctx::JobCtx;
pub use scrape_engine::{EngineSettings, ScrapeEngine};
