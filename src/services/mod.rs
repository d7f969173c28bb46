pub mod analysis;
pub mod gemini;
pub mod github;
pub mod portfolio;
pub mod prompts;
pub mod readme_agent;
pub mod usage;
pub mod visualizer;
pub mod wrapped;

pub use gemini::GeminiClient;
pub use github::GithubClient;
pub use usage::UsageTracker;
