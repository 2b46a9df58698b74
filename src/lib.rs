pub mod aggregator;
pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod gitlab;
pub mod models;
pub mod orchestrator;
pub mod scanner;

pub use aggregator::{aggregate, FanIn, SharedScanner};
pub use config::Config;
pub use context::RunContext;
pub use error::{ScanError, Stage, SweepError};
pub use filter::is_dangling;
pub use gitlab::{ActiveSetProvider, GitLabClient};
pub use models::*;
pub use orchestrator::{build_scanners, generate_json, generate_summary, Orchestrator};
pub use scanner::{ClusterSettings, NameScanner, NamingRule, ResourceScanner};
