pub mod client;

pub use client::{ActiveSetProvider, GitLabClient};
