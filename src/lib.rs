//! Transcript Relay - an HTTP relay for YouTube transcripts
//!
//! Requests are forwarded to YouTube through a pool of authenticated proxies
//! loaded once at startup. Each inbound request picks one proxy at random, and
//! every fetch result, good or bad, is shaped into a JSON envelope.

pub mod cli;
pub mod config;
pub mod proxy;
pub mod server;
pub mod transcript;
pub mod utils;
pub mod youtube;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use proxy::{ProxyEndpoint, ProxyPool, ProxyRecord};
pub use server::{AppState, Server};
pub use transcript::{
    ClientFactory, TranscriptError, TranscriptFetcher, TranscriptResult, TranscriptSegment,
};
pub use youtube::{YoutubeClientFactory, YoutubeTranscriptClient};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;
