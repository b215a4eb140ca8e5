pub mod commands;
pub mod config;
pub mod quotes;
pub mod voice;

/// Custom data passed to all commands
pub struct Data {
    pub config: config::Config,
    pub http_client: reqwest::Client,
    /// Read-mostly quote catalog. The write lock serializes uploads, which
    /// are the only mutation path after startup.
    pub quotes: tokio::sync::RwLock<quotes::QuoteIndex>,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
