use anyhow::Result;
use std::sync::Arc;

use crate::{
    ai::AiClient, config::Config, db::Database, email::Mailer, paypal::PayPalClient,
    session::ChatSessionCache,
};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    /// Cached model sessions, keyed by conversation id
    pub chat_sessions: Arc<ChatSessionCache>,
    pub ai: AiClient,
    pub paypal: PayPalClient,
    pub mailer: Mailer,
    /// Shared HTTP client for OAuth provider calls
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Result<Self> {
        let chat_sessions = Arc::new(ChatSessionCache::new(config.ai.max_cached_sessions));
        let ai = AiClient::new(config.ai.clone())?;
        let paypal = PayPalClient::new(config.paypal.clone(), config.frontend_url.clone())?;
        let mailer = Mailer::new(config.smtp.clone(), config.frontend_url.clone());

        Ok(Self {
            db,
            config,
            chat_sessions,
            ai,
            paypal,
            mailer,
            http: reqwest::Client::new(),
        })
    }
}
