use clap::Args;

use common::config::PipelineConfig;

use crate::state::AppState;

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Accounts per public-key request (default: 25)
    #[arg(long)]
    pub key_batch_size: Option<usize>,

    /// Items per feed page (default: 50)
    #[arg(long)]
    pub page_limit: Option<usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] crate::state::StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut config = PipelineConfig::default();
        if let Some(key_batch_size) = self.key_batch_size {
            config.key_batch_size = key_batch_size;
        }
        if let Some(page_limit) = self.page_limit {
            config.page_limit = page_limit;
        }

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;

        let output = format!(
            "Initialized hush directory at: {}\n\
             - Config: {}\n\
             - Key batch size: {}\n\
             - Page limit: {}\n\
             - Private fetch timeout: {}ms\n\
             - Trusted circle TTL: {}s",
            state.hush_dir.display(),
            state.config_path.display(),
            state.config.key_batch_size,
            state.config.page_limit,
            state.config.private_fetch_timeout_ms,
            state.config.trusted_circle_ttl_secs,
        );

        Ok(output)
    }
}
