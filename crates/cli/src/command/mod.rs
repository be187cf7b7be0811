mod context;
pub mod domain;
mod services;

pub use domain::{CommandAction, CommandRequest, CommandResponse, CommandStatus};

use anyhow::Result;
use domain::CommandOutcome;
use services::Services;
use tokio::sync::watch;

pub struct CommandHandler {
    services: Services,
    cancel: Option<watch::Receiver<bool>>,
}

impl CommandHandler {
    pub fn new(cancel: Option<watch::Receiver<bool>>) -> Self {
        Self {
            services: Services::default(),
            cancel,
        }
    }

    pub async fn execute(&self, request: CommandRequest) -> Result<CommandResponse> {
        let CommandRequest {
            action,
            payload,
            config,
        } = request;

        let mut outcome: CommandOutcome = self
            .services
            .route(
                action,
                payload,
                context::CommandContext::new(config, self.cancel.clone()),
            )
            .await?;

        outcome.meta.duration_ms = outcome
            .meta
            .duration_ms
            .or_else(|| Some(outcome.started.elapsed().as_millis() as u64));

        Ok(CommandResponse {
            status: CommandStatus::Ok,
            message: None,
            hints: outcome.hints,
            data: outcome.data,
            meta: outcome.meta,
        })
    }
}

pub async fn execute(
    request: CommandRequest,
    cancel: Option<watch::Receiver<bool>>,
) -> Result<CommandResponse> {
    CommandHandler::new(cancel).execute(request).await
}
