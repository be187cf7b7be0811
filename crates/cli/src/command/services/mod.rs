mod ingest;
mod status;

use crate::command::context::CommandContext;
use crate::command::domain::{CommandAction, CommandOutcome};
use anyhow::Result;
use ingest::IngestService;
use serde_json::Value;
use status::StatusService;

#[derive(Default)]
pub struct Services {
    ingest: IngestService,
    status: StatusService,
}

impl Services {
    pub async fn route(
        &self,
        action: CommandAction,
        payload: Value,
        ctx: CommandContext,
    ) -> Result<CommandOutcome> {
        match action {
            CommandAction::Ingest => self.ingest.run(payload, &ctx).await,
            CommandAction::Plan => self.ingest.plan(payload, &ctx).await,
            CommandAction::Status => self.status.read(payload, &ctx).await,
        }
    }
}
