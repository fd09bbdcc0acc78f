//! Authentication of a live frame.

use std::path::PathBuf;

use clap::Args;
use faceid::{AuthOutcome, IdentityRecord};
use serde::Serialize;

use super::{build_engine, failure, output_result, read_image};
use crate::Cli;

#[derive(Args)]
pub struct AuthArgs {
    /// Live frame (PNG or JPEG)
    #[arg(long)]
    image: PathBuf,
    /// Acceptance threshold (overrides config file)
    #[arg(long)]
    threshold: Option<f32>,
}

#[derive(Serialize)]
struct AuthReport {
    accepted: bool,
    threshold: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    identity: Option<IdentityRecord>,
}

impl AuthArgs {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let frame = read_image(&self.image)?;
        let (engine, cfg) = build_engine(cli).await?;
        let threshold = self.threshold.unwrap_or(cfg.threshold);

        let outcome = engine
            .authenticate(&frame, threshold)
            .await
            .map_err(failure)?;
        // A rejection is an answer, not an error: exit status stays zero.
        let report = match outcome {
            AuthOutcome::Accepted { record, score } => AuthReport {
                accepted: true,
                threshold,
                score: Some(score),
                identity: Some(record),
            },
            AuthOutcome::Rejected { best_score } => AuthReport {
                accepted: false,
                threshold,
                score: best_score,
                identity: None,
            },
        };
        output_result(&report, cli.json)
    }
}
