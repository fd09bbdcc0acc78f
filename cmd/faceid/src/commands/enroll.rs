//! Enrollment of reference images.

use std::path::PathBuf;

use clap::Args;
use faceid::IdentityRecord;
use serde::Serialize;

use super::{failure, output_result, read_image, start_engine};
use crate::Cli;

#[derive(Args)]
pub struct EnrollArgs {
    /// Identity id stored with every reference vector
    #[arg(long)]
    id: String,
    /// Display name
    #[arg(long)]
    name: Option<String>,
    /// Reference image (PNG or JPEG); repeat for several references
    #[arg(long = "image", required = true)]
    images: Vec<PathBuf>,
}

#[derive(Serialize)]
struct EnrollReport {
    collection: String,
    identity_id: String,
    points: Vec<String>,
}

impl EnrollArgs {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let images = self
            .images
            .iter()
            .map(|p| read_image(p))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let records: Vec<IdentityRecord> = self
            .images
            .iter()
            .map(|p| {
                let record = IdentityRecord::new(&self.id)
                    .with_image_path(p.display().to_string());
                match &self.name {
                    Some(name) => record.with_name(name),
                    None => record,
                }
            })
            .collect();

        let (engine, cfg) = start_engine(cli).await?;
        let ids = if images.len() == 1 {
            let id = engine
                .enroll(&images[0], records[0].clone())
                .await
                .map_err(failure)?;
            vec![id]
        } else {
            engine
                .enroll_batch(&images, records, cfg.store.batch_size)
                .await
                .map_err(failure)?
        };
        tracing::info!(identity = %self.id, count = ids.len(), "enrolled");

        output_result(
            &EnrollReport {
                collection: engine.collection().to_string(),
                identity_id: self.id.clone(),
                points: ids.iter().map(ToString::to_string).collect(),
            },
            cli.json,
        )
    }
}
