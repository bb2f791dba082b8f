//! One invocation: fetch the claim batch, then run the pipeline over it.

use tracing::{error, info};

use crate::claims::ClaimSource;
use crate::error::Result;
use crate::pipeline::{Pipeline, RunControl, RunSummary};

/// Handle one triggering event.
///
/// Only a fetch failure is returned as an error; per-claim problems are
/// visible in the summary and the logs.
pub async fn handle_invocation(
    source: &dyn ClaimSource,
    pipeline: &Pipeline,
    control: &RunControl,
) -> Result<RunSummary> {
    let claims = source.fetch_claims().await.inspect_err(|e| {
        error!(error = %e, "Error fetching claims");
    })?;

    if claims.is_empty() {
        info!("No claims to process");
    }

    Ok(pipeline.run(claims, control).await)
}
