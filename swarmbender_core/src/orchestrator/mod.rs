//! The render pipeline driver (spec.md §4.4): runs the seven ordered
//! stages over a `RenderContext`, checking a `CancellationToken` between
//! each and reporting the first failing stage uniformly.

pub mod context;
mod stages;

use std::path::PathBuf;

pub use context::{CancellationToken, RenderContext, SecretsBag, GLOBAL_SCOPE};
use swarmbender_client::entities::{ComposeFile, RenderRequest, SbConfig, SecretsPolicy};
use swarmbender_client::error::SbError;

/// The artifact produced by a completed render (spec.md §4.4).
#[derive(Debug, Clone)]
pub struct RenderOutcome {
  pub output_path: PathBuf,
  pub history_path: Option<PathBuf>,
  pub rendered_yaml: String,
}

struct Stage {
  order: u32,
  name: &'static str,
  run: fn(&mut RenderContext) -> Result<(), SbError>,
}

/// The ordered stage table (spec.md §4.4). Stage 800 (`Serialize`) is
/// run separately after this list because it produces the final
/// `RenderOutcome` rather than just mutating `ctx`.
const STAGES: &[Stage] = &[
  Stage {
    order: 100,
    name: "LoadTemplate",
    run: stages::load_template,
  },
  Stage {
    order: 200,
    name: "ApplyOverlays",
    run: stages::apply_overlays,
  },
  Stage {
    order: 300,
    name: "EnvironmentApply",
    run: stages::environment_apply,
  },
  Stage {
    order: 400,
    name: "Labels",
    run: stages::labels,
  },
  Stage {
    order: 500,
    name: "SecretsAttach",
    run: stages::secrets_attach,
  },
  Stage {
    order: 600,
    name: "TokenExpand",
    run: stages::token_expand,
  },
];

/// Runs the full render pipeline for one `(stack, env)` pair, producing
/// a rendered stack file under `request.out_dir` (spec.md §2 "Render
/// path (sync)").
pub fn render(
  request: RenderRequest,
  config: SbConfig,
  secrets_policy: SecretsPolicy,
  cancellation: &CancellationToken,
) -> Result<RenderOutcome, SbError> {
  tracing::info!(stack = %request.stack_id, env = %request.env, "render starting");
  let mut ctx = RenderContext::new(request, config, secrets_policy, ComposeFile::default());

  let mut ordered: Vec<&Stage> = STAGES.iter().collect();
  ordered.sort_by_key(|stage| stage.order);

  for stage in ordered {
    if cancellation.is_cancelled() {
      tracing::warn!(stage = stage.name, "render cancelled");
      return Err(SbError::pipeline(stage.name, anyhow::anyhow!("render cancelled before stage '{}'", stage.name)));
    }
    tracing::debug!(stage = stage.name, order = stage.order, "running stage");
    (stage.run)(&mut ctx).map_err(|e| wrap_stage_error(stage.name, e))?;
  }

  if cancellation.is_cancelled() {
    tracing::warn!(stage = "Serialize", "render cancelled");
    return Err(SbError::pipeline("Serialize", anyhow::anyhow!("render cancelled before stage 'Serialize'")));
  }
  let outcome = stages::serialize(&mut ctx).map_err(|e| wrap_stage_error("Serialize", e))?;
  tracing::info!(output = %outcome.output_path.display(), "render complete");
  Ok(outcome)
}

/// Individual stage functions already raise `SbError::Pipeline` for
/// failures encountered mid-stage (e.g. a file read inside a loop over
/// several overlay files); passing those through unchanged avoids a
/// "stage X failed: stage X failed: ..." double wrap.
fn wrap_stage_error(stage: &'static str, error: SbError) -> SbError {
  match error {
    SbError::Pipeline { .. } => error,
    other => SbError::pipeline(stage, other),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stage_table_is_sorted_by_declared_order() {
    let mut ordered: Vec<u32> = STAGES.iter().map(|s| s.order).collect();
    let sorted = {
      let mut copy = ordered.clone();
      copy.sort();
      copy
    };
    ordered.sort();
    assert_eq!(ordered, sorted);
    assert_eq!(STAGES.len(), 6);
  }
}
