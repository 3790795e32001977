//! Shells out to the `docker` CLI (spec.md §6), grounded in komodo's
//! `lib/command` (`shlex::split` + `tokio::process::Command` with piped
//! stdio) and `bin/periphery/src/docker/stack.rs`'s pattern of parsing
//! newline-delimited CLI output.

use std::collections::HashSet;
use std::process::Stdio;
use std::time::Duration;

use indexmap::IndexMap;
use swarmbender_client::error::SbError;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{DetailedSecret, EngineAdapter};

const LIST_RETRY_DELAYS: &[Duration] = &[Duration::from_millis(100), Duration::from_millis(400)];

/// Per-operation deadlines (spec.md §5): list/inspect calls are read-only
/// and retried, so they get the shorter budget; create and remove are
/// single mutating calls (spec.md does not name a remove deadline
/// explicitly, so it is treated like create: a one-shot non-retried
/// engine mutation).
const LIST_TIMEOUT: Duration = Duration::from_secs(20);
const MUTATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Races `fut` against `duration`, mapping an expired deadline to
/// `SbError::Timeout{op}` (spec.md §5, §7).
async fn with_deadline<T>(duration: Duration, op: &'static str, fut: impl std::future::Future<Output = Result<T, SbError>>) -> Result<T, SbError> {
  tokio::time::timeout(duration, fut).await.unwrap_or_else(|_| Err(SbError::Timeout { op: op.to_string() }))
}

pub struct CliEngine {
  pub binary: String,
}

impl Default for CliEngine {
  fn default() -> Self {
    Self { binary: "docker".to_string() }
  }
}

struct CommandOutput {
  success: bool,
  stdout: String,
  stderr: String,
}

/// `binary` may be a compound invocation (e.g. `"sudo docker"` for a
/// rootless-adjacent host setup); it is shell-split the same way
/// komodo's `run_komodo_shell_command` splits a user-supplied command
/// string, and the operation's own args are appended after it.
async fn run(binary: &str, args: &[&str], stdin: Option<&str>) -> Result<CommandOutput, SbError> {
  let mut parts = shlex::split(binary).ok_or_else(|| SbError::Engine {
    op: args.join(" "),
    cause: format!("invalid engine command '{binary}'"),
  })?;
  if parts.is_empty() {
    return Err(SbError::Engine {
      op: args.join(" "),
      cause: "empty engine command".to_string(),
    });
  }
  let program = parts.remove(0);
  let mut command = Command::new(program);
  command.args(parts).args(args).stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());
  let mut child = command.spawn().map_err(|e| SbError::Engine {
    op: args.join(" "),
    cause: e.to_string(),
  })?;
  if let Some(value) = stdin {
    let mut child_stdin = child.stdin.take().expect("stdin was piped");
    child_stdin.write_all(value.as_bytes()).await.map_err(|e| SbError::Engine {
      op: args.join(" "),
      cause: e.to_string(),
    })?;
    drop(child_stdin);
  }
  let output = child.wait_with_output().await.map_err(|e| SbError::Engine {
    op: args.join(" "),
    cause: e.to_string(),
  })?;
  Ok(CommandOutput {
    success: output.status.success(),
    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
  })
}

async fn run_with_retry(binary: &str, args: &[&str], op: &'static str) -> Result<CommandOutput, SbError> {
  let mut last_err = None;
  for (attempt, delay) in std::iter::once(None).chain(LIST_RETRY_DELAYS.iter().map(|d| Some(*d))).enumerate() {
    if let Some(delay) = delay {
      tracing::debug!(op, attempt, delay_ms = delay.as_millis() as u64, "retrying engine command");
      tokio::time::sleep(delay).await;
    }
    match run(binary, args, None).await {
      Ok(output) if output.success => return Ok(output),
      Ok(output) => last_err = Some(SbError::Engine { op: op.to_string(), cause: output.stderr }),
      Err(e) => last_err = Some(e),
    }
  }
  let err = last_err.unwrap_or_else(|| SbError::Engine {
    op: op.to_string(),
    cause: "exhausted retries".to_string(),
  });
  tracing::warn!(op, error = %err, "engine command exhausted retries");
  Err(err)
}

fn already_exists(stderr: &str) -> bool {
  stderr.to_ascii_lowercase().contains("already exists")
}

impl EngineAdapter for CliEngine {
  async fn list_names(&self) -> Result<HashSet<String>, SbError> {
    let output = with_deadline(
      LIST_TIMEOUT,
      "list-names",
      run_with_retry(&self.binary, &["secret", "ls", "--format", "{{.Name}}"], "list-names"),
    )
    .await?;
    Ok(output.stdout.lines().map(str::to_string).collect())
  }

  async fn list_detailed(&self) -> Result<Vec<DetailedSecret>, SbError> {
    let names = self.list_names().await?;
    let mut out = Vec::new();
    for name in names {
      let output = with_deadline(
        LIST_TIMEOUT,
        "list-detailed",
        run_with_retry(
          &self.binary,
          &["secret", "inspect", "--format", "{{.CreatedAt}}|{{json .Spec.Labels}}", &name],
          "list-detailed",
        ),
      )
      .await?;
      let line = output.stdout.trim();
      let Some((created_at, labels_json)) = line.split_once('|') else {
        continue;
      };
      let labels: IndexMap<String, String> = serde_json::from_str(labels_json).unwrap_or_default();
      out.push(DetailedSecret {
        name,
        created_at: created_at.to_string(),
        labels,
      });
    }
    Ok(out)
  }

  async fn ensure_created(&self, name: &str, value: &str, labels: &IndexMap<String, String>) -> Result<bool, SbError> {
    if self.list_names().await?.contains(name) {
      return Ok(false);
    }
    let label_args: Vec<String> = labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
    let mut args: Vec<&str> = vec!["secret", "create"];
    for label in &label_args {
      args.push("--label");
      args.push(label);
    }
    args.push(name);
    args.push("-");
    let output = with_deadline(MUTATE_TIMEOUT, "ensure-created", run(&self.binary, &args, Some(value))).await?;
    if output.success {
      tracing::info!(secret = name, "created via engine");
      return Ok(true);
    }
    if already_exists(&output.stderr) {
      tracing::debug!(secret = name, "engine reports already exists");
      return Ok(false);
    }
    tracing::warn!(secret = name, stderr = %output.stderr, "engine create failed");
    Err(SbError::Engine {
      op: "ensure-created".to_string(),
      cause: output.stderr,
    })
  }

  async fn remove(&self, name: &str) -> Result<bool, SbError> {
    let output = with_deadline(MUTATE_TIMEOUT, "remove", run(&self.binary, &["secret", "rm", name], None)).await?;
    if output.success {
      return Ok(true);
    }
    if output.stderr.to_ascii_lowercase().contains("no such secret") {
      return Ok(false);
    }
    Err(SbError::Engine {
      op: "remove".to_string(),
      cause: output.stderr,
    })
  }
}
