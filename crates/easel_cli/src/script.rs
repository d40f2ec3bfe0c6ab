//! Call scripts: JSON arrays of proxy operations replayed in order.

use anyhow::{Context, Result};
use easel_core::{BatchedContextProxy, ProxyError, RecordedCall, RecordingChannel};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::fs;
use std::path::Path;

/// One scripted operation.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Step {
    /// Queue a property write (`method: false`) or a method call.
    Enqueue {
        name: String,
        #[serde(default)]
        method: bool,
        #[serde(default)]
        args: Vec<Value>,
    },
    BeginBatch,
    EndBatch,
    Flush,
    /// Read a property back.
    Property { name: String },
    /// Invoke a method and print its result.
    Call {
        method: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    Resize,
    Dispose,
    /// Make the simulated host answer `call` requests for `method` with `value`.
    Respond { method: String, value: Value },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Enqueue { name, method: true, .. } => write!(f, "enqueue {name}()"),
            Step::Enqueue { name, .. } => write!(f, "enqueue {name}="),
            Step::BeginBatch => f.write_str("beginBatch"),
            Step::EndBatch => f.write_str("endBatch"),
            Step::Flush => f.write_str("flush"),
            Step::Property { name } => write!(f, "property {name}"),
            Step::Call { method, .. } => write!(f, "call {method}"),
            Step::Resize => f.write_str("resize"),
            Step::Dispose => f.write_str("dispose"),
            Step::Respond { method, .. } => write!(f, "respond {method}"),
        }
    }
}

pub fn parse_script(content: &str) -> Result<Vec<Step>> {
    serde_json::from_str(content).context("Failed to parse script")
}

pub fn load_script(path: &Path) -> Result<Vec<Step>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read script: {}", path.display()))?;
    parse_script(&content)
}

/// What one step did.
#[derive(Debug)]
pub struct StepReport {
    pub step: Step,
    /// Calls that reached the channel while the step ran
    pub transmissions: Vec<RecordedCall>,
    /// Read-back value, if the step produced one
    pub outcome: std::result::Result<Option<Value>, ProxyError>,
}

/// Run `steps` in order against `proxy`. A failing step is reported and the script goes on.
pub async fn run_script(
    proxy: &BatchedContextProxy,
    channel: &RecordingChannel,
    steps: &[Step],
) -> Vec<StepReport> {
    let mut reports = Vec::with_capacity(steps.len());
    let mut seen = channel.calls().len();

    for step in steps {
        tracing::debug!("step: {}", step);
        let outcome = run_step(proxy, channel, step).await;
        if let Err(err) = &outcome {
            tracing::warn!("step `{}` failed: {}", step, err);
        }

        let calls = channel.calls();
        let transmissions = calls.get(seen..).map(<[_]>::to_vec).unwrap_or_default();
        seen = calls.len();

        reports.push(StepReport {
            step: step.clone(),
            transmissions,
            outcome,
        });
    }
    reports
}

async fn run_step(
    proxy: &BatchedContextProxy,
    channel: &RecordingChannel,
    step: &Step,
) -> std::result::Result<Option<Value>, ProxyError> {
    match step {
        Step::Enqueue { name, method, args } => {
            proxy.enqueue(name.as_str(), *method, args.clone()).await?;
        }
        Step::BeginBatch => proxy.begin_batch().await?,
        Step::EndBatch => proxy.end_batch().await?,
        Step::Flush => proxy.flush().await?,
        Step::Property { name } => return proxy.get_property::<Value>(name).await.map(Some),
        Step::Call { method, args } => {
            return proxy
                .invoke_with_result::<Value>(method, args.clone())
                .await
                .map(Some)
        }
        Step::Resize => {
            let size = proxy.resize_query().await?;
            return Ok(Some(json!([size.width, size.height])));
        }
        Step::Dispose => proxy.dispose_async().await,
        Step::Respond { method, value } => channel.respond_to(method.as_str(), value.clone()),
    }
    Ok(None)
}
