//! Finding generation: prompt construction, model fan-out, response decoding
//!
//! Each batch becomes one model call. Batches run concurrently up to a fixed
//! parallelism limit; a failing batch yields zero findings and never aborts
//! the document's analysis.

use futures::stream::{self, StreamExt};
use shared_types::{Control, Finding, Framework};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::batching::{Batch, PROMPT_BLOCK_TEXT_CAP};
use crate::model::ModelClient;

/// Findings accepted per batch; the prompt also asks for at most this many
pub const MAX_FINDINGS_PER_BATCH: usize = 4;

/// Concurrent in-flight model calls
pub const MAX_CONCURRENT_BATCHES: usize = 3;

/// Controls embedded in each prompt
pub const CONTROLS_IN_PROMPT: usize = 12;

/// Requirement text is truncated to this length in the controls summary
const REQUIREMENT_CAP: usize = 160;

/// Truncate on a char boundary
fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Render the top controls (by severity) as a prompt block
pub fn render_controls_summary(controls: &[Control]) -> String {
    let mut sorted: Vec<&Control> = controls.iter().collect();
    sorted.sort_by_key(|c| c.severity.rank());
    sorted.truncate(CONTROLS_IN_PROMPT);

    sorted
        .iter()
        .map(|c| {
            format!(
                "- {} [{}] ({}): {}",
                c.control_id,
                c.severity.label(),
                c.category,
                truncate_chars(&c.requirement, REQUIREMENT_CAP)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the analysis prompt for one batch
pub fn build_prompt(
    batch: &Batch,
    controls_summary: &str,
    framework: Framework,
    max_findings: usize,
) -> String {
    let mut blocks_text = String::new();
    for block in &batch.blocks {
        let header_tag = if block.is_header { " | header" } else { "" };
        blocks_text.push_str(&format!(
            "[page {} | block {}{}] {}\n",
            block.page_number,
            block.block_index,
            header_tag,
            truncate_chars(&block.text, PROMPT_BLOCK_TEXT_CAP)
        ));
    }

    format!(
        "You are reviewing a document for {framework} compliance.\n\
         \n\
         Controls to check:\n\
         {controls_summary}\n\
         \n\
         Document excerpts:\n\
         {blocks_text}\n\
         Identify compliance issues in the excerpts above. Respond with ONLY a \
         JSON array (no prose, no code fences). Each element must have: \
         page_number (int), block_index (int, copied from the excerpt tag), \
         control_id (string), severity (\"high\"|\"medium\"|\"low\"), \
         issue_description (string), bookmark_type (\"verify\"|\"review\"|\
         \"info\"|\"action_required\"), suggested_action (string). Report at \
         most {max_findings} findings, prioritizing high and medium severity. \
         Return [] if the excerpts are compliant."
    )
}

/// Strip Markdown code-fence wrappers the model sometimes adds
pub fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the fence line (may carry a language tag), then the closing fence
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or(rest);
    body.trim().strip_suffix("```").unwrap_or(body).trim()
}

/// Decode a model response into validated findings.
///
/// The response is untrusted: decode failure means zero findings for the
/// batch, and individual items that miss the schema are dropped.
pub fn parse_findings(response: &str, max: usize) -> Vec<Finding> {
    let stripped = strip_code_fences(response);

    let value: serde_json::Value = match serde_json::from_str(stripped) {
        Ok(v) => v,
        Err(e) => {
            warn!("model response was not valid JSON: {}", e);
            return Vec::new();
        }
    };

    let items = match value {
        serde_json::Value::Array(items) => items,
        _ => {
            warn!("model response was not a JSON array");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Finding>(item) {
            Ok(finding) => Some(finding),
            Err(e) => {
                debug!("dropping finding that misses the schema: {}", e);
                None
            }
        })
        .take(max)
        .collect()
}

/// Generates findings from batches via the model client
pub struct FindingGenerator {
    model: Arc<dyn ModelClient>,
    max_findings_per_batch: usize,
    max_concurrent: usize,
}

impl FindingGenerator {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self {
            model,
            max_findings_per_batch: MAX_FINDINGS_PER_BATCH,
            max_concurrent: MAX_CONCURRENT_BATCHES,
        }
    }

    pub fn with_limits(mut self, max_findings_per_batch: usize, max_concurrent: usize) -> Self {
        self.max_findings_per_batch = max_findings_per_batch;
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Analyze one batch. Model failures degrade to an empty finding list.
    pub async fn generate(
        &self,
        batch: &Batch,
        controls_summary: &str,
        framework: Framework,
    ) -> Vec<Finding> {
        let prompt = build_prompt(batch, controls_summary, framework, self.max_findings_per_batch);
        match self.model.invoke(&prompt).await {
            Ok(response) => parse_findings(&response, self.max_findings_per_batch),
            Err(e) => {
                warn!(
                    "model call failed for batch covering pages {:?}: {}",
                    batch.pages, e
                );
                Vec::new()
            }
        }
    }

    /// Analyze all batches with bounded parallelism and fan back in.
    ///
    /// Completion order is not deterministic; the aggregator re-sorts, so
    /// result determinism does not depend on it.
    pub async fn generate_all(
        &self,
        batches: &[Batch],
        controls_summary: &str,
        framework: Framework,
    ) -> Vec<Finding> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));

        let mut tasks = Vec::with_capacity(batches.len());
        for batch in batches {
            let prompt =
                build_prompt(batch, controls_summary, framework, self.max_findings_per_batch);
            let pages = batch.pages.clone();
            let sem = semaphore.clone();
            let model = self.model.clone();
            let max = self.max_findings_per_batch;

            tasks.push(async move {
                let _permit = sem.acquire().await.unwrap();
                match model.invoke(&prompt).await {
                    Ok(response) => parse_findings(&response, max),
                    Err(e) => {
                        warn!("model call failed for batch covering pages {:?}: {}", pages, e);
                        Vec::new()
                    }
                }
            });
        }

        let results: Vec<Vec<Finding>> = stream::iter(tasks)
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        results.into_iter().flatten().collect()
    }
}
