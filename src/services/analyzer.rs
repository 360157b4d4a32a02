use std::sync::Arc;
use std::time::Instant;

use garde::Validate;

use crate::models::analysis::{
    AnalysisStatus, ChunkAnalysis, Classification, Issue, IssueSeverity,
};
use crate::models::check::CheckType;
use crate::services::llm::ChatModel;

const SECURITY_SYSTEM_PROMPT: &str = r#"You are a security auditor reviewing the source code of a third-party plugin before it is published. Plugins run inside a sandbox and interact with the host exclusively through the platform API.

The following platform API patterns are SAFE and must NOT be flagged:
- api.storage.get / api.storage.set: key-value storage scoped to the plugin
- api.http.request: outbound HTTP routed through the platform gateway with user consent
- api.ui.*: menus, dialogs, and panels rendered by the host
- api.events.on / api.events.emit: the plugin's own event bus
- reading the plugin's own manifest or declared settings

RED flags (status "danger", classification "unsafe" or "critical"):
- dynamic code execution: eval, new Function, loading and executing fetched code
- raw network access that bypasses the gateway: direct sockets, requests to hardcoded IP addresses
- access to the host filesystem or process environment outside the sandbox
- harvesting credentials, tokens, or other user data and sending it anywhere
- obfuscated or encoded payloads that hide what the code does
- spawning processes or shell commands

YELLOW flags (status "warning", classification "potentially_unsafe"):
- requesting broader permissions than the plugin's features need
- passing unvalidated user input into commands or queries
- hardcoded third-party endpoints receiving user content

GREEN (status "safe", classification "safe"): ordinary use of the platform API with no data leaving the sandbox except through the gateway.

Respond in English with ONLY a JSON object in exactly this shape:
{"status":"safe"|"warning"|"danger","classification":"safe"|"potentially_unsafe"|"unsafe"|"critical","shortDescription":"summary of at most 200 characters","issues":[{"type":"issue_type","severity":"low"|"medium"|"high"|"critical","description":"what was found","recommendation":"how to fix it"}]}"#;

const PERFORMANCE_SYSTEM_PROMPT: &str = r#"You are a performance reviewer for third-party plugin source code. Plugins share an event loop with the host, so runaway code degrades the whole application.

Flag the following:
- infinite or effectively unbounded loops: while(true) without await/break, recursion without a base case, busy-wait polling
- leaks: caches and arrays that only ever grow, intervals and event listeners that are registered but never cleared
- superlinear algorithms applied to unbounded input: nested loops over the full dataset, repeated string concatenation in loops, per-item synchronous I/O
- blocking the event loop: long synchronous computation without yielding

Classify honest but wasteful code as "warning"/"potentially_unsafe"; reserve "danger" for code that will predictably hang or exhaust memory.

Respond in English with ONLY a JSON object in exactly this shape:
{"status":"safe"|"warning"|"danger","classification":"safe"|"potentially_unsafe"|"unsafe"|"critical","shortDescription":"summary of at most 200 characters","issues":[{"type":"issue_type","severity":"low"|"medium"|"high"|"critical","description":"what was found","recommendation":"how to fix it"}]}"#;

fn system_prompt(check_type: CheckType) -> &'static str {
    match check_type {
        CheckType::Security => SECURITY_SYSTEM_PROMPT,
        CheckType::Performance => PERFORMANCE_SYSTEM_PROMPT,
    }
}

/// Runs one check-type analysis pass over one chunk of source text.
pub struct Analyzer {
    llm: Arc<dyn ChatModel>,
}

impl Analyzer {
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self { llm }
    }

    /// Analyze one chunk. Always returns a well-formed result: transport
    /// errors and malformed model output degrade to the check type's
    /// fallback verdict, never to an error. Callers need no error handling.
    pub async fn analyze_chunk(
        &self,
        plugin_name: &str,
        check_type: CheckType,
        chunk: &str,
        part: usize,
        total: usize,
    ) -> ChunkAnalysis {
        let user = format!(
            "Plugin: {plugin_name}\nPart {part} of {total}.\nAnalyze the following source code:\n```\n{chunk}\n```",
        );

        let started = Instant::now();
        let response = match self.llm.complete(system_prompt(check_type), &user).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    check_type = %check_type,
                    part,
                    total,
                    error = %e,
                    "model call failed, substituting fallback verdict"
                );
                metrics::counter!("verification_analysis_fallbacks_total").increment(1);
                return fallback_result(check_type);
            }
        };
        metrics::histogram!("verification_llm_request_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::debug!(
            check_type = %check_type,
            part,
            total,
            latency_ms = started.elapsed().as_millis() as u64,
            "model response received"
        );

        match parse_analysis(&response) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(
                    check_type = %check_type,
                    part,
                    error = %e,
                    "model response rejected, substituting fallback verdict"
                );
                metrics::counter!("verification_analysis_fallbacks_total").increment(1);
                fallback_result(check_type)
            }
        }
    }
}

/// Extract the first balanced JSON object from free-form model output and
/// validate it against the wire schema.
fn parse_analysis(response: &str) -> Result<ChunkAnalysis, ParseError> {
    let json = extract_json_object(response).ok_or(ParseError::NoJsonObject)?;
    let parsed: ChunkAnalysis = serde_json::from_str(json)?;
    parsed
        .validate()
        .map_err(|report| ParseError::Invalid(report.to_string()))?;
    Ok(parsed)
}

/// Find the first balanced `{...}` in the text, skipping braces inside JSON
/// string literals.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Canned verdict substituted when analysis output is unusable. Security
/// fails closed (an unreviewable plugin is treated as critical); performance
/// degrades to a warning.
pub fn fallback_result(check_type: CheckType) -> ChunkAnalysis {
    match check_type {
        CheckType::Security => ChunkAnalysis {
            status: AnalysisStatus::Danger,
            classification: Classification::Critical,
            short_description:
                "Security analysis failed; treat this code as unreviewed and audit it manually."
                    .to_string(),
            issues: vec![Issue {
                kind: "analysis_error".to_string(),
                severity: IssueSeverity::High,
                description: "The model response could not be interpreted as an analysis result."
                    .to_string(),
                recommendation: "Re-run the verification or audit the plugin manually.".to_string(),
            }],
        },
        CheckType::Performance => ChunkAnalysis {
            status: AnalysisStatus::Warning,
            classification: Classification::PotentiallyUnsafe,
            short_description:
                "Performance analysis failed; results for this section are incomplete.".to_string(),
            issues: vec![Issue {
                kind: "analysis_error".to_string(),
                severity: IssueSeverity::Medium,
                description: "The model response could not be interpreted as an analysis result."
                    .to_string(),
                recommendation: "Re-run the verification for a complete performance report."
                    .to_string(),
            }],
        },
    }
}

#[derive(Debug, thiserror::Error)]
enum ParseError {
    #[error("no JSON object found in model response")]
    NoJsonObject,

    #[error("malformed JSON in model response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("analysis result failed validation: {0}")]
    Invalid(String),
}
