//! Narrative analysis from a remote chat-completions service.
//!
//! The service is optional. [`narrate`] bounds every call with a timeout,
//! retries transient failures with exponential backoff and, when the
//! service cannot help, hands back a local placeholder so the report is
//! still produced.

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{AiConfig, Config, ProviderConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::models::NarrativeRequest;
use crate::render::RunSection;

const SYSTEM_INSTRUCTION: &str = "You are a professional performance-test analyst. You read JMeter load-test reports and give precise, practical performance optimisation advice.";

/// Leading lines some services open with before the actual analysis
const PREAMBLES: [&str; 5] = ["好的，作为", "好的,作为", "sure, as", "okay, as", "ok, as"];

/// Longest error body kept from a failed call
const MAX_ERROR_BODY: usize = 512;

/// Ceiling for a single backoff delay
const MAX_BACKOFF: Duration = Duration::from_secs(60);

const PLACEHOLDER_NARRATIVE: &str = "# Performance analysis

## Overall assessment
The narrative service could not be reached, so no automated assessment was written. The detailed metrics below are complete and can be reviewed directly.

## What to check
- **Response times**: compare the mean, 90th, 95th and 99th percentile figures of each label against your targets.
- **Throughput**: check whether the TPS of each run meets the expected peak load.
- **Errors**: any non-zero error rate deserves a look at the error table and the failing response codes.
- **APDEX**: scores below 0.85 indicate that users will notice slowness.

## Next steps
1. Configure a credential for the narrative service and run the analysis again.
2. Review the statistics tables below for outliers in the meantime.
";

/// Something that turns a prompt into narrative text
pub trait NarrativeGenerator {
    fn generate(&self, request: &NarrativeRequest) -> impl Future<Output = Result<String>> + Send;
}

/// The narrative that ends up in the report
#[derive(Debug, Clone, PartialEq)]
pub struct Narrative {
    pub text: String,
    /// Set when `text` is the local placeholder rather than a service reply
    pub placeholder: bool,
}

impl Narrative {
    pub fn placeholder() -> Self {
        Self {
            text: PLACEHOLDER_NARRATIVE.to_string(),
            placeholder: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for OpenAI-compatible `/chat/completions` endpoints
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    model: String,
}

impl ChatCompletionsClient {
    /// Build a client for one provider. Fails when the provider has no
    /// credential or its endpoint is not a valid URL.
    pub fn new(provider: &ProviderConfig) -> Result<Self> {
        if provider.api_key.trim().is_empty() {
            return Err(Error::config("narrative provider has no API key"));
        }
        let endpoint = Url::parse(&provider.endpoint).map_err(|e| {
            Error::config(format!("invalid provider endpoint {}: {e}", provider.endpoint))
        })?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("arquebus/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key: provider.api_key.clone(),
            model: provider.model.clone(),
        })
    }

    /// Build a client for the provider selected in `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.selected_provider()?)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl NarrativeGenerator for ChatCompletionsClient {
    async fn generate(&self, request: &NarrativeRequest) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system_instruction },
                { "role": "user", "content": request.user_prompt },
            ],
            "max_tokens": request.max_output_tokens,
            "temperature": request.temperature,
        });

        debug!(endpoint = %self.endpoint, model = %self.model, "Calling narrative service");
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let body: String = text.chars().take(MAX_ERROR_BODY).collect();
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatResponse =
            serde_json::from_str(&text).map_err(|e| Error::MalformedResponse(e.to_string()))?;
        reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| Error::MalformedResponse("reply carried no message content".into()))
    }
}

fn backoff_for(retry: &RetryConfig) -> ExponentialBackoff {
    let initial = Duration::from_millis(retry.initial_backoff_ms);
    let mut backoff = ExponentialBackoff {
        initial_interval: initial,
        current_interval: initial,
        max_interval: MAX_BACKOFF.max(initial),
        multiplier: retry.multiplier,
        randomization_factor: 0.0,
        max_elapsed_time: None,
        ..Default::default()
    };
    backoff.reset();
    backoff
}

/// Ask `generator` for a narrative, falling back to the local placeholder.
///
/// Each attempt is bounded by `timeout`. Timeouts, transport errors,
/// throttling and server errors are retried up to `retry.max_attempts`
/// calls in total; any other failure gives up at once. Passing no
/// generator yields the placeholder straight away.
pub async fn narrate<G: NarrativeGenerator>(
    generator: Option<&G>,
    request: &NarrativeRequest,
    retry: &RetryConfig,
    timeout: Duration,
) -> Narrative {
    let Some(generator) = generator else {
        warn!("No narrative service credential configured, using placeholder analysis");
        return Narrative::placeholder();
    };

    let attempts = retry.max_attempts.max(1);
    let mut backoff = backoff_for(retry);

    for attempt in 1..=attempts {
        let result = match tokio::time::timeout(timeout, generator.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                seconds: timeout.as_secs(),
            }),
        };

        match result {
            Ok(text) => {
                let text = strip_preamble(&text);
                if text.trim().is_empty() {
                    warn!(attempt, "Narrative service returned only a preamble, using placeholder analysis");
                    return Narrative::placeholder();
                }
                info!(attempt, chars = text.chars().count(), "Narrative received");
                return Narrative {
                    text,
                    placeholder: false,
                };
            }
            Err(e) if e.is_retryable() && attempt < attempts => {
                let delay = backoff
                    .next_backoff()
                    .unwrap_or(Duration::from_millis(retry.initial_backoff_ms));
                warn!(attempt, error = %e, delay = ?delay, "Narrative call failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                warn!(attempt, error = %e, "Narrative call failed, using placeholder analysis");
                return Narrative::placeholder();
            }
        }
    }

    Narrative::placeholder()
}

/// Drop a conversational opening line ("Sure, as a performance analyst...")
/// ahead of the analysis itself
pub fn strip_preamble(text: &str) -> String {
    let text = text.trim_start();
    let (first, rest) = text.split_once('\n').unwrap_or((text, ""));
    let lowered = first.trim().to_lowercase();

    if PREAMBLES.iter().any(|p| lowered.starts_with(p)) {
        rest.trim_start().to_string()
    } else {
        text.to_string()
    }
}

fn pipe_cell(cell: &str) -> String {
    cell.replace('|', "/").replace('\n', " ")
}

/// Build the prompt describing every run linked from one summary
pub fn build_prompt(summary_name: &str, runs: &[RunSection], ai: &AiConfig) -> NarrativeRequest {
    let mut prompt = format!(
        "Analyse the JMeter load-test results below, taken from the summary report {summary_name}.\n\n"
    );

    for (index, run) in runs.iter().enumerate() {
        let dashboard = &run.dashboard;
        prompt.push_str(&format!("## Report {}: {}\n\n", index + 1, run.name));

        if !dashboard.test_info.is_empty() {
            prompt.push_str("### Test information\n");
            for (key, value) in &dashboard.test_info {
                prompt.push_str(&format!("- {key}: {value}\n"));
            }
            prompt.push('\n');
        }

        if let Some(score) = &dashboard.apdex.score {
            prompt.push_str("### APDEX\n");
            match &dashboard.apdex.level {
                Some(level) => prompt.push_str(&format!("- Score: {score} ({level})\n\n")),
                None => prompt.push_str(&format!("- Score: {score}\n\n")),
            }
        }

        if dashboard.has_statistics() {
            let table = &dashboard.statistics;
            prompt.push_str("### Statistics\n");
            let header: Vec<String> = table.headers.iter().map(|h| pipe_cell(h)).collect();
            prompt.push_str(&format!("| {} |\n", header.join(" | ")));
            prompt.push_str(&format!("|{}\n", " --- |".repeat(header.len())));
            for row in &table.rows {
                let cells: Vec<String> = row.iter().map(|c| pipe_cell(c)).collect();
                prompt.push_str(&format!("| {} |\n", cells.join(" | ")));
            }
            prompt.push('\n');
        }

        if !dashboard.errors.is_empty() {
            prompt.push_str("### Errors\n");
            for record in dashboard.errors.records() {
                let line: Vec<String> = record.iter().map(|(h, v)| format!("{h}: {v}")).collect();
                prompt.push_str(&format!("- {}\n", line.join(", ")));
            }
            prompt.push('\n');
        }

        if let Some(tps) = &run.tps {
            prompt.push_str(&format!(
                "### Throughput\n- Total requests: {}\n- Duration: {:.2} s\n- Average TPS: {:.2}\n- Peak TPS: {:.2}\n\n",
                tps.total_requests, tps.test_duration_seconds, tps.average_tps, tps.peak_tps
            ));
        }
    }

    prompt.push_str(
        "Please cover:\n\
         1. Response times: mean, median and the 90th/95th/99th percentiles per label.\n\
         2. Throughput: whether TPS is adequate and stable.\n\
         3. Errors: error rates, failing labels and likely causes.\n\
         4. APDEX: what the score says about user satisfaction.\n\
         5. Concrete optimisation advice, most important first.\n\n",
    );
    prompt.push_str(&format!(
        "Write the analysis in {}, formatted as Markdown with headings, lists and tables where useful.\n",
        ai.language
    ));

    NarrativeRequest {
        system_instruction: SYSTEM_INSTRUCTION.to_string(),
        user_prompt: prompt,
        max_output_tokens: ai.max_tokens,
        temperature: ai.temperature,
    }
}
