//! OpenAI-compatible adapter for review classification and claim comparison.
//!
//! Supports OpenAI API, Azure OpenAI, and local Ollama instances.
//! Returns the raw message content; the core normalizes it. HTTP failures are mapped to
//! transient (408, 429, 5xx, connection errors) or permanent (other 4xx) domain errors.

use crate::domain::{DomainError, MarketingClaim, SentimentGroup};
use crate::ports::{AiPort, ClassificationRequest};
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fallback wait when a 429 carries no usable `Retry-After`.
const DEFAULT_RATE_LIMIT_SECS: u64 = 5;

/// OpenAI-compatible AI adapter.
///
/// Can be configured to work with:
/// - OpenAI API (api.openai.com)
/// - Azure OpenAI
/// - Ollama (localhost)
/// - Any OpenAI-compatible API
pub struct OpenAiAdapter {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiAdapter {
    /// Create a new OpenAI adapter.
    ///
    /// # Arguments
    /// * `api_url` - API endpoint (e.g., "https://api.openai.com/v1/chat/completions")
    /// * `api_key` - API key (can be empty for local Ollama)
    /// * `model` - Model name (e.g., "gpt-4o-mini", "llama3.2")
    /// * `timeout` - Client-level request timeout
    pub fn new(
        api_url: String,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::InvalidInput(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_url,
            api_key,
            model,
        })
    }

    /// System prompt for chunk classification, tuned per sentiment group.
    fn classify_prompt(group: SentimentGroup) -> String {
        let focus = match group {
            SentimentGroup::Positive5 => {
                "These are 5-star reviews. Focus on advantages, but do not miss complaints or suggestions."
            }
            SentimentGroup::Neutral43 => {
                "These are 3-4 star reviews. Expect a balance of advantages and disadvantages."
            }
            SentimentGroup::Negative21 => {
                "These are 1-2 star reviews. Focus on disadvantages, but do not miss positive remarks."
            }
        };
        format!(
            r#"You analyze customer reviews of cosmetics and health products.
Extract the concrete advantages and disadvantages customers mention.

## Rules
- Every meaningful statement in the reviews must appear under advantages or disadvantages.
- For each point, list the ids (first CSV column) of every review that mentions it.
- Keep the customers' own wording where possible. Do not generalize.
- {focus}

## Output Format
You MUST respond with valid JSON only. No markdown, no explanations outside JSON.

```json
{{
  "advantages": [
    {{"point": "specific advantage", "evidence": [12, 15], "details": "all relevant detail"}}
  ],
  "disadvantages": [
    {{"point": "specific disadvantage", "evidence": [3], "details": "all relevant detail"}}
  ],
  "summary": "2-3 sentence summary of this batch"
}}
```"#
        )
    }

    fn classify_user_prompt(request: &ClassificationRequest) -> String {
        format!(
            "Reviews of group {} ({} reviews), CSV format (Review;Rating;Text):\n\n{}",
            request.group, request.review_count, request.context_csv
        )
    }

    fn compare_prompt() -> &'static str {
        r#"You evaluate whether product marketing is trustworthy.
Compare ONE marketing claim with aggregated customer review evidence.

## Stance
- "conflicts": reviews clearly contradict the claim (claimed effect vs "no effect", "gentle" vs irritation).
- "supports": reviews confirm the claim.
- "neutral": reviews do not address the claim, or evidence is mixed and weak.
Report only clear contradictions. Individual differences and vague cases are "neutral".

## Output Format
You MUST respond with valid JSON only:

```json
{
  "stance": "supports|neutral|conflicts",
  "group": "positive_5|neutral_4_3|negative_2_1 (group holding the opposing evidence, or null)",
  "conflicting_points": ["exact review point texts that oppose the claim"],
  "evidence": "short quote or paraphrase of the deciding review evidence",
  "category": "efficacy|texture|quality|function|safety|other",
  "opposing_share": 0.0,
  "reasoning": "one or two sentences"
}
```
`opposing_share` is your estimate (0-1) of the share of reviews in that group opposing the claim."#
    }

    fn compare_user_prompt(claim: &MarketingClaim, evidence: &str) -> String {
        format!(
            "Marketing claim ({}): {}\n\nReview evidence:\n{}",
            claim.category.as_str(),
            claim.text,
            evidence
        )
    }

    /// Map a non-success status to a domain error.
    fn status_error(status: StatusCode, retry_after: Option<u64>, body: &str) -> DomainError {
        let snippet: String = body.chars().take(200).collect();
        match status {
            StatusCode::TOO_MANY_REQUESTS => DomainError::RateLimited {
                seconds: retry_after.unwrap_or(DEFAULT_RATE_LIMIT_SECS),
            },
            StatusCode::REQUEST_TIMEOUT => {
                DomainError::Transient(format!("API error {}: {}", status, snippet))
            }
            s if s.is_server_error() => {
                DomainError::Transient(format!("API error {}: {}", status, snippet))
            }
            _ => DomainError::Ai(format!("API error {}: {}", status, snippet)),
        }
    }

    fn transport_error(e: reqwest::Error) -> DomainError {
        if e.is_timeout() || e.is_connect() || e.is_request() {
            DomainError::Transient(format!("HTTP request failed: {}", e))
        } else {
            DomainError::Ai(format!("HTTP request failed: {}", e))
        }
    }

    async fn chat(&self, system: String, user: String) -> Result<String, DomainError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user,
                },
            ],
            temperature: 0.0,
            response_format: Some(ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %text, "AI API returned error");
            return Err(Self::status_error(status, retry_after, &text));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| DomainError::Transient(format!("Failed to read API response: {}", e)))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| DomainError::Ai("No response choices returned".to_string()))?;

        debug!(raw_len = content.len(), "received AI response");
        Ok(content)
    }
}

/// OpenAI API request structure.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

/// OpenAI API response structure.
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: String,
}

#[async_trait::async_trait]
impl AiPort for OpenAiAdapter {
    async fn classify(&self, request: &ClassificationRequest) -> Result<String, DomainError> {
        info!(
            product_id = request.product_id,
            unit = %request.unit,
            reviews = request.review_count,
            csv_len = request.context_csv.len(),
            "sending chunk to AI for classification"
        );
        self.chat(
            Self::classify_prompt(request.group),
            Self::classify_user_prompt(request),
        )
        .await
    }

    async fn compare(&self, claim: &MarketingClaim, evidence: &str) -> Result<String, DomainError> {
        info!(
            product_id = claim.product_id,
            claim_id = claim.id,
            evidence_len = evidence.len(),
            "sending claim to AI for comparison"
        );
        self.chat(
            Self::compare_prompt().to_string(),
            Self::compare_user_prompt(claim, evidence),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ClaimCategory;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            OpenAiAdapter::status_error(StatusCode::TOO_MANY_REQUESTS, Some(12), ""),
            DomainError::RateLimited { seconds: 12 }
        );
        assert_eq!(
            OpenAiAdapter::status_error(StatusCode::TOO_MANY_REQUESTS, None, ""),
            DomainError::RateLimited {
                seconds: DEFAULT_RATE_LIMIT_SECS
            }
        );
        assert!(OpenAiAdapter::status_error(StatusCode::REQUEST_TIMEOUT, None, "").is_transient());
        assert!(OpenAiAdapter::status_error(StatusCode::BAD_GATEWAY, None, "").is_transient());
        assert!(
            OpenAiAdapter::status_error(StatusCode::SERVICE_UNAVAILABLE, None, "").is_transient()
        );
        assert!(matches!(
            OpenAiAdapter::status_error(StatusCode::UNAUTHORIZED, None, "bad key"),
            DomainError::Ai(_)
        ));
        assert!(!OpenAiAdapter::status_error(StatusCode::BAD_REQUEST, None, "").is_transient());
    }

    #[test]
    fn test_prompts_carry_context() {
        let request = ClassificationRequest {
            product_id: 1,
            group: SentimentGroup::Negative21,
            unit: "negative_2_1#0".into(),
            review_count: 1,
            context_csv: "Review;Rating;Text\n3;1;irritated my skin\n".into(),
        };
        let user = OpenAiAdapter::classify_user_prompt(&request);
        assert!(user.contains("negative_2_1"));
        assert!(user.contains("irritated my skin"));
        assert!(OpenAiAdapter::classify_prompt(SentimentGroup::Negative21).contains("1-2 star"));

        let claim = MarketingClaim {
            id: 1,
            product_id: 1,
            category: ClaimCategory::Safety,
            text: "Suitable for all skin types".into(),
        };
        let user = OpenAiAdapter::compare_user_prompt(&claim, "- irritated my skin");
        assert!(user.contains("(safety)"));
        assert!(user.contains("Suitable for all skin types"));
    }
}
