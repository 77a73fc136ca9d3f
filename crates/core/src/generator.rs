use crate::chunking::normalize_whitespace;
use crate::error::GenerationError;
use crate::models::{CoverageChecklist, RetrievedChunk};
use crate::summary::Confidence;
use crate::traits::AnswerGenerator;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;

const SNIPPET_CHARS: usize = 300;

const COVERAGE_INSTRUCTIONS: &str = "You are a pet insurance claims assistant. Decide whether the \
described incident is covered using only the policy excerpts provided. Reply with a single JSON \
object with the keys isCovered (boolean), confidence (\"high\", \"medium\" or \"low\"), \
explanation (string), requiredDocuments (array of strings), actionSteps (array of strings), \
relevantExclusions (array of strings) and waitingPeriodNotes (string or null). If the excerpts \
do not settle the question, set confidence to \"low\".";

const COMPARISON_INSTRUCTIONS: &str = "You are a pet insurance advisor comparing two policies. \
Answer the question using only the excerpts for Policy 1 and Policy 2. Name the policy each \
statement comes from and say so when the excerpts do not cover the question.";

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*\})\s*```").expect("code fence pattern is valid")
});

#[derive(Debug, Clone)]
pub struct ChatCompletionConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

/// Client for OpenAI-compatible `POST {base}/chat/completions` endpoints.
pub struct ChatCompletionGenerator {
    client: Client,
    config: ChatCompletionConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionGenerator {
    pub fn new(mut config: ChatCompletionConfig) -> Result<Self, GenerationError> {
        while config.base_url.ends_with('/') {
            config.base_url.pop();
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: 0.0,
        };

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .json(&body);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            tracing::error!(%status, %details, "chat completion request failed");
            return Err(GenerationError::Server {
                status: status.as_u16(),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)
    }
}

#[async_trait]
impl AnswerGenerator for ChatCompletionGenerator {
    async fn coverage_checklist(
        &self,
        incident_description: &str,
        passages: &[RetrievedChunk],
    ) -> Result<CoverageChecklist, GenerationError> {
        let prompt = format!(
            "Incident:\n{incident_description}\n\nPolicy excerpts:\n{}",
            format_passages(passages)
        );
        let content = self.complete(COVERAGE_INSTRUCTIONS, &prompt).await?;
        parse_checklist(&content)
    }

    async fn compare(
        &self,
        question: &str,
        policy1_passages: &[RetrievedChunk],
        policy2_passages: &[RetrievedChunk],
    ) -> Result<String, GenerationError> {
        let prompt = format!(
            "Question:\n{question}\n\nPolicy 1 excerpts:\n{}\n\nPolicy 2 excerpts:\n{}",
            format_passages(policy1_passages),
            format_passages(policy2_passages)
        );
        let answer = self.complete(COMPARISON_INSTRUCTIONS, &prompt).await?;
        Ok(answer.trim().to_string())
    }
}

/// Answers from the retrieved passages alone. Used when no language model
/// endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractiveGenerator;

#[async_trait]
impl AnswerGenerator for ExtractiveGenerator {
    async fn coverage_checklist(
        &self,
        _incident_description: &str,
        passages: &[RetrievedChunk],
    ) -> Result<CoverageChecklist, GenerationError> {
        let explanation = match passages.first() {
            Some(best) => format!(
                "Automatic assessment is unavailable. The most relevant policy passage{} reads: \"{}\"",
                best.page_number
                    .map(|page| format!(" (page {page})"))
                    .unwrap_or_default(),
                snippet(&best.text)
            ),
            None => "No relevant policy passages were found for this incident.".to_string(),
        };

        Ok(CoverageChecklist {
            is_covered: false,
            confidence: Confidence::Low,
            explanation,
            required_documents: vec![
                "Itemized veterinary invoice".to_string(),
                "Medical records for the incident".to_string(),
            ],
            action_steps: vec![
                "Review the cited policy passages".to_string(),
                "Confirm coverage with the insurer before submitting a claim".to_string(),
            ],
            ..CoverageChecklist::default()
        })
    }

    async fn compare(
        &self,
        _question: &str,
        policy1_passages: &[RetrievedChunk],
        policy2_passages: &[RetrievedChunk],
    ) -> Result<String, GenerationError> {
        let describe = |label: &str, passages: &[RetrievedChunk]| match passages.first() {
            Some(best) => format!("{label}: \"{}\"", snippet(&best.text)),
            None => format!("{label}: no relevant passages found."),
        };

        Ok(format!(
            "{}\n\n{}",
            describe("Policy 1", policy1_passages),
            describe("Policy 2", policy2_passages)
        ))
    }
}

pub fn format_passages(passages: &[RetrievedChunk]) -> String {
    if passages.is_empty() {
        return "(no relevant excerpts found)".to_string();
    }

    passages
        .iter()
        .map(|passage| match passage.page_number {
            Some(page) => format!("[page {page}] {}", passage.text.trim()),
            None => passage.text.trim().to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n---\n")
}

/// Models often wrap JSON in a code fence or add a sentence around it.
pub fn parse_checklist(content: &str) -> Result<CoverageChecklist, GenerationError> {
    let candidate = match CODE_FENCE.captures(content).and_then(|captures| captures.get(1)) {
        Some(fenced) => fenced.as_str(),
        None => match (content.find('{'), content.rfind('}')) {
            (Some(start), Some(end)) if start < end => &content[start..=end],
            _ => content,
        },
    };

    Ok(serde_json::from_str(candidate)?)
}

fn snippet(text: &str) -> String {
    let normalized = normalize_whitespace(text);
    if normalized.chars().count() <= SNIPPET_CHARS {
        return normalized;
    }
    let cut = normalized.chars().take(SNIPPET_CHARS).collect::<String>();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn passage(text: &str, page: u32) -> RetrievedChunk {
        RetrievedChunk {
            text: text.to_string(),
            score: 0.1,
            page_number: Some(page),
            document_id: Some("doc-1".to_string()),
            policy_id: Some("p1".to_string()),
        }
    }

    fn generator(server: &MockServer) -> ChatCompletionGenerator {
        ChatCompletionGenerator::new(ChatCompletionConfig {
            base_url: format!("{}/v1", server.uri()),
            api_key: Some("sk-test".to_string()),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 512,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn completion(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        }))
    }

    #[test]
    fn checklist_is_parsed_from_code_fence() {
        let content = "Here you go:\n```json\n{\"isCovered\": true, \"confidence\": \"medium\", \"actionSteps\": [\"File a claim\"]}\n```";
        let checklist = parse_checklist(content).unwrap();
        assert!(checklist.is_covered);
        assert_eq!(checklist.confidence, Confidence::Medium);
        assert_eq!(checklist.action_steps, vec!["File a claim"]);
    }

    #[test]
    fn checklist_is_parsed_from_surrounding_prose() {
        let content = "Assessment {\"isCovered\": false, \"confidence\": \"high\"} done.";
        let checklist = parse_checklist(content).unwrap();
        assert!(!checklist.is_covered);
        assert_eq!(checklist.confidence, Confidence::High);
    }

    #[test]
    fn non_json_output_is_a_parse_error() {
        assert!(matches!(
            parse_checklist("I cannot tell."),
            Err(GenerationError::Parse(_))
        ));
    }

    #[test]
    fn passages_are_labelled_with_pages() {
        let formatted = format_passages(&[passage(" Accidents covered ", 2), passage("Exclusions", 7)]);
        assert_eq!(formatted, "[page 2] Accidents covered\n---\n[page 7] Exclusions");
        assert_eq!(format_passages(&[]), "(no relevant excerpts found)");
    }

    #[tokio::test]
    async fn coverage_checklist_posts_incident_and_excerpts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({ "model": "gpt-4o-mini", "temperature": 0.0 })))
            .respond_with(completion(
                "{\"isCovered\": true, \"confidence\": \"high\", \"requiredDocuments\": [\"Invoice\"]}",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let checklist = generator(&server)
            .coverage_checklist("My dog swallowed a sock", &[passage("Foreign body ingestion is covered", 3)])
            .await
            .unwrap();

        assert!(checklist.is_covered);
        assert_eq!(checklist.required_documents, vec!["Invoice"]);

        let requests = server.received_requests().await.unwrap();
        let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let user_prompt = sent["messages"][1]["content"].as_str().unwrap();
        assert!(user_prompt.contains("swallowed a sock"));
        assert!(user_prompt.contains("[page 3] Foreign body ingestion is covered"));
    }

    #[tokio::test]
    async fn comparison_returns_trimmed_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(completion("  Policy 1 has the lower deductible.\n"))
            .mount(&server)
            .await;

        let answer = generator(&server)
            .compare("Which deductible is lower?", &[passage("$100", 1)], &[passage("$500", 2)])
            .await
            .unwrap();

        assert_eq!(answer, "Policy 1 has the lower deductible.");
    }

    #[tokio::test]
    async fn server_errors_and_empty_choices_are_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let generator = generator(&server);
        let first = generator.compare("q", &[], &[]).await;
        assert!(matches!(first, Err(GenerationError::Server { status: 500 })));
        let second = generator.compare("q", &[], &[]).await;
        assert!(matches!(second, Err(GenerationError::EmptyResponse)));
    }

    #[tokio::test]
    async fn extractive_generator_quotes_best_passage() {
        let checklist = ExtractiveGenerator
            .coverage_checklist("limp", &[passage("Orthopedic   conditions\nare covered", 5)])
            .await
            .unwrap();

        assert!(!checklist.is_covered);
        assert_eq!(checklist.confidence, Confidence::Low);
        assert!(checklist.explanation.contains("(page 5)"));
        assert!(checklist.explanation.contains("Orthopedic conditions are covered"));

        let comparison = ExtractiveGenerator
            .compare("q", &[passage("Plan A text", 1)], &[])
            .await
            .unwrap();
        assert!(comparison.contains("Policy 1: \"Plan A text\""));
        assert!(comparison.contains("Policy 2: no relevant passages found."));
    }

    #[test]
    fn long_snippets_are_truncated() {
        let long = "word ".repeat(200);
        let cut = snippet(&long);
        assert!(cut.ends_with("..."));
        assert!(cut.chars().count() <= SNIPPET_CHARS + 3);
    }
}
