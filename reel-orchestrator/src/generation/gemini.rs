//! Gemini generateContent provider

use async_trait::async_trait;
use reel_core::domain::render::Backend;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{GenerationError, LlmProvider};

const TEMPERATURE: f32 = 0.9;

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(client: Client, api_key: String, model: String, base_url: String) -> Self {
        Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

fn build_request<'a>(system_prompt: &'a str, user_prompt: &'a str) -> GenerateRequest<'a> {
    GenerateRequest {
        system_instruction: Content {
            role: None,
            parts: [Part {
                text: system_prompt,
            }],
        },
        contents: [Content {
            role: Some("user"),
            parts: [Part { text: user_prompt }],
        }],
        generation_config: GenerationConfig {
            temperature: TEMPERATURE,
            response_mime_type: "application/json",
        },
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn backend(&self) -> Backend {
        Backend::Gemini
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, GenerationError> {
        let transport = |source| GenerationError::Transport {
            backend: Backend::Gemini,
            source,
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&build_request(system_prompt, user_prompt))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Provider {
                backend: Backend::Gemini,
                status: status.as_u16(),
                body,
            });
        }

        let reply: GenerateResponse = response.json().await.map_err(transport)?;
        extract_text(reply)
    }
}

/// Joins the text parts of the first candidate
fn extract_text(reply: GenerateResponse) -> Result<String, GenerationError> {
    let text: String = reply
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(GenerationError::Malformed(
            "gemini reply has no text".to_string(),
        ));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_uses_json_mime_type() {
        let json = serde_json::to_value(build_request("sys", "draw")).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "sys");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "draw");
        assert_eq!(
            json["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn test_endpoint_includes_model() {
        let provider = GeminiProvider::new(
            Client::new(),
            "key".to_string(),
            "gemini-2.5-flash".to_string(),
            "https://example.test/".to_string(),
        );
        assert_eq!(
            provider.endpoint(),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_parts_are_joined() {
        let reply: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"status\":"},{"text":"\"rejected\"}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(reply).unwrap(), r#"{"status":"rejected"}"#);
    }

    #[test]
    fn test_missing_candidates_are_malformed() {
        let reply: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            extract_text(reply),
            Err(GenerationError::Malformed(_))
        ));
    }
}
