use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

/// Single-shot prompt client for the description-generation and
/// relevance-search collaborators. Both are optional enhancements: every
/// caller has a deterministic fallback, so errors from here are absorbed and
/// never surface to the user.
#[derive(Clone, Debug)]
pub struct AiClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AiClient {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            http_client: Client::new(),
            base_url,
            api_key,
            model,
        }
    }

    async fn complete(&self, prompt: String) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let request_body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0.2,
        });

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .context("Completion request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Completion endpoint returned status {}", response.status());
        }

        let payload: Value = response
            .json()
            .await
            .context("Failed to parse completion response")?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .context("Completion response missing content")?;

        Ok(content.trim().to_string())
    }

    /// Generate a description from the video title alone.
    #[tracing::instrument(name = "Generate video description", skip(self))]
    pub async fn generate_description(&self, video_title: &str) -> Result<String> {
        let prompt = format!(
            "You are an expert at writing engaging and informative video descriptions.\n\n\
             Based on the title of the video, generate a concise description that accurately \
             reflects the video's content and entices viewers to watch it. Return only the \
             description text.\n\nVideo Title: {}",
            video_title
        );

        let description = self.complete(prompt).await?;
        debug!("Generated {} description characters", description.len());
        Ok(description)
    }

    /// Ask the collaborator which of the given titles match the query. Takes
    /// the query plus parallel title/description arrays and returns the
    /// matching subset of titles.
    #[tracing::instrument(name = "Relevance search", skip(self, titles, descriptions))]
    pub async fn search_titles(
        &self,
        query: &str,
        titles: &[String],
        descriptions: &[String],
    ) -> Result<Vec<String>> {
        let prompt = format!(
            "You are a video search assistant. Given a search query and a list of video titles \
             and descriptions, return the video titles that match the search query, even if the \
             keywords don't exactly match.\n\n\
             Search Query: {}\n\n\
             Video Titles: {}\n\n\
             Video Descriptions: {}\n\n\
             Respond with a JSON array of the matching titles and nothing else.",
            query,
            titles.join(", "),
            descriptions.join(", "),
        );

        let content = self.complete(prompt).await?;
        let matching: Vec<String> = serde_json::from_str(strip_code_fence(&content))
            .context("Relevance response was not a JSON array of titles")?;

        debug!("Relevance search matched {} titles", matching.len());
        Ok(matching)
    }
}

/// Models routinely wrap JSON answers in a markdown fence.
fn strip_code_fence(content: &str) -> &str {
    content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}
