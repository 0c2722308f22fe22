//! Gemini `generateContent` request and response bodies.

use serde::{Deserialize, Serialize};

use super::provider::{GroundingReference, ResponseUnit};

pub const ROLE_USER: &str = "user";
pub const ROLE_MODEL: &str = "model";

const FINISH_STOP: &str = "STOP";
const FINISH_UNSPECIFIED: &str = "FINISH_REASON_UNSPECIFIED";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_role(ROLE_USER, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::with_role(ROLE_MODEL, text)
    }

    /// System instructions carry no role.
    pub fn instruction(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }

    fn with_role(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![Part::text(text)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            thought: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub google_search: GoogleSearch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct GoogleSearch {}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub contents: &'a [Content],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GroundingChunk {
    #[serde(default)]
    pub web: Option<WebSource>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WebSource {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ApiError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}

impl GenerateContentResponse {
    /// Visible text of the first candidate. Thought parts are left out.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text = content
            .parts
            .iter()
            .filter(|part| part.thought != Some(true))
            .filter_map(|part| part.text.as_deref())
            .collect::<String>();

        if text.is_empty() { None } else { Some(text) }
    }

    pub fn grounding(&self) -> Vec<GroundingReference> {
        self.candidates
            .first()
            .and_then(|candidate| candidate.grounding_metadata.as_ref())
            .map(|metadata| {
                metadata
                    .grounding_chunks
                    .iter()
                    .filter_map(|chunk| chunk.web.as_ref())
                    .map(|web| GroundingReference {
                        uri: web.uri.clone(),
                        title: web.title.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Why generation was cut off, if it was.
    ///
    /// A blocked prompt and any finish reason other than `STOP` count.
    pub fn stop_reason(&self) -> Option<String> {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
        {
            return Some(format!("prompt blocked ({reason})"));
        }

        let reason = self.candidates.first()?.finish_reason.as_deref()?;
        match reason {
            FINISH_STOP | FINISH_UNSPECIFIED => None,
            other => Some(format!("generation stopped ({other})")),
        }
    }

    pub fn to_unit(&self) -> ResponseUnit {
        ResponseUnit {
            text: self.text(),
            grounding: self.grounding(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_gemini_field_names() {
        let contents = vec![Content::user("离婚财产如何分割")];
        let request = GenerateContentRequest {
            system_instruction: Some(Content::instruction("你是律师")),
            contents: &contents,
            tools: vec![Tool::default()],
            generation_config: GenerationConfig { temperature: 0.3 },
        };

        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "systemInstruction": { "parts": [{ "text": "你是律师" }] },
                "contents": [{ "role": "user", "parts": [{ "text": "离婚财产如何分割" }] }],
                "tools": [{ "googleSearch": {} }],
                "generationConfig": { "temperature": 0.3 }
            })
        );
    }

    #[test]
    fn request_without_grounding_omits_tools() {
        let request = GenerateContentRequest {
            system_instruction: None,
            contents: &[],
            tools: Vec::new(),
            generation_config: GenerationConfig { temperature: 1.0 },
        };

        let value = serde_json::to_value(&request).unwrap();

        assert!(value.get("tools").is_none());
        assert!(value.get("systemInstruction").is_none());
    }

    #[test]
    fn response_maps_text_and_grounding_chunks() {
        let payload = r#"{
            "candidates": [{
                "content": { "role": "model", "parts": [
                    { "text": "根据《民法典》" },
                    { "text": "hidden", "thought": true },
                    { "text": "第一千零八十七条" }
                ]},
                "groundingMetadata": { "groundingChunks": [
                    { "web": { "uri": "https://flk.npc.gov.cn/a", "title": "npc" } },
                    { "retrievedContext": {} },
                    { "web": { "title": "no uri" } }
                ]}
            }],
            "usageMetadata": { "promptTokenCount": 3 }
        }"#;

        let response: GenerateContentResponse = serde_json::from_str(payload).unwrap();
        let unit = response.to_unit();

        assert_eq!(unit.text.as_deref(), Some("根据《民法典》第一千零八十七条"));
        assert_eq!(unit.grounding.len(), 2);
        assert_eq!(
            unit.grounding[0].uri.as_deref(),
            Some("https://flk.npc.gov.cn/a")
        );
        assert_eq!(unit.grounding[1].uri, None);
    }

    #[test]
    fn response_without_candidates_is_empty_unit() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{ "usageMetadata": {} }"#).unwrap();

        assert_eq!(response.to_unit(), ResponseUnit::default());
    }

    #[test]
    fn blocked_prompt_and_abnormal_finish_are_reported() {
        let blocked: GenerateContentResponse =
            serde_json::from_str(r#"{ "promptFeedback": { "blockReason": "SAFETY" } }"#).unwrap();
        assert_eq!(blocked.stop_reason().as_deref(), Some("prompt blocked (SAFETY)"));

        let recitation: GenerateContentResponse = serde_json::from_str(
            r#"{ "candidates": [{ "finishReason": "RECITATION" }] }"#,
        )
        .unwrap();
        assert_eq!(
            recitation.stop_reason().as_deref(),
            Some("generation stopped (RECITATION)")
        );

        let finished: GenerateContentResponse = serde_json::from_str(
            r#"{ "candidates": [{ "content": { "parts": [{ "text": "完" }] }, "finishReason": "STOP" }] }"#,
        )
        .unwrap();
        assert_eq!(finished.stop_reason(), None);
        assert_eq!(
            GenerateContentResponse::default().stop_reason(),
            None
        );
    }

    #[test]
    fn response_error_object_is_decoded() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{ "error": { "code": 429, "message": "quota", "status": "RESOURCE_EXHAUSTED" } }"#,
        )
        .unwrap();

        let error = response.error.unwrap();
        assert_eq!(error.code, Some(429));
        assert_eq!(error.message, "quota");
    }
}
