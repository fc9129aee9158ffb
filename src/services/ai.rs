// SPDX-License-Identifier: MIT

//! Gemini client for the assistive text features.
//!
//! Handles:
//! - Pickup descriptions from a photo
//! - Step-by-step route plans over ordered stops
//! - Personalized impact reports for citizens
//!
//! These calls are never made while a pickup transition is in flight.

use crate::error::AppError;
use crate::services::route::RouteStop;
use serde::{Deserialize, Serialize};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Shown in impact reports for citizens without badges.
pub const DEFAULT_BADGE_NAME: &str = "Eco-Explorer";

/// Gemini `generateContent` client.
#[derive(Clone)]
pub struct AiGateway {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl AiGateway {
    pub fn new(api_key: Option<String>, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: GEMINI_BASE_URL.to_string(),
            model,
            api_key,
        }
    }

    /// Point the client at a different endpoint (test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Describe the e-waste item in a photo.
    pub async fn describe_photo(&self, mime_type: &str, data_base64: &str) -> Result<String, AppError> {
        let parts = vec![
            Part::text(DESCRIBE_PROMPT),
            Part::inline(mime_type, data_base64),
        ];
        self.generate(parts).await
    }

    /// Turn ordered stops into a travel plan.
    pub async fn plan_route(&self, stops: &[RouteStop]) -> Result<String, AppError> {
        if stops.is_empty() {
            return Err(AppError::Validation(
                "No accepted pickups to plan a route for".to_string(),
            ));
        }
        self.generate(vec![Part::text(&route_prompt(stops))]).await
    }

    /// Short, encouraging impact summary for a citizen.
    pub async fn impact_report(&self, input: &ImpactReportInput) -> Result<String, AppError> {
        self.generate(vec![Part::text(&impact_report_prompt(input))])
            .await
    }

    async fn generate(&self, parts: Vec<Part>) -> Result<String, AppError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::AiGateway("GEMINI_API_KEY is not configured".to_string()))?;

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = GenerateRequest {
            contents: vec![Content { parts }],
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::AiGateway(e.to_string()))?;

        let parsed: GenerateResponse = check_response_json(response).await?;
        parsed
            .text()
            .ok_or_else(|| AppError::AiGateway("Model returned no text".to_string()))
    }
}

async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            tracing::warn!("Gemini rate limit hit (429)");
        }
        return Err(AppError::AiGateway(format!("HTTP {}: {}", status, body)));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::AiGateway(format!("JSON parse error: {}", e)))
}

// ─── Prompts ─────────────────────────────────────────────────────

const DESCRIBE_PROMPT: &str = "You are an expert in identifying e-waste items from images. \
Describe the e-waste item in this photo in two or three sentences: what it is, its \
approximate size and condition, and anything a collector should know before pickup.";

/// Inputs for the impact report prompt.
#[derive(Debug, Clone)]
pub struct ImpactReportInput {
    /// e.g. "2 Laptop(s), 1 Mobile(s)"
    pub contribution_summary: String,
    pub latest_badge: Option<String>,
    pub community_co2_kg: f64,
}

pub fn route_prompt(stops: &[RouteStop]) -> String {
    let mut prompt = String::from(
        "You are helping a recycling company plan an efficient pickup route. \
The stops below are already in visiting order. Write a short step-by-step \
travel plan for the collector.\n\nStops:\n",
    );
    for (i, stop) in stops.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. {} (lat {:.5}, lon {:.5}, {:.1} km from previous)\n",
            i + 1,
            stop.display_address,
            stop.lat,
            stop.lon,
            stop.leg_km
        ));
    }
    prompt
}

pub fn impact_report_prompt(input: &ImpactReportInput) -> String {
    let badge = input.latest_badge.as_deref().unwrap_or(DEFAULT_BADGE_NAME);
    format!(
        "You are an encouraging environmental assistant. Write a short, positive, \
personalized impact summary (2-3 sentences) for this citizen. Use a friendly tone \
and include one real-world analogy that makes the impact tangible.\n\n\
Contributions: {}\nLatest badge: {}\nCommunity CO2 reduced so far: {:.1} kg",
        input.contribution_summary, badge, input.community_co2_kg
    )
}

// ─── Wire types ──────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            inline_data: None,
        }
    }

    fn inline(mime_type: &str, data_base64: &str) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.to_string(),
                data: data_base64.to_string(),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}
