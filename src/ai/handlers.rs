use std::time::Duration;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::instrument;

use crate::{auth::jwt::AuthUser, error::AppError, messages::services as inbox, state::AppState};

use super::analysis::{self, Cluster};
use super::suggestions;

#[derive(Debug, Serialize)]
pub struct AiResult {
    pub clusters: Vec<Cluster>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub success: bool,
    pub source: &'static str,
    pub ai_result: AiResult,
}

#[derive(Debug, Serialize)]
pub struct SuggestionsResponse {
    pub success: bool,
    pub source: &'static str,
    pub suggestions: Vec<String>,
}

pub fn ai_routes() -> Router<AppState> {
    Router::new()
        .route("/analyze-messages", get(analyze_messages))
        .route("/suggest-messages", post(suggest_messages))
}

fn ai_timeout(state: &AppState) -> Duration {
    Duration::from_secs(state.config.ai.timeout_secs.max(1))
}

#[instrument(skip(state))]
pub async fn analyze_messages(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<AnalysisResponse>, AppError> {
    let contents: Vec<String> = inbox::list(&state, user_id)
        .await?
        .into_iter()
        .map(|m| m.content)
        .collect();
    let analysis = analysis::analyze(state.ai.as_ref(), &contents, ai_timeout(&state)).await;
    Ok(Json(AnalysisResponse {
        success: true,
        source: analysis.source(),
        ai_result: AiResult {
            clusters: analysis.into_clusters(),
        },
    }))
}

#[instrument(skip(state))]
pub async fn suggest_messages(State(state): State<AppState>) -> Json<SuggestionsResponse> {
    let suggestions = suggestions::suggest(state.ai.as_ref(), ai_timeout(&state)).await;
    Json(SuggestionsResponse {
        success: true,
        source: suggestions.source(),
        suggestions: suggestions.into_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::fake::ScriptedAi;
    use crate::messages::services::send;
    use std::sync::Arc;
    use time::OffsetDateTime;

    #[tokio::test]
    async fn analysis_of_inbox_uses_model_reply() {
        let ai = ScriptedAi::Reply(
            r#"{"clusters":[{"title":"Kind words","messages":["thank you for the help"]}]}"#.into(),
        );
        let state = AppState::fake_with_ai(Arc::new(ai));
        let user_id = crate::state::tests::seed_verified_user(&state, "sam000").await;
        send(&state, "sam000", "thank you for the help", OffsetDateTime::now_utc())
            .await
            .unwrap();

        let Json(body) = analyze_messages(State(state), AuthUser(user_id)).await.unwrap();
        assert_eq!(body.source, "parsed");
        assert_eq!(body.ai_result.clusters[0].title, "Kind words");

        let json = serde_json::to_value(&body).unwrap();
        assert!(json["aiResult"]["clusters"].is_array());
    }

    #[tokio::test]
    async fn analysis_degrades_when_model_fails() {
        let state = AppState::fake_with_ai(Arc::new(ScriptedAi::Fail));
        let user_id = crate::state::tests::seed_verified_user(&state, "sam000").await;
        send(&state, "sam000", "is anyone reading this", OffsetDateTime::now_utc())
            .await
            .unwrap();

        let Json(body) = analyze_messages(State(state), AuthUser(user_id)).await.unwrap();
        assert!(body.success);
        assert_eq!(body.source, "unavailable");
        assert!(body.ai_result.clusters.is_empty());
    }

    #[tokio::test]
    async fn suggestions_endpoint_always_answers() {
        let state = AppState::fake_with_ai(Arc::new(ScriptedAi::Fail));
        let Json(body) = suggest_messages(State(state)).await;
        assert_eq!(body.suggestions.len(), 3);
        assert_eq!(body.source, "default");
    }
}
