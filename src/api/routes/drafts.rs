use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::api::state::AppState;
use crate::api::{ActorRequest, ApiError};
use crate::models::{DraftId, GameInput, MatchId, PlayerId, ResultDraft};
use crate::platform::{Confirmation, CoreError};

#[derive(Debug, Deserialize)]
pub struct DraftRequest {
    pub actor_id: PlayerId,
    #[serde(default)]
    pub games: Vec<GameInput>,
}

pub async fn get_match_draft(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
) -> Result<Json<ResultDraft>, ApiError> {
    let platform = state.read().await;
    platform.get_match(&match_id)?;
    let draft = platform
        .draft_for_match(&match_id)
        .ok_or_else(|| CoreError::NotFound(format!("draft for match {}", match_id)))?;
    Ok(Json(draft.clone()))
}

pub async fn create_draft(
    State(state): State<AppState>,
    Path(match_id): Path<MatchId>,
    Json(req): Json<DraftRequest>,
) -> Result<(StatusCode, Json<ResultDraft>), ApiError> {
    let draft = state
        .mutate(|platform| platform.create_draft(&match_id, &req.actor_id, &req.games, Utc::now()))
        .await?;
    Ok((StatusCode::CREATED, Json(draft)))
}

pub async fn update_draft(
    State(state): State<AppState>,
    Path(id): Path<DraftId>,
    Json(req): Json<DraftRequest>,
) -> Result<Json<ResultDraft>, ApiError> {
    let draft = state
        .mutate(|platform| platform.update_draft(&id, &req.actor_id, &req.games, Utc::now()))
        .await?;
    Ok(Json(draft))
}

pub async fn delete_draft(
    State(state): State<AppState>,
    Path(id): Path<DraftId>,
    Json(req): Json<ActorRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .mutate(|platform| platform.delete_draft(&id, &req.actor_id, Utc::now()))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn confirm_draft(
    State(state): State<AppState>,
    Path(id): Path<DraftId>,
    Json(req): Json<ActorRequest>,
) -> Result<Json<Confirmation>, ApiError> {
    let confirmation = state
        .mutate(|platform| platform.confirm_draft(&id, &req.actor_id, Utc::now()))
        .await?;
    Ok(Json(confirmation))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::api::build_router;
    use crate::storage::{load_state, StorageConfig};
    use crate::config::RulesConfig;
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    fn games() -> Value {
        json!([{
            "team1": ["ana", "ben"],
            "team2": ["cy", "dee"],
            "team1Score": 25,
            "team2Score": 20
        }])
    }

    #[tokio::test]
    async fn test_draft_confirm_flow() {
        let tmp = tempfile::tempdir().unwrap();
        let (platform, match_id) = started_match();
        let state = setup_test_state(tmp.path(), platform);

        let (status, draft) = post_json(
            build_router(state.clone()),
            &format!("/api/matches/{match_id}/draft"),
            json!({ "actor_id": "ben", "games": games() }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(draft["confirmed"], false);
        let draft_id = draft["id"].as_str().unwrap().to_string();

        let (status, fetched) = get_json(
            build_router(state.clone()),
            &format!("/api/matches/{match_id}/draft"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["id"], draft_id.as_str());

        let (status, confirmation) = post_json(
            build_router(state.clone()),
            &format!("/api/drafts/{draft_id}/confirm"),
            json!({ "actor_id": "cy" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(confirmation["ratings_after"]["ana"], 2.05);
        assert_eq!(confirmation["ratings_after"]["dee"], 1.95);
        assert_eq!(confirmation["entries"].as_array().unwrap().len(), 4);

        let (status, body) = post_json(
            build_router(state.clone()),
            &format!("/api/drafts/{draft_id}/confirm"),
            json!({ "actor_id": "cy" }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "STATE_CONFLICT");

        let (_, m) = get_json(build_router(state), &format!("/api/matches/{match_id}")).await;
        assert_eq!(m["state"], "finished");

        let reloaded = load_state(
            &StorageConfig::new(tmp.path().to_path_buf()),
            RulesConfig::default(),
        )
        .unwrap();
        assert_eq!(
            reloaded
                .player(&crate::models::PlayerId::from("ana"))
                .unwrap()
                .current_rating,
            2.05
        );
    }

    #[tokio::test]
    async fn test_invalid_games_report_issues() {
        let tmp = tempfile::tempdir().unwrap();
        let (platform, match_id) = started_match();
        let state = setup_test_state(tmp.path(), platform);

        let (status, body) = post_json(
            build_router(state.clone()),
            &format!("/api/matches/{match_id}/draft"),
            json!({
                "actor_id": "ana",
                "games": [
                    { "team1": ["ana", "ben"], "team2": ["cy", "dee"], "team1Score": 21, "team2Score": 3 },
                    { "team1": ["ana", "ben"], "team2": ["ana", "dee"], "team1Score": 21, "team2Score": "x" }
                ]
            }),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        let issues = body["error"]["details"].as_array().unwrap();
        assert!(issues.iter().any(|i| i["issue"] == "duplicate_player"));
        assert!(issues.iter().any(|i| i["issue"] == "invalid_score"));

        let (status, _) = get_json(
            build_router(state),
            &format!("/api/matches/{match_id}/draft"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_and_delete_draft() {
        let tmp = tempfile::tempdir().unwrap();
        let (platform, match_id) = started_match();
        let state = setup_test_state(tmp.path(), platform);

        let (_, draft) = post_json(
            build_router(state.clone()),
            &format!("/api/matches/{match_id}/draft"),
            json!({ "actor_id": "ana", "games": games() }),
        )
        .await;
        let draft_id = draft["id"].as_str().unwrap().to_string();

        let (status, updated) = send_json(
            build_router(state.clone()),
            "PUT",
            &format!("/api/drafts/{draft_id}"),
            json!({
                "actor_id": "dee",
                "games": [{ "team1": ["ana", "cy"], "team2": ["ben", "dee"], "team1Score": 11, "team2Score": 11 }]
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["games"][0]["team1Score"], 11);

        let (status, _) = send_json(
            build_router(state.clone()),
            "DELETE",
            &format!("/api/drafts/{draft_id}"),
            json!({ "actor_id": "eve" }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send_json(
            build_router(state.clone()),
            "DELETE",
            &format!("/api/drafts/{draft_id}"),
            json!({ "actor_id": "cy" }),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, ledger) = get_json(build_router(state), "/api/players/ana/ledger").await;
        assert_eq!(ledger["current_rating"], 2.0);
        assert_eq!(ledger["entries"][0]["kind"], "placeholder");
    }

    #[tokio::test]
    async fn test_failed_save_leaves_state_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let (platform, match_id) = started_match();
        let state = setup_test_state(tmp.path(), platform);
        // A file where the state directory belongs makes every save fail
        let blocker = tmp.path().join("state");
        std::fs::write(&blocker, b"").unwrap();

        let (status, body) = post_json(
            build_router(state.clone()),
            &format!("/api/matches/{match_id}/draft"),
            json!({ "actor_id": "ben", "games": games() }),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");

        let (status, _) = get_json(
            build_router(state.clone()),
            &format!("/api/matches/{match_id}/draft"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        std::fs::remove_file(&blocker).unwrap();
        let (status, _) = post_json(
            build_router(state),
            &format!("/api/matches/{match_id}/draft"),
            json!({ "actor_id": "ben", "games": games() }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_draft_locks_roster() {
        let tmp = tempfile::tempdir().unwrap();
        let (platform, match_id) = started_match();
        let state = setup_test_state(tmp.path(), platform);
        post_json(
            build_router(state.clone()),
            &format!("/api/matches/{match_id}/draft"),
            json!({ "actor_id": "ana", "games": games() }),
        )
        .await;

        let (status, body) = post_json(
            build_router(state),
            &format!("/api/matches/{match_id}/remove"),
            json!({ "actor_id": "ana", "player_id": "dee" }),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "STATE_CONFLICT");
    }
}
