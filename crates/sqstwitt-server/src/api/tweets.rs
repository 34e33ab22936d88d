use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct TweetItem {
    id: Uuid,
    id_str: Option<String>,
    text: Option<String>,
    geo: Option<Value>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct TweetDetail {
    id: Uuid,
    document: Value,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TweetQuery {
    pub limit: Option<i64>,
}

pub(super) async fn list_tweets(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<TweetQuery>,
) -> Result<Json<ApiResponse<Vec<TweetItem>>>, ApiError> {
    let rows = sqstwitt_db::list_recent_tweets(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| TweetItem {
            id: row.id,
            id_str: row.id_str,
            text: row.text,
            geo: row.geo,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_tweet(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<TweetDetail>>, ApiError> {
    let Ok(id) = Uuid::parse_str(&id) else {
        return Err(ApiError::new(
            req_id.0,
            "bad_request",
            "tweet id must be a UUID",
        ));
    };

    let row = sqstwitt_db::get_tweet(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: TweetDetail {
            id: row.id,
            document: row.document,
            created_at: row.created_at,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
