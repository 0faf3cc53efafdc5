//! reqwest client for the Sahha REST API.
//!
//! Account-level calls authenticate with `Authorization: account {token}`.
//! The token is cached until Sahha rejects it; a 401 clears the cache so the
//! next refresh re-exchanges credentials.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::Mutex;
use url::Url;

use crate::types::{Profile, SahhaCredentials};

use super::{
    latest_scores, live_profile, ApiProfile, ApiScore, ProfilePage, ProfileSource, SahhaApiError,
    TokenResponse, REQUEST_TIMEOUT_SECS,
};

const TOKEN_PATH: &str = "api/v1/oauth/account/token";
const PROFILE_SEARCH_PATH: &str = "api/v1/account/profile/search";
const SCORE_PATH: &str = "api/v1/account/profile/score/";
const PAGE_SIZE: usize = 100;
/// Score lookback. Only the latest record per dimension is kept.
const SCORE_LOOKBACK_DAYS: i64 = 7;

pub struct SahhaClient {
    http: reqwest::Client,
    base: Url,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<String>>,
}

impl SahhaClient {
    /// Client for the environment named in the credentials.
    pub fn new(credentials: &SahhaCredentials) -> Result<Self, SahhaApiError> {
        let base = Url::parse(credentials.environment.base_url())
            .map_err(|e| SahhaApiError::Decode(e.to_string()))?;
        Self::with_base_url(credentials, base)
    }

    /// Client against an explicit base URL.
    pub fn with_base_url(credentials: &SahhaCredentials, base: Url) -> Result<Self, SahhaApiError> {
        if !credentials.is_complete() {
            return Err(SahhaApiError::MissingCredentials);
        }
        let (Some(client_id), Some(client_secret)) =
            (credentials.client_id.clone(), credentials.client_secret.clone())
        else {
            return Err(SahhaApiError::MissingCredentials);
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base,
            client_id,
            client_secret,
            token: Mutex::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, SahhaApiError> {
        self.base
            .join(path)
            .map_err(|e| SahhaApiError::Decode(format!("bad endpoint {path}: {e}")))
    }

    /// Cached account token, exchanging credentials when there is none.
    pub async fn account_token(&self) -> Result<String, SahhaApiError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }

        let response = self
            .http
            .post(self.endpoint(TOKEN_PATH)?)
            .json(&json!({
                "clientId": self.client_id,
                "clientSecret": self.client_secret,
            }))
            .send()
            .await?;
        let token: TokenResponse = decode(response).await?;
        log::info!("Sahha account token acquired");
        *guard = Some(token.account_token.clone());
        Ok(token.account_token)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, SahhaApiError> {
        let token = self.account_token().await?;
        let response = self
            .http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, format!("account {token}"))
            .send()
            .await?;
        let result = decode(response).await;
        if matches!(result, Err(SahhaApiError::Unauthorized)) {
            *self.token.lock().await = None;
        }
        result
    }

    /// Every profile on the account, following pages until a short one.
    pub async fn list_profiles(&self) -> Result<Vec<ApiProfile>, SahhaApiError> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let mut url = self.endpoint(PROFILE_SEARCH_PATH)?;
            url.query_pairs_mut()
                .append_pair("currentPage", &page.to_string())
                .append_pair("pageSize", &PAGE_SIZE.to_string());
            let batch = self.get_json::<ProfilePage>(url).await?.into_profiles();
            let done = batch.len() < PAGE_SIZE;
            all.extend(batch);
            if done {
                break;
            }
            page += 1;
        }
        Ok(all)
    }

    /// Score endpoint for one profile. The id is pushed as a single
    /// percent-encoded path segment.
    pub fn score_url(&self, external_id: &str) -> Result<Url, SahhaApiError> {
        if matches!(external_id.trim(), "" | "." | "..") {
            return Err(SahhaApiError::Decode(format!(
                "unusable external id '{external_id}'"
            )));
        }
        let mut url = self.endpoint(SCORE_PATH)?;
        let base = url.to_string();
        url.path_segments_mut()
            .map_err(|_| SahhaApiError::Decode(format!("base URL cannot take a path: {base}")))?
            .pop_if_empty()
            .push(external_id);
        Ok(url)
    }

    /// Raw score records for one profile over the lookback window.
    pub async fn profile_scores(
        &self,
        external_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<ApiScore>, SahhaApiError> {
        let mut url = self.score_url(external_id)?;
        let start = now - chrono::Duration::days(SCORE_LOOKBACK_DAYS);
        url.query_pairs_mut()
            .append_pair("startDateTime", &start.to_rfc3339())
            .append_pair("endDateTime", &now.to_rfc3339());
        self.get_json(url).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, SahhaApiError> {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(SahhaApiError::Unauthorized);
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(SahhaApiError::RateLimited);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SahhaApiError::Status {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| SahhaApiError::Decode(e.to_string()))
}

#[async_trait]
impl ProfileSource for SahhaClient {
    fn name(&self) -> &'static str {
        "sahha"
    }

    async fn fetch_profiles(&self, now: DateTime<Utc>) -> Result<Vec<Profile>, SahhaApiError> {
        let listed = self.list_profiles().await?;
        let mut profiles = Vec::with_capacity(listed.len());
        for api in &listed {
            // One bad profile should not blank the whole roster.
            let scores = match self.profile_scores(&api.external_id, now).await {
                Ok(records) => latest_scores(&records),
                Err(SahhaApiError::Unauthorized) => return Err(SahhaApiError::Unauthorized),
                Err(e) => {
                    log::warn!("Scores unavailable for {}: {}", api.profile_id, e);
                    Default::default()
                }
            };
            profiles.push(live_profile(api, scores, now));
        }
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use chrono::TimeZone;
    use serde_json::Value;

    use crate::types::DataOrigin;

    fn credentials() -> SahhaCredentials {
        SahhaCredentials {
            client_id: Some("client".into()),
            client_secret: Some("secret".into()),
            ..Default::default()
        }
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "account tok-1")
    }

    async fn serve(app: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Url::parse(&format!("http://{addr}/")).unwrap()
    }

    fn fake_sahha() -> Router {
        Router::new()
            .route(
                "/api/v1/oauth/account/token",
                post(|Json(body): Json<Value>| async move {
                    if body["clientSecret"] == "secret" {
                        (StatusCode::OK, Json(serde_json::json!({"accountToken": "tok-1"})))
                    } else {
                        (StatusCode::UNAUTHORIZED, Json(serde_json::json!({})))
                    }
                }),
            )
            .route(
                "/api/v1/account/profile/search",
                get(|headers: HeaderMap| async move {
                    if !authorized(&headers) {
                        return (StatusCode::UNAUTHORIZED, Json(serde_json::json!({})));
                    }
                    (
                        StatusCode::OK,
                        Json(serde_json::json!({
                            "items": [
                                {"profileId": "p1", "externalId": "e1"},
                                {"profileId": "p2", "externalId": "e2"}
                            ],
                            "totalCount": 2
                        })),
                    )
                }),
            )
            .route(
                "/api/v1/account/profile/score/{external_id}",
                get(|Path(external_id): Path<String>, headers: HeaderMap| async move {
                    if !authorized(&headers) {
                        return (StatusCode::UNAUTHORIZED, Json(serde_json::json!([])));
                    }
                    match external_id.as_str() {
                        "e1" => (
                            StatusCode::OK,
                            Json(serde_json::json!([
                                {"type": "activity", "score": 0.37, "scoreDateTime": "2025-02-01T00:00:00Z"},
                                {"type": "sleep", "score": 0.81, "scoreDateTime": "2025-02-01T00:00:00Z"}
                            ])),
                        ),
                        ODD_ID => (
                            StatusCode::OK,
                            Json(serde_json::json!([{"type": "activity", "score": 0.5}])),
                        ),
                        "e2" => (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!([]))),
                        _ => (StatusCode::NOT_FOUND, Json(serde_json::json!([]))),
                    }
                }),
            )
    }

    const ODD_ID: &str = "a/../../x?admin=1#frag";

    #[test]
    fn test_score_url_encodes_reserved_characters() {
        let base = Url::parse("https://sandbox-api.sahha.ai/").unwrap();
        let client = SahhaClient::with_base_url(&credentials(), base).unwrap();

        let url = client.score_url(ODD_ID).unwrap();
        assert_eq!(
            url.path(),
            "/api/v1/account/profile/score/a%2F..%2F..%2Fx%3Fadmin=1%23frag"
        );
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);

        let plain = client.score_url("emp-42").unwrap();
        assert_eq!(plain.path(), "/api/v1/account/profile/score/emp-42");

        assert!(client.score_url("..").is_err());
        assert!(client.score_url("").is_err());
    }

    #[tokio::test]
    async fn test_reserved_character_id_reaches_score_route() {
        let base = serve(fake_sahha()).await;
        let client = SahhaClient::with_base_url(&credentials(), base).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 2, 2, 0, 0, 0).single().unwrap();

        let records = client.profile_scores(ODD_ID, now).await.unwrap();
        assert_eq!(latest_scores(&records).activity, Some(50.0));
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let result = SahhaClient::new(&SahhaCredentials::default());
        assert!(matches!(result, Err(SahhaApiError::MissingCredentials)));
    }

    #[tokio::test]
    async fn test_fetch_profiles_against_fake_api() {
        let base = serve(fake_sahha()).await;
        let client = SahhaClient::with_base_url(&credentials(), base).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 2, 2, 0, 0, 0).single().unwrap();

        let profiles = client.fetch_profiles(now).await.unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].scores.activity, Some(37.0));
        assert_eq!(profiles[0].scores.sleep, Some(81.0));
        assert_eq!(profiles[0].origin, DataOrigin::Live);
        // e2's score call failed; the profile is kept without scores.
        assert_eq!(profiles[1].scores.activity, None);
    }

    #[tokio::test]
    async fn test_bad_secret_is_unauthorized() {
        let base = serve(fake_sahha()).await;
        let mut creds = credentials();
        creds.client_secret = Some("wrong".into());
        let client = SahhaClient::with_base_url(&creds, base).unwrap();
        let result = client.account_token().await;
        assert!(matches!(result, Err(SahhaApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let base = serve(fake_sahha()).await;
        let client = SahhaClient::with_base_url(&credentials(), base).unwrap();
        let first = client.account_token().await.unwrap();
        let second = client.account_token().await.unwrap();
        assert_eq!(first, "tok-1");
        assert_eq!(first, second);
    }
}
