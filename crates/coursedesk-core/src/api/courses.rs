//! Client for the course service.
//!
//! The service is a plain REST collection at `{base}/course`. It has no count
//! endpoint, so `list` fetches the requested page and the full collection
//! side by side and counts matches locally.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::{check_response, join_url, ApiError};
use crate::auth::SessionManager;
use crate::models::{Course, CourseDraft, CourseFilter, CoursePage};

/// First page of the course list
pub const DEFAULT_PAGE: u32 = 1;

/// Courses shown per page
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Maximum number of retries for rate-limited (429) GET requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay for rate limiting, doubled on each retry.
const INITIAL_BACKOFF_MS: u64 = 1000;

fn with_bearer(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

/// Course catalog client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct CourseClient {
    client: Client,
    base_url: String,
    session: Option<Arc<SessionManager>>,
    initial_backoff: Duration,
}

impl CourseClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Ok(Self::with_client(super::http_client()?, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            session: None,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }

    /// Authorize requests with the session's access token, refreshing it
    /// when it is about to expire.
    pub fn with_session(mut self, session: Arc<SessionManager>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    fn collection_url(&self) -> String {
        join_url(&self.base_url, "course")
    }

    fn item_url(&self, id: &str) -> String {
        join_url(&self.base_url, &format!("course/{}", id))
    }

    /// The session's access token, refreshed first if it is about to expire.
    async fn bearer_token(&self) -> Result<Option<String>, ApiError> {
        match &self.session {
            Some(session) => Ok(Some(session.valid_access_token().await?)),
            None => Ok(None),
        }
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        Ok(with_bearer(request, self.bearer_token().await?.as_deref()))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        token: Option<&str>,
    ) -> Result<T, ApiError> {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let request = with_bearer(self.client.get(url).query(query), token);
            let response = request.send().await?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited);
                }
                warn!(url = url, retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                continue;
            }

            let response = check_response(response).await?;
            return response
                .json()
                .await
                .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", url, e)));
        }
    }

    /// The service answers 404 when a filtered query matches nothing.
    async fn get_list(
        &self,
        url: &str,
        query: &[(&str, String)],
        token: Option<&str>,
    ) -> Result<Vec<Course>, ApiError> {
        match self.get_json(url, query, token).await {
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            other => other,
        }
    }

    /// One page of courses matching `filter`, with the total match count.
    pub async fn list(
        &self,
        page: u32,
        page_size: u32,
        filter: &CourseFilter,
    ) -> Result<CoursePage, ApiError> {
        let mut query = vec![
            ("page", page.max(1).to_string()),
            ("limit", page_size.max(1).to_string()),
        ];
        if let Some(title) = filter.title() {
            query.push(("search", title.to_string()));
        }
        if let Some(category) = filter.category() {
            query.push(("category", category.to_string()));
        }
        if let Some(level) = filter.level() {
            query.push(("level", level.to_string()));
        }

        let url = self.collection_url();
        // One token for both requests, so a stale one is refreshed once
        let token = self.bearer_token().await?;
        let (data, all) = futures::try_join!(
            self.get_list(&url, &query, token.as_deref()),
            self.get_list(&url, &[], token.as_deref())
        )?;

        let total = all.iter().filter(|c| filter.matches(c)).count();
        debug!(page, returned = data.len(), total, "Fetched course page");
        Ok(CoursePage { data, total })
    }

    /// A single course, or `None` if it doesn't exist.
    pub async fn get(&self, id: &str) -> Result<Option<Course>, ApiError> {
        let token = self.bearer_token().await?;
        match self.get_json(&self.item_url(id), &[], token.as_deref()).await {
            Ok(course) => Ok(Some(course)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create(&self, draft: CourseDraft) -> Result<Course, ApiError> {
        draft.validate().map_err(ApiError::InvalidInput)?;
        let draft = draft.with_default_thumbnail();

        let request = self
            .authorized(self.client.post(self.collection_url()).json(&draft))
            .await?;
        let response = check_response(request.send().await?).await?;
        let course: Course = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("create course: {}", e)))?;

        info!(id = %course.id, "Course created");
        Ok(course)
    }

    pub async fn update(&self, course: &Course) -> Result<Course, ApiError> {
        course.to_draft().validate().map_err(ApiError::InvalidInput)?;

        let request = self
            .authorized(self.client.put(self.item_url(&course.id)).json(course))
            .await?;
        let response = check_response(request.send().await?).await?;
        let updated: Course = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("update course: {}", e)))?;

        info!(id = %updated.id, "Course updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let request = self.authorized(self.client.delete(self.item_url(id))).await?;
        check_response(request.send().await?).await?;
        info!(id, "Course deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AuthGateway, LoginGrant, RefreshGrant};
    use crate::auth::token::token_expiring_in;
    use crate::auth::{AuthError, Credential, CredentialStore, SessionSettings, TokenTtl};
    use crate::models::{UserProfile, DEFAULT_THUMBNAIL_URL};
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn course_json(id: &str, title: &str, category: &str, level: &str) -> serde_json::Value {
        json!({
            "id": id,
            "title": title,
            "category": category,
            "level": level,
            "description": "",
            "thumbnail": DEFAULT_THUMBNAIL_URL
        })
    }

    /// Gateway that refuses every call.
    struct ClosedGateway;

    #[async_trait]
    impl AuthGateway for ClosedGateway {
        async fn lookup_handle_by_identifier(&self, _: &str) -> Result<String, ApiError> {
            Err(ApiError::Unauthorized)
        }

        async fn exchange_credentials(&self, _: &str, _: &str, _: i64) -> Result<LoginGrant, ApiError> {
            Err(ApiError::Unauthorized)
        }

        async fn exchange_refresh_token(&self, _: &str, _: i64) -> Result<RefreshGrant, ApiError> {
            Err(ApiError::Unauthorized)
        }
    }

    /// Gateway whose refresh tokens are single use: only the first refresh
    /// succeeds.
    #[derive(Default)]
    struct RotatingGateway {
        refresh_calls: AtomicUsize,
    }

    #[async_trait]
    impl AuthGateway for RotatingGateway {
        async fn lookup_handle_by_identifier(&self, _: &str) -> Result<String, ApiError> {
            Err(ApiError::Unauthorized)
        }

        async fn exchange_credentials(&self, _: &str, _: &str, _: i64) -> Result<LoginGrant, ApiError> {
            Err(ApiError::Unauthorized)
        }

        async fn exchange_refresh_token(&self, _: &str, _: i64) -> Result<RefreshGrant, ApiError> {
            if self.refresh_calls.fetch_add(1, Ordering::SeqCst) > 0 {
                return Err(ApiError::Unauthorized);
            }
            Ok(RefreshGrant {
                access_token: token_expiring_in(1, 1800),
                refresh_token: Some("refresh-2".to_string()),
            })
        }
    }

    fn session_with_token(access_token: &str) -> Arc<SessionManager> {
        session_with_gateway(access_token, Arc::new(ClosedGateway))
    }

    fn session_with_gateway(access_token: &str, gateway: Arc<dyn AuthGateway>) -> Arc<SessionManager> {
        let store = CredentialStore::new(Arc::new(MemoryStorage::new()), false);
        store
            .write(
                &Credential {
                    access_token: access_token.to_string(),
                    refresh_token: "refresh-1".to_string(),
                    user: UserProfile {
                        id: 1,
                        username: "emilys".to_string(),
                        email: "a@b.com".to_string(),
                        first_name: "Emily".to_string(),
                        last_name: "Johnson".to_string(),
                    },
                },
                &TokenTtl::default(),
            )
            .expect("seed failed");
        Arc::new(SessionManager::new(store, gateway, SessionSettings::default()))
    }

    #[tokio::test]
    async fn test_list_with_filter_counts_total() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/course"))
            .and(query_param("page", "1"))
            .and(query_param("limit", "10"))
            .and(query_param("search", "english"))
            .and(query_param("category", "SPEAKING"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                course_json("1", "English Speaking A", "SPEAKING", "Beginner"),
                course_json("2", "English Speaking B", "SPEAKING", "Advanced"),
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/course"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                course_json("1", "English Speaking A", "SPEAKING", "Beginner"),
                course_json("2", "English Speaking B", "SPEAKING", "Advanced"),
                course_json("3", "English Grammar", "GRAMMAR", "Beginner"),
                course_json("4", "Business ENGLISH talk", "SPEAKING", "Intermediate"),
            ])))
            .mount(&server)
            .await;

        let client = CourseClient::new(server.uri()).expect("client build failed");
        let filter = CourseFilter {
            title: Some("english".to_string()),
            category: Some("SPEAKING".to_string()),
            level: None,
        };
        let page = client
            .list(DEFAULT_PAGE, DEFAULT_PAGE_SIZE, &filter)
            .await
            .expect("list failed");

        assert_eq!(page.data.len(), 2);
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn test_list_treats_not_found_as_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/course"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!("Not found")))
            .mount(&server)
            .await;

        let client = CourseClient::new(server.uri()).expect("client build failed");
        let page = client
            .list(3, 10, &CourseFilter::default())
            .await
            .expect("list failed");
        assert_eq!(page, CoursePage::default());
    }

    #[tokio::test]
    async fn test_get_missing_course() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/course/99"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/course/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(course_json("1", "Phonics", "SPEAKING", "Beginner")),
            )
            .mount(&server)
            .await;

        let client = CourseClient::new(server.uri()).expect("client build failed");
        assert_eq!(client.get("99").await.expect("get failed"), None);
        let course = client.get("1").await.expect("get failed").expect("course missing");
        assert_eq!(course.title, "Phonics");
    }

    #[tokio::test]
    async fn test_create_applies_default_thumbnail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/course"))
            .and(body_json(json!({
                "title": "Grammar 101",
                "category": "GRAMMAR",
                "level": "Beginner",
                "description": "",
                "thumbnail": DEFAULT_THUMBNAIL_URL
            })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(course_json("5", "Grammar 101", "GRAMMAR", "Beginner")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = CourseClient::new(server.uri()).expect("client build failed");
        let created = client
            .create(CourseDraft {
                title: "Grammar 101".to_string(),
                category: "GRAMMAR".to_string(),
                level: "Beginner".to_string(),
                ..Default::default()
            })
            .await
            .expect("create failed");
        assert_eq!(created.id, "5");
    }

    #[tokio::test]
    async fn test_create_rejects_incomplete_draft() {
        let client = CourseClient::new("http://127.0.0.1:9").expect("client build failed");
        let err = client
            .create(CourseDraft::default())
            .await
            .expect_err("create should fail");
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/course/4"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(course_json("4", "Writing Lab", "WRITING", "Advanced")),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/course/4"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/course/5"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = CourseClient::new(server.uri()).expect("client build failed");
        let course = Course::from_draft(
            "4",
            CourseDraft {
                title: "Writing Lab".to_string(),
                category: "WRITING".to_string(),
                level: "Advanced".to_string(),
                ..Default::default()
            },
        );
        let updated = client.update(&course).await.expect("update failed");
        assert_eq!(updated.level, "Advanced");

        client.delete("4").await.expect("delete failed");
        assert!(matches!(
            client.delete("5").await,
            Err(ApiError::ServerError(_))
        ));
    }

    #[tokio::test]
    async fn test_rate_limited_get_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/course/1"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/course/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(course_json("1", "Phonics", "SPEAKING", "Beginner")),
            )
            .mount(&server)
            .await;

        let client = CourseClient::new(server.uri())
            .expect("client build failed")
            .with_initial_backoff(Duration::from_millis(1));
        let course = client.get("1").await.expect("get failed");
        assert!(course.is_some());
    }

    #[tokio::test]
    async fn test_requests_carry_bearer_token() {
        let token = token_expiring_in(1, 1800);
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/course/4"))
            .and(header("authorization", format!("Bearer {}", token).as_str()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = CourseClient::new(server.uri())
            .expect("client build failed")
            .with_session(session_with_token(&token));
        client.delete("4").await.expect("delete failed");
    }

    #[tokio::test]
    async fn test_expired_session_blocks_requests() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = CourseClient::new(server.uri())
            .expect("client build failed")
            .with_session(session_with_token(&token_expiring_in(1, 5)));
        let err = client.delete("4").await.expect_err("delete should fail");
        assert!(matches!(err, ApiError::Session(AuthError::SessionExpired)));
    }

    #[tokio::test]
    async fn test_list_with_stale_token_refreshes_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/course"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                course_json("1", "Phonics", "SPEAKING", "Beginner"),
            ])))
            .expect(2)
            .mount(&server)
            .await;

        let gateway = Arc::new(RotatingGateway::default());
        let session = session_with_gateway(&token_expiring_in(1, 10), gateway.clone());
        let client = CourseClient::new(server.uri())
            .expect("client build failed")
            .with_session(Arc::clone(&session));

        let page = client
            .list(DEFAULT_PAGE, DEFAULT_PAGE_SIZE, &CourseFilter::default())
            .await
            .expect("list failed");

        assert_eq!(page.total, 1);
        assert_eq!(gateway.refresh_calls.load(Ordering::SeqCst), 1);
        assert!(session.get_access_token().is_some());
        assert!(!session.is_token_expired());
    }

    #[tokio::test]
    async fn test_rejected_create_is_bad_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/course"))
            .respond_with(ResponseTemplate::new(400).set_body_string("title too long"))
            .mount(&server)
            .await;

        let client = CourseClient::new(server.uri()).expect("client build failed");
        let err = client
            .create(CourseDraft {
                title: "Grammar 101".to_string(),
                category: "GRAMMAR".to_string(),
                level: "Beginner".to_string(),
                ..Default::default()
            })
            .await
            .expect_err("create should fail");
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
