#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Request, StatusCode, header},
};
use directory::{SqlitePool, User, store, users};
use server::{config::Config, router, state::AppState};
use tempfile::TempDir;
use tower::ServiceExt;

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }
}

/// Router over a fresh in-memory store, acting as a single browser that
/// keeps its session cookie between requests.
pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    pub media: TempDir,
    pub cookie: Option<String>,
}

pub fn config(media: &TempDir, search_root_url: &str, api_key: Option<&str>) -> Config {
    Config {
        port: 0,
        database_url: "sqlite::memory:".to_string(),
        search_root_url: search_root_url.to_string(),
        search_timeout: Duration::from_secs(2),
        media_root: media.path().to_path_buf(),
        bing_api_key: api_key.map(str::to_string),
    }
}

impl TestApp {
    pub async fn new() -> Self {
        let media = TempDir::new().unwrap();
        Self::with_config(config(&media, "http://127.0.0.1:9/", None), media).await
    }

    pub async fn with_config(config: Config, media: TempDir) -> Self {
        let pool = store::connect_in_memory().await.unwrap();
        let state: Arc<AppState> = AppState::with_pool(config, pool.clone()).unwrap();

        Self {
            app: router(state),
            pool,
            media,
            cookie: None,
        }
    }

    pub async fn send(&mut self, mut request: Request<Body>) -> TestResponse {
        if let Some(cookie) = &self.cookie {
            request
                .headers_mut()
                .insert(header::COOKIE, cookie.parse().unwrap());
        }

        let response = self.app.clone().oneshot(request).await.unwrap();

        for value in response.headers().get_all(header::SET_COOKIE) {
            let pair = value.to_str().unwrap().split(';').next().unwrap().to_string();
            self.cookie = match pair.split_once('=') {
                Some((_, "")) | None => None,
                Some(_) => Some(pair),
            };
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        TestResponse {
            status,
            headers,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        let request = Request::get(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn post_form(&mut self, uri: &str, body: &str) -> TestResponse {
        let request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn post_multipart(&mut self, uri: &str, parts: &[Part<'_>]) -> TestResponse {
        const BOUNDARY: &str = "rango-test-boundary";

        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part.file_name {
                Some(file_name) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{file_name}\"\r\n\
                             Content-Type: {}\r\n\r\n",
                            part.name,
                            part.content_type.unwrap_or("application/octet-stream"),
                        )
                        .as_bytes(),
                    );
                }
                None => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                            .as_bytes(),
                    );
                }
            }
            body.extend_from_slice(part.value);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::post(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    pub async fn session_count(&self) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sessions")
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    /// Creates an account straight in the store and logs in through the form.
    pub async fn login_as(&mut self, username: &str, password: &str) -> User {
        let user = users::create_user(&self.pool, username, "", password)
            .await
            .unwrap();

        let response = self
            .post_form(
                "/rango/login/",
                &format!("username={username}&password={password}"),
            )
            .await;
        assert_eq!(response.status, StatusCode::SEE_OTHER);

        user
    }
}

pub struct Part<'a> {
    pub name: &'a str,
    pub value: &'a [u8],
    pub file_name: Option<&'a str>,
    pub content_type: Option<&'a str>,
}

impl<'a> Part<'a> {
    pub fn text(name: &'a str, value: &'a str) -> Self {
        Self {
            name,
            value: value.as_bytes(),
            file_name: None,
            content_type: None,
        }
    }

    pub fn file(name: &'a str, file_name: &'a str, content_type: &'a str, value: &'a [u8]) -> Self {
        Self {
            name,
            value,
            file_name: Some(file_name),
            content_type: Some(content_type),
        }
    }
}
