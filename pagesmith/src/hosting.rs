//! Hosting backend: repository creation, file writes, Pages enablement.

use async_trait::async_trait;
use base64::Engine;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;

use crate::error::HostingError;
use crate::model::check_file_path;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("pagesmith/", env!("CARGO_PKG_VERSION"));

/// Everything but unreserved characters gets escaped inside a path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Repository file path as it goes into a contents URL. Each segment is
/// escaped on its own so `/` keeps separating directories.
fn encode_file_path(path: &str) -> Result<String, HostingError> {
    check_file_path(path).map_err(HostingError::InvalidPath)?;
    Ok(path
        .split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/"))
}

/// A freshly created repository, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    pub owner: String,
    pub name: String,
    pub default_branch: String,
    pub html_url: String,
}

/// Remote operations the publisher needs. Implementations must be safe to
/// share between concurrent pipelines.
#[async_trait]
pub trait HostingClient: Send + Sync {
    async fn create_repository(&self, name: &str) -> Result<RepositoryInfo, HostingError>;

    /// Create or overwrite one file, returning the resulting commit SHA.
    async fn write_file(
        &self,
        repo: &RepositoryInfo,
        path: &str,
        content: &[u8],
        message: &str,
    ) -> Result<String, HostingError>;

    /// Serve the default branch root as a static site. An already-enabled
    /// site is reported as [`HostingError::Conflict`].
    async fn enable_pages(&self, repo: &RepositoryInfo) -> Result<(), HostingError>;
}

/// GitHub REST API client.
#[derive(Clone)]
pub struct GithubClient {
    token: String,
    api_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    name: String,
    html_url: String,
    #[serde(default)]
    default_branch: Option<String>,
    owner: OwnerResponse,
}

#[derive(Debug, Deserialize)]
struct OwnerResponse {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    commit: CommitResponse,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
}

impl GithubClient {
    pub fn new(token: String) -> Self {
        Self {
            token,
            api_url: DEFAULT_API_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_api_url(mut self, url: &str) -> Self {
        self.api_url = url.trim_end_matches('/').to_string();
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.api_url))
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", USER_AGENT)
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, HostingError> {
        let resp = req
            .send()
            .await
            .map_err(|e| HostingError::Transport(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::CONFLICT {
            return Err(HostingError::Conflict(body));
        }
        Err(HostingError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl HostingClient for GithubClient {
    async fn create_repository(&self, name: &str) -> Result<RepositoryInfo, HostingError> {
        let req = self
            .request(reqwest::Method::POST, "/user/repos")
            .json(&serde_json::json!({
                "name": name,
                "private": false,
                "auto_init": false,
            }));
        let repo: RepoResponse = self
            .send(req)
            .await?
            .json()
            .await
            .map_err(|e| HostingError::Response(e.to_string()))?;

        Ok(RepositoryInfo {
            owner: repo.owner.login,
            name: repo.name,
            default_branch: repo.default_branch.unwrap_or_else(|| "main".to_string()),
            html_url: repo.html_url,
        })
    }

    async fn write_file(
        &self,
        repo: &RepositoryInfo,
        path: &str,
        content: &[u8],
        message: &str,
    ) -> Result<String, HostingError> {
        let url_path = encode_file_path(path)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(content);
        let req = self
            .request(
                reqwest::Method::PUT,
                &format!("/repos/{}/{}/contents/{url_path}", repo.owner, repo.name),
            )
            .json(&serde_json::json!({
                "message": message,
                "content": encoded,
            }));
        let written: ContentsResponse = self
            .send(req)
            .await?
            .json()
            .await
            .map_err(|e| HostingError::Response(e.to_string()))?;
        Ok(written.commit.sha)
    }

    async fn enable_pages(&self, repo: &RepositoryInfo) -> Result<(), HostingError> {
        let req = self
            .request(
                reqwest::Method::POST,
                &format!("/repos/{}/{}/pages", repo.owner, repo.name),
            )
            .json(&serde_json::json!({
                "source": { "branch": repo.default_branch, "path": "/" },
            }));
        self.send(req).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode, Uri};
    use axum::routing::{post, put};
    use axum::{Json, Router};

    #[derive(Default)]
    struct Seen {
        bodies: Vec<serde_json::Value>,
        auth: Vec<String>,
    }

    type Shared = Arc<Mutex<Seen>>;

    async fn start_fake_github(pages_status: StatusCode) -> (String, Shared) {
        let seen: Shared = Arc::default();
        let app = Router::new()
            .route(
                "/user/repos",
                post(
                    |State(seen): State<Shared>, headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                        let mut s = seen.lock().unwrap();
                        s.auth.push(
                            headers
                                .get("authorization")
                                .and_then(|v| v.to_str().ok())
                                .unwrap_or_default()
                                .to_string(),
                        );
                        s.bodies.push(body.clone());
                        (
                            StatusCode::CREATED,
                            Json(serde_json::json!({
                                "name": body["name"],
                                "html_url": format!("https://github.com/octo/{}", body["name"].as_str().unwrap_or_default()),
                                "default_branch": "main",
                                "owner": { "login": "octo" }
                            })),
                        )
                    },
                ),
            )
            .route(
                "/repos/{owner}/{repo}/contents/{*path}",
                put(
                    |State(seen): State<Shared>,
                     Path((_owner, _repo, path)): Path<(String, String, String)>,
                     Json(body): Json<serde_json::Value>| async move {
                        seen.lock().unwrap().bodies.push(body);
                        (
                            StatusCode::CREATED,
                            Json(serde_json::json!({ "commit": { "sha": format!("sha-{path}") } })),
                        )
                    },
                ),
            )
            .route(
                "/repos/{owner}/{repo}/pages",
                post(move || async move { (pages_status, "{}") }),
            )
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), seen)
    }

    #[tokio::test]
    async fn creates_repo_and_writes_base64_content() {
        let (url, seen) = start_fake_github(StatusCode::CREATED).await;
        let client = GithubClient::new("tok".to_string()).with_api_url(&url);

        let repo = client.create_repository("t1-round2").await.unwrap();
        assert_eq!(repo.owner, "octo");
        assert_eq!(repo.name, "t1-round2");
        assert_eq!(repo.default_branch, "main");

        let sha = client
            .write_file(&repo, "index.html", b"<p>hi</p>", "Add index.html")
            .await
            .unwrap();
        assert_eq!(sha, "sha-index.html");

        let s = seen.lock().unwrap();
        assert_eq!(s.auth, ["Bearer tok"]);
        assert_eq!(s.bodies[1]["message"], "Add index.html");
        assert_eq!(s.bodies[1]["content"], "PHA+aGk8L3A+");
    }

    /// Server that answers every request like a contents PUT and records
    /// the raw request path.
    async fn start_path_recorder() -> (String, Arc<Mutex<Vec<String>>>) {
        let paths: Arc<Mutex<Vec<String>>> = Arc::default();
        let app = Router::new()
            .fallback(|State(paths): State<Arc<Mutex<Vec<String>>>>, uri: Uri| async move {
                paths.lock().unwrap().push(uri.path().to_string());
                (
                    StatusCode::CREATED,
                    Json(serde_json::json!({ "commit": { "sha": "abc" } })),
                )
            })
            .with_state(paths.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), paths)
    }

    fn repo() -> RepositoryInfo {
        RepositoryInfo {
            owner: "octo".into(),
            name: "t1-round2".into(),
            default_branch: "main".into(),
            html_url: "https://github.com/octo/t1-round2".into(),
        }
    }

    #[tokio::test]
    async fn file_names_are_escaped_into_the_contents_path() {
        let (url, paths) = start_path_recorder().await;
        let client = GithubClient::new("tok".to_string()).with_api_url(&url);

        for name in ["notes#1.txt", "q?.csv", "assets/my logo.png", "index.html"] {
            client.write_file(&repo(), name, b"x", "Add").await.unwrap();
        }

        assert_eq!(
            *paths.lock().unwrap(),
            [
                "/repos/octo/t1-round2/contents/notes%231.txt",
                "/repos/octo/t1-round2/contents/q%3F.csv",
                "/repos/octo/t1-round2/contents/assets/my%20logo.png",
                "/repos/octo/t1-round2/contents/index.html",
            ]
        );
    }

    #[tokio::test]
    async fn traversal_paths_never_reach_the_api() {
        let (url, paths) = start_path_recorder().await;
        let client = GithubClient::new("tok".to_string()).with_api_url(&url);

        for name in ["../../r2/collaborators/mallory", "a//b", ""] {
            let err = client.write_file(&repo(), name, b"x", "Add").await.unwrap_err();
            assert!(matches!(err, HostingError::InvalidPath(_)), "{name:?}: {err}");
        }
        assert!(paths.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn pages_conflict_maps_to_conflict_error() {
        let (url, _seen) = start_fake_github(StatusCode::CONFLICT).await;
        let client = GithubClient::new("tok".to_string()).with_api_url(&url);
        let repo = client.create_repository("r").await.unwrap();

        let err = client.enable_pages(&repo).await.unwrap_err();
        assert!(matches!(err, HostingError::Conflict(_)));
    }

    #[tokio::test]
    async fn other_failures_keep_status() {
        let (url, _seen) = start_fake_github(StatusCode::UNPROCESSABLE_ENTITY).await;
        let client = GithubClient::new("tok".to_string()).with_api_url(&url);
        let repo = client.create_repository("r").await.unwrap();

        let err = client.enable_pages(&repo).await.unwrap_err();
        assert!(matches!(err, HostingError::Api { status: 422, .. }));
    }
}
