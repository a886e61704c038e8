use crate::compose::ComposedMessage;
use crate::errors::ClientError;
use crate::jenkins::CiClient;
use crate::slack::{ChatClient, ChatUser};
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;

/// A build document shaped like the Jenkins remote API output. Commits are
/// `(author name, author email, CI user id)`.
pub fn build_json(id: &str, result: &str, commits: &[(&str, &str, &str)]) -> Value {
    let items: Vec<Value> = commits
        .iter()
        .enumerate()
        .map(|(i, (name, email, user))| {
            json!({
                "author": {
                    "fullName": name,
                    "absoluteUrl": format!("https://ci.example.com/user/{user}"),
                },
                "authorEmail": email,
                "commitId": format!("{user}{i}"),
                "msg": "change",
            })
        })
        .collect();

    json!({
        "_class": "hudson.model.FreeStyleBuild",
        "id": id,
        "number": id.parse::<u64>().unwrap_or_default(),
        "result": result,
        "timestamp": 1_700_000_000_000u64,
        "duration": 61_500,
        "url": format!("https://ci.example.com/job/api/{id}/"),
        "changeSets": [{"kind": "git", "items": items}],
        "actions": [],
    })
}

/// A CI user profile, with a mailer property when `email` is given.
pub fn user_json(id: &str, email: Option<&str>) -> Value {
    let mut properties = vec![json!({"_class": "jenkins.security.ApiTokenProperty"})];
    if let Some(email) = email {
        properties.push(json!({
            "_class": "hudson.tasks.Mailer$UserProperty",
            "address": email,
        }));
    }

    json!({
        "_class": "hudson.model.User",
        "id": id,
        "fullName": id,
        "property": properties,
    })
}

/// In-memory CI server.
#[derive(Default)]
pub struct StaticCi {
    jobs: HashMap<String, Value>,
    builds: HashMap<(String, String), Value>,
    users: HashMap<String, Value>,
    user_errors: HashMap<String, u16>,
    user_delay: Option<Duration>,
    build_calls: AtomicUsize,
    user_calls: AtomicUsize,
}

impl StaticCi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job(mut self, job: &str, raw: Value) -> Self {
        self.jobs.insert(job.to_string(), raw);
        self
    }

    pub fn with_build(mut self, job: &str, build: &str, raw: Value) -> Self {
        self.builds.insert((job.to_string(), build.to_string()), raw);
        self
    }

    pub fn with_user(mut self, id: &str, raw: Value) -> Self {
        self.users.insert(id.to_string(), raw);
        self
    }

    /// Answers profile requests for `id` with the given HTTP status.
    pub fn with_user_error(mut self, id: &str, status: u16) -> Self {
        self.user_errors.insert(id.to_string(), status);
        self
    }

    pub fn with_user_delay(mut self, delay: Duration) -> Self {
        self.user_delay = Some(delay);
        self
    }

    pub fn build_calls(&self) -> usize {
        self.build_calls.load(Ordering::SeqCst)
    }

    pub fn user_calls(&self) -> usize {
        self.user_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CiClient for StaticCi {
    async fn get_job(&self, job: &str) -> Result<Value, ClientError> {
        self.jobs
            .get(job)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("job {job}")))
    }

    async fn get_build(&self, job: &str, build: &str) -> Result<Value, ClientError> {
        self.build_calls.fetch_add(1, Ordering::SeqCst);
        self.builds
            .get(&(job.to_string(), build.to_string()))
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("build {job}#{build}")))
    }

    async fn get_user(&self, user_id: &str) -> Result<Value, ClientError> {
        self.user_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.user_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(status) = self.user_errors.get(user_id) {
            return Err(ClientError::Status {
                status: *status,
                url: format!("user/{user_id}"),
            });
        }
        self.users
            .get(user_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("user {user_id}")))
    }
}

/// In-memory chat system recording every posted message.
pub struct StaticChat {
    users: Vec<ChatUser>,
    delay: Option<Duration>,
    fail_listing: AtomicBool,
    fail_posting: AtomicBool,
    list_calls: AtomicUsize,
    sent: Mutex<Vec<(String, ComposedMessage)>>,
}

impl StaticChat {
    pub fn new(users: Vec<ChatUser>) -> Self {
        StaticChat {
            users,
            delay: None,
            fail_listing: AtomicBool::new(false),
            fail_posting: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Delays every directory listing, widening the window for concurrent loads.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn fail_posting(&self, fail: bool) {
        self.fail_posting.store(fail, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(String, ComposedMessage)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl ChatClient for StaticChat {
    async fn list_users(&self) -> Result<Vec<ChatUser>, ClientError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(ClientError::Api("users.list: ratelimited".into()));
        }
        Ok(self.users.clone())
    }

    async fn post_message(
        &self,
        channel: &str,
        message: &ComposedMessage,
    ) -> Result<(), ClientError> {
        if self.fail_posting.load(Ordering::SeqCst) {
            return Err(ClientError::Status {
                status: 500,
                url: "webhook".into(),
            });
        }
        self.sent
            .lock()
            .push((channel.to_string(), message.clone()));
        Ok(())
    }
}

/// Canned answer of the stub server.
#[derive(Clone, Debug)]
pub struct StubResponse {
    status: u16,
    body: String,
}

impl StubResponse {
    pub fn json(body: &str) -> Self {
        StubResponse {
            status: 200,
            body: body.to_string(),
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        StubResponse {
            status,
            body: body.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub path_and_query: String,
    pub authorization: Option<String>,
    pub body: Vec<u8>,
}

pub struct StubServer {
    pub port: u16,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubServer {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }
}

/// Starts an HTTP server on a random local port that answers by path and
/// query. Unknown paths get a 404.
pub async fn start_stub_server(routes: HashMap<String, StubResponse>) -> StubServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let routes = Arc::new(routes);
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = requests.clone();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let io = TokioIo::new(stream);
            let routes = routes.clone();
            let recorded = recorded.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let routes = routes.clone();
                    let recorded = recorded.clone();
                    async move {
                        let (parts, body) = req.into_parts();
                        let body = body
                            .collect()
                            .await
                            .map(|collected| collected.to_bytes())
                            .unwrap_or_else(|_| Bytes::new());
                        let path_and_query = parts
                            .uri
                            .path_and_query()
                            .map(|pq| pq.as_str().to_string())
                            .unwrap_or_default();

                        recorded.lock().push(RecordedRequest {
                            method: parts.method.to_string(),
                            path_and_query: path_and_query.clone(),
                            authorization: parts
                                .headers
                                .get(hyper::header::AUTHORIZATION)
                                .and_then(|h| h.to_str().ok())
                                .map(str::to_string),
                            body: body.to_vec(),
                        });

                        let stub = routes
                            .get(&path_and_query)
                            .cloned()
                            .unwrap_or_else(|| StubResponse::status(404, "not found"));
                        let mut response = Response::new(Full::new(Bytes::from(stub.body)));
                        *response.status_mut() =
                            StatusCode::from_u16(stub.status).unwrap_or(StatusCode::OK);
                        Ok::<_, Infallible>(response)
                    }
                });

                let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                    .serve_connection(io, service)
                    .await;
            });
        }
    });

    StubServer { port, requests }
}
