// Mocked API server for tests, after the kube-rs tower-test pattern
use std::time::Duration;

use http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use k8s_openapi::api::core::v1::Pod;
use kube::client::Body;
use kube::Client;
use serde_json::json;

type ApiServerHandle = tower_test::mock::Handle<Request<Body>, Response<Body>>;

/// Receives requests from a mocked `kube::Client`
pub struct ApiServerVerifier(ApiServerHandle);

/// Canned API server responses
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    /// 404 for the requested pod
    NotFound,
    /// 403 for any request
    Forbidden,
    /// 409 as for a name collision
    Conflict,
    /// 201 echoing the submitted pod
    Created,
    /// 200 with a pod in the given phase (no status at all for `None`)
    Pod(Option<&'static str>),
}

/// A request as seen by the mocked API server
#[derive(Debug)]
pub struct RecordedRequest {
    pub method: http::Method,
    pub path: String,
    pub query: String,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    async fn read(request: Request<Body>) -> Self {
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let query = request.uri().query().unwrap_or_default().to_string();
        let body = request
            .into_body()
            .collect()
            .await
            .expect("request body readable")
            .to_bytes()
            .to_vec();
        Self {
            method,
            path,
            query,
            body,
        }
    }

    /// Submitted pod manifest
    pub fn pod(&self) -> Pod {
        serde_json::from_slice(&self.body).expect("request body is a pod")
    }

    fn object_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }
}

/// Running scenario; resolves to every request it answered
pub struct MockServer(tokio::task::JoinHandle<Vec<RecordedRequest>>);

impl MockServer {
    /// Wait for the scenario to answer all of its replies
    pub async fn finish(self) -> Vec<RecordedRequest> {
        tokio::time::timeout(Duration::from_secs(1), self.0)
            .await
            .expect("timeout on mock apiserver")
            .expect("scenario succeeded")
    }

    pub fn abort(self) {
        self.0.abort();
    }
}

impl ApiServerVerifier {
    /// Answer requests with `replies`, in order
    ///
    /// If the code under test makes more calls than there are replies, it sees a
    /// closed service error.
    pub fn run(mut self, replies: Vec<Reply>) -> MockServer {
        MockServer(tokio::spawn(async move {
            let mut requests = Vec::new();
            for reply in replies {
                let (request, send) = self.0.next_request().await.expect("service not called");
                let recorded = RecordedRequest::read(request).await;
                send.send_response(reply.respond(&recorded));
                requests.push(recorded);
            }
            requests
        }))
    }

    /// Answer every request with the same reply until the client goes away
    pub fn run_repeating(mut self, reply: Reply) -> MockServer {
        MockServer(tokio::spawn(async move {
            let mut requests = Vec::new();
            while let Some((request, send)) = self.0.next_request().await {
                let recorded = RecordedRequest::read(request).await;
                send.send_response(reply.respond(&recorded));
                requests.push(recorded);
            }
            requests
        }))
    }
}

impl Reply {
    fn respond(self, request: &RecordedRequest) -> Response<Body> {
        match self {
            Reply::NotFound => status(StatusCode::NOT_FOUND, "NotFound", request.object_name()),
            Reply::Forbidden => status(StatusCode::FORBIDDEN, "Forbidden", request.object_name()),
            Reply::Conflict => status(StatusCode::CONFLICT, "AlreadyExists", request.object_name()),
            Reply::Created => {
                let mut pod = request.pod();
                pod.status = Some(Default::default());
                respond_with(StatusCode::CREATED, serde_json::to_value(&pod).unwrap())
            }
            Reply::Pod(phase) => {
                let mut pod = json!({
                    "apiVersion": "v1",
                    "kind": "Pod",
                    "metadata": { "name": request.object_name() },
                    "spec": {
                        "containers": [{ "name": "main", "image": "digitalocean/doks-debug:latest" }],
                    }
                });
                if let Some(phase) = phase {
                    pod["status"] = json!({ "phase": phase });
                }
                respond_with(StatusCode::OK, pod)
            }
        }
    }
}

fn status(code: StatusCode, reason: &str, name: &str) -> Response<Body> {
    respond_with(
        code,
        json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": format!("pods \"{}\": {}", name, reason),
            "reason": reason,
            "code": code.as_u16(),
        }),
    )
}

fn respond_with(code: StatusCode, body: serde_json::Value) -> Response<Body> {
    Response::builder()
        .status(code)
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

/// A kube client wired to a mocked API server
pub fn testcontext() -> (Client, ApiServerVerifier) {
    let (mock_service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
    let mock_client = Client::new(mock_service, "default");
    (mock_client, ApiServerVerifier(handle))
}
