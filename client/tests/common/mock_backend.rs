// Mock inference backend used by the integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use actix_web::dev::ServerHandle;
use actix_web::http::StatusCode;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use serde_json::{json, Value};

/// Upload as seen by the mock: the endpoint and the raw multipart body.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub path: String,
    pub body: String,
}

#[derive(Default)]
pub struct MockState {
    classification: Mutex<Option<(u16, String)>>,
    submission: Mutex<Option<(u16, Value)>>,
    statuses: Mutex<VecDeque<(u16, Value)>>,
    uploads: Mutex<Vec<RecordedUpload>>,
    status_paths: Mutex<Vec<String>>,
    status_calls: AtomicUsize,
}

pub struct MockBackend {
    pub base_url: String,
    state: Arc<MockState>,
    handle: ServerHandle,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let data = web::Data::from(Arc::clone(&state));

        let server = HttpServer::new(move || {
            App::new()
                .app_data(data.clone())
                .route("/api/waste-classification", web::post().to(classify))
                .route("/api/stock-detection", web::post().to(stock_detection))
                .route("/api/task-status/{task_id}", web::get().to(task_status))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .expect("bind mock backend");
        let port = server.addrs()[0].port();
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
            handle,
        }
    }

    pub fn reply_classification(&self, status: u16, body: impl Into<String>) {
        *self.state.classification.lock().unwrap() = Some((status, body.into()));
    }

    pub fn reply_submission(&self, status: u16, body: Value) {
        *self.state.submission.lock().unwrap() = Some((status, body));
    }

    pub fn queue_status(&self, status: u16, body: Value) {
        self.state.statuses.lock().unwrap().push_back((status, body));
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.state.uploads.lock().unwrap().clone()
    }

    pub fn status_paths(&self) -> Vec<String> {
        self.state.status_paths.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> usize {
        self.state.status_calls.load(Ordering::SeqCst)
    }

    pub async fn stop(self) {
        self.handle.stop(true).await;
    }
}

fn record_upload(state: &MockState, req: &HttpRequest, body: &web::Bytes) {
    state.uploads.lock().unwrap().push(RecordedUpload {
        path: req.path().to_string(),
        body: String::from_utf8_lossy(body).into_owned(),
    });
}

fn status_code(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn classify(state: web::Data<MockState>, req: HttpRequest, body: web::Bytes) -> HttpResponse {
    record_upload(&state, &req, &body);
    let (code, reply) = state
        .classification
        .lock()
        .unwrap()
        .clone()
        .unwrap_or((500, json!({"detail": "no classification scripted"}).to_string()));
    HttpResponse::build(status_code(code))
        .content_type("application/json")
        .body(reply)
}

async fn stock_detection(state: web::Data<MockState>, req: HttpRequest, body: web::Bytes) -> HttpResponse {
    record_upload(&state, &req, &body);
    let (code, reply) = state
        .submission
        .lock()
        .unwrap()
        .clone()
        .unwrap_or((500, json!({"detail": "no submission scripted"})));
    HttpResponse::build(status_code(code)).json(reply)
}

async fn task_status(state: web::Data<MockState>, req: HttpRequest) -> HttpResponse {
    state.status_calls.fetch_add(1, Ordering::SeqCst);
    state.status_paths.lock().unwrap().push(req.uri().path().to_string());
    let (code, reply) = state
        .statuses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((404, json!({"detail": "Task not found"})));
    HttpResponse::build(status_code(code)).json(reply)
}
