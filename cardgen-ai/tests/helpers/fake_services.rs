//! Local HTTP stand-ins for the card store and the generation service
//!
//! Both bind `127.0.0.1:0` and run on the test's runtime; the returned URL
//! points at the bound port.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

// ============================================================================
// Card store
// ============================================================================

/// In-memory card store speaking the `{action, version, params}` protocol
pub struct FakeStore {
    /// When false every request gets HTTP 503
    pub reachable: AtomicBool,
    /// When set, addNote answers with this error string
    pub add_error: Mutex<Option<String>>,
    pub decks: Mutex<Vec<String>>,
    pub notes: Mutex<Vec<Value>>,
    /// Every action received, in order
    pub actions: Mutex<Vec<String>>,
}

impl FakeStore {
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn note_fronts(&self) -> Vec<String> {
        self.notes
            .lock()
            .unwrap()
            .iter()
            .map(|n| n["fields"]["Front"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }
}

async fn store_rpc(
    State(store): State<Arc<FakeStore>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !store.reachable.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({})));
    }

    let action = body["action"].as_str().unwrap_or_default().to_string();
    store.actions.lock().unwrap().push(action.clone());

    if body["version"] != json!(6) {
        return (
            StatusCode::OK,
            Json(json!({"result": null, "error": "unsupported version"})),
        );
    }

    let reply = match action.as_str() {
        "version" => json!({"result": 6, "error": null}),
        "deckNames" => {
            let decks = store.decks.lock().unwrap().clone();
            json!({"result": decks, "error": null})
        }
        "createDeck" => {
            let deck = body["params"]["deck"].as_str().unwrap_or_default().to_string();
            let mut decks = store.decks.lock().unwrap();
            decks.push(deck);
            json!({"result": decks.len(), "error": null})
        }
        "addNote" => {
            if let Some(error) = store.add_error.lock().unwrap().clone() {
                json!({"result": null, "error": error})
            } else {
                let mut notes = store.notes.lock().unwrap();
                notes.push(body["params"]["note"].clone());
                json!({"result": 1_000 + notes.len() as i64, "error": null})
            }
        }
        other => json!({"result": null, "error": format!("unsupported action: {}", other)}),
    };

    (StatusCode::OK, Json(reply))
}

/// Start a reachable fake store holding the "Default" deck
pub async fn spawn_fake_store() -> (Arc<FakeStore>, String) {
    let store = Arc::new(FakeStore {
        reachable: AtomicBool::new(true),
        add_error: Mutex::new(None),
        decks: Mutex::new(vec!["Default".to_string()]),
        notes: Mutex::new(Vec::new()),
        actions: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/", post(store_rpc))
        .with_state(Arc::clone(&store));

    let url = serve(app).await;
    (store, url)
}

// ============================================================================
// Generation service
// ============================================================================

/// Chat completions endpoint answering every call with one canned reply
pub struct FakeChat {
    pub status: AtomicU16,
    /// Full response body returned on success
    pub body: Mutex<Value>,
    pub requests: Mutex<Vec<Value>>,
    pub authorizations: Mutex<Vec<String>>,
}

impl FakeChat {
    /// Answer with `content` as the first choice
    pub fn reply_with(&self, content: &str) {
        *self.body.lock().unwrap() = json!({
            "id": "chatcmpl-test",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        });
    }

    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

async fn chat_completions(
    State(chat): State<Arc<FakeChat>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    chat.requests.lock().unwrap().push(body);
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        chat.authorizations.lock().unwrap().push(auth.to_string());
    }

    let status = StatusCode::from_u16(chat.status.load(Ordering::SeqCst))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if !status.is_success() {
        return (status, Json(json!({"error": {"message": "fake failure"}})));
    }

    (status, Json(chat.body.lock().unwrap().clone()))
}

/// Start a fake chat completions server; returns the full endpoint URL
pub async fn spawn_fake_chat() -> (Arc<FakeChat>, String) {
    let chat = Arc::new(FakeChat {
        status: AtomicU16::new(200),
        body: Mutex::new(json!({"choices": []})),
        requests: Mutex::new(Vec::new()),
        authorizations: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(Arc::clone(&chat));

    let url = serve(app).await;
    (chat, format!("{}/v1/chat/completions", url))
}
