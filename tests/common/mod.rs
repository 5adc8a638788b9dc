//! Shared test utilities: a fake Telegram Bot API plus a wired gateway
#![allow(dead_code)] // not every test binary uses every helper

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use chrono::Utc;
use serde_json::{Value, json};
use tower::ServiceExt;

use campus_gateway::app::AppState;
use campus_gateway::db::{self, BotRow, GroupRow, Role, RoleKind};
use campus_gateway::telegram::types::TgUser;
use campus_gateway::{Config, api};

/// One outbound Bot API call observed by the fake server
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub token: String,
    pub method: String,
    pub body: Value,
}

struct FakeTelegramState {
    calls: Mutex<Vec<RecordedCall>>,
    responses: Mutex<HashMap<String, Value>>,
    next_message_id: Mutex<i64>,
    blocklist: Mutex<Value>,
}

/// Handle to the fake Bot API server
#[derive(Clone)]
pub struct FakeTelegram {
    pub base: String,
    state: Arc<FakeTelegramState>,
}

impl FakeTelegram {
    /// All calls of a method, across every bot token
    pub fn calls_of(&self, method: &str) -> Vec<RecordedCall> {
        self.state
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    /// Override the canned response of a method
    pub fn set_response(&self, method: &str, body: Value) {
        self.state
            .responses
            .lock()
            .unwrap()
            .insert(method.to_string(), body);
    }

    /// Serve this payload at `GET {base}/blocklist`
    pub fn set_blocklist(&self, body: Value) {
        *self.state.blocklist.lock().unwrap() = body;
    }

    /// URL of the blocklist endpoint
    pub fn blocklist_url(&self) -> String {
        format!("{}/blocklist", self.base)
    }
}

async fn fake_method(
    State(state): State<Arc<FakeTelegramState>>,
    Path((bot_segment, method)): Path<(String, String)>,
    body: String,
) -> axum::Json<Value> {
    let token = bot_segment.strip_prefix("bot").unwrap_or(&bot_segment);
    let body: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    state.calls.lock().unwrap().push(RecordedCall {
        token: token.to_string(),
        method: method.clone(),
        body: body.clone(),
    });

    if let Some(canned) = state.responses.lock().unwrap().get(&method) {
        return axum::Json(canned.clone());
    }

    let response = match method.as_str() {
        "sendMessage" | "forwardMessage" => {
            let mut next = state.next_message_id.lock().unwrap();
            *next += 1;
            json!({"ok": true, "result": {"message_id": *next}})
        }
        "getChatMemberCount" => json!({"ok": true, "result": 100}),
        "getChat" => {
            let chat_id = body["chat_id"].as_i64().unwrap_or(0);
            json!({"ok": true, "result": {
                "id": chat_id,
                "type": "supergroup",
                "title": "Fresh title",
                "description": "fresh description",
                "invite_link": "https://t.me/joinchat/fresh"
            }})
        }
        "getChatAdministrators" => json!({"ok": true, "result": []}),
        _ => json!({"ok": true, "result": true}),
    };
    axum::Json(response)
}

async fn fake_blocklist(State(state): State<Arc<FakeTelegramState>>) -> axum::Json<Value> {
    axum::Json(state.blocklist.lock().unwrap().clone())
}

/// Spawn the fake Bot API on an ephemeral port
pub async fn spawn_fake_telegram() -> FakeTelegram {
    let state = Arc::new(FakeTelegramState {
        calls: Mutex::new(Vec::new()),
        responses: Mutex::new(HashMap::new()),
        next_message_id: Mutex::new(1000),
        blocklist: Mutex::new(Value::Null),
    });

    let router = Router::new()
        .route("/{bot_segment}/{method}", post(fake_method))
        .route("/blocklist", get(fake_blocklist))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    FakeTelegram {
        base: format!("http://{addr}"),
        state,
    }
}

/// A fully wired gateway against the fake Bot API
pub struct TestEnv {
    pub state: Arc<AppState>,
    pub router: Router,
    pub tg: FakeTelegram,
}

/// Token of the default group bot used by the seed helpers
pub const BOT_TOKEN: &str = "111:AAA";

impl TestEnv {
    /// POST an update to the webhook, returning status and body
    pub async fn post_update(&self, token: &str, update: &Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(format!("/webhook?token={token}"))
            .header("content-type", "application/json")
            .body(Body::from(update.to_string()))
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    /// POST to the webhook without a token parameter
    pub async fn post_raw(&self, uri: &str, body: &str) -> StatusCode {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap().status()
    }

    pub fn seed_bot(&self, token: &str, username: &str) {
        db::BotRepo::new(self.state.db.clone())
            .insert(&BotRow {
                token: token.to_string(),
                username: username.to_string(),
                notes: None,
            })
            .unwrap();
    }

    pub fn seed_group(&self, id: i64, bot_token: &str) {
        db::GroupRepo::new(self.state.db.clone())
            .insert(&GroupRow {
                id,
                title: format!("Group {id}"),
                description: None,
                invite_link: None,
                language: "it".to_string(),
                welcome_template: "<b>{greetings}</b> nel gruppo {title}".to_string(),
                owner_id: None,
                bot_token: Some(bot_token.to_string()),
                ignore_admin_tagging: false,
            })
            .unwrap();
    }

    pub fn seed_user(&self, id: u64, first_name: &str, username: Option<&str>) {
        db::UserRepo::new(self.state.db.clone())
            .upsert_seen(
                &TgUser {
                    id,
                    is_bot: false,
                    first_name: first_name.to_string(),
                    last_name: None,
                    username: username.map(String::from),
                    language_code: None,
                },
                Utc::now(),
            )
            .unwrap();
    }

    pub fn seed_membership(&self, user_id: u64, group_id: i64) {
        db::MembershipRepo::new(self.state.db.clone())
            .upsert_seen(user_id, group_id, Utc::now(), true)
            .unwrap();
    }

    pub fn seed_role(&self, user_id: u64, kind: RoleKind, all_groups: bool, degrees: &[i64]) {
        let mut role = Role::new(user_id, kind);
        role.all_groups = all_groups;
        role.degrees = degrees.to_vec();
        db::RoleRepo::new(self.state.db.clone()).insert(&role).unwrap();
    }

    pub fn events_of(&self, kind: campus_gateway::EventKind) -> Vec<db::EventRow> {
        db::EventRepo::new(self.state.db.clone())
            .list_by_kind(kind)
            .unwrap()
    }
}

/// Build a gateway wired to a fresh fake Bot API
pub async fn setup() -> TestEnv {
    setup_with(|_config, _tg| {}).await
}

/// Build a gateway, letting the caller tweak the configuration first
///
/// The closure also receives the fake server so the configuration can
/// point at endpoints it serves (e.g. the blocklist feed).
pub async fn setup_with(tweak: impl FnOnce(&mut Config, &FakeTelegram)) -> TestEnv {
    let tg = spawn_fake_telegram().await;
    let pool = db::init_memory().expect("failed to init test db");
    let mut config = Config::for_tests();
    tweak(&mut config, &tg);
    let state = Arc::new(AppState::with_base(config, pool, tg.base.clone()));
    let router = api::router(state.clone());
    TestEnv { state, router, tg }
}

// --- Update builders --------------------------------------------------------

/// A plain group message update
pub fn message_update(chat_id: i64, from_id: u64, first_name: &str, text: &str) -> Value {
    json!({
        "update_id": 1,
        "message": {
            "message_id": 10,
            "date": 1_700_000_000,
            "chat": {"id": chat_id, "type": "supergroup", "title": format!("Group {chat_id}")},
            "from": {"id": from_id, "is_bot": false, "first_name": first_name},
            "text": text
        }
    })
}

/// Attach entities to a message update
pub fn with_entities(mut update: Value, entities: Value) -> Value {
    update["message"]["entities"] = entities;
    update
}

/// Attach a replied-to message to a message update
pub fn with_reply(mut update: Value, reply_from: u64, reply_text: &str) -> Value {
    let chat = update["message"]["chat"].clone();
    update["message"]["reply_to_message"] = json!({
        "message_id": 99,
        "date": 1_699_999_000,
        "chat": chat,
        "from": {"id": reply_from, "is_bot": false, "first_name": "Replied"},
        "text": reply_text
    });
    update
}

/// A `chat_member` transition update
pub fn chat_member_update(
    chat_id: i64,
    user: Value,
    old_status: &str,
    new_status: &str,
) -> Value {
    json!({
        "update_id": 2,
        "chat_member": {
            "chat": {"id": chat_id, "type": "supergroup", "title": format!("Group {chat_id}")},
            "from": {"id": 999, "is_bot": false, "first_name": "Admin"},
            "old_chat_member": {"status": old_status, "user": user.clone()},
            "new_chat_member": {"status": new_status, "user": user}
        }
    })
}
