//! Scheduler jobs against the fake Bot API

mod common;

use campus_gateway::EventKind;
use campus_gateway::db::{self, BlacklistSource};
use campus_gateway::sched::{self, jobs};
use chrono::{Duration, Utc};
use serde_json::json;

use common::{BOT_TOKEN, setup, setup_with};

#[tokio::test]
async fn delete_message_task_fires_after_the_delay() {
    let env = setup().await;
    env.seed_bot(BOT_TOKEN, "campus_bot");
    env.seed_group(-100, BOT_TOKEN);

    sched::schedule_message_deletion(&env.state, -100, 555).unwrap();
    let tasks = db::TaskRepo::new(env.state.db.clone());

    // Not due yet
    assert!(tasks.claim_next(Utc::now()).unwrap().is_none());

    let later = Utc::now() + Duration::seconds(120);
    let task = tasks.claim_next(later).unwrap().unwrap();
    jobs::run(&env.state, &task).await.unwrap();
    tasks.ack(&task, later).unwrap();

    let deletes = env.tg.calls_of("deleteMessage");
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].body["message_id"], json!(555));
    assert!(tasks.pending_by_name("delete_message").unwrap().is_empty());
}

#[tokio::test]
async fn delete_message_swallows_already_deleted() {
    let env = setup().await;
    env.seed_bot(BOT_TOKEN, "campus_bot");
    env.seed_group(-100, BOT_TOKEN);
    env.tg.set_response(
        "deleteMessage",
        json!({"ok": false, "description": "Bad Request: message to delete not found"}),
    );

    sched::schedule_message_deletion_after(&env.state, -100, 555, 0).unwrap();
    let tasks = db::TaskRepo::new(env.state.db.clone());
    let later = Utc::now() + Duration::seconds(1);
    let task = tasks.claim_next(later).unwrap().unwrap();

    // Runs clean and does not log anything
    jobs::run(&env.state, &task).await.unwrap();
    assert_eq!(
        db::EventRepo::new(env.state.db.clone()).count().unwrap(),
        0
    );
}

#[tokio::test]
async fn delete_message_defers_on_rate_limit() {
    let env = setup().await;
    env.seed_bot(BOT_TOKEN, "campus_bot");
    env.seed_group(-100, BOT_TOKEN);
    env.tg.set_response(
        "deleteMessage",
        json!({
            "ok": false,
            "description": "Too Many Requests: retry after 120",
            "parameters": {"retry_after": 120}
        }),
    );

    sched::schedule_message_deletion_after(&env.state, -100, 555, 0).unwrap();
    let tasks = db::TaskRepo::new(env.state.db.clone());
    let now = Utc::now() + Duration::seconds(1);
    let task = tasks.claim_next(now).unwrap().unwrap();
    jobs::run(&env.state, &task).await.unwrap();
    tasks.ack(&task, now).unwrap();

    // The deletion was re-queued for after the advertised interval
    let pending = tasks.pending_by_name("delete_message").unwrap();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].2 > now + Duration::seconds(100));
}

#[tokio::test]
async fn refresh_updates_metadata_and_owner() {
    let env = setup().await;
    env.seed_bot(BOT_TOKEN, "campus_bot");
    env.seed_group(-100, BOT_TOKEN);
    env.tg.set_response(
        "getChatAdministrators",
        json!({"ok": true, "result": [
            {"status": "creator", "user": {"id": 42, "is_bot": false, "first_name": "Ada"}},
            {"status": "administrator", "user": {"id": 7, "is_bot": false, "first_name": "Bob"}}
        ]}),
    );

    let tasks = db::TaskRepo::new(env.state.db.clone());
    tasks.enqueue("refresh_group_info", &json!({}), Utc::now()).unwrap();
    let task = tasks
        .claim_next(Utc::now() + Duration::seconds(1))
        .unwrap()
        .unwrap();
    jobs::run(&env.state, &task).await.unwrap();

    let group = db::GroupRepo::new(env.state.db.clone())
        .get(-100)
        .unwrap()
        .unwrap();
    assert_eq!(group.title, "Fresh title");
    assert_eq!(group.invite_link.as_deref(), Some("https://t.me/joinchat/fresh"));
    assert_eq!(group.description.as_deref(), Some("fresh description"));
    assert_eq!(group.owner_id, Some(42));

    // Administrator roster lands in the membership table
    let memberships = db::MembershipRepo::new(env.state.db.clone());
    assert_eq!(memberships.get(42, -100).unwrap().unwrap().status, "creator");
    assert_eq!(
        memberships.get(7, -100).unwrap().unwrap().status,
        "administrator"
    );
}

#[tokio::test]
async fn refresh_skips_unauthorized_groups() {
    let env = setup().await;
    env.seed_bot(BOT_TOKEN, "campus_bot");
    env.seed_group(-100, BOT_TOKEN);
    env.tg
        .set_response("getChat", json!({"ok": false, "description": "Unauthorized"}));

    let tasks = db::TaskRepo::new(env.state.db.clone());
    tasks.enqueue("refresh_group_info", &json!({}), Utc::now()).unwrap();
    let task = tasks
        .claim_next(Utc::now() + Duration::seconds(1))
        .unwrap()
        .unwrap();
    jobs::run(&env.state, &task).await.unwrap();

    // Untouched metadata, no roster call
    let group = db::GroupRepo::new(env.state.db.clone())
        .get(-100)
        .unwrap()
        .unwrap();
    assert_eq!(group.title, "Group -100");
    assert!(env.tg.calls_of("getChatAdministrators").is_empty());
}

#[tokio::test]
async fn blocklist_sync_replaces_partition_and_propagates_bans() {
    let env = setup_with(|config, tg| {
        config.external_blocklist_url = Some(tg.blocklist_url());
    })
    .await;

    env.seed_user(7, "Bob", None);
    env.tg.set_blocklist(json!([7, 404]));

    let tasks = db::TaskRepo::new(env.state.db.clone());
    tasks
        .enqueue("sync_external_blocklist", &json!({}), Utc::now())
        .unwrap();
    let task = tasks
        .claim_next(Utc::now() + Duration::seconds(1))
        .unwrap()
        .unwrap();
    jobs::run(&env.state, &task).await.unwrap();

    let blacklist = db::BlacklistRepo::new(env.state.db.clone());
    assert!(blacklist.contains(7).unwrap());
    assert!(blacklist.contains(404).unwrap());
    let bob = db::UserRepo::new(env.state.db.clone()).get(7).unwrap().unwrap();
    assert!(bob.banned);
    assert_eq!(
        db::EventRepo::new(env.state.db.clone())
            .list_by_kind(EventKind::ModerationSuperban)
            .unwrap()
            .len(),
        1
    );

    // A later sweep without Bob drops the stale feed entry but keeps
    // administrator entries intact
    blacklist.insert(500, BlacklistSource::Administrator).unwrap();
    env.tg.set_blocklist(json!([404]));
    tasks
        .enqueue("sync_external_blocklist", &json!({}), Utc::now())
        .unwrap();
    let task = tasks
        .claim_next(Utc::now() + Duration::seconds(1))
        .unwrap()
        .unwrap();
    jobs::run(&env.state, &task).await.unwrap();

    assert!(!blacklist.contains(7).unwrap());
    assert!(blacklist.contains(404).unwrap());
    assert!(blacklist.contains(500).unwrap());
}

#[tokio::test]
async fn recurring_jobs_are_seeded_once() {
    let env = setup_with(|config, _tg| {
        config.external_blocklist_url = Some("https://example.org/feed".to_string());
    })
    .await;

    sched::seed_recurring(&env.state).unwrap();
    sched::seed_recurring(&env.state).unwrap();

    let tasks = db::TaskRepo::new(env.state.db.clone());
    assert_eq!(tasks.pending_by_name("refresh_group_info").unwrap().len(), 1);
    assert_eq!(
        tasks.pending_by_name("sync_external_blocklist").unwrap().len(),
        1
    );
}
