//! Moderation engine end-to-end: commands through the webhook

mod common;

use campus_gateway::EventKind;
use campus_gateway::db::{self, RoleKind};
use serde_json::json;

use common::{BOT_TOKEN, message_update, setup, with_entities, with_reply};

const SECOND_BOT: &str = "222:BBB";

async fn moderation_env() -> common::TestEnv {
    let env = setup().await;
    env.seed_bot(BOT_TOKEN, "campus_bot");
    env.seed_group(-100, BOT_TOKEN);
    env.seed_user(8, "Ada", Some("ada"));
    env.seed_user(7, "Bob", Some("bob"));
    env.seed_membership(8, -100);
    env.seed_membership(7, -100);
    env
}

#[tokio::test]
async fn kick_by_reply_applies_logs_and_confirms() {
    let env = moderation_env().await;
    env.seed_role(8, RoleKind::Administrator, true, &[]);

    let update = with_reply(message_update(-100, 8, "Ada", "/kick"), 7, "original");
    env.post_update(BOT_TOKEN, &update).await;

    // Kick is an unban: present members are booted but may rejoin
    let unbans = env.tg.calls_of("unbanChatMember");
    assert_eq!(unbans.len(), 1);
    assert_eq!(unbans[0].body["chat_id"], json!(-100));
    assert_eq!(unbans[0].body["user_id"], json!(7));

    let events = env.events_of(EventKind::ModerationKick);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].chat_id, Some(-100));
    assert_eq!(events[0].target_id, Some(7));
    assert_eq!(events[0].issuer_id, Some(8));

    // The command message itself is deleted
    let deletes = env.tg.calls_of("deleteMessage");
    assert!(
        deletes
            .iter()
            .any(|c| c.token == BOT_TOKEN && c.body["message_id"] == json!(10))
    );

    // Confirmation posted in chat and scheduled for cleanup
    let confirmations: Vec<_> = env
        .tg
        .calls_of("sendMessage")
        .into_iter()
        .filter(|c| c.token == BOT_TOKEN)
        .collect();
    assert_eq!(confirmations.len(), 1);
    assert_eq!(
        confirmations[0].body["text"],
        json!("I seguenti utenti sono stati kickati: Bob")
    );
    let pending = db::TaskRepo::new(env.state.db.clone())
        .pending_by_name("delete_message")
        .unwrap();
    assert_eq!(pending.len(), 1);

    // Evidence secured: placeholder reserved, reply forwarded, then edited
    assert_eq!(env.tg.calls_of("forwardMessage").len(), 1);
    assert_eq!(env.tg.calls_of("editMessageText").len(), 1);
}

#[tokio::test]
async fn mute_with_duration_restricts_until_deadline() {
    let env = moderation_env().await;
    env.seed_role(8, RoleKind::Administrator, true, &[]);

    let update = with_entities(
        message_update(-100, 8, "Ada", "/mute @bob 10m spam"),
        json!([
            {"type": "bot_command", "offset": 0, "length": 5},
            {"type": "mention", "offset": 6, "length": 4}
        ]),
    );
    env.post_update(BOT_TOKEN, &update).await;

    let restricts = env.tg.calls_of("restrictChatMember");
    assert_eq!(restricts.len(), 1);
    let body = &restricts[0].body;
    assert_eq!(body["user_id"], json!(7));
    assert_eq!(body["permissions"]["can_send_messages"], json!(false));
    // Message date is 1_700_000_000; ten minutes later
    assert_eq!(body["until_date"], json!(1_700_000_600));

    let events = env.events_of(EventKind::ModerationMute);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].reason.as_deref(), Some("spam"));
}

#[tokio::test]
async fn del_deletes_evidence_first_and_stays_silent() {
    let env = moderation_env().await;
    env.seed_role(8, RoleKind::Moderator, true, &[]);

    let update = with_reply(message_update(-100, 8, "Ada", "/del"), 7, "offensive");
    env.post_update(BOT_TOKEN, &update).await;

    // Both the target and the command message go
    let deletes = env.tg.calls_of("deleteMessage");
    assert_eq!(deletes.len(), 2);

    let events = env.events_of(EventKind::ModerationDel);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].message_text.as_deref(), Some("offensive"));
    assert_eq!(events[0].message_deleted, Some(true));
    assert!(events[0].audit_message_id.is_some());

    // Evidence forwarded into the audit chat before deletion
    let forwards = env.tg.calls_of("forwardMessage");
    assert_eq!(forwards.len(), 1);
    assert_eq!(forwards[0].body["from_chat_id"], json!(-100));
    assert_eq!(forwards[0].body["message_id"], json!(99));

    // Silent: no in-chat confirmation
    assert!(
        env.tg
            .calls_of("sendMessage")
            .iter()
            .all(|c| c.token != BOT_TOKEN)
    );
}

#[tokio::test]
async fn warn_increments_the_counter() {
    let env = moderation_env().await;
    env.seed_role(8, RoleKind::Administrator, true, &[]);

    let update = with_reply(message_update(-100, 8, "Ada", "/warn flooding"), 7, "x");
    env.post_update(BOT_TOKEN, &update).await;

    let bob = db::UserRepo::new(env.state.db.clone()).get(7).unwrap().unwrap();
    assert_eq!(bob.warn_count, 1);
    let events = env.events_of(EventKind::ModerationWarn);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].reason.as_deref(), Some("flooding"));
}

#[tokio::test]
async fn free_restores_the_send_suite_only() {
    let env = moderation_env().await;
    env.seed_role(8, RoleKind::Administrator, true, &[]);

    let update = with_reply(message_update(-100, 8, "Ada", "/free"), 7, "x");
    env.post_update(BOT_TOKEN, &update).await;

    let unbans = env.tg.calls_of("unbanChatMember");
    assert_eq!(unbans.len(), 1);
    assert_eq!(unbans[0].body["only_if_banned"], json!(true));

    let restricts = env.tg.calls_of("restrictChatMember");
    assert_eq!(restricts.len(), 1);
    let perms = &restricts[0].body["permissions"];
    assert_eq!(perms["can_send_messages"], json!(true));
    assert_eq!(perms["can_send_media_messages"], json!(true));
    assert_eq!(perms["can_change_info"], json!(null));
    assert_eq!(perms["can_pin_messages"], json!(null));
}

#[tokio::test]
async fn unauthorized_command_is_dropped_silently() {
    let env = moderation_env().await;
    // Ada holds no role at all

    let update = with_reply(message_update(-100, 8, "Ada", "/ban"), 7, "x");
    env.post_update(BOT_TOKEN, &update).await;

    assert!(env.tg.calls_of("banChatMember").is_empty());
    assert!(env.events_of(EventKind::ModerationBan).is_empty());
    // No feedback of any kind in the chat
    assert!(
        env.tg
            .calls_of("sendMessage")
            .iter()
            .all(|c| c.token != BOT_TOKEN)
    );
    // And no state change on the target
    let bob = db::UserRepo::new(env.state.db.clone()).get(7).unwrap().unwrap();
    assert!(!bob.banned);
    assert_eq!(bob.warn_count, 0);
}

#[tokio::test]
async fn moderator_cannot_exceed_variant_defaults() {
    let env = moderation_env().await;
    env.seed_role(8, RoleKind::Moderator, true, &[]);

    let update = with_reply(message_update(-100, 8, "Ada", "/ban"), 7, "x");
    env.post_update(BOT_TOKEN, &update).await;
    assert!(env.tg.calls_of("banChatMember").is_empty());

    // But muting is within a moderator's defaults
    let update = with_reply(message_update(-100, 8, "Ada", "/mute"), 7, "x");
    env.post_update(BOT_TOKEN, &update).await;
    assert_eq!(env.tg.calls_of("restrictChatMember").len(), 1);
}

#[tokio::test]
async fn no_target_posts_a_usage_hint() {
    let env = moderation_env().await;
    env.seed_role(8, RoleKind::Administrator, true, &[]);

    env.post_update(BOT_TOKEN, &message_update(-100, 8, "Ada", "/kick @ghost"))
        .await;

    let hints: Vec<_> = env
        .tg
        .calls_of("sendMessage")
        .into_iter()
        .filter(|c| c.token == BOT_TOKEN)
        .collect();
    assert_eq!(hints.len(), 1);
    assert!(
        hints[0].body["text"]
            .as_str()
            .unwrap()
            .contains("utente non trovato")
    );
    assert!(env.tg.calls_of("unbanChatMember").is_empty());
}

#[tokio::test]
async fn superban_propagates_across_groups_and_flags_the_user() {
    let env = moderation_env().await;
    env.seed_bot(SECOND_BOT, "campus_second_bot");
    env.seed_group(-200, SECOND_BOT);
    env.seed_membership(7, -200);
    env.seed_role(8, RoleKind::SuperAdministrator, true, &[]);

    let update = with_entities(
        message_update(-100, 8, "Ada", "/superban @bob raids"),
        json!([
            {"type": "bot_command", "offset": 0, "length": 9},
            {"type": "mention", "offset": 10, "length": 4}
        ]),
    );
    env.post_update(BOT_TOKEN, &update).await;

    // One ban per group, each through that group's own bot
    let bans = env.tg.calls_of("banChatMember");
    assert_eq!(bans.len(), 2);
    let mut seen: Vec<(String, i64)> = bans
        .iter()
        .map(|c| (c.token.clone(), c.body["chat_id"].as_i64().unwrap()))
        .collect();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            (BOT_TOKEN.to_string(), -100),
            (SECOND_BOT.to_string(), -200)
        ]
    );

    // One event per affected group
    let events = env.events_of(EventKind::ModerationSuperban);
    assert_eq!(events.len(), 2);
    let mut chats: Vec<i64> = events.iter().map(|e| e.chat_id.unwrap()).collect();
    chats.sort_unstable();
    assert_eq!(chats, vec![-200, -100]);

    let bob = db::UserRepo::new(env.state.db.clone()).get(7).unwrap().unwrap();
    assert!(bob.banned);

    // Bob's very next message anywhere goes down the globally-banned path
    env.post_update(BOT_TOKEN, &message_update(-100, 7, "Bob", "let me in"))
        .await;
    assert_eq!(env.tg.calls_of("banChatMember").len(), 3);
}

#[tokio::test]
async fn superfree_unbans_everywhere_and_clears_the_flag() {
    let env = moderation_env().await;
    env.seed_bot(SECOND_BOT, "campus_second_bot");
    env.seed_group(-200, SECOND_BOT);
    env.seed_membership(7, -200);
    env.seed_role(8, RoleKind::SuperAdministrator, true, &[]);
    db::UserRepo::new(env.state.db.clone()).set_banned(7, true).unwrap();

    let update = with_entities(
        message_update(-100, 8, "Ada", "/superfree @bob"),
        json!([
            {"type": "bot_command", "offset": 0, "length": 10},
            {"type": "mention", "offset": 11, "length": 4}
        ]),
    );
    env.post_update(BOT_TOKEN, &update).await;

    assert_eq!(env.tg.calls_of("unbanChatMember").len(), 2);
    assert_eq!(env.tg.calls_of("restrictChatMember").len(), 2);
    assert_eq!(env.events_of(EventKind::ModerationSuperfree).len(), 2);

    let bob = db::UserRepo::new(env.state.db.clone()).get(7).unwrap().unwrap();
    assert!(!bob.banned);
}

#[tokio::test]
async fn superban_partial_failure_keeps_going() {
    let env = moderation_env().await;
    env.seed_bot(SECOND_BOT, "campus_second_bot");
    env.seed_group(-200, SECOND_BOT);
    env.seed_membership(7, -200);
    env.seed_role(8, RoleKind::SuperAdministrator, true, &[]);

    // Every ban attempt is rejected for lack of rights
    env.tg.set_response(
        "banChatMember",
        json!({"ok": false, "description": "Bad Request: not enough rights"}),
    );

    let update = with_reply(message_update(-100, 8, "Ada", "/superban"), 7, "x");
    env.post_update(BOT_TOKEN, &update).await;

    // Both groups were attempted despite the failures
    assert_eq!(env.tg.calls_of("banChatMember").len(), 2);
    assert_eq!(env.events_of(EventKind::NotEnoughRights).len(), 2);
    assert!(env.events_of(EventKind::ModerationSuperban).is_empty());

    // The store-side flag still flips; the network considers the user banned
    let bob = db::UserRepo::new(env.state.db.clone()).get(7).unwrap().unwrap();
    assert!(bob.banned);
}

#[tokio::test]
async fn info_dossier_is_dmed_to_the_issuer() {
    let env = moderation_env().await;
    env.seed_role(8, RoleKind::Moderator, true, &[]);

    let update = with_reply(message_update(-100, 8, "Ada", "/info"), 7, "x");
    env.post_update(BOT_TOKEN, &update).await;

    let dms: Vec<_> = env
        .tg
        .calls_of("sendMessage")
        .into_iter()
        .filter(|c| c.token == BOT_TOKEN && c.body["chat_id"] == json!(8))
        .collect();
    assert_eq!(dms.len(), 1);
    let text = dms[0].body["text"].as_str().unwrap();
    assert!(text.contains("tg://user?id=7"));
    assert!(text.contains("Ammonizioni"));

    assert_eq!(env.events_of(EventKind::ModerationInfo).len(), 1);
    // Nothing forwarded for a read-only action
    assert!(env.tg.calls_of("forwardMessage").is_empty());
}

#[tokio::test]
async fn not_enough_rights_is_logged_without_feedback() {
    let env = moderation_env().await;
    env.seed_role(8, RoleKind::Administrator, true, &[]);
    env.tg.set_response(
        "banChatMember",
        json!({"ok": false, "description": "Bad Request: not enough rights"}),
    );

    let update = with_reply(message_update(-100, 8, "Ada", "/ban"), 7, "x");
    env.post_update(BOT_TOKEN, &update).await;

    assert_eq!(env.events_of(EventKind::NotEnoughRights).len(), 1);
    assert!(env.events_of(EventKind::ModerationBan).is_empty());
    // No confirmation for a failed action
    assert!(
        env.tg
            .calls_of("sendMessage")
            .iter()
            .all(|c| c.token != BOT_TOKEN)
    );
}

#[tokio::test]
async fn ignore_admin_toggle_requires_restrict_rights() {
    let env = moderation_env().await;

    // Without rights nothing happens
    env.post_update(BOT_TOKEN, &message_update(-100, 8, "Ada", "/ignore_admin"))
        .await;
    assert!(
        !db::GroupRepo::new(env.state.db.clone())
            .get(-100)
            .unwrap()
            .unwrap()
            .ignore_admin_tagging
    );

    // A moderator can restrict members, so the toggle works
    env.seed_role(8, RoleKind::SuperAdministrator, true, &[]);
    env.post_update(BOT_TOKEN, &message_update(-100, 8, "Ada", "/ignore_admin"))
        .await;
    assert!(
        db::GroupRepo::new(env.state.db.clone())
            .get(-100)
            .unwrap()
            .unwrap()
            .ignore_admin_tagging
    );
}

#[tokio::test]
async fn whitelist_command_registers_bots() {
    let env = moderation_env().await;
    env.seed_role(8, RoleKind::SuperAdministrator, true, &[]);

    let update = with_entities(
        message_update(-100, 8, "Ada", "/whitelist @Helpful_bot"),
        json!([
            {"type": "bot_command", "offset": 0, "length": 10},
            {"type": "mention", "offset": 11, "length": 12}
        ]),
    );
    env.post_update(BOT_TOKEN, &update).await;

    assert!(
        db::BotRepo::new(env.state.db.clone())
            .is_whitelisted("@Helpful_bot")
            .unwrap()
    );
    assert_eq!(env.events_of(EventKind::WhitelistBot).len(), 1);
}
