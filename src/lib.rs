//! Campus Gateway - moderation brain for a federated university Telegram network
//!
//! Multiple bots, each serving a slice of the community's group chats, push
//! updates into one webhook. The gateway authenticates the bot, runs the
//! update through a prioritized handler chain, resolves the issuer's
//! effective permissions, executes moderation actions against Telegram and
//! records every state change.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │                Telegram Bot API                   │
//! └────────────┬──────────────────────────▲───────────┘
//!              │ updates (webhook)        │ actions
//! ┌────────────▼──────────────────────────┴───────────┐
//! │                 Campus Gateway                    │
//! │  Ingress │ Dispatcher │ Permissions │ Moderation  │
//! │  Event log │ Admin-tag notifier │ Scheduler       │
//! └────────────────────────┬──────────────────────────┘
//!                          │
//! ┌────────────────────────▼──────────────────────────┐
//! │        SQLite store (users, groups, roles,        │
//! │        catalog, blacklist, events, tasks)         │
//! └───────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod handlers;
pub mod perms;
pub mod propagate;
pub mod sched;
pub mod telegram;
pub mod texts;

pub use app::{AppState, BotCtx};
pub use config::Config;
pub use db::{DbConn, DbPool};
pub use dispatch::{Outcome, UpdateCtx};
pub use error::{Error, Result};
pub use events::{Event, EventKind, EventLogger};
pub use perms::{ModAction, Resolved};
pub use telegram::{BotApi, TgError};
