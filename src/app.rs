//! Process state and startup wiring
//!
//! [`AppState`] is shared by the webhook ingress, the dispatcher and the
//! scheduler. Bot API clients are cached per token, populated lazily on
//! first sighting.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::Config;
use crate::db::{
    self, BlacklistRepo, BotRepo, BotRow, CatalogRepo, DbPool, EventRepo, GroupRepo, GroupRow,
    MembershipRepo, RoleRepo, TaskRepo, UserRepo,
};
use crate::events::EventLogger;
use crate::telegram::BotApi;
use crate::telegram::types::API_BASE;
use crate::{Error, Result};

/// A cached per-bot context
#[derive(Debug)]
pub struct BotCtx {
    pub row: BotRow,
    pub api: BotApi,
}

impl BotCtx {
    /// The bot's own Telegram user id, derived from its token
    #[must_use]
    pub fn user_id(&self) -> Option<u64> {
        self.api.bot_user_id()
    }
}

/// Shared process state
pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub logger: EventLogger,
    tg_base: String,
    bots: RwLock<HashMap<String, Arc<BotCtx>>>,
}

impl AppState {
    /// Build the state over an initialized pool
    #[must_use]
    pub fn new(config: Config, db: DbPool) -> Self {
        Self::with_base(config, db, API_BASE)
    }

    /// Build the state against a custom Bot API base URL
    #[must_use]
    pub fn with_base(config: Config, db: DbPool, tg_base: impl Into<String>) -> Self {
        let tg_base = tg_base.into();
        let logging_api = BotApi::with_base(config.logging_bot_token_raw(), tg_base.clone());
        let logger = EventLogger::new(db.clone(), logging_api, config.logging_chat_id);
        Self {
            config,
            db,
            logger,
            tg_base,
            bots: RwLock::new(HashMap::new()),
        }
    }

    /// Authenticate a webhook token, caching the bot context on first use
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub async fn bot_by_token(&self, token: &str) -> Result<Option<Arc<BotCtx>>> {
        if let Some(ctx) = self.bots.read().await.get(token) {
            return Ok(Some(ctx.clone()));
        }
        let Some(row) = self.bots_repo().get_by_token(token)? else {
            return Ok(None);
        };
        let ctx = Arc::new(BotCtx {
            api: BotApi::with_base(row.token.clone(), self.tg_base.clone()),
            row,
        });
        self.bots
            .write()
            .await
            .insert(token.to_string(), ctx.clone());
        Ok(Some(ctx))
    }

    /// The API client responsible for a group
    ///
    /// # Errors
    ///
    /// Returns error if the group has no bot or the bot is unknown
    pub async fn api_for_group(&self, group: &GroupRow) -> Result<Arc<BotCtx>> {
        let token = group
            .bot_token
            .as_deref()
            .ok_or_else(|| Error::Config(format!("group {} has no bot", group.id)))?;
        self.bot_by_token(token)
            .await?
            .ok_or_else(|| Error::Config(format!("group {} references unknown bot", group.id)))
    }

    // --- Repository accessors ----------------------------------------------

    #[must_use]
    pub fn users(&self) -> UserRepo {
        UserRepo::new(self.db.clone())
    }

    #[must_use]
    pub fn groups(&self) -> GroupRepo {
        GroupRepo::new(self.db.clone())
    }

    #[must_use]
    pub fn memberships(&self) -> MembershipRepo {
        MembershipRepo::new(self.db.clone())
    }

    #[must_use]
    pub fn bots_repo(&self) -> BotRepo {
        BotRepo::new(self.db.clone())
    }

    #[must_use]
    pub fn roles(&self) -> RoleRepo {
        RoleRepo::new(self.db.clone())
    }

    #[must_use]
    pub fn catalog(&self) -> CatalogRepo {
        CatalogRepo::new(self.db.clone())
    }

    #[must_use]
    pub fn blacklist(&self) -> BlacklistRepo {
        BlacklistRepo::new(self.db.clone())
    }

    #[must_use]
    pub fn events(&self) -> EventRepo {
        EventRepo::new(self.db.clone())
    }

    #[must_use]
    pub fn tasks(&self) -> TaskRepo {
        TaskRepo::new(self.db.clone())
    }
}

/// Run the gateway: HTTP ingress plus the scheduler worker
///
/// # Errors
///
/// Returns error if the database or the listener cannot be set up
pub async fn run(config: Config) -> Result<()> {
    let pool = db::init(&config.db_path)?;
    let port = config.port;
    let state = Arc::new(AppState::new(config, pool));

    crate::sched::seed_recurring(&state)?;

    let worker_state = state.clone();
    let worker = tokio::spawn(async move {
        crate::sched::run_worker(worker_state).await;
    });

    let router = crate::api::router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "webhook ingress listening");

    tokio::select! {
        result = async { axum::serve(listener, router).await } => {
            result?;
        }
        () = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }
    worker.abort();
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
