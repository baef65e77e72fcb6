//! Telegram bot.
//!
//! The bot drives the onboarding, budget and participant conversations and
//! delegates every rule to the [`engine::Engine`] it is built with.

use std::{sync::Arc, time::Duration};

use chrono_tz::Tz;
use teloxide::{prelude::*, utils::command::BotCommands};

mod commands;
mod flow;
mod handlers;
mod parsing;
mod state;
mod ui;

pub use commands::MenuCommands;

const DEFAULT_BOT_HOST: &str = "t.me";

#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("telegram token is missing")]
    MissingToken,
    #[error("engine is missing")]
    MissingEngine,
    #[error("unknown default timezone: {0}")]
    InvalidTimezone(String),
}

#[derive(Clone)]
pub struct ConfigParameters {
    allowed_users: Option<Vec<UserId>>,
    engine: Arc<engine::Engine>,
    sessions: state::SessionStore,
    bot_username: String,
    bot_host: String,
    default_tz: Tz,
}

pub struct Bot {
    token: String,
    allowed_users: Option<Vec<UserId>>,
    engine: Arc<engine::Engine>,
    bot_host: String,
    default_tz: Tz,
    session_ttl: Duration,
}

impl Bot {
    pub fn builder() -> BotBuilder {
        BotBuilder::default()
    }

    pub async fn run(&self) {
        tracing::info!("Starting telegram bot...");

        let bot = teloxide::Bot::new(&self.token);
        let bot_username = match bot.get_me().await {
            Ok(me) => me.username().to_string(),
            Err(err) => {
                tracing::error!("failed to fetch bot identity: {err}");
                return;
            }
        };
        if let Err(err) = bot.set_my_commands(MenuCommands::bot_commands()).await {
            tracing::warn!("failed to register bot commands: {err}");
        }
        tracing::info!("Logged in as @{bot_username}");

        let parameters = ConfigParameters {
            allowed_users: self.allowed_users.clone(),
            engine: Arc::clone(&self.engine),
            sessions: state::SessionStore::new(self.session_ttl),
            bot_username,
            bot_host: self.bot_host.clone(),
            default_tz: self.default_tz,
        };

        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(handlers::handle_message))
            .branch(Update::filter_callback_query().endpoint(handlers::handle_callback));

        Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![parameters])
            .default_handler(|upd| async move {
                tracing::warn!("Unhandled update: {:?}", upd);
            })
            .error_handler(LoggingErrorHandler::with_custom_text(
                "An error has occurred in the dispatcher",
            ))
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }
}

#[derive(Default)]
pub struct BotBuilder {
    token: String,
    allowed_users: Option<Vec<UserId>>,
    engine: Option<Arc<engine::Engine>>,
    bot_host: Option<String>,
    default_timezone: Option<String>,
    session_ttl: Option<Duration>,
}

impl BotBuilder {
    pub fn token(mut self, token: &str) -> BotBuilder {
        self.token = token.to_string();
        self
    }

    /// Telegram ids allowed to talk to the bot. An empty list allows everyone.
    pub fn allowed_users(mut self, ids: impl IntoIterator<Item = u64>) -> BotBuilder {
        let allowed_users: Vec<UserId> = ids.into_iter().map(UserId).collect();
        if !allowed_users.is_empty() {
            self.allowed_users = Some(allowed_users);
        }
        self
    }

    pub fn engine(mut self, engine: Arc<engine::Engine>) -> BotBuilder {
        self.engine = Some(engine);
        self
    }

    /// Host used in invite links, `t.me` unless overridden.
    pub fn bot_host(mut self, host: &str) -> BotBuilder {
        self.bot_host = Some(host.to_string());
        self
    }

    pub fn default_timezone(mut self, timezone: &str) -> BotBuilder {
        self.default_timezone = Some(timezone.to_string());
        self
    }

    pub fn session_ttl(mut self, ttl: Duration) -> BotBuilder {
        self.session_ttl = Some(ttl);
        self
    }

    pub fn build(self) -> Result<Bot, BotError> {
        tracing::info!("Initializing telegram bot...");
        if self.token.trim().is_empty() {
            return Err(BotError::MissingToken);
        }
        let engine = self.engine.ok_or(BotError::MissingEngine)?;
        let default_tz = match self.default_timezone {
            Some(name) => name
                .trim()
                .parse::<Tz>()
                .map_err(|_| BotError::InvalidTimezone(name))?,
            None => chrono_tz::Europe::Moscow,
        };

        Ok(Bot {
            token: self.token,
            allowed_users: self.allowed_users,
            engine,
            bot_host: self
                .bot_host
                .unwrap_or_else(|| DEFAULT_BOT_HOST.to_string()),
            default_tz,
            session_ttl: self.session_ttl.unwrap_or(state::DEFAULT_SESSION_TTL),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_token_and_engine() {
        assert!(matches!(
            Bot::builder().build(),
            Err(BotError::MissingToken)
        ));
        assert!(matches!(
            Bot::builder().token("123:abc").build(),
            Err(BotError::MissingEngine)
        ));
    }
}
