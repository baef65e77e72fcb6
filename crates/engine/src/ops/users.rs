use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, QueryFilter, SqlErr, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{ResultEngine, TelegramProfile, User, users};

use super::{Engine, normalize_optional_text, with_tx};

impl Engine {
    /// Insert the Telegram user if unknown, otherwise refresh the stored
    /// username and names when they changed.
    pub async fn ensure_user(
        &self,
        profile: &TelegramProfile,
        now: DateTime<Utc>,
    ) -> ResultEngine<User> {
        let username = normalize_optional_text(profile.username.as_deref());
        let first_name = normalize_optional_text(profile.first_name.as_deref());
        let last_name = normalize_optional_text(profile.last_name.as_deref());

        if let Some(existing) = self.find_user_by_telegram_id(profile.telegram_id).await? {
            if existing.telegram_username == username
                && existing.first_name == first_name
                && existing.last_name == last_name
            {
                return User::try_from(existing);
            }
            let mut active: users::ActiveModel = existing.into();
            active.telegram_username = ActiveValue::Set(username);
            active.first_name = ActiveValue::Set(first_name);
            active.last_name = ActiveValue::Set(last_name);
            let updated = active.update(&self.database).await?;
            return User::try_from(updated);
        }

        let model = users::ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4().to_string()),
            telegram_id: ActiveValue::Set(profile.telegram_id),
            telegram_username: ActiveValue::Set(username),
            first_name: ActiveValue::Set(first_name),
            last_name: ActiveValue::Set(last_name),
            active_budget_id: ActiveValue::Set(None),
            created_at: ActiveValue::Set(now),
        };
        match model.insert(&self.database).await {
            Ok(inserted) => {
                tracing::info!(telegram_id = profile.telegram_id, "registered new user");
                User::try_from(inserted)
            }
            // Another update from the same account won the insert race.
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                let existing = self
                    .find_user_by_telegram_id(profile.telegram_id)
                    .await?
                    .ok_or(err)?;
                User::try_from(existing)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Return a user by internal id.
    pub async fn user(&self, user_id: Uuid) -> ResultEngine<User> {
        with_tx!(self, |db_tx| {
            let model = self.require_user(&db_tx, user_id).await?;
            User::try_from(model)
        })
    }

    async fn find_user_by_telegram_id(&self, telegram_id: i64) -> ResultEngine<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::TelegramId.eq(telegram_id))
            .one(&self.database)
            .await
            .map_err(Into::into)
    }
}
