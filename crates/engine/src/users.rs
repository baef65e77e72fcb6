//! Users table and the `User` domain type.
//!
//! Users are keyed by an internal uuid; the Telegram id is unique and used to
//! find the row on every interaction.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use uuid::Uuid;

use crate::{
    EngineError,
    util::{parse_optional_uuid, parse_uuid},
};

/// Identity data reported by Telegram for the sender of an update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TelegramProfile {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub active_budget_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// First and last name joined by a space, if any part is present.
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }

    /// `@username`, if the user has one.
    pub fn handle(&self) -> Option<String> {
        self.username
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(|u| format!("@{u}"))
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub telegram_id: i64,
    pub telegram_username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub active_budget_id: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::memberships::Entity")]
    Memberships,
}

impl Related<super::memberships::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Memberships.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for User {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "user")?,
            telegram_id: model.telegram_id,
            username: model.telegram_username,
            first_name: model.first_name,
            last_name: model.last_name,
            active_budget_id: parse_optional_uuid(model.active_budget_id.as_deref(), "budget")?,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(username: Option<&str>, first: Option<&str>, last: Option<&str>) -> User {
        User {
            id: Uuid::new_v4(),
            telegram_id: 42,
            username: username.map(ToString::to_string),
            first_name: first.map(ToString::to_string),
            last_name: last.map(ToString::to_string),
            active_budget_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn full_name_joins_present_parts() {
        assert_eq!(
            user(None, Some("Anna"), Some("Petrova")).full_name().as_deref(),
            Some("Anna Petrova")
        );
        assert_eq!(user(None, None, Some("Petrova")).full_name().as_deref(), Some("Petrova"));
        assert_eq!(user(None, Some("  "), None).full_name(), None);
    }

    #[test]
    fn handle_requires_username() {
        assert_eq!(user(Some("anna"), None, None).handle().as_deref(), Some("@anna"));
        assert_eq!(user(Some(""), None, None).handle(), None);
        assert_eq!(user(None, None, None).handle(), None);
    }
}
