//! Budget invites: single-use, time-limited tokens that admit a new
//! participant.

use chrono::{DateTime, Duration, Utc};
use sea_orm::entity::prelude::*;
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine, User,
    util::{generate_invite_token, parse_uuid},
};

/// How long a freshly created invite stays valid.
pub const INVITE_TTL_HOURS: i64 = 24;
/// How many times an invite can be accepted.
pub const INVITE_MAX_USES: i32 = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invite {
    pub id: Uuid,
    pub token: String,
    pub budget_id: Uuid,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub max_uses: i32,
    pub used_count: i32,
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Invite {
    pub(crate) fn new(budget_id: Uuid, created_by: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            token: generate_invite_token(),
            budget_id,
            created_by,
            created_at: now,
            expires_at: now + Duration::hours(INVITE_TTL_HOURS),
            max_uses: INVITE_MAX_USES,
            used_count: 0,
            last_used_at: None,
            is_active: true,
        }
    }

    /// Fails with the first terminal condition that applies at `now`.
    ///
    /// Exhaustion is reported before deactivation so that a consumed
    /// single-use invite reads as "already used" rather than "not found".
    pub fn ensure_usable(&self, now: DateTime<Utc>) -> ResultEngine<()> {
        if self.used_count >= self.max_uses {
            return Err(EngineError::InviteExhausted);
        }
        if !self.is_active {
            return Err(EngineError::InviteNotFound);
        }
        if now >= self.expires_at {
            return Err(EngineError::InviteExpired);
        }
        Ok(())
    }
}

/// What a prospective participant sees before accepting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvitePreview {
    pub token: String,
    pub budget_id: Uuid,
    pub budget_name: String,
    pub inviter: User,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "budget_invites")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub token: String,
    pub budget_id: String,
    pub created_by_user_id: String,
    pub created_at: DateTimeUtc,
    pub expires_at: DateTimeUtc,
    pub max_uses: i32,
    pub used_count: i32,
    pub last_used_at: Option<DateTimeUtc>,
    pub is_active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::budgets::Entity",
        from = "Column::BudgetId",
        to = "super::budgets::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Budgets,
}

impl Related<super::budgets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Budgets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Invite> for ActiveModel {
    fn from(value: &Invite) -> Self {
        use sea_orm::ActiveValue::Set;
        Self {
            id: Set(value.id.to_string()),
            token: Set(value.token.clone()),
            budget_id: Set(value.budget_id.to_string()),
            created_by_user_id: Set(value.created_by.to_string()),
            created_at: Set(value.created_at),
            expires_at: Set(value.expires_at),
            max_uses: Set(value.max_uses),
            used_count: Set(value.used_count),
            last_used_at: Set(value.last_used_at),
            is_active: Set(value.is_active),
        }
    }
}

impl TryFrom<Model> for Invite {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "invite")?,
            token: model.token,
            budget_id: parse_uuid(&model.budget_id, "budget")?,
            created_by: parse_uuid(&model.created_by_user_id, "user")?,
            created_at: model.created_at,
            expires_at: model.expires_at,
            max_uses: model.max_uses,
            used_count: model.used_count,
            last_used_at: model.last_used_at,
            is_active: model.is_active,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invite(now: DateTime<Utc>) -> Invite {
        Invite::new(Uuid::new_v4(), Uuid::new_v4(), now)
    }

    #[test]
    fn new_invite_expires_after_ttl() {
        let now = Utc::now();
        let invite = invite(now);
        assert_eq!(invite.expires_at - invite.created_at, Duration::hours(24));
        assert_eq!(invite.max_uses, 1);
        assert!(invite.ensure_usable(now).is_ok());
    }

    #[test]
    fn expiry_is_inclusive() {
        let now = Utc::now();
        let invite = invite(now);
        assert_eq!(
            invite.ensure_usable(invite.expires_at),
            Err(EngineError::InviteExpired)
        );
        assert!(
            invite
                .ensure_usable(invite.expires_at - Duration::seconds(1))
                .is_ok()
        );
    }

    #[test]
    fn exhaustion_wins_over_deactivation() {
        let now = Utc::now();
        let mut invite = invite(now);
        invite.used_count = 1;
        invite.is_active = false;
        assert_eq!(invite.ensure_usable(now), Err(EngineError::InviteExhausted));
    }

    #[test]
    fn revoked_invite_reads_as_missing() {
        let now = Utc::now();
        let mut invite = invite(now);
        invite.is_active = false;
        assert_eq!(invite.ensure_usable(now), Err(EngineError::InviteNotFound));
    }
}
