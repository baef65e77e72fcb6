//! The `Budget` is a shared ledger: a name, a base currency, up to two
//! auxiliary currencies and the timezone its reports are computed in.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::{
    Currency, EngineError, MembershipRole, ResultEngine,
    util::{parse_timezone, parse_uuid},
};

/// Longest accepted budget name, in characters.
pub const MAX_BUDGET_NAME_CHARS: usize = 64;

#[derive(Clone, Debug, PartialEq)]
pub struct Budget {
    pub id: Uuid,
    pub name: String,
    pub base_currency: Currency,
    pub aux_currency_1: Option<Currency>,
    pub aux_currency_2: Option<Currency>,
    pub timezone: Tz,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub is_archived: bool,
}

impl Budget {
    /// Base currency followed by the auxiliary ones.
    pub fn currencies(&self) -> impl Iterator<Item = &Currency> {
        std::iter::once(&self.base_currency)
            .chain(self.aux_currency_1.as_ref())
            .chain(self.aux_currency_2.as_ref())
    }
}

/// Raw values collected by the creation conversation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BudgetDraft {
    pub name: String,
    pub base_currency: String,
    pub aux_currency_1: Option<String>,
    pub aux_currency_2: Option<String>,
    pub timezone: String,
}

/// A budget as listed for one of its members.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BudgetSummary {
    pub id: Uuid,
    pub name: String,
    pub role: MembershipRole,
    /// The user's active-budget pointer references this budget.
    pub is_default: bool,
}

/// Draft after normalization, ready to insert.
#[derive(Debug)]
pub(crate) struct ValidatedDraft {
    pub name: String,
    pub base_currency: Currency,
    pub aux_currency_1: Option<Currency>,
    pub aux_currency_2: Option<Currency>,
    pub timezone: Tz,
}

impl BudgetDraft {
    /// Trim, upper-case and validate every field.
    ///
    /// An empty second auxiliary currency is allowed without a first one;
    /// it is shifted into the first slot.
    pub(crate) fn validate(&self) -> ResultEngine<ValidatedDraft> {
        let name = crate::ops::normalize_budget_name(&self.name)?;
        let base_currency = Currency::try_from(self.base_currency.as_str())?;
        let mut aux = [self.aux_currency_1.as_deref(), self.aux_currency_2.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(Currency::try_from)
            .collect::<ResultEngine<Vec<_>>>()?
            .into_iter();
        let aux_currency_1 = aux.next();
        let aux_currency_2 = aux.next();

        let codes: Vec<&Currency> = std::iter::once(&base_currency)
            .chain(aux_currency_1.as_ref())
            .chain(aux_currency_2.as_ref())
            .collect();
        let distinct = codes
            .iter()
            .enumerate()
            .all(|(i, a)| codes[i + 1..].iter().all(|b| a != b));
        if !distinct {
            return Err(EngineError::ValidationFailure(
                "base and auxiliary currencies must be different".to_string(),
            ));
        }

        Ok(ValidatedDraft {
            name,
            base_currency,
            aux_currency_1,
            aux_currency_2,
            timezone: parse_timezone(&self.timezone)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub base_currency: String,
    pub aux_currency_1: Option<String>,
    pub aux_currency_2: Option<String>,
    pub timezone: String,
    pub created_by_user_id: String,
    pub created_at: DateTimeUtc,
    pub is_archived: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::memberships::Entity")]
    Memberships,
    #[sea_orm(has_many = "super::invites::Entity")]
    Invites,
}

impl Related<super::memberships::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Memberships.def()
    }
}

impl Related<super::invites::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invites.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Budget> for ActiveModel {
    fn from(value: &Budget) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            name: ActiveValue::Set(value.name.clone()),
            base_currency: ActiveValue::Set(value.base_currency.code().to_string()),
            aux_currency_1: ActiveValue::Set(
                value.aux_currency_1.as_ref().map(|c| c.code().to_string()),
            ),
            aux_currency_2: ActiveValue::Set(
                value.aux_currency_2.as_ref().map(|c| c.code().to_string()),
            ),
            timezone: ActiveValue::Set(value.timezone.name().to_string()),
            created_by_user_id: ActiveValue::Set(value.created_by.to_string()),
            created_at: ActiveValue::Set(value.created_at),
            is_archived: ActiveValue::Set(value.is_archived),
        }
    }
}

impl TryFrom<Model> for Budget {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "budget")?,
            name: model.name,
            base_currency: Currency::try_from(model.base_currency.as_str())?,
            aux_currency_1: model
                .aux_currency_1
                .as_deref()
                .map(Currency::try_from)
                .transpose()?,
            aux_currency_2: model
                .aux_currency_2
                .as_deref()
                .map(Currency::try_from)
                .transpose()?,
            timezone: parse_timezone(&model.timezone)?,
            created_by: parse_uuid(&model.created_by_user_id, "user")?,
            created_at: model.created_at,
            is_archived: model.is_archived,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(base: &str, aux1: Option<&str>, aux2: Option<&str>) -> BudgetDraft {
        BudgetDraft {
            name: "  Family  ".to_string(),
            base_currency: base.to_string(),
            aux_currency_1: aux1.map(ToString::to_string),
            aux_currency_2: aux2.map(ToString::to_string),
            timezone: "Europe/Moscow".to_string(),
        }
    }

    #[test]
    fn validate_normalizes_fields() {
        let validated = draft("rub", Some("usd"), None).validate().unwrap();
        assert_eq!(validated.name, "Family");
        assert_eq!(validated.base_currency.code(), "RUB");
        assert_eq!(validated.aux_currency_1.unwrap().code(), "USD");
        assert!(validated.aux_currency_2.is_none());
        assert_eq!(validated.timezone, Tz::Europe__Moscow);
    }

    #[test]
    fn validate_rejects_duplicate_currencies() {
        for (base, aux1, aux2) in [
            ("RUB", Some("rub"), None),
            ("RUB", None, Some("RUB")),
            ("RUB", Some("USD"), Some("usd")),
        ] {
            let err = draft(base, aux1, aux2).validate().unwrap_err();
            assert!(matches!(err, EngineError::ValidationFailure(_)), "{base} {aux1:?} {aux2:?}");
        }
    }

    #[test]
    fn validate_shifts_lone_second_aux() {
        let validated = draft("RUB", Some(" "), Some("EUR")).validate().unwrap();
        assert_eq!(validated.aux_currency_1.unwrap().code(), "EUR");
        assert!(validated.aux_currency_2.is_none());
    }

    #[test]
    fn validate_rejects_bad_timezone() {
        let mut bad = draft("RUB", None, None);
        bad.timezone = "Nowhere/City".to_string();
        assert!(matches!(
            bad.validate().unwrap_err(),
            EngineError::ValidationFailure(_)
        ));
    }
}
