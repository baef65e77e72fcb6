//! Domain engine for shared budgets.
//!
//! The [`Engine`] owns the database connection and exposes the operations
//! the chat layer needs: user upsert, budget creation, invites, memberships
//! and the per-user active budget. Every operation runs in its own database
//! transaction.

pub use budgets::{Budget, BudgetDraft, BudgetSummary, MAX_BUDGET_NAME_CHARS};
pub use currency::{Currency, SUPPORTED_CURRENCIES};
pub use error::EngineError;
pub use invites::{INVITE_MAX_USES, INVITE_TTL_HOURS, Invite, InvitePreview};
pub use memberships::{Membership, MembershipRole};
pub use ops::{Engine, EngineBuilder, Participant, normalize_budget_name};
pub use users::{TelegramProfile, User};

mod budget_counters;
mod budgets;
mod currency;
mod error;
mod invites;
mod memberships;
mod ops;
mod users;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
