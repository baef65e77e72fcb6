//! Conversation state machines.
//!
//! The flows are plain values: every input produces a new state or an error
//! message, nothing here talks to Telegram or to the engine.

use chrono_tz::Tz;
use engine::{BudgetDraft, Currency, MAX_BUDGET_NAME_CHARS, normalize_budget_name};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum CreateStep {
    #[default]
    Name,
    BaseCurrency,
    AuxCurrency1,
    AuxCurrency2,
    Timezone,
    Confirm,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub(crate) enum FlowError {
    #[error("Название не может быть пустым.")]
    EmptyName,
    #[error("Название не длиннее {MAX_BUDGET_NAME_CHARS} символов.")]
    NameTooLong,
    #[error("Не знаю такую валюту. Выбери из списка или пришли код из 3 букв.")]
    InvalidCurrency,
    #[error("Эта валюта уже выбрана.")]
    DuplicateCurrency,
    #[error("Не знаю такую таймзону. Пример: Europe/Moscow.")]
    InvalidTimezone,
    #[error("Этот шаг нельзя пропустить.")]
    NotSkippable,
    #[error("Используй кнопки ниже.")]
    UnexpectedInput,
}

/// What happened to the flow after `back`.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Back {
    Moved,
    /// Back on the first step leaves the flow.
    Exit,
}

/// Values collected while creating a budget.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct CreateBudgetFlow {
    pub step: CreateStep,
    pub name: Option<String>,
    pub base_currency: Option<Currency>,
    pub aux_currency_1: Option<Currency>,
    pub aux_currency_2: Option<Currency>,
    pub timezone: Option<Tz>,
}

impl CreateBudgetFlow {
    /// Free text typed by the user, interpreted according to the step.
    pub(crate) fn input_text(&mut self, text: &str) -> Result<(), FlowError> {
        match self.step {
            CreateStep::Name => self.set_name(text),
            CreateStep::BaseCurrency | CreateStep::AuxCurrency1 | CreateStep::AuxCurrency2 => {
                self.pick_currency(text)
            }
            CreateStep::Timezone => self.set_timezone(text),
            CreateStep::Confirm => Err(FlowError::UnexpectedInput),
        }
    }

    pub(crate) fn set_name(&mut self, text: &str) -> Result<(), FlowError> {
        if self.step != CreateStep::Name {
            return Err(FlowError::UnexpectedInput);
        }
        let name = normalize_budget_name(text).map_err(|_| {
            if text.trim().is_empty() {
                FlowError::EmptyName
            } else {
                FlowError::NameTooLong
            }
        })?;
        self.name = Some(name);
        self.step = CreateStep::BaseCurrency;
        Ok(())
    }

    pub(crate) fn pick_currency(&mut self, code: &str) -> Result<(), FlowError> {
        let currency = Currency::try_from(code).map_err(|_| FlowError::InvalidCurrency)?;
        if self.chosen_currencies().any(|c| *c == currency) {
            return Err(FlowError::DuplicateCurrency);
        }
        match self.step {
            CreateStep::BaseCurrency => {
                self.base_currency = Some(currency);
                self.step = CreateStep::AuxCurrency1;
            }
            CreateStep::AuxCurrency1 => {
                self.aux_currency_1 = Some(currency);
                self.step = CreateStep::AuxCurrency2;
            }
            CreateStep::AuxCurrency2 => {
                self.aux_currency_2 = Some(currency);
                self.step = CreateStep::Timezone;
            }
            _ => return Err(FlowError::UnexpectedInput),
        }
        Ok(())
    }

    /// Skipping the first auxiliary currency skips the second as well.
    pub(crate) fn skip(&mut self) -> Result<(), FlowError> {
        match self.step {
            CreateStep::AuxCurrency1 => {
                self.aux_currency_1 = None;
                self.aux_currency_2 = None;
            }
            CreateStep::AuxCurrency2 => self.aux_currency_2 = None,
            _ => return Err(FlowError::NotSkippable),
        }
        self.step = CreateStep::Timezone;
        Ok(())
    }

    pub(crate) fn set_timezone(&mut self, name: &str) -> Result<(), FlowError> {
        if self.step != CreateStep::Timezone {
            return Err(FlowError::UnexpectedInput);
        }
        let tz = name
            .trim()
            .parse::<Tz>()
            .map_err(|_| FlowError::InvalidTimezone)?;
        self.timezone = Some(tz);
        self.step = CreateStep::Confirm;
        Ok(())
    }

    /// Go to the previous step, clearing what was entered from there on.
    pub(crate) fn back(&mut self) -> Back {
        let previous = match self.step {
            CreateStep::Name => return Back::Exit,
            CreateStep::BaseCurrency => CreateStep::Name,
            CreateStep::AuxCurrency1 => CreateStep::BaseCurrency,
            CreateStep::AuxCurrency2 => CreateStep::AuxCurrency1,
            CreateStep::Timezone if self.aux_currency_1.is_none() => CreateStep::AuxCurrency1,
            CreateStep::Timezone => CreateStep::AuxCurrency2,
            CreateStep::Confirm => CreateStep::Timezone,
        };
        self.rewind_to(previous);
        Back::Moved
    }

    /// "Edit" on the confirm screen returns to the timezone step.
    pub(crate) fn edit(&mut self) {
        if self.step == CreateStep::Confirm {
            self.rewind_to(CreateStep::Timezone);
        }
    }

    /// The collected values, once the flow reached the confirm step.
    pub(crate) fn draft(&self) -> Option<BudgetDraft> {
        if self.step != CreateStep::Confirm {
            return None;
        }
        Some(BudgetDraft {
            name: self.name.clone()?,
            base_currency: self.base_currency.as_ref()?.to_string(),
            aux_currency_1: self.aux_currency_1.as_ref().map(ToString::to_string),
            aux_currency_2: self.aux_currency_2.as_ref().map(ToString::to_string),
            timezone: self.timezone?.name().to_string(),
        })
    }

    pub(crate) fn chosen_currencies(&self) -> impl Iterator<Item = &Currency> {
        self.base_currency
            .iter()
            .chain(self.aux_currency_1.iter())
            .chain(self.aux_currency_2.iter())
    }

    fn rewind_to(&mut self, step: CreateStep) {
        if step <= CreateStep::Name {
            self.name = None;
        }
        if step <= CreateStep::BaseCurrency {
            self.base_currency = None;
        }
        if step <= CreateStep::AuxCurrency1 {
            self.aux_currency_1 = None;
        }
        if step <= CreateStep::AuxCurrency2 {
            self.aux_currency_2 = None;
        }
        self.timezone = None;
        self.step = step;
    }
}

/// Joining an existing budget through an invite.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) enum JoinFlow {
    #[default]
    AwaitToken,
    Confirm {
        token: String,
    },
}
