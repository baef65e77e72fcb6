use engine::{Budget, BudgetSummary, InvitePreview, MembershipRole, Participant, SUPPORTED_CURRENCIES};
use teloxide::{
    types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup},
    utils::html::escape,
};
use uuid::Uuid;

use crate::{
    flow::{CreateBudgetFlow, CreateStep},
    parsing::{encode_uuid, participant_callback},
};

pub(crate) const GENERIC_FAILURE: &str = "Что-то пошло не так. Попробуй ещё раз.";
pub(crate) const MISSING_TOKEN: &str = "Не вижу токен. Пришли ссылку или код вида invite_XXXX.";
pub(crate) const CONTROLS_HINT: &str = "Кнопки управления внизу 👇";
pub(crate) const CANCELLED: &str = "Отменено.";

const CREATE_TITLE: &str = "💼 Создание бюджета";
const CURRENCIES_PER_ROW: usize = 5;
const COMMON_TIMEZONES: [&str; 6] = [
    "Europe/Moscow",
    "Europe/Kaliningrad",
    "Asia/Yekaterinburg",
    "Asia/Almaty",
    "Asia/Tbilisi",
    "Europe/Istanbul",
];

fn section(title: &str, hint: &str) -> String {
    format!("<b>{title}</b>\n{hint}")
}

fn button(text: impl Into<String>, data: impl Into<String>) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text.into(), data.into())
}

pub(crate) fn render_welcome(first_name: Option<&str>) -> String {
    let name = first_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or("друг");
    format!(
        "👋 Добро пожаловать, {}!\n🤖 Я - бот финансовый помощник!\n\n❤️ Приятного использования!",
        escape(name)
    )
}

pub(crate) fn render_help(commands: &str) -> String {
    format!(
        "{}\n\nЧтобы присоединиться к чужому бюджету, пришли ссылку-приглашение.",
        escape(commands)
    )
}

pub(crate) fn render_first_run() -> (String, InlineKeyboardMarkup) {
    let kb = InlineKeyboardMarkup::new(vec![
        vec![button("✅ Создать бюджет", "ob:create")],
        vec![button("➕ Присоединиться", "ob:join")],
    ]);
    (section("Первый запуск", "Что делаем?"), kb)
}

pub(crate) fn render_home(budget: &BudgetSummary) -> (String, InlineKeyboardMarkup) {
    let text = format!(
        "<b>🏠 HOME</b>\n<i>💼 Бюджет \"{}\"</i>",
        escape(&budget.name)
    );
    let kb = InlineKeyboardMarkup::new(vec![
        vec![
            button("➕ Добавить приход", "main:income"),
            button("➖ Добавить расход", "main:expense"),
        ],
        vec![button("🎯 Цели", "main:goals"), button("💼 Бюджеты", "main:budgets")],
        vec![button("📊 Отчёты", "main:reports")],
    ]);
    (text, kb)
}

/// Sections of the main menu that have no content yet.
pub(crate) fn render_placeholder(title: &str) -> (String, InlineKeyboardMarkup) {
    let kb = InlineKeyboardMarkup::new(vec![vec![button("⬅️ Назад", "home:show")]]);
    (section(title, "Раздел в разработке."), kb)
}

pub(crate) fn render_create_step(
    flow: &CreateBudgetFlow,
    default_tz: &str,
) -> (String, InlineKeyboardMarkup) {
    let nav = vec![button("⬅️ Назад", "ob:back"), button("❌ Отмена", "ob:cancel")];
    match flow.step {
        CreateStep::Name => (
            section(CREATE_TITLE, "Введите название"),
            InlineKeyboardMarkup::new(vec![vec![button("❌ Отмена", "ob:cancel")]]),
        ),
        CreateStep::BaseCurrency => {
            let mut rows = currency_rows(flow);
            rows.push(nav);
            (
                section(CREATE_TITLE, "Выберите базовую валюту"),
                InlineKeyboardMarkup::new(rows),
            )
        }
        CreateStep::AuxCurrency1 | CreateStep::AuxCurrency2 => {
            let chosen: Vec<&str> = flow.chosen_currencies().map(|c| c.code()).collect();
            let hint = format!(
                "Выберите до 2 дополнительных валют\nУже выбрано: {}",
                chosen.join(", ")
            );
            let mut rows = currency_rows(flow);
            rows.push(vec![button("⏭ Пропустить", "ob:skip")]);
            rows.push(nav);
            (section(CREATE_TITLE, &hint), InlineKeyboardMarkup::new(rows))
        }
        CreateStep::Timezone => {
            let mut rows = vec![vec![button(
                format!("Оставить {default_tz}"),
                "ob:tz:keep",
            )]];
            rows.extend(
                COMMON_TIMEZONES
                    .iter()
                    .filter(|tz| **tz != default_tz)
                    .collect::<Vec<_>>()
                    .chunks(2)
                    .map(|pair| {
                        pair.iter()
                            .map(|tz| button(**tz, format!("ob:tz:{tz}")))
                            .collect()
                    }),
            );
            rows.push(nav);
            (
                section(CREATE_TITLE, "Выберите таймзону\nИли пришли название, например Asia/Tbilisi"),
                InlineKeyboardMarkup::new(rows),
            )
        }
        CreateStep::Confirm => render_create_confirm(flow),
    }
}

fn currency_rows(flow: &CreateBudgetFlow) -> Vec<Vec<InlineKeyboardButton>> {
    let available: Vec<&str> = SUPPORTED_CURRENCIES
        .iter()
        .copied()
        .filter(|code| flow.chosen_currencies().all(|c| c.code() != *code))
        .collect();
    available
        .chunks(CURRENCIES_PER_ROW)
        .map(|chunk| {
            chunk
                .iter()
                .map(|code| button(*code, format!("ob:cur:{code}")))
                .collect()
        })
        .collect()
}

fn render_create_confirm(flow: &CreateBudgetFlow) -> (String, InlineKeyboardMarkup) {
    let or_dash = |value: Option<&str>| value.unwrap_or("—").to_string();
    let text = format!(
        "Проверь данные 👇\n\nБюджет: {}\nБазовая валюта: {}\nВспомогательная 1: {}\nВспомогательная 2: {}\nТаймзона: {}\n\nСоздать бюджет?",
        escape(flow.name.as_deref().unwrap_or("—")),
        or_dash(flow.base_currency.as_ref().map(|c| c.code())),
        or_dash(flow.aux_currency_1.as_ref().map(|c| c.code())),
        or_dash(flow.aux_currency_2.as_ref().map(|c| c.code())),
        or_dash(flow.timezone.as_ref().map(|tz| tz.name())),
    );
    let kb = InlineKeyboardMarkup::new(vec![
        vec![button("✅ Создать бюджет", "ob:confirm")],
        vec![button("✏️ Исправить", "ob:edit"), button("❌ Отмена", "ob:cancel")],
    ]);
    (text, kb)
}

pub(crate) fn render_budget_created(budget: &Budget) -> String {
    format!("✅ Бюджет \"{}\" создан.", escape(&budget.name))
}

pub(crate) fn render_join_prompt() -> (String, InlineKeyboardMarkup) {
    let kb = InlineKeyboardMarkup::new(vec![vec![button("❌ Отмена", "join:cancel")]]);
    (
        section("🔗 Присоединиться", "Пришли ссылку или код вида invite_XXXX"),
        kb,
    )
}

pub(crate) fn render_invite_preview(preview: &InvitePreview) -> (String, InlineKeyboardMarkup) {
    let inviter = preview
        .inviter
        .handle()
        .unwrap_or_else(|| "пользователь".to_string());
    let text = format!(
        "{} пригласил вас в совместный бюджет \"{}\".",
        escape(&inviter),
        escape(&preview.budget_name)
    );
    let kb = InlineKeyboardMarkup::new(vec![vec![
        button("✅ Присоединиться", "join:accept"),
        button("❌ Отмена", "join:cancel"),
    ]]);
    (text, kb)
}

pub(crate) fn render_joined(budget_name: &str) -> String {
    format!("✅ Вы присоединились к бюджету \"{}\".", escape(budget_name))
}

pub(crate) fn render_invite_created(budget_id: Uuid, link: &str) -> (String, InlineKeyboardMarkup) {
    let text = format!(
        "Готово 👇\n\nСсылка действует 24 часа и используется один раз:\n{}",
        escape(link)
    );
    let kb = InlineKeyboardMarkup::new(vec![vec![button(
        "⬅️ Назад",
        format!("bud:open:{}", encode_uuid(budget_id)),
    )]]);
    (text, kb)
}

pub(crate) fn render_budgets_menu() -> (String, InlineKeyboardMarkup) {
    let kb = InlineKeyboardMarkup::new(vec![
        vec![button("📋 Мои бюджеты", "bud:list")],
        vec![button("✅ Создать бюджет", "bud:create")],
        vec![button("➕ Присоединиться", "bud:join")],
        vec![button("Закрыть", "home:show")],
    ]);
    (section("💼 Бюджеты", "Что делаем?"), kb)
}

pub(crate) fn render_budget_list(budgets: &[BudgetSummary]) -> (String, InlineKeyboardMarkup) {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = budgets
        .iter()
        .map(|b| {
            let label = if b.is_default {
                format!("⭐ {}", b.name)
            } else {
                b.name.clone()
            };
            vec![button(label, format!("bud:open:{}", encode_uuid(b.id)))]
        })
        .collect();
    rows.push(vec![button("⬅️ Назад", "main:budgets")]);

    let text = if budgets.is_empty() {
        "У вас пока нет бюджетов.".to_string()
    } else {
        "Мои бюджеты:".to_string()
    };
    (text, InlineKeyboardMarkup::new(rows))
}

pub(crate) fn render_budget_detail(
    budget: &Budget,
    summary: &BudgetSummary,
) -> (String, InlineKeyboardMarkup) {
    let currencies: Vec<&str> = budget.currencies().map(|c| c.code()).collect();
    let text = format!(
        "Бюджет: {}\nВалюты: {}\nТаймзона: {}",
        escape(&budget.name),
        currencies.join(", "),
        budget.timezone.name()
    );

    let id = encode_uuid(budget.id);
    let mut rows = Vec::new();
    if summary.role == MembershipRole::Owner {
        rows.push(vec![button("👥 Участники", format!("bud:members:{id}"))]);
        rows.push(vec![button(
            "🔗 Пригласить участника",
            format!("bud:invite:{id}"),
        )]);
    }
    if !summary.is_default {
        rows.push(vec![button(
            "⭐ Сделать по умолчанию",
            format!("bud:default:{id}"),
        )]);
    }
    if summary.role == MembershipRole::Owner {
        rows.push(vec![button(
            "📦 Архивировать бюджет",
            format!("bud:archive:{id}"),
        )]);
    }
    rows.push(vec![button("⬅️ Назад", "bud:list"), button("Закрыть", "home:show")]);
    (text, InlineKeyboardMarkup::new(rows))
}

pub(crate) fn render_archive_confirm(budget: &Budget) -> (String, InlineKeyboardMarkup) {
    let id = encode_uuid(budget.id);
    let kb = InlineKeyboardMarkup::new(vec![vec![
        button("✅ Архивировать", format!("bud:archive_yes:{id}")),
        button("❌ Отмена", format!("bud:open:{id}")),
    ]]);
    (
        format!("Архивировать бюджет \"{}\"?", escape(&budget.name)),
        kb,
    )
}

pub(crate) fn render_default_set(budget: &Budget) -> String {
    format!("Бюджет по умолчанию: {}", escape(&budget.name))
}

fn participant_label(participant: &Participant) -> String {
    let handle = participant
        .user
        .handle()
        .unwrap_or_else(|| "без username".to_string());
    let name = participant
        .user
        .full_name()
        .unwrap_or_else(|| "Без имени".to_string());
    let role = match participant.role {
        MembershipRole::Owner => "владелец",
        MembershipRole::Participant => "участник",
    };
    format!("{handle} — {name} ({role})")
}

pub(crate) fn render_participants(
    budget_id: Uuid,
    participants: &[Participant],
) -> (String, InlineKeyboardMarkup) {
    let mut text = String::from("👥 Участники\n");
    if participants.is_empty() {
        text.push_str("\nУчастников нет.");
    }
    for participant in participants {
        text.push('\n');
        text.push_str(&escape(&participant_label(participant)));
    }

    let mut rows: Vec<Vec<InlineKeyboardButton>> = participants
        .iter()
        .filter(|p| p.role != MembershipRole::Owner)
        .map(|p| {
            let who = p
                .user
                .username
                .clone()
                .or_else(|| p.user.full_name())
                .unwrap_or_else(|| "участника".to_string());
            vec![button(
                format!("Удалить {who}"),
                participant_callback("p:rm:", p.user.id, budget_id),
            )]
        })
        .collect();
    rows.push(vec![button(
        "⬅️ Назад",
        format!("bud:open:{}", encode_uuid(budget_id)),
    )]);
    (text, InlineKeyboardMarkup::new(rows))
}

pub(crate) fn render_remove_confirm(
    budget_id: Uuid,
    participant: &Participant,
) -> (String, InlineKeyboardMarkup) {
    let text = format!(
        "Удалить из бюджета?\n{}",
        escape(&participant_label(participant))
    );
    let kb = InlineKeyboardMarkup::new(vec![vec![
        button(
            "✅ Подтвердить",
            participant_callback("p:cf:", participant.user.id, budget_id),
        ),
        button(
            "❌ Отмена",
            format!("bud:members:{}", encode_uuid(budget_id)),
        ),
    ]]);
    (text, kb)
}

pub(crate) const PARTICIPANT_REMOVED: &str = "✅ Участник удалён.";

/// Reply keyboard shown while a conversation is in progress.
pub(crate) fn control_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new("Назад"), KeyboardButton::new("Отмена")],
        vec![
            KeyboardButton::new("Пропустить"),
            KeyboardButton::new("Главное меню"),
        ],
    ])
    .resize_keyboard()
}
