use chrono::Utc;
use engine::{EngineError, TelegramProfile};
use teloxide::{
    prelude::*,
    types::{CallbackQuery, ChatId, InlineKeyboardMarkup, KeyboardRemove, ParseMode, User},
    utils::{command::BotCommands, html::escape},
};
use uuid::Uuid;

use crate::{
    ConfigParameters, MenuCommands,
    flow::{Back, CreateBudgetFlow, FlowError, JoinFlow},
    parsing::{
        Command, Control, decode_uuid, extract_invite_token, invite_link, parse_command,
        parse_control, parse_participant_callback,
    },
    state::Conversation,
    ui,
};

pub(crate) async fn handle_message(
    bot: Bot,
    msg: Message,
    cfg: ConfigParameters,
) -> ResponseResult<()> {
    let chat_id = msg.chat.id;
    let result = process_message(bot.clone(), msg, cfg.clone()).await;
    recover(&bot, Some(chat_id), &cfg, result).await
}

pub(crate) async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    cfg: ConfigParameters,
) -> ResponseResult<()> {
    let chat_id = q.message.as_ref().map(|message| message.chat().id);
    let result = process_callback(bot.clone(), q, cfg.clone()).await;
    recover(&bot, chat_id, &cfg, result).await
}

/// Failed Telegram requests leave the conversation in an unknown state, so
/// the chat is dropped back to idle and told that something went wrong.
async fn recover(
    bot: &Bot,
    chat_id: Option<ChatId>,
    cfg: &ConfigParameters,
    result: ResponseResult<()>,
) -> ResponseResult<()> {
    let Err(err) = result else {
        return Ok(());
    };
    let Some(chat_id) = chat_id else {
        tracing::error!("telegram request failed: {err}");
        return Ok(());
    };
    tracing::error!("telegram request failed in chat {}: {err}", chat_id.0);
    cfg.sessions.discard(chat_id).await;
    if let Err(err) = bot
        .send_message(chat_id, ui::GENERIC_FAILURE)
        .reply_markup(KeyboardRemove::new())
        .await
    {
        tracing::warn!("failed to report failure to chat {}: {err}", chat_id.0);
    }
    Ok(())
}

async fn process_message(
    bot: Bot,
    msg: Message,
    cfg: ConfigParameters,
) -> ResponseResult<()> {
    if !is_allowed(&cfg, msg.from.as_ref()) {
        return Ok(());
    }

    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let chat_id = msg.chat.id;
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let user_id = match current_user(&cfg, from).await {
        Ok(user) => user.id,
        Err(err) => return report_error(&bot, chat_id, &cfg, None, err).await,
    };

    // The hub is now above the user's message; answer below it.
    cfg.sessions
        .update(chat_id, |s| s.hub_message_id = None)
        .await;

    if let Some(cmd) = parse_command(text) {
        match cmd {
            Command::Start { payload } => {
                bot.send_message(chat_id, ui::render_welcome(Some(from.first_name.as_str())))
                    .parse_mode(ParseMode::Html)
                    .await?;
                cfg.sessions.reset(chat_id).await;
                match payload.as_deref().map(extract_invite_token) {
                    Some(Some(token)) => show_invite_preview(&bot, chat_id, &cfg, token).await?,
                    Some(None) => {
                        send_notice(&bot, chat_id, &cfg, ui::MISSING_TOKEN, false).await?;
                        show_home(&bot, chat_id, &cfg, user_id).await?;
                    }
                    None => show_home(&bot, chat_id, &cfg, user_id).await?,
                }
            }
            Command::Home => {
                cfg.sessions.reset(chat_id).await;
                show_home(&bot, chat_id, &cfg, user_id).await?;
            }
            Command::Budgets => {
                cfg.sessions.reset(chat_id).await;
                show_budgets_menu(&bot, chat_id, &cfg).await?;
            }
            Command::Help => {
                let help = ui::render_help(&MenuCommands::descriptions().to_string());
                bot.send_message(chat_id, help)
                    .parse_mode(ParseMode::Html)
                    .await?;
            }
            Command::Cancel => cancel_conversation(&bot, chat_id, &cfg, user_id).await?,
        }
        return Ok(());
    }

    if let Some(control) = parse_control(text) {
        return handle_control(&bot, chat_id, &cfg, user_id, control).await;
    }

    match cfg.sessions.get(chat_id).await.conversation {
        Conversation::CreateBudget(_) => {
            update_create_flow(&bot, chat_id, &cfg, user_id, |flow| flow.input_text(text)).await
        }
        Conversation::JoinBudget(_) => receive_invite_token(&bot, chat_id, &cfg, text).await,
        // A pasted invite works without opening the join screen first.
        Conversation::Idle if extract_invite_token(text).is_some() => {
            receive_invite_token(&bot, chat_id, &cfg, text).await
        }
        Conversation::Idle => show_home(&bot, chat_id, &cfg, user_id).await,
    }
}

async fn process_callback(
    bot: Bot,
    q: CallbackQuery,
    cfg: ConfigParameters,
) -> ResponseResult<()> {
    if !is_allowed(&cfg, Some(&q.from)) {
        return Ok(());
    }

    let Some(message) = q.message.as_ref() else {
        return Ok(());
    };
    let chat_id = message.chat().id;

    let _ = bot.answer_callback_query(q.id.clone()).await;

    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };

    let user_id = match current_user(&cfg, &q.from).await {
        Ok(user) => user.id,
        Err(err) => return report_error(&bot, chat_id, &cfg, None, err).await,
    };

    if data == "home:show" {
        cfg.sessions.reset(chat_id).await;
        show_home(&bot, chat_id, &cfg, user_id).await?;
    } else if let Some(section) = data.strip_prefix("main:") {
        show_main_section(&bot, chat_id, &cfg, section).await?;
    } else if data == "ob:create" || data == "bud:create" {
        start_create(&bot, chat_id, &cfg, user_id).await?;
    } else if data == "ob:join" || data == "bud:join" {
        open_controls(&bot, chat_id, &cfg).await?;
        start_join(&bot, chat_id, &cfg).await?;
    } else if data == "ob:cancel" || data == "join:cancel" {
        cancel_conversation(&bot, chat_id, &cfg, user_id).await?;
    } else if data == "ob:back" {
        create_back(&bot, chat_id, &cfg, user_id).await?;
    } else if data == "ob:skip" {
        update_create_flow(&bot, chat_id, &cfg, user_id, CreateBudgetFlow::skip).await?;
    } else if data == "ob:edit" {
        update_create_flow(&bot, chat_id, &cfg, user_id, |flow| {
            flow.edit();
            Ok(())
        })
        .await?;
    } else if data == "ob:confirm" {
        confirm_budget(&bot, chat_id, &cfg, user_id).await?;
    } else if data == "ob:tz:keep" {
        let tz = cfg.default_tz.name();
        update_create_flow(&bot, chat_id, &cfg, user_id, |flow| flow.set_timezone(tz)).await?;
    } else if let Some(tz) = data.strip_prefix("ob:tz:") {
        update_create_flow(&bot, chat_id, &cfg, user_id, |flow| flow.set_timezone(tz)).await?;
    } else if let Some(code) = data.strip_prefix("ob:cur:") {
        update_create_flow(&bot, chat_id, &cfg, user_id, |flow| flow.pick_currency(code)).await?;
    } else if data == "join:accept" {
        accept_invite(&bot, chat_id, &cfg, user_id).await?;
    } else if data == "bud:list" {
        show_budget_list(&bot, chat_id, &cfg, user_id).await?;
    } else if let Some(budget_id) = data.strip_prefix("bud:open:").and_then(decode_uuid) {
        show_budget_detail(&bot, chat_id, &cfg, user_id, budget_id).await?;
    } else if let Some(budget_id) = data.strip_prefix("bud:members:").and_then(decode_uuid) {
        show_participants(&bot, chat_id, &cfg, user_id, budget_id).await?;
    } else if let Some(budget_id) = data.strip_prefix("bud:invite:").and_then(decode_uuid) {
        create_invite(&bot, chat_id, &cfg, user_id, budget_id).await?;
    } else if let Some(budget_id) = data.strip_prefix("bud:default:").and_then(decode_uuid) {
        make_default(&bot, chat_id, &cfg, user_id, budget_id).await?;
    } else if let Some(budget_id) = data.strip_prefix("bud:archive:").and_then(decode_uuid) {
        match cfg.engine.budget_detail(user_id, budget_id).await {
            Ok(budget) => {
                let (text, kb) = ui::render_archive_confirm(&budget);
                edit_or_send(&bot, chat_id, &cfg, text, kb).await?;
            }
            Err(err) => report_error(&bot, chat_id, &cfg, None, err).await?,
        }
    } else if let Some(budget_id) = data.strip_prefix("bud:archive_yes:").and_then(decode_uuid) {
        archive_budget(&bot, chat_id, &cfg, user_id, budget_id).await?;
    } else if let Some((participant_id, budget_id)) =
        data.strip_prefix("p:rm:").and_then(parse_participant_callback)
    {
        match cfg
            .engine
            .participant(user_id, budget_id, participant_id)
            .await
        {
            Ok(participant) => {
                let (text, kb) = ui::render_remove_confirm(budget_id, &participant);
                edit_or_send(&bot, chat_id, &cfg, text, kb).await?;
            }
            Err(err) => report_error(&bot, chat_id, &cfg, None, err).await?,
        }
    } else if let Some((participant_id, budget_id)) =
        data.strip_prefix("p:cf:").and_then(parse_participant_callback)
    {
        remove_participant(&bot, chat_id, &cfg, user_id, budget_id, participant_id).await?;
    } else {
        tracing::warn!("Unknown callback data: {data}");
    }

    Ok(())
}

async fn handle_control(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user_id: Uuid,
    control: Control,
) -> ResponseResult<()> {
    let conversation = cfg.sessions.get(chat_id).await.conversation;
    match (control, conversation) {
        (Control::Cancel, _) => cancel_conversation(bot, chat_id, cfg, user_id).await,
        (Control::MainMenu, _) => {
            cfg.sessions.reset(chat_id).await;
            bot.send_message(chat_id, "🏠")
                .reply_markup(KeyboardRemove::new())
                .await?;
            show_home(bot, chat_id, cfg, user_id).await
        }
        (Control::Back, Conversation::CreateBudget(_)) => {
            create_back(bot, chat_id, cfg, user_id).await
        }
        (Control::Back, Conversation::JoinBudget(JoinFlow::Confirm { .. })) => {
            start_join(bot, chat_id, cfg).await
        }
        (Control::Back, Conversation::JoinBudget(JoinFlow::AwaitToken)) => {
            cancel_conversation(bot, chat_id, cfg, user_id).await
        }
        (Control::Skip, Conversation::CreateBudget(_)) => {
            update_create_flow(bot, chat_id, cfg, user_id, CreateBudgetFlow::skip).await
        }
        (Control::Skip, Conversation::JoinBudget(_)) => {
            send_notice(bot, chat_id, cfg, &FlowError::NotSkippable.to_string(), false).await
        }
        (Control::Back | Control::Skip, Conversation::Idle) => {
            show_home(bot, chat_id, cfg, user_id).await
        }
    }
}

async fn show_home(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user_id: Uuid,
) -> ResponseResult<()> {
    let (text, kb) = match cfg.engine.home_budget(user_id).await {
        Ok(Some(budget)) => ui::render_home(&budget),
        Ok(None) => ui::render_first_run(),
        Err(err) => return report_error(bot, chat_id, cfg, None, err).await,
    };
    edit_or_send(bot, chat_id, cfg, text, kb).await
}

async fn show_main_section(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    section: &str,
) -> ResponseResult<()> {
    let title = match section {
        "budgets" => return show_budgets_menu(bot, chat_id, cfg).await,
        "income" => "➕ Добавить приход",
        "expense" => "➖ Добавить расход",
        "goals" => "🎯 Цели",
        "reports" => "📊 Отчёты",
        other => {
            tracing::warn!("Unknown main menu section: {other}");
            return Ok(());
        }
    };
    let (text, kb) = ui::render_placeholder(title);
    edit_or_send(bot, chat_id, cfg, text, kb).await
}

async fn cancel_conversation(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user_id: Uuid,
) -> ResponseResult<()> {
    cfg.sessions.reset(chat_id).await;
    send_notice(bot, chat_id, cfg, ui::CANCELLED, true).await?;
    show_home(bot, chat_id, cfg, user_id).await
}

/// Show the reply keyboard; the next prompt goes below it.
async fn open_controls(bot: &Bot, chat_id: ChatId, cfg: &ConfigParameters) -> ResponseResult<()> {
    bot.send_message(chat_id, ui::CONTROLS_HINT)
        .reply_markup(ui::control_keyboard())
        .await?;
    cfg.sessions
        .update(chat_id, |s| s.hub_message_id = None)
        .await;
    Ok(())
}

// ---- Budget creation ----

async fn start_create(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user_id: Uuid,
) -> ResponseResult<()> {
    match cfg.engine.list_user_budgets(user_id).await {
        Ok(budgets) if !budgets.is_empty() => {
            let err = EngineError::AlreadyHasBudget;
            return report_error(bot, chat_id, cfg, Some("Не удалось создать бюджет"), err).await;
        }
        Ok(_) => {}
        Err(err) => return report_error(bot, chat_id, cfg, None, err).await,
    }

    let flow = CreateBudgetFlow::default();
    cfg.sessions
        .update(chat_id, |s| {
            s.conversation = Conversation::CreateBudget(flow.clone());
        })
        .await;
    open_controls(bot, chat_id, cfg).await?;
    show_create_step(bot, chat_id, cfg, &flow).await
}

async fn show_create_step(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    flow: &CreateBudgetFlow,
) -> ResponseResult<()> {
    let (text, kb) = ui::render_create_step(flow, cfg.default_tz.name());
    edit_or_send(bot, chat_id, cfg, text, kb).await
}

/// Apply one input to the creation flow and show where it landed.
///
/// Invalid input keeps the step and explains what is wrong.
async fn update_create_flow<F>(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user_id: Uuid,
    f: F,
) -> ResponseResult<()>
where
    F: FnOnce(&mut CreateBudgetFlow) -> Result<(), FlowError>,
{
    let Conversation::CreateBudget(mut flow) = cfg.sessions.get(chat_id).await.conversation else {
        // Button from a conversation that has expired.
        return show_home(bot, chat_id, cfg, user_id).await;
    };

    if let Err(err) = f(&mut flow) {
        send_notice(bot, chat_id, cfg, &err.to_string(), false).await?;
    }
    cfg.sessions
        .update(chat_id, |s| {
            s.conversation = Conversation::CreateBudget(flow.clone());
        })
        .await;
    show_create_step(bot, chat_id, cfg, &flow).await
}

async fn create_back(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user_id: Uuid,
) -> ResponseResult<()> {
    let Conversation::CreateBudget(mut flow) = cfg.sessions.get(chat_id).await.conversation else {
        return show_home(bot, chat_id, cfg, user_id).await;
    };

    match flow.back() {
        Back::Exit => cancel_conversation(bot, chat_id, cfg, user_id).await,
        Back::Moved => {
            cfg.sessions
                .update(chat_id, |s| {
                    s.conversation = Conversation::CreateBudget(flow.clone());
                })
                .await;
            show_create_step(bot, chat_id, cfg, &flow).await
        }
    }
}

async fn confirm_budget(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user_id: Uuid,
) -> ResponseResult<()> {
    let Conversation::CreateBudget(flow) = cfg.sessions.get(chat_id).await.conversation else {
        return show_home(bot, chat_id, cfg, user_id).await;
    };
    let Some(draft) = flow.draft() else {
        return show_create_step(bot, chat_id, cfg, &flow).await;
    };

    match cfg
        .engine
        .create_first_budget(user_id, &draft, Utc::now())
        .await
    {
        Ok(budget) => {
            cfg.sessions.reset(chat_id).await;
            send_notice(bot, chat_id, cfg, &ui::render_budget_created(&budget), true).await?;
            show_home(bot, chat_id, cfg, user_id).await
        }
        Err(err) => {
            let keep_prompt = err.is_domain();
            report_error(bot, chat_id, cfg, Some("Не удалось создать бюджет"), err).await?;
            if keep_prompt {
                show_create_step(bot, chat_id, cfg, &flow).await?;
            }
            Ok(())
        }
    }
}

// ---- Joining ----

async fn start_join(bot: &Bot, chat_id: ChatId, cfg: &ConfigParameters) -> ResponseResult<()> {
    cfg.sessions
        .update(chat_id, |s| {
            s.conversation = Conversation::JoinBudget(JoinFlow::AwaitToken);
        })
        .await;
    let (text, kb) = ui::render_join_prompt();
    edit_or_send(bot, chat_id, cfg, text, kb).await
}

async fn receive_invite_token(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    text: &str,
) -> ResponseResult<()> {
    match extract_invite_token(text) {
        Some(token) => show_invite_preview(bot, chat_id, cfg, token).await,
        None => send_notice(bot, chat_id, cfg, ui::MISSING_TOKEN, false).await,
    }
}

async fn show_invite_preview(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    token: String,
) -> ResponseResult<()> {
    match cfg.engine.preview_invite(&token, Utc::now()).await {
        Ok(preview) => {
            cfg.sessions
                .update(chat_id, |s| {
                    s.conversation = Conversation::JoinBudget(JoinFlow::Confirm { token });
                })
                .await;
            let (text, kb) = ui::render_invite_preview(&preview);
            edit_or_send(bot, chat_id, cfg, text, kb).await
        }
        Err(err) => report_error(bot, chat_id, cfg, Some("Не удалось присоединиться"), err).await,
    }
}

async fn accept_invite(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user_id: Uuid,
) -> ResponseResult<()> {
    let Conversation::JoinBudget(JoinFlow::Confirm { token }) =
        cfg.sessions.get(chat_id).await.conversation
    else {
        return show_home(bot, chat_id, cfg, user_id).await;
    };

    let joined = match cfg.engine.accept_invite(&token, user_id, Utc::now()).await {
        Ok(membership) => cfg
            .engine
            .budget_detail(user_id, membership.budget_id)
            .await,
        Err(err) => Err(err),
    };
    match joined {
        Ok(budget) => {
            tracing::info!(budget_id = %budget.id, %user_id, "user joined budget");
            cfg.sessions.reset(chat_id).await;
            send_notice(bot, chat_id, cfg, &ui::render_joined(&budget.name), true).await?;
            show_home(bot, chat_id, cfg, user_id).await
        }
        Err(err) => {
            let retry = err.is_domain();
            report_error(bot, chat_id, cfg, Some("Не удалось присоединиться"), err).await?;
            if retry {
                start_join(bot, chat_id, cfg).await?;
            }
            Ok(())
        }
    }
}

// ---- Budgets ----

async fn show_budgets_menu(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
) -> ResponseResult<()> {
    let (text, kb) = ui::render_budgets_menu();
    edit_or_send(bot, chat_id, cfg, text, kb).await
}

async fn show_budget_list(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user_id: Uuid,
) -> ResponseResult<()> {
    match cfg.engine.list_user_budgets(user_id).await {
        Ok(budgets) => {
            let (text, kb) = ui::render_budget_list(&budgets);
            edit_or_send(bot, chat_id, cfg, text, kb).await
        }
        Err(err) => report_error(bot, chat_id, cfg, None, err).await,
    }
}

async fn show_budget_detail(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user_id: Uuid,
    budget_id: Uuid,
) -> ResponseResult<()> {
    let detail = match cfg.engine.budget_detail(user_id, budget_id).await {
        Ok(budget) => cfg
            .engine
            .list_user_budgets(user_id)
            .await
            .and_then(|budgets| {
                budgets
                    .into_iter()
                    .find(|b| b.id == budget_id)
                    .map(|summary| (budget, summary))
                    .ok_or(EngineError::NotMember)
            }),
        Err(err) => Err(err),
    };
    match detail {
        Ok((budget, summary)) => {
            let (text, kb) = ui::render_budget_detail(&budget, &summary);
            edit_or_send(bot, chat_id, cfg, text, kb).await
        }
        Err(err) => report_error(bot, chat_id, cfg, None, err).await,
    }
}

async fn create_invite(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user_id: Uuid,
    budget_id: Uuid,
) -> ResponseResult<()> {
    match cfg
        .engine
        .create_invite_for_budget(user_id, budget_id, Utc::now())
        .await
    {
        Ok(invite) => {
            let link = invite_link(&cfg.bot_host, &cfg.bot_username, &invite.token);
            let (text, kb) = ui::render_invite_created(budget_id, &link);
            edit_or_send(bot, chat_id, cfg, text, kb).await
        }
        Err(err) => report_error(bot, chat_id, cfg, None, err).await,
    }
}

async fn make_default(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user_id: Uuid,
    budget_id: Uuid,
) -> ResponseResult<()> {
    match cfg.engine.set_active_budget(user_id, budget_id).await {
        Ok(budget) => {
            send_notice(bot, chat_id, cfg, &ui::render_default_set(&budget), false).await?;
            show_budget_detail(bot, chat_id, cfg, user_id, budget_id).await
        }
        Err(err) => report_error(bot, chat_id, cfg, None, err).await,
    }
}

async fn archive_budget(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user_id: Uuid,
    budget_id: Uuid,
) -> ResponseResult<()> {
    match cfg.engine.archive_budget(user_id, budget_id).await {
        Ok(()) => {
            send_notice(bot, chat_id, cfg, "📦 Бюджет архивирован.", false).await?;
            show_home(bot, chat_id, cfg, user_id).await
        }
        Err(err) => report_error(bot, chat_id, cfg, None, err).await,
    }
}

// ---- Participants ----

async fn show_participants(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user_id: Uuid,
    budget_id: Uuid,
) -> ResponseResult<()> {
    match cfg
        .engine
        .list_participants_for_budget(user_id, budget_id)
        .await
    {
        Ok(participants) => {
            let (text, kb) = ui::render_participants(budget_id, &participants);
            edit_or_send(bot, chat_id, cfg, text, kb).await
        }
        Err(err) => report_error(bot, chat_id, cfg, None, err).await,
    }
}

async fn remove_participant(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    user_id: Uuid,
    budget_id: Uuid,
    participant_id: Uuid,
) -> ResponseResult<()> {
    match cfg
        .engine
        .remove_participant_from_budget(user_id, budget_id, participant_id)
        .await
    {
        Ok(()) => {
            send_notice(bot, chat_id, cfg, ui::PARTICIPANT_REMOVED, false).await?;
            show_participants(bot, chat_id, cfg, user_id, budget_id).await
        }
        Err(err) => report_error(bot, chat_id, cfg, None, err).await,
    }
}

// ---- Helpers ----

async fn edit_or_send(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    text: String,
    kb: InlineKeyboardMarkup,
) -> ResponseResult<()> {
    let session = cfg.sessions.get(chat_id).await;
    if let Some(message_id) = session.hub_message_id
        && bot
            .edit_message_text(chat_id, message_id, text.clone())
            .parse_mode(ParseMode::Html)
            .reply_markup(kb.clone())
            .await
            .is_ok()
    {
        return Ok(());
    }

    let sent = bot
        .send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(kb)
        .await?;
    cfg.sessions
        .update(chat_id, |s| s.hub_message_id = Some(sent.id))
        .await;
    Ok(())
}

/// Send a standalone message; the next screen is sent below it.
async fn send_notice(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    text: &str,
    close_controls: bool,
) -> ResponseResult<()> {
    let request = bot
        .send_message(chat_id, text.to_string())
        .parse_mode(ParseMode::Html);
    if close_controls {
        request.reply_markup(KeyboardRemove::new()).await?;
    } else {
        request.await?;
    }
    cfg.sessions
        .update(chat_id, |s| s.hub_message_id = None)
        .await;
    Ok(())
}

/// Domain errors are explained and leave the conversation as it is.
/// Anything else is logged and resets the chat.
async fn report_error(
    bot: &Bot,
    chat_id: ChatId,
    cfg: &ConfigParameters,
    context: Option<&str>,
    err: EngineError,
) -> ResponseResult<()> {
    if !err.is_domain() {
        tracing::error!("engine failure in chat {}: {err}", chat_id.0);
        cfg.sessions.discard(chat_id).await;
        bot.send_message(chat_id, ui::GENERIC_FAILURE)
            .reply_markup(KeyboardRemove::new())
            .await?;
        return Ok(());
    }

    let message = escape(&user_message_for_engine_error(&err));
    let text = match context {
        Some(context) => format!("{context}: {message}"),
        None => message,
    };
    send_notice(bot, chat_id, cfg, &text, false).await
}

async fn current_user(cfg: &ConfigParameters, from: &User) -> Result<engine::User, EngineError> {
    let telegram_id =
        i64::try_from(from.id.0).map_err(|_| EngineError::InvalidId(from.id.0.to_string()))?;
    let profile = TelegramProfile {
        telegram_id,
        username: from.username.clone(),
        first_name: Some(from.first_name.clone()),
        last_name: from.last_name.clone(),
    };
    cfg.engine.ensure_user(&profile, Utc::now()).await
}

fn is_allowed(cfg: &ConfigParameters, from: Option<&User>) -> bool {
    let Some(from) = from else {
        return false;
    };
    match &cfg.allowed_users {
        None => true,
        Some(ids) => ids.contains(&from.id),
    }
}

fn user_message_for_engine_error(err: &EngineError) -> String {
    match err {
        EngineError::NotOwner => "это может сделать только владелец бюджета.".to_string(),
        EngineError::NotMember => "вы не участник этого бюджета.".to_string(),
        EngineError::ParticipantNotFound => "участник не найден.".to_string(),
        EngineError::CannotRemoveOwner => "владельца нельзя удалить.".to_string(),
        EngineError::AlreadyMember => "вы уже участник этого бюджета.".to_string(),
        EngineError::AlreadyHasBudget => "у вас уже есть бюджет.".to_string(),
        EngineError::BudgetUnavailable => "бюджет не найден или архивирован.".to_string(),
        EngineError::InviteNotFound => "приглашение не найдено.".to_string(),
        EngineError::InviteExpired => "срок действия приглашения истёк.".to_string(),
        EngineError::InviteExhausted => "приглашение уже использовано.".to_string(),
        EngineError::UserNotFound => "пользователь не найден, нажми /start.".to_string(),
        EngineError::ValidationFailure(reason) => format!("некорректные данные ({reason})."),
        EngineError::InvalidId(_) | EngineError::Database(_) => ui::GENERIC_FAILURE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_have_messages() {
        for err in [
            EngineError::NotOwner,
            EngineError::InviteExpired,
            EngineError::InviteExhausted,
            EngineError::CannotRemoveOwner,
        ] {
            let message = user_message_for_engine_error(&err);
            assert_ne!(message, ui::GENERIC_FAILURE);
            assert!(message.ends_with('.'), "{message}");
        }
    }

    #[test]
    fn validation_reason_is_kept() {
        let err = EngineError::ValidationFailure("unknown timezone: Moon/Base".to_string());
        assert!(user_message_for_engine_error(&err).contains("Moon/Base"));
    }
}
