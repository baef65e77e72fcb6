use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use uuid::Uuid;

/// Prefix of the deep-link payload that carries an invite token.
pub(crate) const INVITE_PREFIX: &str = "invite_";

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    Start { payload: Option<String> },
    Home,
    Budgets,
    Help,
    Cancel,
}

/// Texts of the reply keyboard shown during conversations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Control {
    Back,
    Cancel,
    Skip,
    MainMenu,
}

pub(crate) fn parse_command(text: &str) -> Option<Command> {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return None;
    }
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or("");
    // `/start@kazna_bot` in group chats.
    let cmd = cmd.split_once('@').map_or(cmd, |(cmd, _)| cmd);
    let arg = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    match cmd {
        "/start" => Some(Command::Start { payload: arg }),
        "/home" | "/main_menu" => Some(Command::Home),
        "/budgets" => Some(Command::Budgets),
        "/help" => Some(Command::Help),
        "/cancel" => Some(Command::Cancel),
        _ => None,
    }
}

pub(crate) fn parse_control(text: &str) -> Option<Control> {
    match text.trim() {
        "Назад" => Some(Control::Back),
        "Отмена" => Some(Control::Cancel),
        "Пропустить" => Some(Control::Skip),
        "Главное меню" => Some(Control::MainMenu),
        _ => None,
    }
}

/// Find an invite token in a deep link (`https://t.me/bot?start=invite_X`),
/// a bare `invite_X` code or a `/start invite_X` message.
pub(crate) fn extract_invite_token(text: &str) -> Option<String> {
    let (_, rest) = text.split_once(INVITE_PREFIX)?;
    let token: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    (!token.is_empty()).then_some(token)
}

/// Deep link that opens the bot with the invite as `/start` payload.
pub(crate) fn invite_link(bot_host: &str, bot_username: &str, token: &str) -> String {
    format!("https://{bot_host}/{bot_username}?start={INVITE_PREFIX}{token}")
}

/// Callback data is limited to 64 bytes, so uuids travel as 22 base64url
/// characters instead of 36 hex ones.
pub(crate) fn encode_uuid(id: Uuid) -> String {
    URL_SAFE_NO_PAD.encode(id.as_bytes())
}

pub(crate) fn decode_uuid(raw: &str) -> Option<Uuid> {
    let bytes = URL_SAFE_NO_PAD.decode(raw).ok()?;
    Uuid::from_slice(&bytes).ok()
}

/// Participant callbacks carry `{participant}:{budget}`.
pub(crate) fn participant_callback(prefix: &str, participant_id: Uuid, budget_id: Uuid) -> String {
    format!(
        "{prefix}{}:{}",
        encode_uuid(participant_id),
        encode_uuid(budget_id)
    )
}

pub(crate) fn parse_participant_callback(payload: &str) -> Option<(Uuid, Uuid)> {
    let (participant, budget) = payload.split_once(':')?;
    Some((decode_uuid(participant)?, decode_uuid(budget)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_with_payload() {
        assert_eq!(
            parse_command("/start invite_abc"),
            Some(Command::Start {
                payload: Some("invite_abc".to_string())
            })
        );
        assert_eq!(
            parse_command("/start"),
            Some(Command::Start { payload: None })
        );
    }

    #[test]
    fn command_with_bot_suffix() {
        assert_eq!(parse_command("/budgets@kazna_bot"), Some(Command::Budgets));
        assert_eq!(parse_command("/main_menu"), Some(Command::Home));
        assert_eq!(parse_command("/unknown"), None);
        assert_eq!(parse_command("hello"), None);
    }

    #[test]
    fn control_texts() {
        assert_eq!(parse_control(" Назад "), Some(Control::Back));
        assert_eq!(parse_control("Пропустить"), Some(Control::Skip));
        assert_eq!(parse_control("назад"), None);
    }

    #[test]
    fn token_from_link_code_and_start() {
        let token = "Ab-9_xYz";
        for text in [
            format!("https://t.me/kazna_bot?start=invite_{token}"),
            format!("invite_{token}"),
            format!("/start invite_{token}"),
            format!("  вот код: invite_{token} спасибо"),
        ] {
            assert_eq!(extract_invite_token(&text).as_deref(), Some(token), "{text}");
        }
    }

    #[test]
    fn missing_token() {
        assert_eq!(extract_invite_token("привет"), None);
        assert_eq!(extract_invite_token("invite_"), None);
        assert_eq!(extract_invite_token("invite_ abc"), None);
    }

    #[test]
    fn link_round_trips_through_extraction() {
        let link = invite_link("t.me", "kazna_bot", "tok_123");
        assert_eq!(link, "https://t.me/kazna_bot?start=invite_tok_123");
        assert_eq!(extract_invite_token(&link).as_deref(), Some("tok_123"));
    }

    #[test]
    fn participant_callback_fits_telegram_limit() {
        let participant = Uuid::new_v4();
        let budget = Uuid::new_v4();
        let data = participant_callback("p:rm:", participant, budget);
        assert!(data.len() <= 64, "{} bytes", data.len());
        assert_eq!(encode_uuid(participant).len(), 22);

        let payload = data.strip_prefix("p:rm:").unwrap();
        assert_eq!(parse_participant_callback(payload), Some((participant, budget)));
    }

    #[test]
    fn malformed_participant_callback() {
        assert_eq!(parse_participant_callback("garbage"), None);
        assert_eq!(decode_uuid("AAAA"), None);
    }
}
