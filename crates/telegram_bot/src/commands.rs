//! Commands advertised in the Telegram menu.

use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Команды:")]
pub enum MenuCommands {
    #[command(description = "Начать работу с ботом.")]
    Start,
    #[command(description = "Главное меню.")]
    Home,
    #[command(description = "Мои бюджеты.")]
    Budgets,
    #[command(description = "Прервать текущий шаг.")]
    Cancel,
    #[command(description = "Показать это сообщение.")]
    Help,
}
