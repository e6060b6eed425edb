use crate::telegram_client::BotCommand;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Settings,
    Subscribe,
    Unsubscribe,
    ShowSubscriptions,
    Vacancies(Option<String>),
    News,
    Pylint,
    Tip,
    Learn,
    Confirm,
    Cancel,
    Skip,
    Unknown(String),
}

impl Command {
    /// Parses `/name[@bot] [argument]`. Returns `None` for plain text.
    pub fn parse(text: &str) -> Option<Command> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;

        let (head, argument) = match rest.split_once(char::is_whitespace) {
            Some((head, argument)) => (head, Some(argument.trim()).filter(|a| !a.is_empty())),
            None => (rest, None),
        };
        // In groups Telegram appends the bot username: /news@my_bot
        let name = head.split('@').next().unwrap_or_default().to_lowercase();

        let command = match name.as_str() {
            "start" | "help" => Command::Start,
            "settings" => Command::Settings,
            "subscribe" => Command::Subscribe,
            "unsubscribe" => Command::Unsubscribe,
            "show_subscriptions" => Command::ShowSubscriptions,
            "vacancies" => Command::Vacancies(argument.map(str::to_string)),
            "news" => Command::News,
            "pylint" => Command::Pylint,
            "tip" => Command::Tip,
            "learn" => Command::Learn,
            "confirm" => Command::Confirm,
            "cancel" => Command::Cancel,
            "skip" => Command::Skip,
            _ => Command::Unknown(name),
        };

        Some(command)
    }

    /// Commands that only make sense as an answer inside a dialogue.
    pub fn is_dialogue_reply(&self) -> bool {
        matches!(self, Command::Confirm | Command::Skip)
    }
}

/// Menu published to Telegram at startup.
pub fn bot_commands() -> Vec<BotCommand> {
    [
        ("settings", "Change your city and level"),
        ("subscribe", "Subscribe to vacancy alerts"),
        ("unsubscribe", "Remove your subscriptions"),
        ("vacancies", "Search vacancies by keywords"),
        ("news", "Latest IT news"),
        ("pylint", "Check your Python code"),
        ("tip", "A random programming tip"),
        ("learn", "Learning resources for your level"),
        ("show_subscriptions", "Show all my subscriptions"),
    ]
    .into_iter()
    .map(|(command, description)| BotCommand {
        command: command.to_string(),
        description: description.to_string(),
    })
    .collect()
}
