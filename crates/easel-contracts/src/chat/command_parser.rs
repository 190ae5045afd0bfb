use super::command_registry::{
    find_action, ConfigOp, TopLevel, CONFIG_OPERATIONS, TOP_LEVEL_COMMANDS,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Usage,
    Prompt(Option<String>),
    Config(ConfigCommand),
    Model(Option<String>),
    Generate,
    Price,
    Help,
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    Usage,
    Get(String),
    Set {
        field: String,
        value: Option<String>,
    },
    Reset(String),
    List,
    Dump,
    Save,
    Load,
    MissingField(String),
    Unknown(String),
}

/// A slash command split off the front of a message: `/name@bot rest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlashCommand {
    pub name: String,
    pub target: Option<String>,
    pub rest: String,
}

fn split_word(text: &str) -> (&str, &str) {
    let trimmed = text.trim_start();
    match trimmed.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, tail),
        None => (trimmed, ""),
    }
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn parse_slash_command(text: &str) -> Option<SlashCommand> {
    let slash_tail = text.trim_start().strip_prefix('/')?;
    let (head, rest) = slash_tail
        .split_once(char::is_whitespace)
        .unwrap_or((slash_tail, ""));
    let (name, target) = match head.split_once('@') {
        Some((name, target)) => (name, non_empty(target)),
        None => (head, None),
    };
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if !valid {
        return None;
    }
    Some(SlashCommand {
        name: name.to_ascii_lowercase(),
        target,
        rest: rest.trim().to_string(),
    })
}

/// Parses the text following the bot command.
pub fn parse_command(text: &str) -> BotCommand {
    let (command, rest) = split_word(text);
    if command.is_empty() {
        return BotCommand::Usage;
    }
    let Some(action) = find_action(command, TOP_LEVEL_COMMANDS) else {
        return BotCommand::Unknown(command.to_string());
    };
    match action {
        TopLevel::Prompt => BotCommand::Prompt(non_empty(rest)),
        TopLevel::Config => BotCommand::Config(parse_config_command(rest)),
        TopLevel::Model => BotCommand::Model(non_empty(rest)),
        TopLevel::Generate => BotCommand::Generate,
        TopLevel::Price => BotCommand::Price,
        TopLevel::Help => BotCommand::Help,
    }
}

pub fn parse_config_command(text: &str) -> ConfigCommand {
    let (operation, rest) = split_word(text);
    if operation.is_empty() {
        return ConfigCommand::Usage;
    }
    let Some(op) = find_action(operation, CONFIG_OPERATIONS) else {
        return ConfigCommand::Unknown(operation.to_string());
    };
    if !op.needs_field() {
        return match op {
            ConfigOp::List => ConfigCommand::List,
            ConfigOp::Dump => ConfigCommand::Dump,
            ConfigOp::Save => ConfigCommand::Save,
            _ => ConfigCommand::Load,
        };
    }

    let (field, value) = split_word(rest);
    if field.is_empty() {
        return ConfigCommand::MissingField(operation.to_string());
    }
    let field = field.to_string();
    match op {
        ConfigOp::Get => ConfigCommand::Get(field),
        ConfigOp::Set => ConfigCommand::Set {
            field,
            value: non_empty(value),
        },
        _ => ConfigCommand::Reset(field),
    }
}
