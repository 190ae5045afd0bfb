mod command_parser;
mod command_registry;
mod format;

pub use command_parser::{
    parse_command, parse_config_command, parse_slash_command, BotCommand, ConfigCommand,
    SlashCommand,
};
pub use command_registry::{config_operation_names, BOT_COMMAND, CHAT_HELP_COMMANDS};
pub use format::{code_block, code_span, escape_markdown_v2};
