/// Slash command the bot answers to.
pub const BOT_COMMAND: &str = "nai";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TopLevel {
    Prompt,
    Config,
    Model,
    Generate,
    Price,
    Help,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec<A: 'static> {
    pub command: &'static str,
    pub action: A,
}

pub(crate) const TOP_LEVEL_COMMANDS: &[CommandSpec<TopLevel>] = &[
    CommandSpec {
        command: "prompt",
        action: TopLevel::Prompt,
    },
    CommandSpec {
        command: "config",
        action: TopLevel::Config,
    },
    CommandSpec {
        command: "model",
        action: TopLevel::Model,
    },
    CommandSpec {
        command: "generate",
        action: TopLevel::Generate,
    },
    CommandSpec {
        command: "price",
        action: TopLevel::Price,
    },
    CommandSpec {
        command: "help",
        action: TopLevel::Help,
    },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ConfigOp {
    Get,
    Set,
    Reset,
    List,
    Dump,
    Save,
    Load,
}

impl ConfigOp {
    pub fn needs_field(self) -> bool {
        matches!(self, Self::Get | Self::Set | Self::Reset)
    }
}

pub(crate) const CONFIG_OPERATIONS: &[CommandSpec<ConfigOp>] = &[
    CommandSpec {
        command: "get",
        action: ConfigOp::Get,
    },
    CommandSpec {
        command: "set",
        action: ConfigOp::Set,
    },
    CommandSpec {
        command: "reset",
        action: ConfigOp::Reset,
    },
    CommandSpec {
        command: "list",
        action: ConfigOp::List,
    },
    CommandSpec {
        command: "dump",
        action: ConfigOp::Dump,
    },
    CommandSpec {
        command: "save",
        action: ConfigOp::Save,
    },
    CommandSpec {
        command: "load",
        action: ConfigOp::Load,
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "prompt [text]",
    "config <get|set|reset|list|dump|save|load>",
    "model [name]",
    "generate",
    "price",
    "help",
];

pub fn config_operation_names() -> Vec<&'static str> {
    CONFIG_OPERATIONS.iter().map(|spec| spec.command).collect()
}

pub(crate) fn find_action<A: Copy>(command: &str, specs: &[CommandSpec<A>]) -> Option<A> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}
