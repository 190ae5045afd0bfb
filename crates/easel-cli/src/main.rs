mod dispatch;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use easel_contracts::chat::{parse_command, BOT_COMMAND};
use easel_contracts::events::{find_terminal_event, NEW_IMAGE_EVENT};
use easel_contracts::models::Tier;
use easel_contracts::schema::{generation_config, SetOutcome};
use easel_contracts::store::ConfigStore;
use easel_engine::telegram::{Message, TelegramBot};
use easel_engine::{GeneratedImage, GenerationClient, HttpTransport};
use tracing_subscriber::EnvFilter;

use crate::dispatch::{Dispatcher, Reply};

const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "easel", version, about = "Telegram bridge for NovelAI image generation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the Telegram bot loop.
    Serve(ServeArgs),
    /// Print the cost of generating with the given settings.
    Price(RequestArgs),
    /// Generate one image and write it to disk.
    Generate(GenerateArgs),
    /// Print the configurable fields and their defaults.
    Fields,
}

#[derive(Debug, Parser)]
struct ServeArgs {
    #[arg(long, default_value = "easel-config.json")]
    config_file: PathBuf,
    #[arg(long, default_value_t = 30)]
    poll_timeout: u64,
    #[arg(long, default_value_t = 120)]
    request_timeout: u64,
    #[arg(long, default_value = "OPUS")]
    tier: Tier,
}

#[derive(Debug, Args)]
struct RequestArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    model: Option<String>,
    /// Field assignment, e.g. `--set steps=40`. Repeatable.
    #[arg(long = "set", value_name = "FIELD=VALUE")]
    assignments: Vec<String>,
    #[arg(long)]
    config_file: Option<PathBuf>,
    #[arg(long, default_value_t = 120)]
    request_timeout: u64,
    #[arg(long, default_value = "OPUS")]
    tier: Tier,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[command(flatten)]
    request: RequestArgs,
    #[arg(long)]
    out: PathBuf,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("easel error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => {
            run_serve(args)?;
            Ok(0)
        }
        Command::Price(args) => run_price(args),
        Command::Generate(args) => run_generate(args),
        Command::Fields => run_fields(),
    }
}

fn required_env(key: &str) -> Result<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .with_context(|| format!("{key} must be set"))
}

fn build_client(
    token: String,
    request_timeout: u64,
    tier: Tier,
) -> Result<GenerationClient<HttpTransport>> {
    let transport = HttpTransport::new(Duration::from_secs(request_timeout))?;
    let config = generation_config()?;
    let mut client = GenerationClient::new(transport, token, config);
    client.set_tier(tier);
    Ok(client)
}

fn run_serve(args: ServeArgs) -> Result<()> {
    let telegram_token = required_env("TELEGRAM_TOKEN")?;
    let nai_token = required_env("NAI_TOKEN")?;
    let owner: i64 = required_env("OWNER_ID")?
        .parse()
        .context("OWNER_ID must be a numeric Telegram user id")?;

    let mut client = build_client(nai_token, args.request_timeout, args.tier)?;
    let store = ConfigStore::new(&args.config_file);
    if store.exists() {
        store.load(client.config_mut())?;
    }
    let mut dispatcher = Dispatcher::new(client, store);
    let mut bot = TelegramBot::new(telegram_token, Duration::from_secs(args.poll_timeout));

    tracing::info!(owner, config_file = %args.config_file.display(), "bot started");
    loop {
        let updates = match bot.get_updates() {
            Ok(updates) => updates,
            Err(err) => {
                tracing::warn!(error = %err, "polling for updates failed");
                thread::sleep(POLL_ERROR_BACKOFF);
                continue;
            }
        };
        for update in updates {
            let Some(message) = update.message else {
                continue;
            };
            if message.sender_id() != Some(owner) {
                tracing::debug!(sender = ?message.sender_id(), "ignoring message from non-owner");
                continue;
            }
            let Some(command) = message.bot_command() else {
                continue;
            };
            if command.name != BOT_COMMAND {
                tracing::info!(command = %command.name, "unknown command");
                continue;
            }
            tracing::info!(rest = %command.rest, "handling command");
            for reply in dispatcher.handle(parse_command(&command.rest)) {
                if let Err(err) = deliver(&bot, &message, reply) {
                    tracing::warn!(error = %format!("{err:#}"), "failed to deliver reply");
                }
            }
        }
    }
}

fn deliver(bot: &TelegramBot, message: &Message, reply: Reply) -> Result<()> {
    let chat_id = message.chat.id;
    let reply_to = Some(message.message_id);
    match reply {
        Reply::Text(text) => bot.send_message(chat_id, &text, reply_to)?,
        Reply::Image { image, caption } => {
            let file_name = image.file_name();
            if let Err(err) =
                bot.send_document(chat_id, image.bytes, &file_name, Some(&caption), reply_to)
            {
                let text = easel_contracts::chat::escape_markdown_v2(&format!("Error: {err}"));
                bot.send_message(chat_id, &text, reply_to)?;
            }
        }
    }
    Ok(())
}

fn prepare_client(args: &RequestArgs) -> Result<GenerationClient<HttpTransport>> {
    let token = required_env("NAI_TOKEN")?;
    let mut client = build_client(token, args.request_timeout, args.tier)?;
    client.set_prompt(args.prompt.trim());
    if let Some(model) = args.model.as_deref() {
        if !client.set_model(model) {
            bail!(
                "unknown model '{model}' (known: {})",
                client.models().names().join(", ")
            );
        }
    }
    if let Some(path) = &args.config_file {
        ConfigStore::new(path).load(client.config_mut())?;
    }
    for assignment in &args.assignments {
        let Some((field, value)) = assignment.split_once('=') else {
            bail!("expected FIELD=VALUE, got '{assignment}'");
        };
        match client.config_mut().set(field.trim(), value.trim()) {
            SetOutcome::Accepted => {}
            SetOutcome::Rejected => bail!("value '{}' rejected for field {field}", value.trim()),
            SetOutcome::UnknownField => bail!("unknown field '{field}'"),
        }
    }
    Ok(client)
}

fn run_price(args: RequestArgs) -> Result<i32> {
    let client = prepare_client(&args)?;
    let cost = client.price()?;
    println!("{cost}");
    Ok(0)
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let client = prepare_client(&args.request)?;
    if client.prompt().is_empty() {
        bail!("prompt must not be empty");
    }
    let events = client.generate()?;
    let Some(event) = find_terminal_event(&events, NEW_IMAGE_EVENT) else {
        let names = events
            .iter()
            .map(|event| event.name().unwrap_or(""))
            .collect::<Vec<_>>()
            .join(", ");
        eprintln!("no image produced; events: [{names}]");
        return Ok(2);
    };
    let image = GeneratedImage::from_event(event)?;
    let path = output_path(&args.out, &image);
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, &image.bytes).with_context(|| format!("failed writing {}", path.display()))?;
    println!("{} ({}x{})", path.display(), image.width, image.height);
    Ok(0)
}

fn output_path(out: &Path, image: &GeneratedImage) -> PathBuf {
    if out.is_dir() {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S");
        return out.join(format!("{stamp}-{}", image.file_name()));
    }
    out.to_path_buf()
}

fn run_fields() -> Result<i32> {
    let config = generation_config()?;
    let dump = config.dump();
    for (name, value) in &dump {
        let kind = config
            .schema()
            .field(name)
            .map(|def| format!("{:?}", def.kind).to_ascii_lowercase())
            .unwrap_or_default();
        println!("{name:<16} {kind:<8} {value}");
    }
    Ok(0)
}
