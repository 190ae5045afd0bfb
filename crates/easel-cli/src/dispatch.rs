use easel_contracts::chat::{
    code_block, code_span, config_operation_names, escape_markdown_v2, BotCommand,
    ConfigCommand, BOT_COMMAND, CHAT_HELP_COMMANDS,
};
use easel_contracts::events::{find_terminal_event, StreamEvent, NEW_IMAGE_EVENT};
use easel_contracts::schema::{FieldKind, FieldValue, SetOutcome};
use easel_contracts::store::ConfigStore;
use easel_engine::{ApiTransport, ClientError, GeneratedImage, GenerationClient};
use serde_json::Value;

/// One outgoing chat message, text already in MarkdownV2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Image {
        image: GeneratedImage,
        caption: String,
    },
}

impl Reply {
    fn plain(text: &str) -> Self {
        Self::Text(escape_markdown_v2(text))
    }
}

pub struct Dispatcher<T: ApiTransport> {
    client: GenerationClient<T>,
    store: ConfigStore,
}

impl<T: ApiTransport> Dispatcher<T> {
    pub fn new(client: GenerationClient<T>, store: ConfigStore) -> Self {
        Self { client, store }
    }

    /// Provider failures become reply text; nothing here returns an error.
    pub fn handle(&mut self, command: BotCommand) -> Vec<Reply> {
        match self.dispatch(command) {
            Ok(replies) => replies,
            Err(ClientError::ProviderTimeout) => {
                tracing::warn!("provider timed out");
                vec![Reply::plain(
                    "the provider took too long to answer, try again later.",
                )]
            }
            Err(ClientError::Provider { status, message }) => {
                tracing::warn!(status, %message, "provider request failed");
                vec![Reply::plain(&format!("something went wrong: {message}"))]
            }
            Err(err) => {
                tracing::warn!(error = %err, "command failed");
                vec![Reply::plain(&format!("something went wrong: {err}"))]
            }
        }
    }

    fn dispatch(&mut self, command: BotCommand) -> Result<Vec<Reply>, ClientError> {
        match command {
            BotCommand::Usage | BotCommand::Help => Ok(vec![self.help()]),
            BotCommand::Prompt(None) => {
                let prompt = self.client.prompt();
                let shown = if prompt.is_empty() {
                    "<empty prompt>"
                } else {
                    prompt
                };
                Ok(vec![Reply::Text(code_span(shown))])
            }
            BotCommand::Prompt(Some(prompt)) => {
                self.client.set_prompt(prompt);
                Ok(vec![self.price_changed()?])
            }
            BotCommand::Model(requested) => self.model(requested),
            BotCommand::Config(command) => self.config(command),
            BotCommand::Generate => self.generate(),
            BotCommand::Price => {
                let cost = self.client.price()?;
                Ok(vec![Reply::plain(&format!(
                    "current settings will cost {cost} on generation."
                ))])
            }
            BotCommand::Unknown(command) => Ok(vec![Reply::Text(format!(
                "{}\n{}",
                escape_markdown_v2(&format!("invalid command {command}")),
                self.help_body()
            ))]),
        }
    }

    fn help_body(&self) -> String {
        let lines = CHAT_HELP_COMMANDS
            .iter()
            .map(|line| code_span(&format!("/{BOT_COMMAND} {line}")))
            .collect::<Vec<_>>();
        lines.join("\n")
    }

    fn help(&self) -> Reply {
        Reply::Text(format!(
            "{}\n{}",
            escape_markdown_v2("available commands:"),
            self.help_body()
        ))
    }

    fn price_changed(&self) -> Result<Reply, ClientError> {
        let cost = self.client.price()?;
        Ok(Reply::plain(&format!("done, price changed to {cost}")))
    }

    fn model(&mut self, requested: Option<String>) -> Result<Vec<Reply>, ClientError> {
        let known = self.client.models().names().join(", ");
        let Some(requested) = requested else {
            let catalog = self
                .client
                .models()
                .list()
                .map(|spec| format!("{:<20} {}", spec.name, spec.description))
                .collect::<Vec<_>>()
                .join("\n");
            return Ok(vec![Reply::Text(format!(
                "{} {}\n{}\n{}",
                escape_markdown_v2("current model:"),
                code_span(self.client.model()),
                escape_markdown_v2("known models:"),
                code_block(&catalog)
            ))]);
        };
        if !self.client.set_model(&requested) {
            return Ok(vec![Reply::Text(format!(
                "{}\n{} {}",
                escape_markdown_v2(&format!("unknown model {requested}")),
                escape_markdown_v2("known models:"),
                code_span(&known)
            ))]);
        }
        Ok(vec![self.price_changed()?])
    }

    fn invalid_field(&self, field: &str) -> Reply {
        let valid = self.client.config().list().join(", ");
        Reply::plain(&format!("invalid field {field}\nvalid fields: [{valid}]"))
    }

    /// What a bare `config set <field>` stores: text fields become empty.
    fn cleared_value(&self, field: &str) -> Value {
        match self.client.config().schema().field(field) {
            Some(def) if def.kind == FieldKind::String => Value::String(String::new()),
            _ => Value::Null,
        }
    }

    fn operations(&self) -> String {
        code_span(&config_operation_names().join(", "))
    }

    fn config(&mut self, command: ConfigCommand) -> Result<Vec<Reply>, ClientError> {
        let reply = match command {
            ConfigCommand::Usage => Reply::Text(format!(
                "{} {}",
                escape_markdown_v2("operations:"),
                self.operations()
            )),
            ConfigCommand::Unknown(operation) => Reply::Text(format!(
                "{}\n{} {}",
                escape_markdown_v2(&format!("invalid operation {operation}")),
                escape_markdown_v2("supported operations:"),
                self.operations()
            )),
            ConfigCommand::MissingField(_) => Reply::plain("you have to supply a field."),
            ConfigCommand::List => Reply::Text(code_block(&self.client.config().list().join("\n"))),
            ConfigCommand::Dump => {
                let dump = self.client.config().dump();
                let pretty = serde_json::to_string_pretty(&dump)
                    .map_err(|err| ClientError::InvalidPayload(err.to_string()))?;
                Reply::Text(code_block(&pretty))
            }
            ConfigCommand::Get(field) => {
                if !self.client.config().schema().contains(&field) {
                    return Ok(vec![self.invalid_field(&field)]);
                }
                match self.client.config().get(&field) {
                    None => Reply::Text(code_span("<empty value>")),
                    Some(FieldValue::Str(text)) if text.is_empty() => {
                        Reply::Text(code_span("<empty value>"))
                    }
                    Some(value) => Reply::Text(code_span(&value.to_json().to_string())),
                }
            }
            ConfigCommand::Set { field, value } => {
                let raw = match value {
                    Some(value) => Value::String(value),
                    None => self.cleared_value(&field),
                };
                match self.client.config_mut().set(&field, raw) {
                    SetOutcome::UnknownField => self.invalid_field(&field),
                    SetOutcome::Rejected => {
                        let current = self
                            .client
                            .config()
                            .get(&field)
                            .map(|value| value.to_json().to_string())
                            .unwrap_or_else(|| "<empty value>".to_string());
                        Reply::Text(format!(
                            "{} {}",
                            escape_markdown_v2(&format!(
                                "value rejected, {field} stays at"
                            )),
                            code_span(&current)
                        ))
                    }
                    SetOutcome::Accepted => self.price_changed()?,
                }
            }
            ConfigCommand::Reset(field) => match self.client.config_mut().reset(&field) {
                SetOutcome::UnknownField => self.invalid_field(&field),
                _ => self.price_changed()?,
            },
            ConfigCommand::Save => match self.store.save(self.client.config()) {
                Ok(()) => Reply::plain(&format!("saved to {}", self.store.path().display())),
                Err(err) => Reply::plain(&format!("could not save config: {err}")),
            },
            ConfigCommand::Load => match self.store.load(self.client.config_mut()) {
                Ok(report) => {
                    let mut text = format!("loaded {} fields", report.accepted.len());
                    if !report.rejected.is_empty() {
                        text.push_str(&format!(", rejected: {}", report.rejected.join(", ")));
                    }
                    if !report.ignored.is_empty() {
                        text.push_str(&format!(", ignored: {}", report.ignored.join(", ")));
                    }
                    Reply::plain(&text)
                }
                Err(err) => Reply::plain(&format!("could not load config: {err}")),
            },
        };
        Ok(vec![reply])
    }

    fn generate(&mut self) -> Result<Vec<Reply>, ClientError> {
        if self.client.prompt().trim().is_empty() {
            return Ok(vec![Reply::plain("empty prompt")]);
        }
        let events = self.client.generate()?;
        if events.is_empty() {
            return Ok(vec![Reply::plain("no image produced, try again.")]);
        }
        let Some(event) = find_terminal_event(&events, NEW_IMAGE_EVENT) else {
            return Ok(vec![Reply::Text(format!(
                "{} {}",
                escape_markdown_v2("found events:"),
                code_span(&event_names(&events))
            ))]);
        };
        let image = GeneratedImage::from_event(event)?;
        tracing::info!(
            width = image.width,
            height = image.height,
            bytes = image.bytes.len(),
            "image generated"
        );
        let caption = escape_markdown_v2(&format!("{}x{}", image.width, image.height));
        Ok(vec![Reply::Image { image, caption }])
    }
}

fn event_names(events: &[StreamEvent]) -> String {
    events
        .iter()
        .map(|event| event.name().unwrap_or(""))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io::Cursor;

    use easel_contracts::chat::parse_command;
    use easel_contracts::schema::generation_config;
    use easel_contracts::store::ConfigStore;
    use easel_engine::{ApiResponse, ApiTransport, ClientError, GenerationClient};
    use serde_json::Value;

    use super::{Dispatcher, Reply};

    #[derive(Default)]
    struct ScriptedTransport {
        responses: RefCell<VecDeque<Result<ApiResponse, ClientError>>>,
    }

    impl ScriptedTransport {
        fn reply(self, status: u16, content_type: &str, body: &str) -> Self {
            self.responses.borrow_mut().push_back(Ok(ApiResponse {
                status,
                content_type: Some(content_type.to_string()),
                body: body.to_string(),
            }));
            self
        }

        fn quote(self, cost: i64) -> Self {
            self.reply(
                200,
                "application/json",
                &format!(
                    r#"{{"requestEligibleForUnlimitedGeneration": false, "costPerPrompt": {cost}, "numPrompts": 1, "freePrompts": 0}}"#
                ),
            )
        }

        fn timeout(self) -> Self {
            self.responses
                .borrow_mut()
                .push_back(Err(ClientError::ProviderTimeout));
            self
        }
    }

    impl ApiTransport for ScriptedTransport {
        fn post_json(
            &self,
            _endpoint: &str,
            _body: &Value,
            _bearer: Option<&str>,
        ) -> Result<ApiResponse, ClientError> {
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::InvalidPayload("no reply queued".to_string())))
        }
    }

    fn dispatcher(
        transport: ScriptedTransport,
        store_path: &std::path::Path,
    ) -> anyhow::Result<Dispatcher<ScriptedTransport>> {
        let client = GenerationClient::new(transport, "token", generation_config()?);
        Ok(Dispatcher::new(client, ConfigStore::new(store_path)))
    }

    fn text(replies: &[Reply]) -> &str {
        match replies.first() {
            Some(Reply::Text(text)) => text.as_str(),
            other => panic!("expected text reply, got {other:?}"),
        }
    }

    fn run(dispatcher: &mut Dispatcher<ScriptedTransport>, input: &str) -> Vec<Reply> {
        dispatcher.handle(parse_command(input))
    }

    #[test]
    fn set_reports_new_price_or_rejection() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let transport = ScriptedTransport::default().quote(12);
        let mut dispatcher = dispatcher(transport, &temp.path().join("config.json"))?;

        let accepted = run(&mut dispatcher, "config set steps 40");
        assert_eq!(text(&accepted), "done, price changed to 12");

        let rejected = run(&mut dispatcher, "config set steps 400");
        assert_eq!(text(&rejected), "value rejected, steps stays at `40`");
        assert_eq!(text(&run(&mut dispatcher, "config get steps")), "`40`");

        let unknown = run(&mut dispatcher, "config set colour red");
        assert!(text(&unknown).starts_with("invalid field colour"));
        Ok(())
    }

    #[test]
    fn bare_set_clears_text_fields_only() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let transport = ScriptedTransport::default().quote(2).quote(2);
        let mut dispatcher = dispatcher(transport, &temp.path().join("c.json"))?;

        run(&mut dispatcher, "config set negative blurry");
        assert_eq!(text(&run(&mut dispatcher, "config get negative")), "`\"blurry\"`");
        assert_eq!(
            text(&run(&mut dispatcher, "config set negative")),
            "done, price changed to 2"
        );
        assert_eq!(
            text(&run(&mut dispatcher, "config get negative")),
            "`<empty value>`"
        );

        assert_eq!(
            text(&run(&mut dispatcher, "config set steps")),
            "value rejected, steps stays at `28`"
        );
        Ok(())
    }

    #[test]
    fn get_renders_empty_and_quoted_values() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut dispatcher = dispatcher(ScriptedTransport::default(), &temp.path().join("c.json"))?;
        assert_eq!(text(&run(&mut dispatcher, "config get seed")), "`<empty value>`");
        assert_eq!(
            text(&run(&mut dispatcher, "config get negative")),
            "`<empty value>`"
        );
        assert_eq!(
            text(&run(&mut dispatcher, "config get sampler")),
            "`\"k_euler_ancestral\"`"
        );
        assert_eq!(
            text(&run(&mut dispatcher, "config get")),
            "you have to supply a field\\."
        );
        Ok(())
    }

    #[test]
    fn prompt_is_echoed_and_updated() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let transport = ScriptedTransport::default().quote(3);
        let mut dispatcher = dispatcher(transport, &temp.path().join("c.json"))?;
        assert_eq!(text(&run(&mut dispatcher, "prompt")), "`<empty prompt>`");
        assert_eq!(
            text(&run(&mut dispatcher, "prompt misty harbor")),
            "done, price changed to 3"
        );
        assert_eq!(text(&run(&mut dispatcher, "prompt")), "`misty harbor`");
        Ok(())
    }

    #[test]
    fn generate_requires_prompt_and_sends_image() -> anyhow::Result<()> {
        use base64::Engine as _;
        use image::{DynamicImage, ImageFormat, RgbImage};

        let mut png = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(8, 6))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        let data = base64::engine::general_purpose::STANDARD.encode(&png);
        let body = format!("id: 1\nevent: progress\nid: 2\nevent: newImage\ndata: {data}\n");

        let temp = tempfile::tempdir()?;
        let transport = ScriptedTransport::default()
            .quote(0)
            .reply(200, "text/event-stream", &body)
            .reply(200, "text/event-stream", "id: 1\nevent: progress\n")
            .reply(200, "application/json", "{}");
        let mut dispatcher = dispatcher(transport, &temp.path().join("c.json"))?;

        assert_eq!(text(&run(&mut dispatcher, "generate")), "empty prompt");
        run(&mut dispatcher, "prompt a quiet forest");

        match run(&mut dispatcher, "generate").first() {
            Some(Reply::Image { image, caption }) => {
                assert_eq!((image.width, image.height), (8, 6));
                assert_eq!(image.bytes, png);
                assert_eq!(caption, "8x6");
            }
            other => panic!("expected image reply, got {other:?}"),
        }
        assert_eq!(
            text(&run(&mut dispatcher, "generate")),
            "found events: `progress`"
        );
        assert_eq!(
            text(&run(&mut dispatcher, "generate")),
            "no image produced, try again\\."
        );
        Ok(())
    }

    #[test]
    fn provider_failures_become_reply_text() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let transport = ScriptedTransport::default()
            .reply(500, "application/json", r#"{"message": "overloaded"}"#)
            .timeout();
        let mut dispatcher = dispatcher(transport, &temp.path().join("c.json"))?;
        assert_eq!(
            text(&run(&mut dispatcher, "price")),
            "something went wrong: overloaded"
        );
        assert_eq!(
            text(&run(&mut dispatcher, "price")),
            "the provider took too long to answer, try again later\\."
        );
        Ok(())
    }

    #[test]
    fn save_and_load_round_trip_through_store() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("saved.json");
        let transport = ScriptedTransport::default().quote(1).quote(1);
        let mut dispatcher = dispatcher(transport, &path)?;

        run(&mut dispatcher, "config set width 1024");
        let saved = run(&mut dispatcher, "config save");
        assert!(text(&saved).starts_with("saved to "));

        run(&mut dispatcher, "config reset width");
        assert_eq!(text(&run(&mut dispatcher, "config get width")), "`768`");
        assert_eq!(text(&run(&mut dispatcher, "config load")), "loaded 12 fields");
        assert_eq!(text(&run(&mut dispatcher, "config get width")), "`1024`");
        Ok(())
    }

    #[test]
    fn unknown_operations_and_models_list_alternatives() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut dispatcher = dispatcher(ScriptedTransport::default(), &temp.path().join("c.json"))?;
        assert_eq!(
            text(&run(&mut dispatcher, "config twist")),
            "invalid operation twist\nsupported operations: `get, set, reset, list, dump, save, load`"
        );
        assert!(text(&run(&mut dispatcher, "model dall-e")).starts_with("unknown model dall\\-e"));
        let current = run(&mut dispatcher, "model");
        assert!(text(&current).starts_with("current model: `nai-diffusion`\nknown models:\n```"));
        assert!(text(&current).contains("nai-diffusion-furry  NAI Diffusion Furry"));
        assert!(text(&run(&mut dispatcher, "config list")).starts_with("```\nheight\nwidth"));
        Ok(())
    }
}
