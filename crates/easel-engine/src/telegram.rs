use std::env;
use std::time::Duration;

use easel_contracts::chat::{parse_slash_command, SlashCommand};
use reqwest::blocking::multipart::{Form as MultipartForm, Part as MultipartPart};
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("telegram request failed")]
    Http(#[from] reqwest::Error),
    #[error("telegram api error ({code}): {description}")]
    Api { code: i64, description: String },
    #[error("telegram response for {0} had no result")]
    MissingResult(&'static str),
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: usize,
    pub length: usize,
}

impl Message {
    pub fn sender_id(&self) -> Option<i64> {
        self.from.as_ref().map(|user| user.id)
    }

    /// The leading bot command, located through the first entity. Entity
    /// offsets count UTF-16 code units.
    pub fn bot_command(&self) -> Option<SlashCommand> {
        let text = self.text.as_deref()?;
        let entity = self.entities.first()?;
        if entity.kind != "bot_command" {
            return None;
        }
        let start = utf16_to_byte(text, entity.offset)?;
        let end = utf16_to_byte(text, entity.offset + entity.length)?;
        let mut command = parse_slash_command(&text[start..end])?;
        command.rest = text[end..].trim().to_string();
        Some(command)
    }
}

fn utf16_to_byte(text: &str, offset: usize) -> Option<usize> {
    let mut units = 0;
    for (idx, ch) in text.char_indices() {
        if units == offset {
            return Some(idx);
        }
        if units > offset {
            return None;
        }
        units += ch.len_utf16();
    }
    (units == offset).then_some(text.len())
}

pub struct TelegramBot {
    api_base: String,
    token: String,
    http: HttpClient,
    offset: i64,
    poll_timeout: Duration,
}

impl TelegramBot {
    pub fn new(token: impl Into<String>, poll_timeout: Duration) -> Self {
        Self {
            api_base: env::var("TELEGRAM_API_BASE")
                .ok()
                .map(|value| value.trim().trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE.to_string()),
            token: token.into(),
            http: HttpClient::new(),
            offset: 0,
            poll_timeout,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    /// Long-polls for new updates and advances the offset past them.
    pub fn get_updates(&mut self) -> Result<Vec<Update>, TelegramError> {
        let request = self
            .http
            .post(self.method_url("getUpdates"))
            .timeout(self.poll_timeout + Duration::from_secs(10))
            .form(&[
                ("offset", self.offset.to_string()),
                ("timeout", self.poll_timeout.as_secs().to_string()),
            ]);
        let updates: Vec<Update> = call(request, "getUpdates")?;
        if let Some(last) = updates.last() {
            self.offset = last.update_id + 1;
        }
        if !updates.is_empty() {
            tracing::info!(count = updates.len(), offset = self.offset, "received updates");
        }
        Ok(updates)
    }

    /// Sends MarkdownV2 text; the caller is responsible for escaping.
    pub fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<(), TelegramError> {
        let mut fields = vec![
            ("chat_id", chat_id.to_string()),
            ("text", text.to_string()),
            ("parse_mode", "MarkdownV2".to_string()),
        ];
        if let Some(message_id) = reply_to {
            fields.push(("reply_to_message_id", message_id.to_string()));
        }
        let request = self
            .http
            .post(self.method_url("sendMessage"))
            .form(&fields);
        let _: serde_json::Value = call(request, "sendMessage")?;
        Ok(())
    }

    pub fn send_document(
        &self,
        chat_id: i64,
        bytes: Vec<u8>,
        file_name: &str,
        caption: Option<&str>,
        reply_to: Option<i64>,
    ) -> Result<(), TelegramError> {
        let part = MultipartPart::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("image/png")?;
        let mut form = MultipartForm::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);
        if let Some(caption) = caption {
            form = form
                .text("caption", caption.to_string())
                .text("parse_mode", "MarkdownV2");
        }
        if let Some(message_id) = reply_to {
            form = form.text("reply_to_message_id", message_id.to_string());
        }
        let request = self
            .http
            .post(self.method_url("sendDocument"))
            .multipart(form);
        let _: serde_json::Value = call(request, "sendDocument")?;
        Ok(())
    }
}

fn call<T: DeserializeOwned>(
    request: RequestBuilder,
    method: &'static str,
) -> Result<T, TelegramError> {
    let envelope: ApiEnvelope<T> = request.send()?.json()?;
    unwrap_envelope(envelope, method)
}

fn unwrap_envelope<T>(envelope: ApiEnvelope<T>, method: &'static str) -> Result<T, TelegramError> {
    if !envelope.ok {
        return Err(TelegramError::Api {
            code: envelope.error_code.unwrap_or_default(),
            description: envelope
                .description
                .unwrap_or_else(|| "no description".to_string()),
        });
    }
    envelope.result.ok_or(TelegramError::MissingResult(method))
}
