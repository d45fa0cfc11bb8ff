use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::dispatch::Reply;

pub static DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct BotUser {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    base: String,
}

impl TelegramClient {
    /// `poll_timeout` is the long-poll window; the HTTP timeout sits above it.
    pub fn new(api: &str, token: &str, poll_timeout: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(poll_timeout + 15))
            .build()?;
        Ok(TelegramClient {
            client,
            base: format!("{}/bot{token}", api.trim_end_matches('/')),
        })
    }

    pub async fn get_me(&self) -> Result<BotUser> {
        self.call("getMe", self.client.get(self.url("getMe"))).await
    }

    pub async fn get_updates(&self, offset: i64, timeout: u64) -> Result<Vec<Update>> {
        let body = json!({
            "offset": offset,
            "timeout": timeout,
            "allowed_updates": ["message"],
        });
        self.call("getUpdates", self.client.post(self.url("getUpdates")).json(&body))
            .await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str, markdown: bool) -> Result<()> {
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if markdown {
            body["parse_mode"] = json!("Markdown");
        }
        let _: Message = self
            .call("sendMessage", self.client.post(self.url("sendMessage")).json(&body))
            .await?;
        Ok(())
    }

    pub async fn send_photo(
        &self,
        chat_id: i64,
        image: Vec<u8>,
        caption: Option<&str>,
    ) -> Result<()> {
        let mut form = Form::new().text("chat_id", chat_id.to_string()).part(
            "photo",
            Part::bytes(image)
                .file_name("chart.png")
                .mime_str("image/png")?,
        );
        if let Some(caption) = caption {
            form = form.text("caption", caption.to_string());
        }
        let _: Message = self
            .call("sendPhoto", self.client.post(self.url("sendPhoto")).multipart(form))
            .await?;
        Ok(())
    }

    /// Sends a dispatcher reply. Chart files are removed once they are read.
    pub async fn deliver(&self, chat_id: i64, reply: Reply) -> Result<()> {
        match reply {
            Reply::Text { text, markdown } => self.send_message(chat_id, &text, markdown).await,
            Reply::Photo { path, caption } => {
                let image = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("Failed to read chart {}", path.display()))?;
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %e, "could not remove chart file");
                }
                self.send_photo(chat_id, image, caption.as_deref()).await
            }
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let resp = request
            .send()
            .await
            .with_context(|| format!("Failed to call Telegram {method}"))?;
        let status = resp.status();
        let body: ApiResponse<T> = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse Telegram {method} response ({status})"))?;
        unwrap_response(method, body)
    }
}

fn unwrap_response<T>(method: &str, body: ApiResponse<T>) -> Result<T> {
    if !body.ok {
        anyhow::bail!(
            "Telegram {} failed: {}",
            method,
            body.description.unwrap_or_else(|| "no description".to_string())
        );
    }
    debug!(method, "Telegram call succeeded");
    body.result
        .with_context(|| format!("Telegram {method} returned no result"))
}
