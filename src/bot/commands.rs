//! Inbound command parsing and the subscription command handler.

use std::sync::Arc;

use log::debug;
use log::info;
use log::warn;

use crate::bot::error::BotError;
use crate::bot::error::ValidationError;
use crate::messenger::InboundMessage;
use crate::messenger::Messenger;
use crate::service::subscription_service::SubscribeResult;
use crate::service::subscription_service::SubscriptionService;
use crate::service::subscription_service::UnsubscribeResult;

/// Minimum number of digits in a recipient key.
pub const MIN_RECIPIENT_KEY_LEN: usize = 10;

pub const WELCOME_TEXT: &str = "👋 *Bem-vindo ao Bot de Alertas IAGRO*\n\n\
    Envie seu telefone no formato:\n\
    `67999999999`\n\n\
    ❌ Para parar alertas, envie:\n\
    `/parar`";
pub const FORMAT_ERROR_TEXT: &str = "❌ Envie no formato: 67999999999";
pub const SUBSCRIBED_TEXT: &str = "✅ Cadastro realizado com sucesso!";
pub const UNSUBSCRIBED_TEXT: &str = "🔕 Alertas desativados.";
pub const NOT_REGISTERED_TEXT: &str = "⚠️ Você não estava cadastrado.";

/// A classified inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    /// Anything else is a registration attempt with the trimmed text.
    Register(String),
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if let Some(rest) = text.strip_prefix('/') {
            let word = rest.split_whitespace().next().unwrap_or_default();
            // `/start@SomeBot` is how commands arrive in group chats.
            let name = word.split('@').next().unwrap_or_default();
            match name.to_lowercase().as_str() {
                "start" | "help" => return Self::Start,
                "stop" | "parar" => return Self::Stop,
                _ => {}
            }
        }
        Self::Register(text.to_string())
    }
}

/// Checks that `raw` is an all-digit string of at least [`MIN_RECIPIENT_KEY_LEN`] digits.
pub fn validate_recipient_key(raw: &str) -> Result<&str, ValidationError> {
    let key = raw.trim();
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::NotDigits {
            value: key.to_string(),
        });
    }
    if key.len() < MIN_RECIPIENT_KEY_LEN {
        return Err(ValidationError::TooShort {
            len: key.len(),
            min: MIN_RECIPIENT_KEY_LEN,
        });
    }
    Ok(key)
}

/// Applies user commands to the registry and replies to every one of them.
pub struct CommandHandler {
    service: Arc<SubscriptionService>,
    messenger: Arc<dyn Messenger>,
}

impl CommandHandler {
    pub fn new(service: Arc<SubscriptionService>, messenger: Arc<dyn Messenger>) -> Self {
        Self { service, messenger }
    }

    /// Routes one inbound message to its command.
    pub async fn handle(&self, message: &InboundMessage) -> Result<(), BotError> {
        let command = Command::parse(&message.text);
        debug!("Endpoint {} sent {:?}", message.endpoint_id, command);
        match command {
            Command::Start => self.on_start_command(&message.endpoint_id).await,
            Command::Stop => self.on_stop_command(&message.endpoint_id).await,
            Command::Register(text) => self.on_register_text(&text, &message.endpoint_id).await,
        }
    }

    pub async fn on_start_command(&self, endpoint_id: &str) -> Result<(), BotError> {
        self.messenger
            .send_markdown(endpoint_id, WELCOME_TEXT)
            .await?;
        Ok(())
    }

    pub async fn on_register_text(&self, raw_text: &str, endpoint_id: &str) -> Result<(), BotError> {
        let key = match validate_recipient_key(raw_text) {
            Ok(key) => key,
            Err(e) => {
                warn!("Rejected registration from endpoint {endpoint_id}: {e}");
                self.messenger
                    .send_text(endpoint_id, FORMAT_ERROR_TEXT)
                    .await?;
                return Ok(());
            }
        };

        if let SubscribeResult::Renewed {
            previous_endpoint, ..
        } = self.service.subscribe(key, endpoint_id).await?
            && previous_endpoint != endpoint_id
        {
            info!("Recipient {key} moved from endpoint {previous_endpoint} to {endpoint_id}");
        }
        self.messenger.send_text(endpoint_id, SUBSCRIBED_TEXT).await?;
        Ok(())
    }

    pub async fn on_stop_command(&self, endpoint_id: &str) -> Result<(), BotError> {
        let reply = match self.service.unsubscribe_by_endpoint(endpoint_id).await? {
            UnsubscribeResult::Success { .. } => UNSUBSCRIBED_TEXT,
            UnsubscribeResult::AlreadyUnsubscribed | UnsubscribeResult::NoneSubscribed => {
                NOT_REGISTERED_TEXT
            }
        };
        self.messenger.send_text(endpoint_id, reply).await?;
        Ok(())
    }
}
