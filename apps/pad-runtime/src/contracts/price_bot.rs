// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Cipherpad Contributors

//! Price reporting bot.
//!
//! Demonstrates outbound HTTP from a contract. `ReportPrice` starts a side
//! task that fetches the current price and forwards it to a Telegram chat.
//! The result is reported through the egress queue two blocks later whether
//! or not the requests finished.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{
    AccountId, ContractId, MessageOrigin, NativeContext, NativeContract, TransactionError,
    TransactionResult, PRICE_BOT,
};
use crate::runtime::side_task::AsyncSideTask;

/// Blocks between starting a report and finalizing it.
pub const REPORT_DURATION: u64 = 2;

pub const DEFAULT_PRICE_FEED_URL: &str =
    "https://min-api.cryptocompare.com/data/price?fsym=BTC&tsyms=USD";
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// External services the bot talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceBotEndpoints {
    pub price_feed_url: String,
    pub telegram_api_url: String,
}

impl Default for PriceBotEndpoints {
    fn default() -> Self {
        Self {
            price_feed_url: DEFAULT_PRICE_FEED_URL.to_string(),
            telegram_api_url: DEFAULT_TELEGRAM_API_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    SetOwner { owner: AccountId },
    SetupBot { token: String, chat_id: String },
    ReportPrice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    QueryOwner,
    QueryBotToken,
    QueryChatId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Owner(AccountId),
    BotToken(String),
    ChatId(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum Error {
    #[error("query origin unavailable")]
    OriginUnavailable,
    #[error("not authorized")]
    NotAuthorized,
}

/// Sealed part of the bot's state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct BotState {
    owner: AccountId,
    bot_token: String,
    chat_id: String,
}

/// Body of the Telegram `sendMessage` call.
#[derive(Debug, Serialize, Deserialize)]
struct TgMessage {
    chat_id: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct Price {
    #[serde(rename = "USD")]
    usd: f64,
}

pub struct PriceBot {
    root: AccountId,
    state: BotState,
    endpoints: PriceBotEndpoints,
    client: reqwest::Client,
}

impl PriceBot {
    pub fn new(root: AccountId, endpoints: PriceBotEndpoints, client: reqwest::Client) -> Self {
        Self {
            root,
            state: BotState::default(),
            endpoints,
            client,
        }
    }

    fn is_privileged(&self, account: &AccountId) -> bool {
        *account == self.root || *account == self.state.owner
    }
}

/// Fetch the price and post it to the chat. Never fails; errors are
/// returned as text.
async fn report_price(
    client: reqwest::Client,
    endpoints: PriceBotEndpoints,
    bot_token: String,
    chat_id: String,
) -> String {
    info!("Fetching price");
    let body = match client.get(&endpoints.price_feed_url).send().await {
        Ok(resp) => match resp.text().await {
            Ok(body) => body,
            Err(err) => return format!("Network error: {err}"),
        },
        Err(err) => return format!("Network error: {err}"),
    };

    let price: Price = match serde_json::from_str(&body) {
        Ok(price) => price,
        Err(err) => {
            warn!(error = %err, "Unexpected price feed response");
            return format!("Malformed price response: {err}");
        }
    };

    let uri = format!(
        "{}/bot{}/sendMessage",
        endpoints.telegram_api_url.trim_end_matches('/'),
        bot_token
    );
    let message = TgMessage {
        chat_id,
        text: format!("BTC price: ${}", price.usd),
    };
    let result = match client.post(uri).json(&message).send().await {
        Ok(resp) => match resp.text().await {
            Ok(body) => body,
            Err(err) => format!("Network error: {err}"),
        },
        Err(err) => format!("Network error: {err}"),
    };
    info!("Price report sent");
    result
}

impl NativeContract for PriceBot {
    type Cmd = Command;
    type QReq = Request;
    type QResp = Result<Response, Error>;

    fn id(&self) -> ContractId {
        PRICE_BOT
    }

    fn name(&self) -> &'static str {
        "price_bot"
    }

    fn handle_command(
        &mut self,
        context: &mut NativeContext<'_>,
        origin: MessageOrigin,
        cmd: Command,
    ) -> TransactionResult {
        let sender = *origin.account().ok_or(TransactionError::BadOrigin)?;

        match cmd {
            Command::SetOwner { owner } => {
                if sender != self.root {
                    return Err(TransactionError::BadOrigin);
                }
                info!(owner = %owner, "Price bot owner set");
                self.state.owner = owner;
            }
            Command::SetupBot { token, chat_id } => {
                if !self.is_privileged(&sender) {
                    return Err(TransactionError::BadOrigin);
                }
                self.state.bot_token = token;
                self.state.chat_id = chat_id;
            }
            Command::ReportPrice => {
                if !self.is_privileged(&sender) {
                    return Err(TransactionError::BadOrigin);
                }

                let task = AsyncSideTask::spawn(
                    context.block.block_number,
                    REPORT_DURATION,
                    report_price(
                        self.client.clone(),
                        self.endpoints.clone(),
                        self.state.bot_token.clone(),
                        self.state.chat_id.clone(),
                    ),
                    |result: Option<String>, ctx| {
                        let payload = match result {
                            Some(result) => json!({ "kind": "price_report", "result": result }),
                            None => json!({ "kind": "price_report", "timed_out": true }),
                        };
                        ctx.emit(payload);
                    },
                );
                context.spawn_side_task(task);
            }
        }
        Ok(())
    }

    fn handle_query(&self, origin: Option<&AccountId>, req: Request) -> Result<Response, Error> {
        let sender = origin.ok_or(Error::OriginUnavailable)?;
        match req {
            Request::QueryOwner => Ok(Response::Owner(self.state.owner)),
            Request::QueryBotToken => {
                if !self.is_privileged(sender) {
                    return Err(Error::NotAuthorized);
                }
                Ok(Response::BotToken(self.state.bot_token.clone()))
            }
            Request::QueryChatId => {
                if !self.is_privileged(sender) {
                    return Err(Error::NotAuthorized);
                }
                Ok(Response::ChatId(self.state.chat_id.clone()))
            }
        }
    }

    fn snapshot(&self) -> Value {
        serde_json::to_value(&self.state).unwrap_or(Value::Null)
    }

    fn restore(&mut self, state: Value) -> Result<(), serde_json::Error> {
        self.state = serde_json::from_value(state)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::BlockInfo;
    use crate::runtime::egress::EgressQueue;
    use crate::runtime::side_task::SideTaskManager;
    use axum::{extract::Path, routing::get, routing::post, Json, Router};
    use std::time::Duration;

    fn account(byte: u8) -> AccountId {
        AccountId::new([byte; 32])
    }

    fn bot(endpoints: PriceBotEndpoints) -> PriceBot {
        PriceBot::new(account(1), endpoints, reqwest::Client::new())
    }

    /// Serves a fixed price and echoes Telegram messages.
    async fn mock_services() -> PriceBotEndpoints {
        let app = Router::new()
            .route("/price", get(|| async { Json(json!({ "USD": 64000.5 })) }))
            .route(
                "/{bot}/sendMessage",
                post(|Path(bot): Path<String>, Json(msg): Json<TgMessage>| async move {
                    Json(json!({ "ok": true, "bot": bot, "chat_id": msg.chat_id, "text": msg.text }))
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        PriceBotEndpoints {
            price_feed_url: format!("http://{addr}/price"),
            telegram_api_url: format!("http://{addr}"),
        }
    }

    fn run(
        bot: &mut PriceBot,
        side_tasks: &mut SideTaskManager,
        egress: &mut EgressQueue,
        block_number: u64,
        sender: AccountId,
        cmd: Command,
    ) -> TransactionResult {
        let mut ctx = NativeContext {
            block: BlockInfo {
                block_number,
                now_ms: 0,
            },
            contract_id: PRICE_BOT,
            side_tasks,
            egress,
        };
        bot.handle_command(&mut ctx, MessageOrigin::AccountId(sender), cmd)
    }

    #[tokio::test]
    async fn only_root_sets_owner_and_owner_configures() {
        let mut bot = bot(PriceBotEndpoints::default());
        let mut side_tasks = SideTaskManager::new();
        let mut egress = EgressQueue::default();
        let owner = account(2);

        assert_eq!(
            run(&mut bot, &mut side_tasks, &mut egress, 1, owner, Command::SetOwner { owner }),
            Err(TransactionError::BadOrigin)
        );
        run(&mut bot, &mut side_tasks, &mut egress, 1, account(1), Command::SetOwner { owner })
            .unwrap();
        run(
            &mut bot,
            &mut side_tasks,
            &mut egress,
            2,
            owner,
            Command::SetupBot {
                token: "123:abc".to_string(),
                chat_id: "42".to_string(),
            },
        )
        .unwrap();
        assert_eq!(
            run(&mut bot, &mut side_tasks, &mut egress, 3, account(9), Command::ReportPrice),
            Err(TransactionError::BadOrigin)
        );

        assert_eq!(
            bot.handle_query(Some(&account(9)), Request::QueryOwner),
            Ok(Response::Owner(owner))
        );
        assert_eq!(
            bot.handle_query(Some(&account(9)), Request::QueryBotToken),
            Err(Error::NotAuthorized)
        );
        assert_eq!(
            bot.handle_query(Some(&owner), Request::QueryChatId),
            Ok(Response::ChatId("42".to_string()))
        );
        assert_eq!(
            bot.handle_query(None, Request::QueryOwner),
            Err(Error::OriginUnavailable)
        );
    }

    #[tokio::test]
    async fn gatekeeper_origin_is_rejected() {
        let mut bot = bot(PriceBotEndpoints::default());
        let mut side_tasks = SideTaskManager::new();
        let mut egress = EgressQueue::default();
        let mut ctx = NativeContext {
            block: BlockInfo {
                block_number: 1,
                now_ms: 0,
            },
            contract_id: PRICE_BOT,
            side_tasks: &mut side_tasks,
            egress: &mut egress,
        };
        assert_eq!(
            bot.handle_command(&mut ctx, MessageOrigin::Gatekeeper, Command::ReportPrice),
            Err(TransactionError::BadOrigin)
        );
    }

    #[tokio::test]
    async fn report_price_posts_to_telegram() {
        let endpoints = mock_services().await;
        let result = report_price(
            reqwest::Client::new(),
            endpoints,
            "123:abc".to_string(),
            "42".to_string(),
        )
        .await;
        let body: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(body["bot"], "bot123:abc");
        assert_eq!(body["chat_id"], "42");
        assert_eq!(body["text"], "BTC price: $64000.5");
    }

    #[tokio::test]
    async fn unreachable_feed_reports_network_error() {
        let endpoints = PriceBotEndpoints {
            price_feed_url: "http://127.0.0.1:1/price".to_string(),
            telegram_api_url: "http://127.0.0.1:1".to_string(),
        };
        let result =
            report_price(reqwest::Client::new(), endpoints, String::new(), String::new()).await;
        assert!(result.starts_with("Network error:"), "{result}");
    }

    #[tokio::test]
    async fn report_is_finalized_two_blocks_later() {
        let mut bot = bot(mock_services().await);
        let mut side_tasks = SideTaskManager::new();
        let mut egress = EgressQueue::default();

        run(&mut bot, &mut side_tasks, &mut egress, 10, account(1), Command::ReportPrice).unwrap();
        assert_eq!(side_tasks.len(), 1);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(side_tasks.poll(11, &mut egress).is_empty());
        let outcomes = side_tasks.poll(10 + REPORT_DURATION, &mut egress);
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].completed);

        let messages = egress.since(0);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].from, PRICE_BOT);
        assert_eq!(messages[0].payload["kind"], "price_report");
        assert!(messages[0].payload["result"]
            .as_str()
            .unwrap()
            .contains("BTC price"));
    }

    #[tokio::test]
    async fn state_snapshot_roundtrip() {
        let mut bot = bot(PriceBotEndpoints::default());
        let mut side_tasks = SideTaskManager::new();
        let mut egress = EgressQueue::default();
        run(
            &mut bot,
            &mut side_tasks,
            &mut egress,
            1,
            account(1),
            Command::SetOwner { owner: account(3) },
        )
        .unwrap();

        let mut restored = PriceBot::new(account(1), PriceBotEndpoints::default(), reqwest::Client::new());
        restored.restore(bot.snapshot()).unwrap();
        assert_eq!(
            restored.handle_query(Some(&account(3)), Request::QueryOwner),
            Ok(Response::Owner(account(3)))
        );
    }
}
