use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use anyhow::Context;
use chrono::Utc;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;

use crate::chat::{ChatError, ChatSource, MessageBatch, RoomMessage};

const MESSAGE_EVENT: &str = "m.room.message";
const TEXT_MSGTYPE: &str = "m.text";

/// Matrix client-server API client, scoped to a single room. Constructed via
/// [`MatrixChat::login`], which authenticates and joins the room; failures
/// there are startup failures.
pub struct MatrixChat {
    client: ClientWithMiddleware,
    base_url: String,
    access_token: String,
    user_id: String,
    room_id: String,
    // transaction ids must be unique per access token; the prefix keys them
    // to this process instance
    txn_prefix: String,
    txn_counter: AtomicU64,
}

impl MatrixChat {
    const SYNC_TIMEOUT_MS: &'static str = "30000";
    const HISTORY_PAGE_LIMIT: &'static str = "100";

    /// Logs in with password and joins the configured room (id or alias).
    #[tracing::instrument(skip(password))]
    pub async fn login(
        server: &str,
        user: &str,
        password: &str,
        room: &str,
    ) -> anyhow::Result<Self> {
        // the sync long poll is 30s; leave the server margin on top
        let client = crate::http::retrying_client(Duration::from_secs(75))?;
        let base_url = format!("{}/_matrix/client/v3", server.trim_end_matches('/'));

        #[derive(Debug, Deserialize)]
        struct LoginResponse {
            access_token: String,
            user_id: String,
        }

        let body = serde_json::json!({
            "type": "m.login.password",
            "identifier": { "type": "m.id.user", "user": user },
            "password": password,
            "initial_device_display_name": "playlist-pulse",
        });
        let resp = client
            .post(format!("{base_url}/login"))
            .json(&body)
            .send()
            .await
            .context("Failed to reach the homeserver")?;
        let login = check(resp)
            .await
            .context("Homeserver rejected login")?
            .json::<LoginResponse>()
            .await
            .context("Malformed login response")?;

        #[derive(Debug, Deserialize)]
        struct JoinResponse {
            room_id: String,
        }

        let resp = client
            .post(format!("{base_url}/join/{}", urlencoding::encode(room)))
            .bearer_auth(&login.access_token)
            .json(&serde_json::json!({}))
            .send()
            .await
            .context("Failed to reach the homeserver")?;
        let joined = check(resp)
            .await
            .context("Failed to join the configured room")?
            .json::<JoinResponse>()
            .await
            .context("Malformed join response")?;

        tracing::info!(user_id = %login.user_id, room_id = %joined.room_id, "Logged in to Matrix");

        Ok(MatrixChat {
            client,
            base_url,
            access_token: login.access_token,
            user_id: login.user_id,
            room_id: joined.room_id,
            txn_prefix: format!("playlist-pulse-{}", Utc::now().timestamp_millis()),
            txn_counter: AtomicU64::new(0),
        })
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ChatError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(ChatError::Api {
        status: status.as_u16(),
        message,
    })
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    sender: String,
    origin_server_ts: i64,
    #[serde(default)]
    content: serde_json::Value,
}

impl RawEvent {
    /// Keeps plain-text room messages, drops everything else (state events,
    /// reactions, media, ...).
    fn into_message(self) -> Option<RoomMessage> {
        if self.kind != MESSAGE_EVENT || self.content["msgtype"] != TEXT_MSGTYPE {
            return None;
        }
        let body = self.content["body"].as_str()?.to_string();
        Some(RoomMessage {
            sender: self.sender,
            body,
            timestamp_ms: self.origin_server_ts,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SyncResponse {
    next_batch: String,
    #[serde(default)]
    rooms: SyncRooms,
}

#[derive(Debug, Default, Deserialize)]
struct SyncRooms {
    #[serde(default)]
    join: HashMap<String, JoinedRoom>,
}

#[derive(Debug, Deserialize)]
struct JoinedRoom {
    #[serde(default)]
    timeline: Timeline,
}

#[derive(Debug, Default, Deserialize)]
struct Timeline {
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    chunk: Vec<RawEvent>,
    end: Option<String>,
}

impl ChatSource for MatrixChat {
    async fn next_batch(&self, cursor: Option<&str>) -> Result<MessageBatch, ChatError> {
        let mut request = self
            .client
            .get(format!("{}/sync", self.base_url))
            .bearer_auth(&self.access_token)
            .query(&[
                ("timeout", Self::SYNC_TIMEOUT_MS),
                ("set_presence", "offline"),
            ]);
        if let Some(cursor) = cursor {
            request = request.query(&[("since", cursor)]);
        }

        let resp = request
            .send()
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Sync request failed"))?;
        let sync = check(resp).await?.json::<SyncResponse>().await?;

        let messages = sync
            .rooms
            .join
            .into_iter()
            .filter(|(room_id, _)| room_id == &self.room_id)
            .flat_map(|(_, room)| room.timeline.events)
            .filter_map(RawEvent::into_message)
            .collect();

        Ok(MessageBatch {
            messages,
            next_cursor: sync.next_batch,
        })
    }

    async fn history_page(
        &self,
        from: &str,
    ) -> Result<(Vec<RoomMessage>, Option<String>), ChatError> {
        let resp = self
            .client
            .get(format!("{}/rooms/{}/messages", self.base_url, self.room_id))
            .bearer_auth(&self.access_token)
            .query(&[
                ("from", from),
                ("dir", "b"),
                ("limit", Self::HISTORY_PAGE_LIMIT),
            ])
            .send()
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "History request failed"))?;
        let page = check(resp).await?.json::<MessagesResponse>().await?;

        let messages = page
            .chunk
            .into_iter()
            .filter_map(RawEvent::into_message)
            .collect();
        Ok((messages, page.end))
    }

    async fn post(&self, body: &str) -> Result<(), ChatError> {
        let txn = format!(
            "{}-{}",
            self.txn_prefix,
            self.txn_counter.fetch_add(1, Ordering::Relaxed)
        );
        let resp = self
            .client
            .put(format!(
                "{}/rooms/{}/send/{MESSAGE_EVENT}/{txn}",
                self.base_url, self.room_id
            ))
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({ "msgtype": TEXT_MSGTYPE, "body": body }))
            .send()
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Room send failed"))?;
        check(resp).await?;
        Ok(())
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }
}
