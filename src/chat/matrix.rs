//! Matrix client-server API session over reqwest

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ChatError, ChatEvent, ChatSession, MembershipChange, Result, SyncBatch};

const CLIENT_API_PREFIX: [&str; 3] = ["_matrix", "client", "v3"];

/// Extra time allowed on top of the server-side long-poll timeout
const SYNC_GRACE: Duration = Duration::from_secs(30);

/// Connection settings for [`MatrixSession::connect`]
#[derive(Debug, Clone)]
pub struct MatrixConfig {
    pub homeserver: String,
    pub user_id: String,
    pub device_name: String,
    pub access_token: Option<String>,
    pub password: Option<String>,
    pub sync_timeout: Duration,
}

/// Logged-in Matrix session
pub struct MatrixSession {
    client: Client,
    homeserver: Url,
    user_id: String,
    access_token: String,
    sync_timeout: Duration,
}

impl MatrixSession {
    /// Log in (or reuse a pre-issued access token) and return a ready session
    pub async fn connect(config: MatrixConfig) -> Result<Self> {
        let homeserver = Url::parse(&config.homeserver)
            .map_err(|_| ChatError::InvalidHomeserver(config.homeserver.clone()))?;
        let client = Client::builder()
            .timeout(config.sync_timeout + SYNC_GRACE)
            .build()?;

        let (user_id, access_token) = match (config.access_token, config.password) {
            (Some(token), _) => (config.user_id, token),
            (None, Some(password)) => {
                login(&client, &homeserver, &config.user_id, &password, &config.device_name)
                    .await?
            }
            (None, None) => return Err(ChatError::MissingCredentials),
        };

        info!(user_id = %user_id, homeserver = %homeserver, "Matrix session ready");
        Ok(Self {
            client,
            homeserver,
            user_id,
            access_token,
            sync_timeout: config.sync_timeout,
        })
    }

    async fn join(&self, room: &str) -> Result<()> {
        let url = endpoint(&self.homeserver, &["rooms", room, "join"])?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&json!({}))
            .send()
            .await?;
        check(response).await?;
        info!(room, "Joined room after invite");
        Ok(())
    }
}

#[async_trait]
impl ChatSession for MatrixSession {
    async fn sync(&mut self, since: Option<&str>) -> Result<SyncBatch> {
        let url = endpoint(&self.homeserver, &["sync"])?;
        let mut query = vec![("timeout", self.sync_timeout.as_millis().to_string())];
        if let Some(since) = since {
            query.push(("since", since.to_string()));
        }

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(&query)
            .send()
            .await?;
        let sync: SyncResponse = check(response).await?.json().await?;

        for room in sync.rooms.invite.keys() {
            if let Err(err) = self.join(room).await {
                warn!(room = %room, error = %err, "Failed to accept invite");
            }
        }

        let batch = sync.into_batch(&self.user_id);
        debug!(events = batch.events.len(), next_batch = %batch.next_batch, "Sync complete");
        Ok(batch)
    }

    async fn send_text(&self, room: &str, text: &str) -> Result<()> {
        let txn_id = Uuid::new_v4().to_string();
        let url = endpoint(
            &self.homeserver,
            &["rooms", room, "send", "m.room.message", &txn_id],
        )?;
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "msgtype": "m.text", "body": text }))
            .send()
            .await?;
        check(response).await?;
        debug!(room, "Message sent");
        Ok(())
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }
}

async fn login(
    client: &Client,
    homeserver: &Url,
    user_id: &str,
    password: &str,
    device_name: &str,
) -> Result<(String, String)> {
    #[derive(Deserialize)]
    struct LoginResponse {
        user_id: String,
        access_token: String,
    }

    let url = endpoint(homeserver, &["login"])?;
    let body = json!({
        "type": "m.login.password",
        "identifier": { "type": "m.id.user", "user": user_id },
        "password": password,
        "initial_device_display_name": device_name,
    });
    let response = client.post(url).json(&body).send().await?;
    let login: LoginResponse = check(response).await?.json().await?;
    Ok((login.user_id, login.access_token))
}

/// Build a client API URL; each segment is percent-encoded on its own
pub fn endpoint(homeserver: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = homeserver.clone();
    url.path_segments_mut()
        .map_err(|_| ChatError::InvalidHomeserver(homeserver.to_string()))?
        .pop_if_empty()
        .extend(CLIENT_API_PREFIX)
        .extend(segments);
    Ok(url)
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ChatError::Api {
        status: status.as_u16(),
        body: if status == StatusCode::UNAUTHORIZED {
            "access token rejected".to_string()
        } else {
            body
        },
    })
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
    #[serde(default)]
    invite: HashMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct JoinedRoom {
    #[serde(default)]
    timeline: Timeline,
}

#[derive(Debug, Default, Deserialize)]
struct Timeline {
    #[serde(default)]
    events: Vec<RoomEvent>,
}

#[derive(Debug, Deserialize)]
struct RoomEvent {
    #[serde(rename = "type")]
    kind: String,
    sender: String,
    #[serde(default)]
    state_key: Option<String>,
    #[serde(default)]
    content: Value,
}

impl SyncResponse {
    fn into_batch(self, own_user: &str) -> SyncBatch {
        let mut events: Vec<ChatEvent> = self
            .rooms
            .join
            .into_iter()
            .flat_map(|(room, joined)| {
                joined
                    .timeline
                    .events
                    .into_iter()
                    .map(move |event| event.into_chat_event(&room))
            })
            .collect();

        events.extend(self.rooms.invite.into_keys().map(|room| ChatEvent::Membership {
            room,
            user: own_user.to_string(),
            change: MembershipChange::Invited,
        }));

        SyncBatch {
            next_batch: self.next_batch,
            events,
        }
    }
}

impl RoomEvent {
    fn into_chat_event(self, room: &str) -> ChatEvent {
        match self.kind.as_str() {
            "m.room.message" => {
                let msgtype = self.content.get("msgtype").and_then(Value::as_str);
                let body = self.content.get("body").and_then(Value::as_str);
                match (msgtype, body) {
                    (Some("m.text" | "m.notice"), Some(body)) => ChatEvent::Message {
                        room: room.to_string(),
                        sender: self.sender,
                        body: body.to_string(),
                    },
                    _ => ChatEvent::Other,
                }
            }
            "m.room.member" => {
                let change = match self.content.get("membership").and_then(Value::as_str) {
                    Some("join") => MembershipChange::Joined,
                    Some("leave" | "ban") => MembershipChange::Left,
                    Some("invite") => MembershipChange::Invited,
                    _ => return ChatEvent::Other,
                };
                ChatEvent::Membership {
                    room: room.to_string(),
                    user: self.state_key.unwrap_or(self.sender),
                    change,
                }
            }
            _ => ChatEvent::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_room_ids() {
        let homeserver = Url::parse("https://matrix.example.org/").unwrap();
        let url = endpoint(&homeserver, &["rooms", "!abc:example.org", "join"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://matrix.example.org/_matrix/client/v3/rooms/!abc:example.org/join"
        );

        let url = endpoint(&homeserver, &["rooms", "#a b", "join"]).unwrap();
        assert!(url.as_str().ends_with("/rooms/%23a%20b/join"));
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let homeserver = Url::parse("https://example.org/matrix/").unwrap();
        let url = endpoint(&homeserver, &["sync"]).unwrap();
        assert_eq!(url.as_str(), "https://example.org/matrix/_matrix/client/v3/sync");
    }

    #[test]
    fn test_sync_response_into_batch() {
        let body = json!({
            "next_batch": "s72595_4483_1934",
            "rooms": {
                "join": {
                    "!room:example.org": {
                        "timeline": {
                            "events": [
                                {
                                    "type": "m.room.message",
                                    "sender": "@alice:example.org",
                                    "content": { "msgtype": "m.text", "body": "status" }
                                },
                                {
                                    "type": "m.room.message",
                                    "sender": "@alice:example.org",
                                    "content": { "msgtype": "m.image", "body": "cat.png" }
                                },
                                {
                                    "type": "m.room.member",
                                    "sender": "@bob:example.org",
                                    "state_key": "@bob:example.org",
                                    "content": { "membership": "leave" }
                                },
                                {
                                    "type": "m.reaction",
                                    "sender": "@bob:example.org",
                                    "content": {}
                                }
                            ]
                        }
                    }
                },
                "invite": { "!new:example.org": {} }
            }
        });

        let sync: SyncResponse = serde_json::from_value(body).unwrap();
        let batch = sync.into_batch("@bot:example.org");

        assert_eq!(batch.next_batch, "s72595_4483_1934");
        assert_eq!(
            batch.events,
            vec![
                ChatEvent::Message {
                    room: "!room:example.org".to_string(),
                    sender: "@alice:example.org".to_string(),
                    body: "status".to_string(),
                },
                ChatEvent::Other,
                ChatEvent::Membership {
                    room: "!room:example.org".to_string(),
                    user: "@bob:example.org".to_string(),
                    change: MembershipChange::Left,
                },
                ChatEvent::Other,
                ChatEvent::Membership {
                    room: "!new:example.org".to_string(),
                    user: "@bot:example.org".to_string(),
                    change: MembershipChange::Invited,
                },
            ]
        );
    }

    #[test]
    fn test_empty_sync_response() {
        let sync: SyncResponse = serde_json::from_value(json!({ "next_batch": "s1" })).unwrap();
        let batch = sync.into_batch("@bot:example.org");
        assert_eq!(batch.next_batch, "s1");
        assert!(batch.events.is_empty());
    }

    #[tokio::test]
    async fn test_connect_requires_credentials() {
        let config = MatrixConfig {
            homeserver: "https://matrix.example.org".to_string(),
            user_id: "@bot:example.org".to_string(),
            device_name: "fetchbot".to_string(),
            access_token: None,
            password: None,
            sync_timeout: Duration::from_secs(30),
        };
        assert!(matches!(
            MatrixSession::connect(config).await,
            Err(ChatError::MissingCredentials)
        ));
    }
}
