//! Per-user real-time push.
//!
//! Each user gets a logical "room": a `tokio::sync::broadcast` channel keyed by user id. The
//! engine's event hooks publish into the room; the SSE endpoint drains it. Delivery is strictly
//! best-effort — no subscriber, a full buffer, or a lagging reader all mean messages are dropped
//! silently, and the client recovers the authoritative state from the pull endpoints.
use std::{collections::HashMap, sync::Arc};

use actix_web::{web, HttpResponse};
use futures::stream;
use log::*;
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use yieldvault_engine::{
    db_types::UserId,
    events::{PaymentInstructionsReadyEvent, PositionStatusChangedEvent},
};

use crate::errors::ServerError;

const ROOM_BUFFER_SIZE: usize = 32;

/// The two message kinds a trusted internal caller can push to a user.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    PaymentInstructionsReady(PaymentInstructionsReadyEvent),
    PositionStatusChanged(PositionStatusChangedEvent),
}

impl PushMessage {
    fn user_id(&self) -> &UserId {
        match self {
            PushMessage::PaymentInstructionsReady(e) => &e.user_id,
            PushMessage::PositionStatusChanged(e) => &e.user_id,
        }
    }
}

#[derive(Clone, Default)]
pub struct PushNotifier {
    rooms: Arc<RwLock<HashMap<UserId, broadcast::Sender<PushMessage>>>>,
}

impl PushNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire-and-forget push to the owner of the message. Never blocks on, or fails because of,
    /// the receiving side.
    pub async fn publish(&self, message: PushMessage) {
        let rooms = self.rooms.read().await;
        let Some(sender) = rooms.get(message.user_id()) else {
            trace!("📡️ No open room for {}; message dropped", message.user_id());
            return;
        };
        match sender.send(message) {
            Ok(n) => trace!("📡️ Message delivered to {n} subscriber(s)"),
            // All receivers are gone; the user went offline between subscribe and publish.
            Err(_) => trace!("📡️ Room has no live subscribers; message dropped"),
        }
    }

    /// Join (creating if needed) the user's room.
    pub async fn subscribe(&self, user_id: &UserId) -> broadcast::Receiver<PushMessage> {
        let mut rooms = self.rooms.write().await;
        let sender = rooms.entry(user_id.clone()).or_insert_with(|| broadcast::channel(ROOM_BUFFER_SIZE).0);
        sender.subscribe()
    }
}

/// Turn a room subscription into a `text/event-stream` response. Lagged receivers skip ahead
/// rather than erroring: pushed state is advisory, the pull endpoints are authoritative.
pub fn sse_response(rx: broadcast::Receiver<PushMessage>) -> HttpResponse {
    let stream = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(message) => {
                    let json = match serde_json::to_string(&message) {
                        Ok(json) => json,
                        Err(e) => {
                            error!("📡️ Could not serialize push message: {e}");
                            continue;
                        },
                    };
                    let frame = web::Bytes::from(format!("data: {json}\n\n"));
                    return Some((Ok::<_, ServerError>(frame), rx));
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("📡️ Subscriber lagged; {skipped} message(s) dropped");
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });
    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream)
}

#[cfg(test)]
mod test {
    use yieldvault_engine::db_types::PositionStatus;

    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_is_a_silent_no_op() {
        let notifier = PushNotifier::new();
        let event = PositionStatusChangedEvent::new(1, UserId::from("u-1"), PositionStatus::Active, "activated");
        // No room exists; nothing to assert beyond "does not panic or block".
        notifier.publish(PushMessage::PositionStatusChanged(event)).await;
    }

    #[tokio::test]
    async fn subscribers_receive_their_own_messages_only() {
        let notifier = PushNotifier::new();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let mut alice_rx = notifier.subscribe(&alice).await;
        let mut bob_rx = notifier.subscribe(&bob).await;

        let event = PositionStatusChangedEvent::new(7, alice.clone(), PositionStatus::Active, "activated");
        notifier.publish(PushMessage::PositionStatusChanged(event)).await;

        let received = alice_rx.recv().await.expect("alice should receive");
        assert_eq!(received.user_id(), &alice);
        assert!(bob_rx.try_recv().is_err(), "bob must not see alice's messages");
    }
}
