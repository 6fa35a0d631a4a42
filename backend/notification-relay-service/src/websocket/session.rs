//! The WebSocket session actor.
//!
//! A session starts unbound. The client's `register` frame binds it to a
//! user in the registry, which from then on holds the sending half of this
//! session's frame queue; a spawned forwarder drains the receiving half
//! into the actor mailbox.

use std::time::{Duration, Instant};

use actix::{Actor, ActorContext, AsyncContext, Handler, Message as ActixMessage, StreamHandler};
use actix_web_actors::ws;
use tokio::sync::mpsc::unbounded_channel;
use tracing::{debug, warn};

use super::messages::{ClientMessage, ServerFrame};
use super::{SessionId, SessionRegistry};

/// How often the server pings the client.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
/// How long without client traffic before the session is dropped.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Serialized frame on its way out through the socket.
#[derive(ActixMessage)]
#[rtype(result = "()")]
pub struct OutboundFrame(pub String);

pub struct WsSession {
    session_id: SessionId,
    user_id: Option<String>,
    registry: SessionRegistry,
    hb: Instant,
}

impl WsSession {
    pub fn new(registry: SessionRegistry) -> Self {
        Self {
            session_id: SessionId::new(),
            user_id: None,
            registry,
            hb: Instant::now(),
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                warn!("WebSocket heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn handle_register(&mut self, user_id: String, ctx: &mut ws::WebsocketContext<Self>) {
        if let Some(bound) = &self.user_id {
            debug!(
                "Session {:?} already bound to user {}, ignoring register",
                self.session_id, bound
            );
            return;
        }
        self.user_id = Some(user_id.clone());

        let (tx, mut rx) = unbounded_channel::<String>();
        let registry = self.registry.clone();
        let session_id = self.session_id;
        let addr = ctx.address();

        actix::spawn(async move {
            let newly_registered = registry.register(&user_id, session_id, tx).await;
            if newly_registered {
                match ServerFrame::registered(&user_id).to_json() {
                    Ok(ack) => addr.do_send(OutboundFrame(ack)),
                    Err(e) => warn!("Failed to serialize register ack: {:?}", e),
                }
            }

            // Drain the registry's queue into the actor until unregister
            // drops the sender.
            while let Some(frame) = rx.recv().await {
                addr.do_send(OutboundFrame(frame));
            }

            debug!("Frame forwarder for session {:?} ended", session_id);
        });
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        debug!("WebSocket session {:?} started", self.session_id);
        self.hb(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        debug!(
            "WebSocket session {:?} stopped (user: {:?})",
            self.session_id, self.user_id
        );

        // No-op when the session never registered.
        let registry = self.registry.clone();
        let session_id = self.session_id;
        actix::spawn(async move {
            registry.unregister(session_id).await;
        });
    }
}

impl Handler<OutboundFrame> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: OutboundFrame, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => match ClientMessage::from_json(&text) {
                Ok(ClientMessage::Register { user_id }) => self.handle_register(user_id, ctx),
                Err(e) => {
                    // Unknown frames do not kill the session.
                    warn!("Failed to parse client frame: {:?}", e);
                }
            },
            Ok(ws::Message::Binary(_)) => {
                warn!("Binary WebSocket messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                debug!("WebSocket close received: {:?}", reason);
                ctx.stop();
            }
            _ => {}
        }
    }
}
