use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use futures_util::{Sink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::{error::RecvError, Receiver};
use tracing::{info, warn};

use crate::{
    models::auth::{AuthEvent, AuthEventKind, Session},
    services::auth::AuthService,
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct WsQueryParams {
    pub token: String,
}

/// GET /auth/events?token=..., the auth-change stream of the token's user.
///
/// The token is checked before the upgrade, so a refused subscription gets a
/// plain 401 instead of a socket.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsQueryParams>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let session = match AuthService::session_from_token(&state, &params.token).await {
        Ok(session) => session,
        Err(e) => {
            warn!("auth events: refused subscription: {e}");
            return e.into_response();
        }
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };
    // Subscribe before the upgrade so nothing published in between is lost.
    let events = state.sessions.subscribe();

    ws.on_upgrade(move |socket| async move {
        info!("auth events connected: user={}", session.user_id);
        handle_socket(socket, session, events).await;
    })
}

/// Push `session`'s user events into `sink` until this session signs out,
/// the registry goes away or the sink fails.
pub async fn forward_events<S>(session: &Session, events: &mut Receiver<AuthEvent>, sink: &mut S)
where
    S: Sink<Message> + Unpin,
{
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!("auth events for {}: skipped {skipped} events", session.user_id);
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        if event.user_id != session.user_id {
            continue;
        }
        let payload = match serde_json::to_string(&event) {
            Ok(p) => p,
            Err(_) => continue,
        };
        if sink.send(Message::Text(payload.into())).await.is_err() {
            break;
        }
        if event.event == AuthEventKind::SignedOut && event.session_key == session.key {
            let _ = sink.send(Message::Close(None)).await;
            break;
        }
    }
}

async fn handle_socket(socket: WebSocket, session: Session, mut events: Receiver<AuthEvent>) {
    let (mut sender, mut receiver) = socket.split();
    let user_id = session.user_id;

    // Registry events → WebSocket
    let mut events_task = tokio::spawn(async move {
        forward_events(&session, &mut events, &mut sender).await;
    });

    // Client → server: only close frames matter
    let mut client_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut events_task) => client_task.abort(),
        _ = (&mut client_task) => events_task.abort(),
    }

    info!("auth events disconnected: user={user_id}");
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use uuid::Uuid;

    use super::*;
    use crate::{models::user::UserRole, services::sessions::SessionRegistry};

    fn session(user_id: Uuid, key: &str) -> Session {
        Session {
            user_id,
            email: None,
            role: UserRole::Viewer,
            access_token: format!("token-{key}"),
            key: key.into(),
            expires_at: chrono::Utc::now().timestamp() + 3600,
        }
    }

    fn event_kind(message: &Message) -> String {
        match message {
            Message::Text(text) => {
                let value: Value = serde_json::from_str(text.as_str()).unwrap();
                value["event"].as_str().unwrap().to_string()
            }
            other => panic!("expected a text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn forwards_own_events_and_closes_after_sign_out() {
        let registry = SessionRegistry::new();
        let user = Uuid::new_v4();
        let mine = session(user, "mine");
        let other = session(Uuid::new_v4(), "other");
        let mut events = registry.subscribe();

        registry.establish(other.clone(), Some(AuthEventKind::SignedIn)).await;
        registry.establish(mine.clone(), Some(AuthEventKind::SignedIn)).await;
        registry.sign_out(&other).await;
        registry.sign_out(&mine).await;
        registry.establish(session(user, "later"), Some(AuthEventKind::SignedIn)).await;

        let mut sent: Vec<Message> = Vec::new();
        forward_events(&mine, &mut events, &mut sent).await;

        assert_eq!(sent.len(), 3);
        assert_eq!(event_kind(&sent[0]), "signed_in");
        assert_eq!(event_kind(&sent[1]), "signed_out");
        assert!(matches!(sent[2], Message::Close(None)));

        // The loop stopped at the sign-out; the next event is still queued.
        let next = events.try_recv().unwrap();
        assert_eq!(next.session_key, "later");
    }

    #[tokio::test]
    async fn another_session_of_the_same_user_signing_out_keeps_the_stream_open() {
        let registry = SessionRegistry::new();
        let user = Uuid::new_v4();
        let mine = session(user, "phone");
        let laptop = session(user, "laptop");
        let mut events = registry.subscribe();

        registry.establish(laptop.clone(), Some(AuthEventKind::SignedIn)).await;
        registry.sign_out(&laptop).await;
        registry.sign_out(&mine).await;

        let mut sent: Vec<Message> = Vec::new();
        forward_events(&mine, &mut events, &mut sent).await;

        let kinds: Vec<String> = sent[..3].iter().map(event_kind).collect();
        assert_eq!(kinds, ["signed_in", "signed_out", "signed_out"]);
        assert!(matches!(sent[3], Message::Close(None)));
        assert_eq!(sent.len(), 4);
    }

    #[tokio::test]
    async fn stream_ends_when_the_registry_is_dropped() {
        let registry = SessionRegistry::new();
        let mine = session(Uuid::new_v4(), "mine");
        let mut events = registry.subscribe();
        registry.establish(session(Uuid::new_v4(), "other"), Some(AuthEventKind::SignedIn)).await;
        drop(registry);

        let mut sent: Vec<Message> = Vec::new();
        forward_events(&mine, &mut events, &mut sent).await;
        assert!(sent.is_empty());
    }
}
