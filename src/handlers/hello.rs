use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};

use crate::{
    handshake::{RetryPolicy, responder},
    state::AppState,
};

/// Upgrades `GET /hello` and runs the responder side of the handshake.
pub async fn hello(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| run_handshake(socket, state))
}

async fn run_handshake(mut socket: WebSocket, state: AppState) {
    tracing::debug!("🤝 Hello connection opened");
    let tunables = state.config.tunables();

    let outcome = responder::respond(
        &mut socket,
        &*state.sessions,
        tunables.session_ttl(),
        RetryPolicy::from(&tunables),
    )
    .await;

    match outcome {
        Ok(session) => tracing::info!("🔑 Session {}… established", id_prefix(&session.session_id)),
        Err(e) => e.log(),
    }

    if let Err(e) = socket.send(Message::Close(None)).await {
        tracing::debug!("Hello socket close failed: {}", e);
    }
}

/// Leading characters of a session id, safe to log.
fn id_prefix(id: &str) -> &str {
    id.char_indices().nth(8).map_or(id, |(end, _)| &id[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logged_session_ids_are_truncated() {
        assert_eq!(id_prefix("0123456789abcdef"), "01234567");
        assert_eq!(id_prefix("short"), "short");
    }
}
