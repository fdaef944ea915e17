//! WebSocket transports for the hello exchange.

use async_trait::async_trait;
use axum::extract::ws::{Message as AxumMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::{WebSocketStream, tungstenite::Message};

use crate::error::Result;
use crate::handshake::FrameChannel;

/// Server side: the socket handed over by the `/hello` upgrade.
#[async_trait]
impl FrameChannel for WebSocket {
    async fn send_frame(&mut self, payload: Vec<u8>) -> Result<()> {
        self.send(AxumMessage::Binary(payload.into())).await?;
        Ok(())
    }

    async fn recv_frame(&mut self) -> Result<Option<Vec<u8>>> {
        while let Some(msg) = self.recv().await {
            match msg? {
                AxumMessage::Binary(data) => return Ok(Some(data.to_vec())),
                AxumMessage::Text(text) => return Ok(Some(text.as_str().as_bytes().to_vec())),
                AxumMessage::Close(_) => return Ok(None),
                AxumMessage::Ping(_) | AxumMessage::Pong(_) => continue,
            }
        }
        Ok(None)
    }
}

/// Client side: a connection opened with `tokio_tungstenite::connect_async`.
#[async_trait]
impl<S> FrameChannel for WebSocketStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send_frame(&mut self, payload: Vec<u8>) -> Result<()> {
        self.send(Message::Binary(payload.into())).await?;
        Ok(())
    }

    async fn recv_frame(&mut self) -> Result<Option<Vec<u8>>> {
        while let Some(msg) = self.next().await {
            match msg? {
                Message::Binary(data) => return Ok(Some(data.to_vec())),
                Message::Text(text) => return Ok(Some(text.as_str().as_bytes().to_vec())),
                Message::Close(_) => return Ok(None),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
        Ok(None)
    }
}
