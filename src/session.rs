use anyhow::Result;
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

use crate::model::{Message, ResponseChunk};
use crate::providers::gemini::{GeminiClient, ResponseStream};
use crate::streaming::{ChunkFuture, ChunkSource};

pub type PrimeFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + 'a>>;
pub type TurnFuture<'a> = Pin<Box<dyn Future<Output = Result<Box<dyn ChunkSource + 'a>>> + 'a>>;

pub trait ChatTransport {
    /// Sends a message whose reply is kept in context but not shown.
    fn prime<'a>(&'a mut self, text: &'a str) -> PrimeFuture<'a>;

    fn send_stream<'a>(&'a mut self, text: &'a str) -> TurnFuture<'a>;
}

/// Chat over the stateless REST API. Every request replays the full
/// history; a turn is recorded only once its reply has fully arrived.
pub struct ChatSession<'c> {
    client: &'c GeminiClient,
    history: Vec<Message>,
}

impl<'c> ChatSession<'c> {
    pub fn new(client: &'c GeminiClient) -> Self {
        Self {
            client,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub async fn send_message(&mut self, text: &str) -> Result<Message> {
        let user = Message::user(text);
        let mut messages = self.history.clone();
        messages.push(user.clone());

        let reply = self.client.generate(&messages).await?;
        self.history.push(user);
        self.history.push(reply.clone());
        Ok(reply)
    }

    pub async fn send_message_stream(&mut self, text: &str) -> Result<SessionStream<'_>> {
        let user = Message::user(text);
        let mut messages = self.history.clone();
        messages.push(user.clone());

        let inner = self.client.stream_generate(&messages).await?;
        Ok(SessionStream {
            inner,
            history: &mut self.history,
            pending_user: Some(user),
        })
    }
}

impl ChatTransport for ChatSession<'_> {
    fn prime<'a>(&'a mut self, text: &'a str) -> PrimeFuture<'a> {
        Box::pin(async move {
            self.send_message(text).await?;
            Ok(())
        })
    }

    fn send_stream<'a>(&'a mut self, text: &'a str) -> TurnFuture<'a> {
        Box::pin(async move {
            let stream = self.send_message_stream(text).await?;
            Ok(Box::new(stream) as Box<dyn ChunkSource + 'a>)
        })
    }
}

pub struct SessionStream<'s> {
    inner: ResponseStream,
    history: &'s mut Vec<Message>,
    pending_user: Option<Message>,
}

impl SessionStream<'_> {
    async fn pull(&mut self) -> Option<Result<ResponseChunk>> {
        let next = self.inner.pull().await;
        if next.is_none()
            && let Some(user) = self.pending_user.take()
        {
            self.history.push(user);
            self.history
                .push(Message::model(self.inner.transcript().to_string()));
            debug!(history_len = self.history.len(), "recorded chat turn");
        }
        next
    }
}

impl ChunkSource for SessionStream<'_> {
    fn next_chunk(&mut self) -> ChunkFuture<'_> {
        Box::pin(self.pull())
    }
}
