use anyhow::{Context, Result};
use std::future::Future;
use std::io::Write;
use std::pin::Pin;

use crate::model::ResponseChunk;

pub type ChunkFuture<'a> = Pin<Box<dyn Future<Output = Option<Result<ResponseChunk>>> + 'a>>;

/// A pull sequence of response chunks.
///
/// `None` means the response is complete. An `Err` ends the sequence too;
/// callers must not pull again after either.
pub trait ChunkSource {
    fn next_chunk(&mut self) -> ChunkFuture<'_>;
}

impl<T: ChunkSource + ?Sized> ChunkSource for Box<T> {
    fn next_chunk(&mut self) -> ChunkFuture<'_> {
        (**self).next_chunk()
    }
}

pub async fn stream_response<S, W>(source: &mut S, out: &mut W) -> Result<()>
where
    S: ChunkSource + ?Sized,
    W: Write,
{
    while let Some(next) = source.next_chunk().await {
        let chunk = next?;
        for part in &chunk.parts {
            write!(out, "{part} ").context("Failed to write response")?;
            out.flush().context("Failed to flush stdout")?;
        }
    }
    writeln!(out).context("Failed to write response")?;
    out.flush().context("Failed to flush stdout")?;
    Ok(())
}
