use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use tracing::{debug, warn};

use crate::instruction::Instruction;
use crate::session::ChatTransport;
use crate::streaming::stream_response;

const EXIT_COMMANDS: [&str; 2] = ["exit", "quit"];

pub async fn run_repl<C, R, W>(
    chat: &mut C,
    instruction: Instruction,
    input: &mut R,
    out: &mut W,
) -> Result<()>
where
    C: ChatTransport + ?Sized,
    R: BufRead,
    W: Write,
{
    writeln!(out, "💬 Interactive mode enabled (Type 'exit' to quit)")
        .context("Failed to write banner")?;

    if let Err(err) = chat.prime(instruction.text()).await {
        warn!(
            instruction = instruction.as_str(),
            error = %format!("{err:#}"),
            "failed to send instruction to chat session"
        );
    }

    loop {
        write!(out, "You: ").context("Failed to write prompt")?;
        out.flush().context("Failed to flush stdout")?;

        let mut line = String::new();
        let read = input.read_line(&mut line).context("Failed to read stdin")?;
        if read == 0 {
            writeln!(out).context("Failed to write prompt")?;
            break;
        }

        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        if EXIT_COMMANDS.contains(&prompt) {
            break;
        }

        debug!(prompt_len = prompt.len(), "sending chat turn");
        let mut reply = chat.send_stream(prompt).await?;
        write!(out, "AI: ").context("Failed to write prompt")?;
        out.flush().context("Failed to flush stdout")?;
        stream_response(&mut reply, &mut *out).await?;
    }

    writeln!(out, "👋 Goodbye!").context("Failed to write farewell")?;
    Ok(())
}
