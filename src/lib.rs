pub mod config;
pub mod credentials;
pub mod instruction;
pub mod logging;
pub mod model;
pub mod providers;
pub mod repl;
pub mod session;
pub mod streaming;

use anyhow::Result;
use std::env;
use std::io::{self, Write};
use tracing::{info, warn};

use config::Config;
use credentials::{CredentialFile, resolve_credentials};
use instruction::{Invocation, Mode, parse_args};
use model::Message;
use providers::gemini::GeminiClient;
use providers::http_errors::ApiStatusError;
use repl::run_repl;
use session::ChatSession;
use streaming::stream_response;

pub async fn run() -> Result<()> {
    let cfg = Config::from_env();
    info!(
        base_url = %cfg.base_url,
        credentials_file = %cfg.credentials_file.display(),
        connect_timeout_secs = cfg.connect_timeout_secs,
        "loaded runtime configuration"
    );

    let args: Vec<String> = env::args().skip(1).collect();
    let invocation = parse_args(&args);
    let store = CredentialFile::new(cfg.credentials_file.clone());

    let result = run_invocation(&cfg, &store, invocation).await;
    if let Err(err) = &result
        && let Some(api_err) = err.downcast_ref::<ApiStatusError>()
        && api_err.invalidates_credentials()
    {
        match store.remove() {
            Ok(()) => warn!(
                path = %store.path().display(),
                status = api_err.status(),
                "removed saved credentials after rejected request"
            ),
            Err(remove_err) => warn!(
                path = %store.path().display(),
                error = %remove_err,
                "failed to remove rejected credentials"
            ),
        }
    }
    result
}

async fn run_invocation(
    cfg: &Config,
    store: &CredentialFile,
    invocation: Invocation,
) -> Result<()> {
    let creds = {
        let mut input = io::stdin().lock();
        let mut out = io::stdout();
        resolve_credentials(store, &mut input, &mut out)?
    };
    let client = GeminiClient::new(cfg, &creds)?;
    info!(
        model = %client.model(),
        instruction = invocation.instruction.as_str(),
        interactive = matches!(invocation.mode, Mode::Interactive),
        "starting session"
    );

    let mut out = io::stdout();
    match invocation.mode {
        Mode::OneShot { query } => {
            let prompt = format!("{} {}", invocation.instruction.text(), query);
            let mut stream = client.stream_generate(&[Message::user(prompt)]).await?;
            stream_response(&mut stream, &mut out).await
        }
        Mode::Interactive => {
            let mut session = ChatSession::new(&client);
            let mut input = io::stdin().lock();
            let result = run_repl(&mut session, invocation.instruction, &mut input, &mut out).await;
            out.flush().ok();
            result
        }
    }
}
