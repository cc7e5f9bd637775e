use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::io::{self, BufRead, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const API_KEY_FIELD: &str = "api";
const MODEL_FIELD: &str = "model";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub model: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.model.trim().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct CredentialFile {
    path: PathBuf,
}

impl CredentialFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable files load as empty credentials.
    pub fn load(&self) -> Credentials {
        match fs::read_to_string(&self.path) {
            Ok(text) => parse_credentials(&text),
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    warn!(
                        path = %self.path.display(),
                        error = %err,
                        "failed to read credentials file"
                    );
                }
                Credentials::default()
            }
        }
    }

    pub fn save(&self, creds: &Credentials) -> io::Result<()> {
        fs::write(&self.path, render_credentials(creds))
    }

    pub fn remove(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

fn parse_credentials(text: &str) -> Credentials {
    let fields: HashMap<&str, &str> = text
        .lines()
        .filter_map(|line| line.split_once('='))
        .collect();

    Credentials {
        api_key: fields.get(API_KEY_FIELD).copied().unwrap_or_default().to_string(),
        model: fields.get(MODEL_FIELD).copied().unwrap_or_default().to_string(),
    }
}

fn render_credentials(creds: &Credentials) -> String {
    format!(
        "{API_KEY_FIELD}={}\n{MODEL_FIELD}={}\n",
        creds.api_key, creds.model
    )
}

fn prompt_line(input: &mut impl BufRead, out: &mut impl Write, label: &str) -> Result<String> {
    write!(out, "{label}").context("Failed to write prompt")?;
    out.flush().context("Failed to flush stdout")?;

    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("Failed to read stdin")?;
    Ok(line.trim().to_string())
}

pub fn resolve_credentials(
    store: &CredentialFile,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<Credentials> {
    let stored = store.load();
    if stored.is_complete() {
        debug!(path = %store.path().display(), "loaded stored credentials");
        return Ok(stored);
    }

    info!(path = %store.path().display(), "credentials incomplete, prompting");
    writeln!(out, "🔑 API key and model required.").context("Failed to write prompt")?;
    let api_key = prompt_line(input, out, "Enter API Key: ")?;
    let model = prompt_line(input, out, "Enter Model: ")?;
    let creds = Credentials { api_key, model };

    match store.save(&creds) {
        Ok(()) => info!(path = %store.path().display(), "saved credentials"),
        Err(err) => warn!(
            path = %store.path().display(),
            error = %err,
            "failed to save credentials, continuing with entered values"
        ),
    }

    Ok(creds)
}
