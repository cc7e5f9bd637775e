#![allow(dead_code)]

use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::sync::mpsc;
use std::thread;

#[derive(Debug)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<String>,
    pub body: String,
}

fn read_request(stream: &TcpStream) -> CapturedRequest {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader
        .read_line(&mut request_line)
        .expect("request line should be readable");

    let mut headers = Vec::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).expect("header should be readable");
        let line = line.trim_end().to_string();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':')
            && name.eq_ignore_ascii_case("content-length")
        {
            content_length = value.trim().parse().expect("content-length is numeric");
        }
        headers.push(line);
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).expect("body should be readable");
    CapturedRequest {
        request_line: request_line.trim_end().to_string(),
        headers,
        body: String::from_utf8(body).expect("body should be utf-8"),
    }
}

/// Fake Gemini endpoint answering each connection with the next canned
/// `(status, body)` pair.
pub fn spawn_server(responses: Vec<(u16, String)>) -> (String, mpsc::Receiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    let addr = listener.local_addr().expect("address should be available");
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for (status, body) in responses {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let captured = read_request(&stream);
            let _ = tx.send(captured);
            let response = format!(
                "HTTP/1.1 {status} X\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n{body}"
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });

    (format!("http://{addr}"), rx)
}

pub fn unused_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind should succeed");
    let addr = listener.local_addr().expect("address should be available");
    drop(listener);
    format!("http://{addr}")
}

pub fn sse_event(texts: &[&str]) -> String {
    let parts: Vec<serde_json::Value> = texts
        .iter()
        .map(|text| serde_json::json!({ "text": text }))
        .collect();
    let body = serde_json::json!({
        "candidates": [{ "content": { "role": "model", "parts": parts } }]
    });
    format!("data: {body}\r\n\r\n")
}

pub fn write_credentials(dir: &Path, api_key: &str, model: &str) {
    fs::write(
        dir.join("config.txt"),
        format!("api={api_key}\nmodel={model}\n"),
    )
    .expect("failed to write config.txt");
}

/// Base command for the `hey` binary running inside `dir` with a clean
/// logging and settings environment.
pub fn hey_command(dir: &Path, base_url: &str) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_hey"));
    cmd.current_dir(dir)
        .env("GEMINI_BASE_URL", base_url)
        .env("MODEL_CONNECT_TIMEOUT_SECS", "2")
        .env_remove("HEY_CONFIG_FILE")
        .env_remove("RUST_LOG")
        .env_remove("LOG_OUTPUT")
        .env_remove("LOG_FORMAT")
        .env_remove("LOG_FILE_PATH");
    cmd
}

pub fn run_with_stdin(mut cmd: Command, stdin: &str) -> Output {
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run hey binary");
    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(stdin.as_bytes())
        .expect("failed to write stdin");
    child.wait_with_output().expect("failed to wait for hey")
}
