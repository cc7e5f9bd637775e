mod common;

use std::fs;

use common::{hey_command, run_with_stdin, spawn_server, sse_event, write_credentials};

#[test]
fn one_shot_query_streams_reply_to_stdout() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    write_credentials(dir.path(), "test-key", "gemini-test");
    let body = format!("{}{}", sse_event(&["Hello"]), sse_event(&["world"]));
    let (base_url, requests) = spawn_server(vec![(200, body)]);

    let mut cmd = hey_command(dir.path(), &base_url);
    cmd.args(["hello", "world"]);
    let output = run_with_stdin(cmd, "");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "hey failed:\n{stderr}");
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Hello world \n");

    let captured = requests.recv().expect("request should be captured");
    assert_eq!(
        captured.request_line,
        "POST /v1beta/models/gemini-test:streamGenerateContent?alt=sse HTTP/1.1"
    );
    let sent: serde_json::Value = serde_json::from_str(&captured.body).expect("json body");
    assert_eq!(
        sent["contents"][0]["parts"][0]["text"],
        "Stay to the point and say less. hello world"
    );
}

#[test]
fn command_help_flag_sends_expert_instruction() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    write_credentials(dir.path(), "test-key", "gemini-test");
    let (base_url, requests) = spawn_server(vec![(200, sse_event(&["git reset --soft HEAD~1"]))]);

    let mut cmd = hey_command(dir.path(), &base_url);
    cmd.args(["-t", "undo", "last", "commit"]);
    let output = run_with_stdin(cmd, "");

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "git reset --soft HEAD~1 \n"
    );
    let captured = requests.recv().expect("request should be captured");
    let sent: serde_json::Value = serde_json::from_str(&captured.body).expect("json body");
    let text = sent["contents"][0]["parts"][0]["text"]
        .as_str()
        .expect("text part");
    assert!(text.starts_with("Act as a Linux/CMD/Powershell command expert"));
    assert!(text.ends_with(" undo last commit"));
}

#[test]
fn missing_credentials_are_prompted_and_saved() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    let (base_url, requests) = spawn_server(vec![(200, sse_event(&["ok"]))]);

    let mut cmd = hey_command(dir.path(), &base_url);
    cmd.arg("ping");
    let output = run_with_stdin(cmd, "  typed-key  \n gemini-typed \n");

    assert!(
        output.status.success(),
        "hey failed:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("API key and model required."));
    assert!(stdout.contains("Enter API Key: Enter Model: "));
    assert!(stdout.ends_with("ok \n"));

    let saved = fs::read_to_string(dir.path().join("config.txt")).expect("config saved");
    assert_eq!(saved, "api=typed-key\nmodel=gemini-typed\n");

    let captured = requests.recv().expect("request should be captured");
    assert!(captured.request_line.contains("/models/gemini-typed:"));
    assert!(
        captured
            .headers
            .iter()
            .any(|h| h.eq_ignore_ascii_case("x-goog-api-key: typed-key"))
    );
}

#[test]
fn interactive_session_primes_then_exits_on_sentinel() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    write_credentials(dir.path(), "test-key", "gemini-test");
    let prime_reply = r#"{"candidates":[{"content":{"parts":[{"text":"Understood."}]}}]}"#;
    let (base_url, requests) = spawn_server(vec![
        (200, prime_reply.to_string()),
        (200, sse_event(&["Hi!"])),
    ]);

    let cmd = hey_command(dir.path(), &base_url);
    let output = run_with_stdin(cmd, "hello\nexit\nnever sent\n");

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "💬 Interactive mode enabled (Type 'exit' to quit)\n\
         You: AI: Hi! \n\
         You: 👋 Goodbye!\n"
    );

    let prime = requests.recv().expect("prime request");
    assert!(prime.request_line.contains(":generateContent"));
    let prime_body: serde_json::Value = serde_json::from_str(&prime.body).expect("json body");
    assert_eq!(
        prime_body["contents"][0]["parts"][0]["text"],
        "You are an AI assistant."
    );

    let turn = requests.recv().expect("turn request");
    let turn_body: serde_json::Value = serde_json::from_str(&turn.body).expect("json body");
    let contents = turn_body["contents"].as_array().expect("contents array");
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[1]["parts"][0]["text"], "Understood.");
    assert_eq!(contents[2]["parts"][0]["text"], "hello");
    assert!(requests.try_recv().is_err(), "sentinel must not be sent");
}

#[test]
fn rejected_api_key_fails_and_forgets_saved_credentials() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    write_credentials(dir.path(), "bad-key", "gemini-test");
    let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
    let (base_url, _requests) = spawn_server(vec![(400, body.to_string())]);

    let mut cmd = hey_command(dir.path(), &base_url);
    cmd.arg("hi");
    let output = run_with_stdin(cmd, "");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Invalid API key or argument (400): API key not valid."),
        "unexpected stderr:\n{stderr}"
    );
    assert!(!dir.path().join("config.txt").exists());
}

#[test]
fn rate_limit_keeps_saved_credentials() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    write_credentials(dir.path(), "test-key", "gemini-test");
    let (base_url, _requests) = spawn_server(vec![(429, "slow down".to_string())]);

    let mut cmd = hey_command(dir.path(), &base_url);
    cmd.arg("hi");
    let output = run_with_stdin(cmd, "");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Rate limit exceeded."), "unexpected stderr:\n{stderr}");
    assert!(dir.path().join("config.txt").exists());
}

#[test]
fn malformed_event_stops_output_and_fails() {
    let dir = tempfile::tempdir().expect("temp dir should be created");
    write_credentials(dir.path(), "test-key", "gemini-test");
    let body = format!(
        "{}data: {{oops\r\n\r\n{}",
        sse_event(&["C1"]),
        sse_event(&["C2"])
    );
    let (base_url, _requests) = spawn_server(vec![(200, body)]);

    let mut cmd = hey_command(dir.path(), &base_url);
    cmd.arg("hi");
    let output = run_with_stdin(cmd, "");

    assert!(!output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "C1 ");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Failed to parse Gemini stream event"),
        "unexpected stderr:\n{stderr}"
    );
}
