use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use anthology_core::error::LlmError;
use anthology_core::traits::ChatModel;
use anthology_core::types::{ChatMessage, ChatRequest};
use anthology_rag::OpenAiChatClient;

struct Captured {
    head: String,
    body: String,
}

fn read_request(stream: &TcpStream) -> Captured {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut head = String::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        if line == "\r\n" || line.is_empty() {
            break;
        }
        if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
            content_length = v.trim().parse().unwrap();
        }
        head.push_str(&line);
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).unwrap();
    Captured { head, body: String::from_utf8(body).unwrap() }
}

/// Answer one request with `status` and `body`; returns the base URL and the captured request.
fn serve(status: u16, body: &'static str) -> (String, thread::JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let captured = read_request(&stream);
        write!(
            stream,
            "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
        .unwrap();
        captured
    });
    (url, handle)
}

fn request(timeout: Duration) -> ChatRequest {
    ChatRequest {
        messages: vec![ChatMessage::system("be brief"), ChatMessage::user("hi")],
        max_tokens: Some(5),
        temperature: Some(0.0),
        timeout,
    }
}

#[test]
fn successful_completion_is_parsed() {
    let (url, server) = serve(
        200,
        r#"{"id": "gen-1", "choices": [{"index": 0, "message": {"role": "assistant", "content": "yes"}, "finish_reason": "stop"}]}"#,
    );
    let client = OpenAiChatClient::new(url, "sk-test", "google/gemini-flash-1.5")
        .with_attribution(Some("http://localhost:9001".into()), Some("Anthology".into()));
    let completion = client.complete(&request(Duration::from_secs(5))).expect("completion");
    assert_eq!(completion.first_content(), Some("yes"));
    assert_eq!(completion.choices[0].finish_reason.as_deref(), Some("stop"));

    let captured = server.join().unwrap();
    let head = captured.head.to_ascii_lowercase();
    assert!(head.starts_with("post /chat/completions"));
    assert!(head.contains("authorization: bearer sk-test"));
    assert!(head.contains("http-referer: http://localhost:9001"));
    assert!(head.contains("x-title: anthology"));

    let body: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
    assert_eq!(body["model"], "google/gemini-flash-1.5");
    assert_eq!(body["max_tokens"], 5);
    assert_eq!(body["stream"], false);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "hi");
}

#[test]
fn provider_error_message_is_kept_on_bad_status() {
    let (url, server) = serve(401, r#"{"error": {"message": "No auth credentials found", "code": 401}}"#);
    let client = OpenAiChatClient::new(url, "sk-bad", "m");
    match client.complete(&request(Duration::from_secs(5))) {
        Err(LlmError::Status { status, body }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "No auth credentials found");
        }
        other => panic!("expected status error, got {other:?}"),
    }
    server.join().unwrap();
}

#[test]
fn empty_choices_carry_the_provider_error() {
    let (url, server) = serve(200, r#"{"choices": [], "error": {"message": "upstream overloaded"}}"#);
    let client = OpenAiChatClient::new(url, "sk", "m");
    let completion = client.complete(&request(Duration::from_secs(5))).expect("completion");
    assert!(completion.choices.is_empty());
    assert_eq!(completion.error.as_deref(), Some("upstream overloaded"));
    server.join().unwrap();
}

#[test]
fn garbage_body_is_a_decode_error() {
    let (url, server) = serve(200, "<html>not json</html>");
    let client = OpenAiChatClient::new(url, "sk", "m");
    assert!(matches!(client.complete(&request(Duration::from_secs(5))), Err(LlmError::Decode(_))));
    server.join().unwrap();
}

#[test]
fn stalled_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        read_request(&stream);
        thread::sleep(Duration::from_secs(3));
        drop(stream);
    });
    let client = OpenAiChatClient::new(url, "sk", "m");
    let result = client.complete(&request(Duration::from_millis(300)));
    assert!(matches!(result, Err(LlmError::Timeout)), "got {result:?}");
    server.join().unwrap();
}

#[test]
fn closed_port_is_a_transport_error() {
    let url = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };
    let client = OpenAiChatClient::new(url, "sk", "m");
    assert!(matches!(client.complete(&request(Duration::from_secs(2))), Err(LlmError::Transport(_))));
}
