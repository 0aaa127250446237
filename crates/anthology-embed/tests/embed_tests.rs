use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use anthology_core::config::EmbeddingConfig;
use anthology_core::traits::Embedder;
use anthology_embed::{embedder_from_config, OpenAiEmbedder};

/// Serve one HTTP request with a canned JSON body and hand back the request body.
fn serve_once(status: u16, body: &'static str) -> (String, thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
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
        }
        let mut req_body = vec![0u8; content_length];
        reader.read_exact(&mut req_body).unwrap();
        let mut stream = stream;
        write!(
            stream,
            "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
        .unwrap();
        String::from_utf8(req_body).unwrap()
    });
    (url, handle)
}

#[test]
fn fake_embedder_shapes_and_determinism() {
    // Force the hashing embedder whatever the provider says.
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");

    let cfg = EmbeddingConfig { dimension: 384, ..EmbeddingConfig::default() };
    let embedder = embedder_from_config(&cfg).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let (v1, v2) = (&embs[0], &embs[1]);

    assert_eq!(v1.len(), 384);
    assert_eq!(embedder.identity().dimension, 384);

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[test]
fn openai_embedder_reorders_and_normalizes() {
    let (url, server) = serve_once(
        200,
        r#"{"data": [{"index": 1, "embedding": [0.0, 2.0]}, {"index": 0, "embedding": [3.0, 4.0]}]}"#,
    );
    let embedder = OpenAiEmbedder::new(url, "sk-test", "text-embedding-3-small", 2, Duration::from_secs(5)).unwrap();
    let out = embedder
        .embed_batch(&["first".to_string(), "second".to_string()])
        .expect("embeddings");

    assert_eq!(out.len(), 2);
    assert!((out[0][0] - 0.6).abs() < 1e-6 && (out[0][1] - 0.8).abs() < 1e-6);
    assert!((out[1][1] - 1.0).abs() < 1e-6);
    assert_eq!(embedder.identity().model_name, "text-embedding-3-small");

    let request: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();
    assert_eq!(request["model"], "text-embedding-3-small");
    assert_eq!(request["input"][1], "second");
}

#[test]
fn openai_embedder_rejects_wrong_dimension() {
    let (url, server) = serve_once(200, r#"{"data": [{"index": 0, "embedding": [1.0, 0.0, 0.0]}]}"#);
    let embedder = OpenAiEmbedder::new(url, "sk-test", "m", 2, Duration::from_secs(5)).unwrap();
    let err = embedder.embed_batch(&["x".to_string()]).unwrap_err();
    assert!(err.to_string().contains("dimension"), "{err}");
    server.join().unwrap();
}

#[test]
fn openai_embedder_surfaces_http_errors() {
    let (url, server) = serve_once(401, r#"{"error": {"message": "bad key"}}"#);
    let embedder = OpenAiEmbedder::new(url, "sk-wrong", "m", 2, Duration::from_secs(5)).unwrap();
    let err = embedder.embed_batch(&["x".to_string()]).unwrap_err();
    assert!(err.to_string().contains("401"), "{err}");
    server.join().unwrap();
}
