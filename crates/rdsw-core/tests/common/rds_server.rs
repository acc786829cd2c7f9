//! Minimal HTTP/1.1 server that answers every GET from a script, for integration tests.
//!
//! Each request takes the next scripted `(status, body)`; the last entry
//! repeats. Request lines and `X-Auth-Token` headers are recorded.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct Recorded {
    /// Request targets, e.g. "/v3/proj/instances?id=abc".
    pub targets: Vec<String>,
    pub tokens: Vec<Option<String>>,
}

pub struct RdsServer {
    pub base_url: String,
    recorded: Arc<Mutex<Recorded>>,
}

impl RdsServer {
    pub fn recorded(&self) -> Recorded {
        self.recorded.lock().unwrap().clone()
    }
}

/// Starts a server in a background thread. It runs until the process exits.
pub fn start(script: Vec<(u16, String)>) -> RdsServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let script = Arc::new(Mutex::new(VecDeque::from(script)));
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    let recorded_srv = Arc::clone(&recorded);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let script = Arc::clone(&script);
            let recorded = Arc::clone(&recorded_srv);
            thread::spawn(move || handle(stream, &script, &recorded));
        }
    });
    RdsServer {
        base_url: format!("http://127.0.0.1:{}/", port),
        recorded,
    }
}

fn next_answer(script: &Mutex<VecDeque<(u16, String)>>) -> (u16, String) {
    let mut script = script.lock().unwrap();
    if script.len() > 1 {
        script.pop_front().unwrap()
    } else {
        script
            .front()
            .cloned()
            .unwrap_or((500, r#"{"error_code":"TEST.0001"}"#.to_string()))
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        500 => "Internal Server Error",
        _ => "Status",
    }
}

fn handle(
    mut stream: std::net::TcpStream,
    script: &Mutex<VecDeque<(u16, String)>>,
    recorded: &Mutex<Recorded>,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (target, token) = parse_request(request);
    {
        let mut rec = recorded.lock().unwrap();
        rec.targets.push(target);
        rec.tokens.push(token);
    }
    let (status, body) = next_answer(script);
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason(status),
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
}

/// Returns (request target, optional X-Auth-Token value).
fn parse_request(request: &str) -> (String, Option<String>) {
    let mut target = String::new();
    let mut token = None;
    for (i, line) in request.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if i == 0 {
            target = line.split_whitespace().nth(1).unwrap_or("").to_string();
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("x-auth-token") {
                token = Some(value.trim().to_string());
            }
        }
    }
    (target, token)
}
