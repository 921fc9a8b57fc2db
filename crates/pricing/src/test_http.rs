use serde_json::Value;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration as StdDuration;

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|window| window == b"\r\n\r\n")
}

/// Serves `responses` in order, one connection each, and returns the request
/// targets (path plus query) it saw.
pub(crate) fn spawn_scripted_server(
    responses: Vec<(u16, Value)>,
) -> Option<(String, thread::JoinHandle<Vec<String>>)> {
    let listener = match TcpListener::bind("127.0.0.1:0") {
        Ok(listener) => listener,
        Err(error) => {
            eprintln!("skipping HTTP client test: failed to bind 127.0.0.1:0: {}", error);
            return None;
        }
    };
    let addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(error) => {
            eprintln!("skipping HTTP client test: failed to read listener addr: {}", error);
            return None;
        }
    };
    let handle = thread::spawn(move || {
        let mut targets = Vec::with_capacity(responses.len());
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().expect("accept client");
            stream
                .set_read_timeout(Some(StdDuration::from_secs(5)))
                .expect("set read timeout");
            let mut buffer = Vec::new();
            let mut chunk = [0_u8; 1024];
            while find_header_end(&buffer).is_none() {
                let read = stream.read(&mut chunk).expect("read request headers");
                if read == 0 {
                    break;
                }
                buffer.extend_from_slice(&chunk[..read]);
            }
            let header_text = String::from_utf8_lossy(&buffer).to_string();
            let target = header_text
                .lines()
                .next()
                .and_then(|line| line.split_whitespace().nth(1))
                .unwrap_or_default()
                .to_string();
            targets.push(target);

            let body = body.to_string();
            let reason = if status == 200 { "OK" } else { "ERR" };
            let response = format!(
                "HTTP/1.1 {} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                reason,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).expect("write response");
            stream.flush().expect("flush response");
        }
        targets
    });
    Some((format!("http://{}", addr), handle))
}

/// An address nothing listens on; connecting to it is refused.
pub(crate) fn closed_local_url() -> Option<String> {
    let listener = TcpListener::bind("127.0.0.1:0").ok()?;
    let addr = listener.local_addr().ok()?;
    drop(listener);
    Some(format!("http://{}", addr))
}
