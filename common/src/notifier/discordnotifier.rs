// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use std::path::Path;
use std::time::Duration;

use rand::distributions::{Alphanumeric, DistString};
use serde::Serialize;

use crate::notifier::notifier::{DeliveryResult, Notifier, NotifyError};

/// Discord answers successful webhook posts with `204 No Content`.
const SUCCESS_STATUS: u16 = 204;

#[derive(Serialize)]
struct TextMessage<'a> {
    content: &'a str,
}

/// Posts to a Discord webhook.
pub struct DiscordNotifier {
    agent: ureq::Agent,
    webhook_url: String,
}

impl DiscordNotifier {
    pub fn new(webhook_url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();

        Self {
            agent,
            webhook_url: webhook_url.into(),
        }
    }

    fn check(result: Result<ureq::Response, ureq::Error>) -> DeliveryResult {
        match result {
            Ok(response) if response.status() == SUCCESS_STATUS => Ok(()),
            Ok(response) => Err(NotifyError::Status(response.status())),
            Err(ureq::Error::Status(code, _)) => Err(NotifyError::Status(code)),
            Err(e) => Err(NotifyError::Transport(e.to_string())),
        }
    }

    fn report(what: &str, result: DeliveryResult) -> DeliveryResult {
        match &result {
            Ok(()) => log::info!("Discord {what} sent successfully"),
            Err(NotifyError::Status(code)) => {
                log::warn!("Failed to send Discord {what}. Status code: {code}")
            }
            Err(e) => log::warn!("An error occurred while sending Discord {what}: {e}"),
        }
        result
    }
}

impl Notifier for DiscordNotifier {
    fn send_message(&self, text: &str) -> DeliveryResult {
        let result = self
            .agent
            .post(&self.webhook_url)
            .send_json(TextMessage { content: text });

        Self::report("message", Self::check(result))
    }

    fn send_file(&self, path: &Path, text: &str) -> DeliveryResult {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => return Self::report("file", Err(e.into())),
        };

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "log.csv".into());

        let boundary = Alphanumeric.sample_string(&mut rand::thread_rng(), 32);
        let body = multipart_body(&boundary, text, &file_name, &bytes);

        let result = self
            .agent
            .post(&self.webhook_url)
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={boundary}"),
            )
            .send_bytes(&body);

        Self::report("file", Self::check(result))
    }
}

/// Builds a `multipart/form-data` body with a `content` field and a `file` field.
pub(crate) fn multipart_body(boundary: &str, content: &str, file_name: &str, file: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(file.len() + content.len() + 256);

    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"content\"\r\n\r\n");
    body.extend_from_slice(content.as_bytes());
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            file_name.replace('"', "")
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(file);
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

#[test]
fn test_multipart_body_layout() {
    let body = multipart_body("XYZ", "Here is the file", "BME280_data.csv", b"Date,Time\r\n");
    let body = String::from_utf8(body).unwrap();

    assert_eq!(
        body,
        "--XYZ\r\n\
         Content-Disposition: form-data; name=\"content\"\r\n\r\n\
         Here is the file\r\n\
         --XYZ\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"BME280_data.csv\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n\
         Date,Time\r\n\r\n\
         --XYZ--\r\n"
    );
}

#[test]
fn test_unreachable_webhook_is_a_transport_error() {
    // Nothing listens on a port we just released.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let notifier = DiscordNotifier::new(format!("http://{addr}/hook"), Duration::from_secs(2));

    assert!(matches!(
        notifier.send_message("hello"),
        Err(NotifyError::Transport(_))
    ));
}

#[test]
fn test_missing_attachment_is_reported() {
    let notifier = DiscordNotifier::new("http://127.0.0.1:9/hook", Duration::from_secs(1));
    let dir = tempfile::tempdir().unwrap();

    assert!(matches!(
        notifier.send_file(&dir.path().join("missing.csv"), "file"),
        Err(NotifyError::Attachment(_))
    ));
}

/// Serves one request on a loopback port and answers it with `status`.
///
/// The thread returns the raw request it received.
#[cfg(test)]
fn answer_once(status: u16) -> (String, std::thread::JoinHandle<Vec<u8>>) {
    use std::io::{Read, Write};

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/hook", listener.local_addr().unwrap());

    let handle = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];

        // Read the head, then as much body as Content-Length announces.
        let head_len = loop {
            let n = stream.read(&mut buf).unwrap();
            assert!(n > 0, "connection closed before the request head was complete");
            request.extend_from_slice(&buf[..n]);
            if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&request[..head_len]).to_ascii_lowercase();
        let body_len: usize = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .map(|value| value.trim().parse().unwrap())
            .unwrap_or(0);
        while request.len() < head_len + body_len {
            let n = stream.read(&mut buf).unwrap();
            assert!(n > 0, "connection closed before the request body was complete");
            request.extend_from_slice(&buf[..n]);
        }

        write!(
            stream,
            "HTTP/1.1 {status} Whatever\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        )
        .unwrap();
        stream.flush().unwrap();
        request
    });

    (url, handle)
}

#[test]
fn test_message_delivered_on_204() {
    let (url, server) = answer_once(204);
    let notifier = DiscordNotifier::new(url, Duration::from_secs(5));

    assert!(notifier.send_message("hello").is_ok());

    let request = String::from_utf8(server.join().unwrap()).unwrap();
    assert!(request.starts_with("POST /hook "));
    assert!(request.ends_with(r#"{"content":"hello"}"#));
}

#[test]
fn test_message_rejected_on_200() {
    let (url, server) = answer_once(200);
    let notifier = DiscordNotifier::new(url, Duration::from_secs(5));

    assert!(matches!(
        notifier.send_message("hello"),
        Err(NotifyError::Status(200))
    ));
    server.join().unwrap();
}

#[test]
fn test_message_rejected_on_500() {
    let (url, server) = answer_once(500);
    let notifier = DiscordNotifier::new(url, Duration::from_secs(5));

    assert!(matches!(
        notifier.send_message("hello"),
        Err(NotifyError::Status(500))
    ));
    server.join().unwrap();
}

#[test]
fn test_file_delivered_on_204() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("BME280_data.csv");
    std::fs::write(&path, "Date,Time\r\n").unwrap();

    let (url, server) = answer_once(204);
    let notifier = DiscordNotifier::new(url, Duration::from_secs(5));

    assert!(notifier.send_file(&path, "Here is the file").is_ok());

    let request = String::from_utf8(server.join().unwrap()).unwrap();
    assert!(request
        .to_ascii_lowercase()
        .contains("content-type: multipart/form-data; boundary="));
    assert!(request.contains("filename=\"BME280_data.csv\""));
    assert!(request.contains("Here is the file\r\n"));
}
