use std::time::Duration;

use reqwest::Client;

/// Build an HTTP client with the configured timeout.
/// `insecure_tls` disables certificate verification for local development.
pub fn build_client(timeout: Duration, insecure_tls: bool) -> reqwest::Result<Client> {
    let mut builder = Client::builder().timeout(timeout);
    if insecure_tls {
        builder = builder.danger_accept_invalid_certs(true);
    }
    builder.build()
}

pub fn body_snippet(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}
