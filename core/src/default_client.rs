use std::time::Duration;

/// Upper bound for establishing a TCP/TLS connection. There is no
/// overall request timeout since subscription bodies stay open indefinitely.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub fn user_agent() -> String {
    format!(
        "notes/{} ({} {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Shared HTTP client for the notes backend.
pub fn create_client() -> reqwest::Client {
    match reqwest::Client::builder()
        .user_agent(user_agent())
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!("Failed to build HTTP client, using defaults: {e}");
            reqwest::Client::new()
        }
    }
}
