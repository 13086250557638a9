use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpOptions {
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

pub(crate) fn client_builder(options: &HttpOptions) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .timeout(options.timeout)
        .connect_timeout(options.connect_timeout)
        .user_agent(format!("mvnenv/{}", env!("CARGO_PKG_VERSION")))
}

/// Build the shared client used for unauthenticated repository traffic.
///
/// # Errors
/// Returns an error if the TLS backend cannot be initialised.
pub fn build_client(options: &HttpOptions) -> Result<reqwest::Client, reqwest::Error> {
    client_builder(options).build()
}
