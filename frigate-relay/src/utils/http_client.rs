use std::time::Duration;

use crate::Result;

pub use frigate_api::install_rustls_provider;

/// Build the `reqwest::Client` used for Telegram Bot API calls.
///
/// No overall request timeout is set here: long polling needs a longer one
/// than regular sends, so callers set it per request.
pub fn build_bot_client(connect_timeout: Duration) -> Result<reqwest::Client> {
    install_rustls_provider();

    let mut builder = reqwest::Client::builder().user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
    ));

    if connect_timeout > Duration::ZERO {
        builder = builder.connect_timeout(connect_timeout);
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_bot_client_installs_provider() {
        // Must not panic even when nothing else has built a client yet.
        build_bot_client(Duration::from_secs(1)).unwrap();
        build_bot_client(Duration::ZERO).unwrap();

        // Once installed, plain clients are safe too.
        let _client = reqwest::Client::new();
    }
}
