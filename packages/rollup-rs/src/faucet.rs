//! Testnet faucet endpoint
//!
//! The base-token faucet is a plain HTTP service: `GET {base}/{address}`
//! answers with free text that mentions a `txhash` when it sent funds.

use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;
use eyre::{Result, WrapErr};
use reqwest::Client;
use tracing::debug;
use url::Url;

#[async_trait]
pub trait FaucetApi: Send + Sync {
    /// Ask for base-chain funds for `address` and return the response text
    async fn request_funds(&self, address: Address) -> Result<String>;
}

pub struct HttpFaucet {
    base_url: Url,
    client: Client,
}

impl HttpFaucet {
    pub fn new(base_url: Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .wrap_err("Failed to build HTTP client")?;
        Ok(Self { base_url, client })
    }

    /// Endpoint for `address`
    pub fn donate_url(&self, address: Address) -> String {
        format!(
            "{}/{:#x}",
            self.base_url.as_str().trim_end_matches('/'),
            address
        )
    }
}

#[async_trait]
impl FaucetApi for HttpFaucet {
    async fn request_funds(&self, address: Address) -> Result<String> {
        let url = self.donate_url(address);
        debug!(url = %url, "Requesting faucet funds");

        let body = self
            .client
            .get(&url)
            .send()
            .await
            .wrap_err_with(|| format!("Faucet request to {} failed", url))?
            .text()
            .await
            .wrap_err("Failed to read faucet response")?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_donate_url() {
        let faucet =
            HttpFaucet::new(Url::parse("http://faucet.testnet.golem.network:4000/donate").unwrap())
                .unwrap();
        assert_eq!(
            faucet.donate_url(Address::repeat_byte(0xab)),
            "http://faucet.testnet.golem.network:4000/donate/0xabababababababababababababababababababab"
        );
    }
}
