use log::{debug, warn};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::config::AppConfig;
use crate::domain::models::{DataQuality, Network};
use crate::infrastructure::feed::error::FeedError;
use crate::infrastructure::feed::types::{
    FeedPage, TokenHoldingRecord, TokenInfo, TransactionRecord, TransferRecord,
};

/// Client for the Sei block-explorer REST feed.
///
/// Endpoint fallback is the only retry performed here; the recurring
/// cadence of the jobs is the retry mechanism for everything else.
pub struct FeedClient {
    client: Client,
    config: AppConfig,
}

impl FeedClient {
    /// Create a new feed client
    pub fn new(config: &AppConfig) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.feed.request_timeout_secs))
            .build()?;

        Ok(FeedClient {
            client,
            config: config.clone(),
        })
    }

    fn api_url(&self, network: Network) -> Result<String, FeedError> {
        self.config
            .get_feed_config(network.as_str())
            .map(|n| n.api_url.clone())
            .ok_or_else(|| {
                FeedError::ConfigError(format!("no feed endpoint for network {}", network))
            })
    }

    /// Fetch the latest transactions of a wallet account.
    ///
    /// Three endpoint generations are tried in order; the first body that
    /// exposes an item array wins. A wallet unknown to every candidate is a
    /// not-found error; any other total failure degrades to an empty page
    /// tagged SERVICE_UNAVAILABLE.
    pub async fn fetch_wallet_transactions(
        &self,
        address: &str,
        network: Network,
    ) -> Result<FeedPage<TransactionRecord>, FeedError> {
        let base = self.api_url(network)?;
        let limit = self.config.feed.default_page_limit;
        let candidates = [
            format!("{}/accounts/{}/transactions?limit={}", base, address, limit),
            format!("{}/accounts/evm/{}/transactions?limit={}", base, address, limit),
            format!("{}/contracts/evm/{}/transactions?limit={}", base, address, limit),
        ];

        let mut not_found = 0;
        for url in &candidates {
            match self.fetch_page_body(url).await {
                Ok(Some(body)) => {
                    let items = parse_items::<TransactionRecord>(&body);
                    return Ok(FeedPage {
                        items,
                        token_info: None,
                        quality: DataQuality::Complete,
                    });
                }
                Ok(None) => {
                    debug!("[FEED] No item array in response from {}", url);
                }
                Err(FeedError::NotFound { .. }) => {
                    not_found += 1;
                }
                Err(e) => {
                    warn!("[FEED] Endpoint failed: {} ({})", url, e);
                }
            }
        }

        if not_found == candidates.len() {
            return Err(FeedError::NotFound {
                url: address.to_string(),
                status: 404,
            });
        }

        Ok(FeedPage::unavailable())
    }

    /// Fetch the latest ERC-20 transfers of a token contract
    pub async fn fetch_token_transfers(
        &self,
        token_address: &str,
        network: Network,
    ) -> Result<FeedPage<TransferRecord>, FeedError> {
        self.fetch_transfers("erc20", token_address, network).await
    }

    /// Fetch the latest ERC-721 transfers of a collection contract
    pub async fn fetch_nft_transfers(
        &self,
        collection_address: &str,
        network: Network,
    ) -> Result<FeedPage<TransferRecord>, FeedError> {
        self.fetch_transfers("erc721", collection_address, network)
            .await
    }

    async fn fetch_transfers(
        &self,
        standard: &str,
        address: &str,
        network: Network,
    ) -> Result<FeedPage<TransferRecord>, FeedError> {
        let base = self.api_url(network)?;
        let url = format!(
            "{}/transfers/evm/{}?tokenHash={}&offset=0&limit={}",
            base, standard, address, self.config.feed.default_page_limit
        );

        match self.fetch_page_body(&url).await {
            Ok(Some(body)) => {
                let items = parse_items::<TransferRecord>(&body);
                let token_info = parse_token_info(&body);
                Ok(FeedPage {
                    items,
                    token_info,
                    quality: DataQuality::Complete,
                })
            }
            Ok(None) => {
                warn!("[FEED] No item array in response from {}", url);
                Ok(FeedPage::unavailable())
            }
            Err(e) => {
                warn!("[FEED] Transfer fetch failed: {} ({})", url, e);
                Ok(FeedPage::unavailable())
            }
        }
    }

    /// Fetch the native coin balance of an account, in wei as a decimal string
    pub async fn fetch_native_balance(
        &self,
        address: &str,
        network: Network,
    ) -> Result<String, FeedError> {
        let base = self.api_url(network)?;
        let url = format!("{}/accounts/{}", base, address);
        let body = self.fetch_json(&url).await?;

        body.get("coin_balance")
            .or_else(|| body.get("coinBalance"))
            .or_else(|| body.get("balance"))
            .and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .ok_or_else(|| {
                FeedError::ResponseError(format!("no balance field in response from {}", url))
            })
    }

    /// Fetch the ERC-20 holdings page of an account
    pub async fn fetch_token_holdings(
        &self,
        address: &str,
        network: Network,
    ) -> Result<Vec<TokenHoldingRecord>, FeedError> {
        self.fetch_holdings(address, network, "ERC-20").await
    }

    /// Fetch the ERC-721 holdings page of an account
    pub async fn fetch_nft_holdings(
        &self,
        address: &str,
        network: Network,
    ) -> Result<Vec<TokenHoldingRecord>, FeedError> {
        self.fetch_holdings(address, network, "ERC-721").await
    }

    async fn fetch_holdings(
        &self,
        address: &str,
        network: Network,
        token_type: &str,
    ) -> Result<Vec<TokenHoldingRecord>, FeedError> {
        let base = self.api_url(network)?;
        let url = format!("{}/accounts/{}/tokens?type={}", base, address, token_type);
        let body = self.fetch_json(&url).await?;

        let items = items_array(&body).ok_or_else(|| {
            FeedError::ResponseError(format!("no item array in response from {}", url))
        })?;

        Ok(items.iter().filter_map(TokenHoldingRecord::from_item).collect())
    }

    /// GET a URL and return its body when it exposes an item array.
    async fn fetch_page_body(&self, url: &str) -> Result<Option<Value>, FeedError> {
        let body = self.fetch_json(url).await?;
        if items_array(&body).is_some() {
            Ok(Some(body))
        } else {
            Ok(None)
        }
    }

    async fn fetch_json(&self, url: &str) -> Result<Value, FeedError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status.as_u16() == 404 {
            return Err(FeedError::NotFound {
                url: url.to_string(),
                status: 404,
            });
        }
        if !status.is_success() {
            return Err(FeedError::UpstreamStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FeedError::ResponseError(format!("error decoding response: {}", e)))
    }
}

/// The item array of a feed body: `items` or `transfers`.
fn items_array(body: &Value) -> Option<&Vec<Value>> {
    body.get("items")
        .or_else(|| body.get("transfers"))
        .and_then(Value::as_array)
}

/// Parse the item array, dropping rows that do not deserialize.
fn parse_items<T: serde::de::DeserializeOwned>(body: &Value) -> Vec<T> {
    items_array(body)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value::<T>(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn parse_token_info(body: &Value) -> Option<TokenInfo> {
    body.get("token")
        .or_else(|| body.get("tokenInfo"))
        .or_else(|| body.get("token_info"))
        .and_then(|v| serde_json::from_value::<TokenInfo>(v.clone()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_items_array_accepts_both_keys() {
        assert!(items_array(&json!({"items": []})).is_some());
        assert!(items_array(&json!({"transfers": []})).is_some());
        assert!(items_array(&json!({"result": []})).is_none());
        assert!(items_array(&json!({"items": "nope"})).is_none());
    }

    #[test]
    fn test_parse_items_skips_malformed_rows() {
        let body = json!({"items": [
            {"hash": "0x1", "from": "0xA", "to": "0xB", "value": "10", "status": true,
             "timestamp": "2025-06-01T00:00:00Z"},
            {"unexpected": true}
        ]});
        let items = parse_items::<TransferRecord>(&body);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].hash, "0x1");
    }

    #[test]
    fn test_parse_token_info() {
        let body = json!({"items": [], "token": {"name": "Example", "symbol": "EXM", "decimals": 18}});
        let info = parse_token_info(&body).unwrap();
        assert_eq!(info.symbol, "EXM");
        assert_eq!(info.decimals, 18);
    }
}
