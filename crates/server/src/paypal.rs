//! PayPal REST orders client (listing promotion payments and
//! subscription checkout).

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::PayPalConfig;

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

/// Purchase item details attached to subscription orders.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
}

#[derive(Clone)]
pub struct PayPalClient {
    client: Client,
    config: PayPalConfig,
    frontend_url: String,
}

impl PayPalClient {
    pub fn new(config: PayPalConfig, frontend_url: String) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(Self {
            client,
            config,
            frontend_url,
        })
    }

    async fn access_token(&self) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.config.api_base))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|e| anyhow!("Failed to reach PayPal: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("PayPal token error ({}): {}", status.as_u16(), text));
        }

        let token: AccessTokenResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse PayPal token response: {}", e))?;
        Ok(token.access_token)
    }

    fn experience_context(&self, return_path: &str, cancel_path: &str) -> serde_json::Value {
        json!({
            "payment_method_preference": "IMMEDIATE_PAYMENT_REQUIRED",
            "brand_name": "EstateFlow",
            "locale": "en-US",
            "landing_page": "LOGIN",
            "user_action": "PAY_NOW",
            "return_url": format!("{}{}", self.frontend_url, return_path),
            "cancel_url": format!("{}{}", self.frontend_url, cancel_path),
        })
    }

    async fn post_order(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let access_token = self.access_token().await?;

        let response = self
            .client
            .post(format!("{}{}", self.config.api_base, path))
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to reach PayPal: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("PayPal error ({}): {}", status.as_u16(), text));
        }

        let data = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse PayPal response: {}", e))?;
        Ok(data)
    }

    /// Simple capture-intent order (listing promotion).
    pub async fn create_order(&self, total: &str, currency: &str) -> Result<serde_json::Value> {
        self.post_order(
            "/v2/checkout/orders",
            json!({
                "intent": "CAPTURE",
                "purchase_units": [{
                    "amount": {
                        "currency_code": currency,
                        "value": total,
                    }
                }],
                "payment_source": {
                    "paypal": {
                        "experience_context": self.experience_context("/complete-payment", "/cancel-payment"),
                    }
                }
            }),
        )
        .await
    }

    /// Subscription checkout order with an item breakdown.
    pub async fn create_subscription_order(
        &self,
        amount: &str,
        item: &OrderItem,
        currency: &str,
    ) -> Result<serde_json::Value> {
        self.post_order(
            "/v2/checkout/orders",
            json!({
                "intent": "CAPTURE",
                "purchase_units": [{
                    "amount": {
                        "currency_code": currency,
                        "value": amount,
                        "breakdown": {
                            "item_total": {
                                "currency_code": currency,
                                "value": amount,
                            }
                        }
                    },
                    "items": [{
                        "name": item.name,
                        "unit_amount": {
                            "currency_code": currency,
                            "value": amount,
                        },
                        "quantity": "1",
                        "description": item.description,
                        "category": item.category.as_deref().unwrap_or("DIGITAL_GOODS"),
                    }],
                }],
                "payment_source": {
                    "paypal": {
                        "experience_context": self.experience_context("/complete-subscription", "/cancel-subscription"),
                    }
                }
            }),
        )
        .await
    }

    pub async fn capture_order(&self, order_id: &str) -> Result<serde_json::Value> {
        self.post_order(
            &format!("/v2/checkout/orders/{}/capture", order_id),
            json!({}),
        )
        .await
    }
}
