use crate::config::PayPalConfig;
use crate::error::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PayPalOrder {
    pub id: String,
    pub status: String,
}

/// Order status PayPal reports once funds are captured.
pub const CAPTURE_COMPLETED: &str = "COMPLETED";

#[derive(Clone)]
pub struct PayPalService {
    client: Client,
    config: PayPalConfig,
}

impl PayPalService {
    pub fn new(config: PayPalConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn currency(&self) -> &str {
        &self.config.currency
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    pub async fn get_access_token(&self) -> AppResult<String> {
        let response = self
            .client
            .post(self.url("/v1/oauth2/token"))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if response.status().is_success() {
            let token: AccessToken = response.json().await?;
            Ok(token.access_token)
        } else {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            Err(AppError::ExternalApiError(format!(
                "PayPal token request failed ({status}): {error_text}"
            )))
        }
    }

    /// Create a capture-intent order and return PayPal's order id.
    pub async fn create_order(&self, amount_cents: i64) -> AppResult<String> {
        if amount_cents <= 0 {
            return Err(AppError::ValidationError(
                "Order amount must be positive".to_string(),
            ));
        }
        let token = self.get_access_token().await?;
        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "amount": {
                    "currency_code": self.config.currency,
                    "value": format_amount(amount_cents),
                }
            }]
        });

        let response = self
            .client
            .post(self.url("/v2/checkout/orders"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            let order: PayPalOrder = response.json().await?;
            log::info!("Created PayPal order {} ({})", order.id, order.status);
            Ok(order.id)
        } else {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            Err(AppError::ExternalApiError(format!(
                "PayPal create order failed ({status}): {error_text}"
            )))
        }
    }

    /// Capture a previously approved order and return PayPal's status string.
    pub async fn capture_order(&self, order_id: &str) -> AppResult<String> {
        let token = self.get_access_token().await?;
        let response = self
            .client
            .post(self.url(&format!("/v2/checkout/orders/{order_id}/capture")))
            .bearer_auth(token)
            .json(&json!({}))
            .send()
            .await?;

        if response.status().is_success() {
            let order: PayPalOrder = response.json().await?;
            log::info!("Captured PayPal order {} ({})", order.id, order.status);
            Ok(order.status)
        } else {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            Err(AppError::ExternalApiError(format!(
                "PayPal capture failed ({status}): {error_text}"
            )))
        }
    }
}

/// 999 -> "9.99"
pub fn format_amount(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn service(base_url: String) -> PayPalService {
        PayPalService::new(PayPalConfig {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            base_url,
            currency: "USD".to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(999), "9.99");
        assert_eq!(format_amount(7999), "79.99");
        assert_eq!(format_amount(5), "0.05");
    }

    #[tokio::test]
    async fn test_create_and_capture_order() {
        let mut server = mockito::Server::new_async().await;
        let token = server
            .mock("POST", "/v1/oauth2/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"A21AA","expires_in":32400}"#)
            .expect(2)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/v2/checkout/orders")
            .match_header("authorization", "Bearer A21AA")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "intent": "CAPTURE",
                "purchase_units": [{"amount": {"currency_code": "USD", "value": "29.99"}}]
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"ORDER-1","status":"CREATED"}"#)
            .create_async()
            .await;
        let capture = server
            .mock("POST", "/v2/checkout/orders/ORDER-1/capture")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"ORDER-1","status":"COMPLETED"}"#)
            .create_async()
            .await;

        let paypal = service(server.url());
        let id = paypal.create_order(2999).await.unwrap();
        assert_eq!(id, "ORDER-1");
        let status = paypal.capture_order(&id).await.unwrap();
        assert_eq!(status, CAPTURE_COMPLETED);

        token.assert_async().await;
        create.assert_async().await;
        capture.assert_async().await;
    }

    #[tokio::test]
    async fn test_token_failure_is_external_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/oauth2/token")
            .with_status(401)
            .with_body(r#"{"error":"invalid_client"}"#)
            .create_async()
            .await;

        let paypal = service(server.url());
        let err = paypal.capture_order("ORDER-1").await.unwrap_err();
        assert!(matches!(err, AppError::ExternalApiError(_)));
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amount() {
        let paypal = service("http://127.0.0.1:9".to_string());
        assert!(matches!(
            paypal.create_order(0).await,
            Err(AppError::ValidationError(_))
        ));
    }
}
