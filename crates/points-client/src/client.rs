//! Points HTTP client implementation.

use reqwest::Client;
use std::time::Duration;

use points_core::UserId;

use crate::error::ClientError;
use crate::types::{
    ApiErrorResponse, BalanceResponse, HealthResponse, ListTransactionsResponse, RegisterRequest,
    RegisterResponse, TransferRequest, TransferResponse,
};

/// Points API client.
#[derive(Debug, Clone)]
pub struct PointsClient {
    client: Client,
    base_url: String,
}

impl PointsClient {
    /// Create a new points client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the points service (e.g., `"http://points:8080"`)
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_options(base_url, ClientOptions::default())
    }

    /// Create a new points client with custom options.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Check service health.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Register a user.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::BadRequest` for missing fields or an unknown
    /// referral code.
    pub async fn register(
        &self,
        name: impl Into<String>,
        email: impl Into<String>,
        referral_code: Option<&str>,
    ) -> Result<RegisterResponse, ClientError> {
        let url = format!("{}/register", self.base_url);
        let request = RegisterRequest {
            name: name.into(),
            email: email.into(),
            referral_code: referral_code.map(str::to_owned),
        };

        let response = self.client.post(&url).json(&request).send().await?;
        self.handle_response(response).await
    }

    /// Transfer points from `sender` to `recipient`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InsufficientFunds` if the sender cannot cover the
    /// transfer and `ClientError::Timeout` if the ledger timed out.
    pub async fn transfer(
        &self,
        sender: UserId,
        recipient: UserId,
        points: i64,
    ) -> Result<TransferResponse, ClientError> {
        let url = format!("{}/transaction", self.base_url);
        let request = TransferRequest {
            user_id: sender.to_string(),
            recipient_user_id: recipient.to_string(),
            points,
        };

        tracing::debug!(sender = %sender, recipient = %recipient, points, "Sending transfer");

        let response = self.client.post(&url).json(&request).send().await?;
        self.handle_response(response).await
    }

    /// Get a user's current balance.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` if the user has no account.
    pub async fn balance(&self, user_id: UserId) -> Result<BalanceResponse, ClientError> {
        let url = format!("{}/users/{user_id}/balance", self.base_url);
        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// List a user's transfers, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` if the user is unknown.
    pub async fn transactions(
        &self,
        user_id: UserId,
        limit: usize,
        offset: usize,
    ) -> Result<ListTransactionsResponse, ClientError> {
        let url = format!("{}/users/{user_id}/transactions", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Try to parse error response
        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        let Ok(api_error) = error_body else {
            return Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            });
        };

        let detail = |key: &str| {
            api_error
                .error
                .details
                .as_ref()
                .and_then(|d| d.get(key))
                .and_then(serde_json::Value::as_i64)
                .unwrap_or(0)
        };

        // Map specific error codes to typed errors
        let err = match api_error.error.code.as_str() {
            "insufficient_funds" => ClientError::InsufficientFunds {
                balance: detail("balance"),
                required: detail("required"),
            },
            "bad_request" => ClientError::BadRequest(api_error.error.message),
            "not_found" => ClientError::NotFound(api_error.error.message),
            "timeout" => ClientError::Timeout(api_error.error.message),
            code => ClientError::Api {
                code: code.to_string(),
                message: api_error.error.message,
                status: status.as_u16(),
            },
        };

        tracing::debug!(status = status.as_u16(), error = %err, "Points API returned error");
        Err(err)
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BonusStatus;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn client_creation() {
        let client = PointsClient::new("http://localhost:8080").unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = PointsClient::new("http://localhost:8080/").unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[tokio::test]
    async fn register_sends_referral_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/register"))
            .and(body_json(json!({
                "name": "Ada",
                "email": "ada@example.com",
                "referral_code": "abc123"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user": {
                    "id": "6f1c0a6e-8a53-4a55-9a0e-3f5f2a0d7b11",
                    "name": "Ada",
                    "email": "ada@example.com",
                    "referral_code": "Xy-9q2",
                    "created_at": "2024-01-01T00:00:00+00:00"
                },
                "points": 0,
                "referrer_id": "0d8f9a4e-3c1b-4d7e-9f2a-6b5c4d3e2f10",
                "referral_bonus": { "status": "pending", "unpaid": 1 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = PointsClient::new(server.uri()).unwrap();
        let response = client
            .register("Ada", "ada@example.com", Some("abc123"))
            .await
            .unwrap();

        assert_eq!(response.user.referral_code, "Xy-9q2");
        assert_eq!(response.referral_bonus, BonusStatus::Pending { unpaid: 1 });
    }

    #[tokio::test]
    async fn transfer_maps_insufficient_funds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transaction"))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                "error": {
                    "code": "insufficient_funds",
                    "message": "insufficient points: balance=10, required=20",
                    "details": { "balance": 10, "required": 20 }
                }
            })))
            .mount(&server)
            .await;

        let client = PointsClient::new(server.uri()).unwrap();
        let err = client
            .transfer(UserId::generate(), UserId::generate(), 20)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClientError::InsufficientFunds {
                balance: 10,
                required: 20
            }
        ));
    }

    #[tokio::test]
    async fn transfer_timeout_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transaction"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "error": {
                    "code": "timeout",
                    "message": "The request timed out, please retry",
                    "details": { "retryable": true }
                }
            })))
            .mount(&server)
            .await;

        let client = PointsClient::new(server.uri()).unwrap();
        let err = client
            .transfer(UserId::generate(), UserId::generate(), 5)
            .await
            .unwrap_err();

        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn balance_not_found() {
        let server = MockServer::start().await;
        let user_id = UserId::generate();
        Mock::given(method("GET"))
            .and(path(format!("/users/{user_id}/balance")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "code": "not_found", "message": "account not found" }
            })))
            .mount(&server)
            .await;

        let client = PointsClient::new(server.uri()).unwrap();
        let err = client.balance(user_id).await.unwrap_err();

        assert!(matches!(err, ClientError::NotFound(_)));
    }

    #[tokio::test]
    async fn transactions_sends_pagination() {
        let server = MockServer::start().await;
        let user_id = UserId::generate();
        Mock::given(method("GET"))
            .and(path(format!("/users/{user_id}/transactions")))
            .and(query_param("limit", "10"))
            .and(query_param("offset", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "transactions": [],
                "has_more": false
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = PointsClient::new(server.uri()).unwrap();
        let page = client.transactions(user_id, 10, 20).await.unwrap();

        assert!(page.transactions.is_empty());
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn non_json_error_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = PointsClient::new(server.uri()).unwrap();
        let err = client.health().await.unwrap_err();

        assert!(matches!(err, ClientError::Api { status: 502, .. }));
    }
}
