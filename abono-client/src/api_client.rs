//! REST adapter for the console API.

use crate::config::{AuthConfig, ClientConfig};
use abono_core::{
    ApiError, ApiResult, ConsoleApi, Customer, CustomerCreateRequest, CustomerId,
    CustomerListParams, CustomerPurchasesParams, CustomerUpdateRequest, InstallmentSimulation,
    InstallmentSimulationRequest, Page, Payment, PaymentCreateRequest, PaymentMethod, Purchase,
    PurchaseCreateRequest, PurchaseId, PurchaseListParams, PurchaseStatus, PurchaseUpdateRequest,
};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Config error: {0}")]
    Config(String),
}

#[derive(Serialize)]
struct CustomerQuery<'a> {
    q: &'a str,
    page: u32,
    size: u32,
    sort: &'a str,
}

#[derive(Serialize)]
struct PageQuery<'a> {
    page: u32,
    size: u32,
    sort: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PurchaseQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_id: Option<CustomerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<PurchaseStatus>,
    page: u32,
    size: u32,
    sort: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Console API over HTTP.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    auth_header: HeaderMap,
}

impl RestClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        let auth_header = build_auth_headers(&config.auth)?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_header,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T, Q>(&self, path: &str, query: Option<&Q>) -> ApiResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let mut request = self
            .client
            .get(self.url(path))
            .headers(self.auth_header.clone());
        if let Some(query) = query {
            request = request.query(query);
        }
        debug!(method = "GET", path, "Sending request");
        let response = request.send().await.map_err(transport_error)?;
        parse_response(response).await
    }

    async fn post_json<T, B>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        debug!(method = "POST", path, "Sending request");
        let response = self
            .client
            .post(self.url(path))
            .headers(self.auth_header.clone())
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        parse_response(response).await
    }

    async fn put_json<T, B>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        debug!(method = "PUT", path, "Sending request");
        let response = self
            .client
            .put(self.url(path))
            .headers(self.auth_header.clone())
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        parse_response(response).await
    }

    async fn delete(&self, path: &str) -> ApiResult<()> {
        debug!(method = "DELETE", path, "Sending request");
        let response = self
            .client
            .delete(self.url(path))
            .headers(self.auth_header.clone())
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.map_err(transport_error)?;
        Err(server_error(status.as_u16(), &text))
    }
}

#[async_trait]
impl ConsoleApi for RestClient {
    async fn list_customers(&self, params: &CustomerListParams) -> ApiResult<Page<Customer>> {
        let query = CustomerQuery {
            q: &params.q,
            page: params.page,
            size: params.size,
            sort: &params.sort,
        };
        self.get_json("/api/customers", Some(&query)).await
    }

    async fn get_customer(&self, id: CustomerId) -> ApiResult<Customer> {
        let path = format!("/api/customers/{}", id);
        self.get_json::<Customer, ()>(&path, None).await
    }

    async fn create_customer(&self, request: &CustomerCreateRequest) -> ApiResult<Customer> {
        self.post_json("/api/customers/add", request).await
    }

    async fn update_customer(
        &self,
        id: CustomerId,
        request: &CustomerUpdateRequest,
    ) -> ApiResult<Customer> {
        let path = format!("/api/customers/{}", id);
        self.put_json(&path, request).await
    }

    async fn delete_customer(&self, id: CustomerId) -> ApiResult<()> {
        let path = format!("/api/customers/{}", id);
        self.delete(&path).await
    }

    async fn list_customer_purchases(
        &self,
        customer_id: CustomerId,
        params: &CustomerPurchasesParams,
    ) -> ApiResult<Page<Purchase>> {
        let path = format!("/api/customers/{}/purchases", customer_id);
        let query = PageQuery {
            page: params.page,
            size: params.size,
            sort: &params.sort,
        };
        self.get_json(&path, Some(&query)).await
    }

    async fn list_purchases(&self, params: &PurchaseListParams) -> ApiResult<Page<Purchase>> {
        let query = PurchaseQuery {
            customer_id: params.customer_id,
            status: params.status,
            page: params.page,
            size: params.size,
            sort: &params.sort,
        };
        self.get_json("/api/purchases", Some(&query)).await
    }

    async fn get_purchase(&self, id: PurchaseId) -> ApiResult<Purchase> {
        let path = format!("/api/purchases/{}", id);
        self.get_json::<Purchase, ()>(&path, None).await
    }

    async fn create_purchase(&self, request: &PurchaseCreateRequest) -> ApiResult<Purchase> {
        self.post_json("/api/purchases", request).await
    }

    async fn update_purchase(
        &self,
        id: PurchaseId,
        request: &PurchaseUpdateRequest,
    ) -> ApiResult<Purchase> {
        let path = format!("/api/purchases/{}", id);
        self.put_json(&path, request).await
    }

    async fn simulate_installments(
        &self,
        request: &InstallmentSimulationRequest,
    ) -> ApiResult<InstallmentSimulation> {
        self.post_json("/api/purchases/installments/simulate", request)
            .await
    }

    async fn list_payments(&self, purchase_id: PurchaseId) -> ApiResult<Vec<Payment>> {
        let path = format!("/api/purchases/{}/payments", purchase_id);
        self.get_json::<Vec<Payment>, ()>(&path, None).await
    }

    async fn create_payment(
        &self,
        purchase_id: PurchaseId,
        request: &PaymentCreateRequest,
    ) -> ApiResult<Payment> {
        let path = format!("/api/purchases/{}/payments", purchase_id);
        self.post_json(&path, request).await
    }

    async fn list_payment_methods(&self) -> ApiResult<Vec<PaymentMethod>> {
        self.get_json::<Vec<PaymentMethod>, ()>("/api/payment-methods", None)
            .await
    }
}

async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> ApiResult<T> {
    let status = response.status();
    let body = response.bytes().await.map_err(transport_error)?;
    if status.is_success() {
        serde_json::from_slice(&body).map_err(|e| ApiError::decode(e.to_string()))
    } else {
        Err(server_error(status.as_u16(), &String::from_utf8_lossy(&body)))
    }
}

/// Prefer the server's `{"message": ...}`; fall back to the raw body.
fn server_error(status: u16, text: &str) -> ApiError {
    match serde_json::from_str::<ErrorBody>(text) {
        Ok(ErrorBody {
            message: Some(message),
        }) if !message.trim().is_empty() => ApiError::server(status, message),
        _ => ApiError::server(status, format!("HTTP {}: {}", status, text.trim())),
    }
}

fn transport_error(err: reqwest::Error) -> ApiError {
    if err.is_decode() {
        ApiError::decode(err.to_string())
    } else {
        ApiError::transport(err.to_string())
    }
}

fn build_auth_headers(auth: &AuthConfig) -> Result<HeaderMap, ApiClientError> {
    let mut headers = HeaderMap::new();
    if let Some(api_key) = &auth.api_key {
        headers.insert(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_str(api_key).map_err(|e| ApiClientError::Config(e.to_string()))?,
        );
    }
    if let Some(token) = &auth.bearer_token {
        let value = format!("Bearer {}", token);
        headers.insert(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&value).map_err(|e| ApiClientError::Config(e.to_string()))?,
        );
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_is_preferred() {
        let err = server_error(400, r#"{"message":"Payment exceeds remaining amount"}"#);
        assert_eq!(err, ApiError::server(400, "Payment exceeds remaining amount"));

        let err = server_error(502, "Bad Gateway");
        assert_eq!(err, ApiError::server(502, "HTTP 502: Bad Gateway"));

        let err = server_error(500, r#"{"error":"x"}"#);
        assert_eq!(err.user_message(), r#"HTTP 500: {"error":"x"}"#);
    }

    #[test]
    fn purchase_query_omits_absent_filters() {
        let query = PurchaseQuery {
            customer_id: None,
            status: Some(PurchaseStatus::Activo),
            page: 0,
            size: 9,
            sort: "createdAt",
        };
        let value = serde_json::to_value(&query).unwrap();
        assert!(value.get("customerId").is_none());
        assert_eq!(value["status"], "ACTIVO");
    }

    #[test]
    fn auth_headers_follow_config() {
        let headers = build_auth_headers(&AuthConfig {
            api_key: Some("k-1".to_string()),
            bearer_token: Some("t-2".to_string()),
        })
        .unwrap();
        assert_eq!(headers["x-api-key"], "k-1");
        assert_eq!(headers["authorization"], "Bearer t-2");
        assert!(build_auth_headers(&AuthConfig::default()).unwrap().is_empty());
    }
}
