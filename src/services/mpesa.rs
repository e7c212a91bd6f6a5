//! M-Pesa Daraja client
//!
//! Wraps the three Daraja calls the booking flow needs: OAuth client
//! credentials, STK push (Lipa na M-Pesa Online) and STK push status query.
//! Also holds the wire types of the STK callback body.

use std::future::Future;
use std::time::Duration;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn, debug};
use crate::config::MpesaConfig;
use crate::config::settings::daraja_base_url;
use crate::models::{MpesaSettings, PaymentResolution};
use crate::services::redis::RedisService;
use crate::utils::errors::{MaabaraError, MpesaError, MpesaResult, Result};

/// Daraja error code for an STK request the payer has not answered yet
pub const STILL_PROCESSING_CODE: &str = "500.001.1001";

const ACCOUNT_REFERENCE_MAX: usize = 12;
const TRANSACTION_DESC_MAX: usize = 13;
/// Tokens are refreshed this long before Daraja says they expire
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;
const EAT_OFFSET_HOURS: i64 = 3;

/// One STK push to send
#[derive(Debug, Clone)]
pub struct StkPushRequest {
    pub amount: i64,
    pub phone: String,
    pub account_reference: String,
    pub description: String,
    pub callback_url: String,
}

/// Callback URL carrying the shared secret as its `token` query parameter
pub fn callback_url_with_token(callback_url: &str, token: &str) -> Result<String> {
    let mut url = url::Url::parse(callback_url)
        .map_err(|e| MaabaraError::Config(format!("Invalid M-Pesa callback URL {}: {}", callback_url, e)))?;

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "token")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.query_pairs_mut().clear().extend_pairs(kept).append_pair("token", token);
    Ok(url.to_string())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StkPushBody<'a> {
    business_short_code: &'a str,
    password: String,
    timestamp: String,
    transaction_type: &'static str,
    amount: i64,
    party_a: &'a str,
    party_b: &'a str,
    phone_number: &'a str,
    #[serde(rename = "CallBackURL")]
    callback_url: &'a str,
    account_reference: String,
    transaction_desc: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StkQueryBody<'a> {
    business_short_code: &'a str,
    password: String,
    timestamp: String,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: &'a str,
}

/// Accepted STK push
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: String,
    #[serde(rename = "CustomerMessage", default)]
    pub customer_message: String,
}

#[derive(Debug, Deserialize)]
struct StkQueryResponse {
    #[serde(rename = "ResultCode")]
    result_code: Option<Value>,
    #[serde(rename = "ResultDesc")]
    result_desc: Option<String>,
}

/// Daraja error body
#[derive(Debug, Deserialize)]
struct DarajaError {
    #[serde(rename = "errorCode", default)]
    error_code: String,
    #[serde(rename = "errorMessage", default)]
    error_message: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Outcome of an STK status query
#[derive(Debug, Clone, PartialEq)]
pub enum StkQueryOutcome {
    /// The payer has not answered the prompt yet
    Pending,
    Resolved(PaymentResolution),
}

/// Callback body posted by Daraja to the callback URL
#[derive(Debug, Clone, Deserialize)]
pub struct StkCallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: StkCallbackBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkCallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: Value,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata")]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<CallbackItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: Option<Value>,
}

impl StkCallback {
    fn item(&self, name: &str) -> Option<&Value> {
        self.callback_metadata
            .as_ref()?
            .items
            .iter()
            .find(|item| item.name == name)?
            .value
            .as_ref()
    }

    /// Result reported by the callback
    pub fn resolution(&self) -> MpesaResult<PaymentResolution> {
        let result_code = value_as_i64(&self.result_code)
            .ok_or_else(|| MpesaError::InvalidResponse(format!("ResultCode {} is not numeric", self.result_code)))?;

        Ok(PaymentResolution {
            result_code: result_code_from(result_code)?,
            result_desc: self.result_desc.clone(),
            amount: self.item("Amount").and_then(value_as_i64),
            mpesa_receipt: self.item("MpesaReceiptNumber").and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            }),
        })
    }
}

/// Daraja sends numbers both as JSON numbers and as strings
pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().map(|f| f.round() as i64))
        }
        _ => None,
    }
}

/// Result codes are stored as `INTEGER`; anything wider is a broken response
fn result_code_from(code: i64) -> MpesaResult<i32> {
    i32::try_from(code).map_err(|_| MpesaError::InvalidResponse(format!("ResultCode {} is out of range", code)))
}

/// Client for the Daraja API
#[derive(Debug, Clone)]
pub struct MpesaClient {
    client: Client,
    redis: RedisService,
    base_url_override: Option<String>,
    max_retries: u32,
    retry_delay: Duration,
}

impl MpesaClient {
    /// Create a new client; credentials are passed per call
    pub fn new(config: &MpesaConfig, redis: RedisService) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("Maabara/1.0")
            .build()
            .map_err(MaabaraError::Http)?;

        Ok(Self {
            client,
            redis,
            base_url_override: None,
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(250),
        })
    }

    /// Point the client at another Daraja host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    /// Base delay of the exponential retry backoff
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn base_url(&self, credentials: &MpesaSettings) -> String {
        match &self.base_url_override {
            Some(url) => url.clone(),
            None => daraja_base_url(&credentials.environment).to_string(),
        }
    }

    /// Daraja timestamp `YYYYMMDDHHMMSS` in East Africa Time
    pub fn timestamp_at(now: DateTime<Utc>) -> String {
        (now + chrono::Duration::hours(EAT_OFFSET_HOURS)).format("%Y%m%d%H%M%S").to_string()
    }

    pub fn timestamp() -> String {
        Self::timestamp_at(Utc::now())
    }

    /// STK password: base64 of shortcode, passkey and timestamp
    pub fn password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(format!("{}{}{}", shortcode, passkey, timestamp))
    }

    fn token_cache_key(credentials: &MpesaSettings) -> String {
        format!("mpesa:token:{}", credentials.shortcode)
    }

    /// OAuth access token, served from Redis while it is fresh
    pub async fn access_token(&self, credentials: &MpesaSettings) -> MpesaResult<String> {
        if !credentials.is_complete() {
            return Err(MpesaError::NotConfigured);
        }

        let key = Self::token_cache_key(credentials);
        match self.redis.get::<CachedToken>(&key).await {
            Ok(Some(cached)) if cached.expires_at > Utc::now() => {
                debug!("Using cached M-Pesa access token");
                return Ok(cached.access_token);
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "Token cache unavailable, fetching a fresh token"),
        }

        let token = self.with_retries("oauth", || self.fetch_access_token(credentials)).await?;

        if let Err(e) = self.redis.set(&key, &token, Some(self.cache_ttl(&token))).await {
            debug!(error = %e, "Failed to cache M-Pesa access token");
        }

        Ok(token.access_token)
    }

    fn cache_ttl(&self, token: &CachedToken) -> u64 {
        (token.expires_at - Utc::now()).num_seconds().max(1) as u64
    }

    async fn fetch_access_token(&self, credentials: &MpesaSettings) -> MpesaResult<CachedToken> {
        let url = format!("{}/oauth/v1/generate?grant_type=client_credentials", self.base_url(credentials));

        let response = self.client
            .get(&url)
            .basic_auth(&credentials.consumer_key, Some(&credentials.consumer_secret))
            .send()
            .await
            .map_err(classify_send_error)?;

        let response = check_status(response).await?;
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| MpesaError::InvalidResponse(e.to_string()))?;

        let expires_in = value_as_i64(&body.expires_in).unwrap_or(3599);
        let lifetime = (expires_in - TOKEN_EXPIRY_MARGIN_SECS).max(1);

        info!(expires_in = expires_in, "Fetched M-Pesa access token");
        Ok(CachedToken {
            access_token: body.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(lifetime),
        })
    }

    /// Send an STK push prompt to the payer's phone
    ///
    /// Never retried: a timed-out push may still reach the phone.
    pub async fn stk_push(&self, credentials: &MpesaSettings, request: &StkPushRequest) -> MpesaResult<StkPushResponse> {
        let token = self.access_token(credentials).await?;
        let timestamp = Self::timestamp();

        let body = StkPushBody {
            business_short_code: &credentials.shortcode,
            password: Self::password(&credentials.shortcode, &credentials.passkey, &timestamp),
            timestamp,
            transaction_type: "CustomerPayBillOnline",
            amount: request.amount,
            party_a: &request.phone,
            party_b: &credentials.shortcode,
            phone_number: &request.phone,
            callback_url: &request.callback_url,
            account_reference: request.account_reference.chars().take(ACCOUNT_REFERENCE_MAX).collect(),
            transaction_desc: request.description.chars().take(TRANSACTION_DESC_MAX).collect(),
        };

        let url = format!("{}/mpesa/stkpush/v1/processrequest", self.base_url(credentials));
        debug!(amount = request.amount, reference = %request.account_reference, "Sending STK push");

        let response = self.client
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(classify_send_error)?;

        let response = check_status(response).await?;
        let accepted: StkPushResponse = response
            .json()
            .await
            .map_err(|e| MpesaError::InvalidResponse(e.to_string()))?;

        if accepted.response_code != "0" {
            return Err(MpesaError::Rejected {
                code: accepted.response_code,
                message: accepted.response_description,
            });
        }

        info!(checkout_request_id = %accepted.checkout_request_id, "STK push accepted");
        Ok(accepted)
    }

    /// Ask Daraja for the result of an STK push
    pub async fn stk_query(&self, credentials: &MpesaSettings, checkout_request_id: &str) -> MpesaResult<StkQueryOutcome> {
        let token = self.access_token(credentials).await?;
        self.with_retries("stk_query", || self.query_once(credentials, &token, checkout_request_id)).await
    }

    async fn query_once(&self, credentials: &MpesaSettings, token: &str, checkout_request_id: &str) -> MpesaResult<StkQueryOutcome> {
        let timestamp = Self::timestamp();
        let body = StkQueryBody {
            business_short_code: &credentials.shortcode,
            password: Self::password(&credentials.shortcode, &credentials.passkey, &timestamp),
            timestamp,
            checkout_request_id,
        };

        let url = format!("{}/mpesa/stkpushquery/v1/query", self.base_url(credentials));
        let response = self.client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(classify_send_error)?;

        let response = match check_status(response).await {
            Ok(response) => response,
            Err(MpesaError::Rejected { code, .. }) if code == STILL_PROCESSING_CODE => {
                return Ok(StkQueryOutcome::Pending);
            }
            Err(e) => return Err(e),
        };

        let body: StkQueryResponse = response
            .json()
            .await
            .map_err(|e| MpesaError::InvalidResponse(e.to_string()))?;

        let Some(result_code) = body.result_code.as_ref().and_then(value_as_i64) else {
            return Ok(StkQueryOutcome::Pending);
        };

        Ok(StkQueryOutcome::Resolved(PaymentResolution {
            result_code: result_code_from(result_code)?,
            result_desc: body.result_desc.unwrap_or_default(),
            amount: None,
            mpesa_receipt: None,
        }))
    }

    /// Run an idempotent call, retrying transient failures with exponential backoff
    async fn with_retries<T, F, Fut>(&self, operation: &str, mut call: F) -> MpesaResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = MpesaResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match call().await {
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.retry_delay * 2u32.saturating_pow(attempt);
                    warn!(operation = operation, attempt = attempt + 1, error = %e, delay_ms = delay.as_millis() as u64, "Retrying M-Pesa call");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

fn classify_send_error(e: reqwest::Error) -> MpesaError {
    if e.is_timeout() {
        MpesaError::Timeout
    } else if e.is_connect() {
        MpesaError::ServiceUnavailable
    } else {
        MpesaError::RequestFailed(e.to_string())
    }
}

/// Turn non-2xx responses into errors, keeping Daraja's error code
async fn check_status(response: reqwest::Response) -> MpesaResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    if let Ok(error) = serde_json::from_str::<DarajaError>(&text) {
        if !error.error_code.is_empty() {
            if error.error_code == STILL_PROCESSING_CODE {
                return Err(MpesaError::Rejected { code: error.error_code, message: error.error_message });
            }
            if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                warn!(status = status.as_u16(), code = %error.error_code, message = %error.error_message, "Daraja server error");
                return Err(MpesaError::ServiceUnavailable);
            }
            return Err(MpesaError::Rejected { code: error.error_code, message: error.error_message });
        }
    }

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        warn!(status = status.as_u16(), body = %text, "Daraja server error");
        return Err(MpesaError::ServiceUnavailable);
    }

    Err(MpesaError::RequestFailed(format!("HTTP {}: {}", status, text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    #[test]
    fn test_callback_url_gets_token() {
        let url = callback_url_with_token("https://maabara.online/api/payments/mpesa/callback", "s3cret").unwrap();
        assert_eq!(url, "https://maabara.online/api/payments/mpesa/callback?token=s3cret");

        let url = callback_url_with_token("https://maabara.online/cb?token=old&v=2", "new").unwrap();
        assert_eq!(url, "https://maabara.online/cb?v=2&token=new");

        assert!(callback_url_with_token("not a url", "s3cret").is_err());
    }

    #[test]
    fn test_timestamp_is_east_africa_time() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 22, 5, 9).unwrap();
        assert_eq!(MpesaClient::timestamp_at(now), "20250315010509");
    }

    #[test]
    fn test_password_encoding() {
        let password = MpesaClient::password("174379", "passkey", "20250315010509");
        let decoded = base64::engine::general_purpose::STANDARD.decode(password).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "174379passkey20250315010509");
    }

    #[test]
    fn test_numbers_as_strings() {
        assert_eq!(value_as_i64(&serde_json::json!("1032")), Some(1032));
        assert_eq!(value_as_i64(&serde_json::json!(0)), Some(0));
        assert_eq!(value_as_i64(&serde_json::json!(1500.0)), Some(1500));
        assert_eq!(value_as_i64(&serde_json::json!("3599")), Some(3599));
        assert_eq!(value_as_i64(&serde_json::json!(null)), None);
    }

    #[test]
    fn test_successful_callback_resolution() {
        let payload = serde_json::json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResultCode": 0,
                    "ResultDesc": "The service request is processed successfully.",
                    "CallbackMetadata": {
                        "Item": [
                            { "Name": "Amount", "Value": 1500.00 },
                            { "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" },
                            { "Name": "Balance" },
                            { "Name": "TransactionDate", "Value": 20191219102115u64 },
                            { "Name": "PhoneNumber", "Value": 254708374149u64 }
                        ]
                    }
                }
            }
        });

        let envelope: StkCallbackEnvelope = serde_json::from_value(payload).unwrap();
        let resolution = envelope.body.stk_callback.resolution().unwrap();
        assert_eq!(resolution.result_code, 0);
        assert_eq!(resolution.amount, Some(1500));
        assert_eq!(resolution.mpesa_receipt.as_deref(), Some("NLJ7RT61SV"));
    }

    #[test]
    fn test_cancelled_callback_has_no_metadata() {
        let payload = serde_json::json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "8555-67195-1",
                    "CheckoutRequestID": "ws_CO_27072017151044001",
                    "ResultCode": 1032,
                    "ResultDesc": "Request cancelled by user"
                }
            }
        });

        let envelope: StkCallbackEnvelope = serde_json::from_value(payload).unwrap();
        let resolution = envelope.body.stk_callback.resolution().unwrap();
        assert_eq!(resolution.result_code, 1032);
        assert_eq!(resolution.amount, None);
        assert_eq!(resolution.mpesa_receipt, None);
    }

    #[test]
    fn test_out_of_range_result_code_is_rejected() {
        let payload = serde_json::json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "8555-67195-1",
                    "CheckoutRequestID": "ws_CO_27072017151044001",
                    "ResultCode": 4294967296i64,
                    "ResultDesc": "The service request is processed successfully."
                }
            }
        });

        let envelope: StkCallbackEnvelope = serde_json::from_value(payload).unwrap();
        assert_matches!(envelope.body.stk_callback.resolution(), Err(MpesaError::InvalidResponse(_)));
        assert_eq!(result_code_from(1032).unwrap(), 1032);
    }
}
