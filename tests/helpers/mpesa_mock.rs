//! Mock Daraja API server for testing
//!
//! Serves the OAuth, STK push and STK query endpoints with wiremock so the
//! payment flow runs without Safaricom.

use serde_json::{json, Value};
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

pub const TEST_CHECKOUT_ID: &str = "ws_CO_191220191020363925";
pub const TEST_MERCHANT_ID: &str = "29115-34620561-1";

/// Mock Daraja server
pub struct DarajaMockServer {
    pub server: MockServer,
}

impl DarajaMockServer {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    /// OAuth endpoint handing out a fixed token
    pub async fn mock_oauth(&self) {
        Mock::given(method("GET"))
            .and(path("/oauth/v1/generate"))
            .and(query_param("grant_type", "client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "test-access-token",
                "expires_in": "3599"
            })))
            .mount(&self.server)
            .await;
    }

    /// STK push accepted with the given checkout id
    pub async fn mock_stk_push_accepted(&self, checkout_request_id: &str) {
        Mock::given(method("POST"))
            .and(path("/mpesa/stkpush/v1/processrequest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "MerchantRequestID": TEST_MERCHANT_ID,
                "CheckoutRequestID": checkout_request_id,
                "ResponseCode": "0",
                "ResponseDescription": "Success. Request accepted for processing",
                "CustomerMessage": "Success. Request accepted for processing"
            })))
            .mount(&self.server)
            .await;
    }

    /// STK push refused by Daraja
    pub async fn mock_stk_push_rejected(&self) {
        Mock::given(method("POST"))
            .and(path("/mpesa/stkpush/v1/processrequest"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "requestId": "1234-5678",
                "errorCode": "400.002.02",
                "errorMessage": "Bad Request - Invalid PhoneNumber"
            })))
            .mount(&self.server)
            .await;
    }

    /// STK query answering with a final result code
    pub async fn mock_stk_query_result(&self, result_code: &str, result_desc: &str) {
        Mock::given(method("POST"))
            .and(path("/mpesa/stkpushquery/v1/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ResponseCode": "0",
                "ResponseDescription": "The service request has been accepted successsfully",
                "MerchantRequestID": TEST_MERCHANT_ID,
                "CheckoutRequestID": TEST_CHECKOUT_ID,
                "ResultCode": result_code,
                "ResultDesc": result_desc
            })))
            .mount(&self.server)
            .await;
    }

    /// STK query for a prompt the payer has not answered yet
    pub async fn mock_stk_query_processing(&self) {
        Mock::given(method("POST"))
            .and(path("/mpesa/stkpushquery/v1/query"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "requestId": "1234-5678",
                "errorCode": "500.001.1001",
                "errorMessage": "The transaction is being processed"
            })))
            .mount(&self.server)
            .await;
    }

    /// Number of requests that reached `endpoint`
    pub async fn calls_to(&self, endpoint: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == endpoint)
            .count()
    }

    pub async fn reset(&self) {
        self.server.reset().await;
    }
}

/// Successful STK callback body
pub fn success_callback(checkout_request_id: &str, amount: i64, receipt: &str) -> Value {
    json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": TEST_MERCHANT_ID,
                "CheckoutRequestID": checkout_request_id,
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
                "CallbackMetadata": {
                    "Item": [
                        { "Name": "Amount", "Value": amount },
                        { "Name": "MpesaReceiptNumber", "Value": receipt },
                        { "Name": "TransactionDate", "Value": 20191219102115_i64 },
                        { "Name": "PhoneNumber", "Value": 254708374149_i64 }
                    ]
                }
            }
        }
    })
}

/// Failed or cancelled STK callback body
pub fn failure_callback(checkout_request_id: &str, result_code: i64, result_desc: &str) -> Value {
    json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": TEST_MERCHANT_ID,
                "CheckoutRequestID": checkout_request_id,
                "ResultCode": result_code,
                "ResultDesc": result_desc
            }
        }
    })
}
