use crate::config::GatewayConfig;
use crate::error::PaymentError;
use crate::gateways::{make_reference_id, GatewayAck, InitiateRequest, PaymentGateway, StatusInquiry};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::json;

/// Client for the WaafiPay mobile-money gateway. Builds the signed JSON
/// envelope for purchases and transaction inquiries and normalizes the
/// response. The sandbox endpoint occasionally answers with XML/HTML; those
/// responses are degraded to an indeterminate PENDING shape rather than
/// treated as errors, matching how the gateway behaves in practice.
pub struct WaafipayGateway {
    pub api_url: String,
    pub merchant_uid: String,
    pub api_user_id: String,
    pub api_key: String,
    pub timeout_ms: u64,
    pub client: reqwest::Client,
}

impl WaafipayGateway {
    pub fn new(cfg: &GatewayConfig) -> Self {
        if cfg.merchant_uid.is_empty() || cfg.api_user_id.is_empty() || cfg.api_key.is_empty() {
            tracing::warn!("waafipay credentials not configured, payment operations will fail");
        }
        Self {
            api_url: cfg.api_url.clone(),
            merchant_uid: cfg.merchant_uid.clone(),
            api_user_id: cfg.api_user_id.clone(),
            api_key: cfg.api_key.clone(),
            timeout_ms: cfg.timeout_ms,
            client: reqwest::Client::new(),
        }
    }

    fn envelope(&self, service_name: &str, service_params: serde_json::Value) -> serde_json::Value {
        json!({
            "schemaVersion": "1.0",
            "requestId": request_id(),
            "timestamp": chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            "channelName": "WEB",
            "serviceName": service_name,
            "serviceParams": service_params,
        })
    }

    async fn post(&self, payload: &serde_json::Value) -> Result<GatewayResponse, PaymentError> {
        let resp = self
            .client
            .post(&self.api_url)
            .json(payload)
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .send()
            .await
            .map_err(|e| PaymentError::GatewayUnavailable(e.to_string()))?;

        let http_ok = resp.status().is_success();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let text = resp
            .text()
            .await
            .map_err(|e| PaymentError::GatewayUnavailable(e.to_string()))?;

        let looks_like_xml = text.trim_start().starts_with('<')
            || content_type.contains("xml")
            || content_type.contains("text/html");
        if looks_like_xml {
            tracing::warn!("waafipay returned a non-JSON response: {}", truncate(&text, 200));
            return Ok(GatewayResponse { http_ok, body: None });
        }

        let body: serde_json::Value = serde_json::from_str(&text).map_err(|_| {
            PaymentError::GatewayUnavailable(format!("invalid gateway response: {}", truncate(&text, 100)))
        })?;
        Ok(GatewayResponse { http_ok, body: Some(body) })
    }
}

struct GatewayResponse {
    http_ok: bool,
    /// None when the gateway answered with XML/HTML instead of JSON.
    body: Option<serde_json::Value>,
}

#[async_trait::async_trait]
impl PaymentGateway for WaafipayGateway {
    fn name(&self) -> &'static str {
        "waafipay"
    }

    async fn initiate(&self, request: &InitiateRequest) -> Result<GatewayAck, PaymentError> {
        let reference_id = make_reference_id(&request.subject_id);
        let payload = self.envelope(
            "API_PURCHASE",
            json!({
                "merchantUid": self.merchant_uid,
                "apiUserId": self.api_user_id,
                "apiKey": self.api_key,
                "paymentMethod": "MWALLET_ACCOUNT",
                "payerInfo": { "accountNo": request.payer.account_no() },
                "transactionInfo": {
                    "amount": format_amount(request.amount_minor),
                    "currency": request.currency,
                    "referenceId": reference_id,
                    "description": request.description,
                },
            }),
        );

        tracing::info!("initiating waafipay purchase, reference {}", reference_id);
        let resp = self.post(&payload).await?;

        let Some(body) = resp.body else {
            if !resp.http_ok {
                return Err(PaymentError::GatewayRejected(
                    "gateway returned a non-JSON error response".to_string(),
                ));
            }
            // Initiated, but the degraded response carries no transaction
            // id; a webhook or a later inquiry has to finish the job.
            return Ok(GatewayAck {
                transaction_id: None,
                reference_id,
                status: Some("PENDING".to_string()),
                response_code: Some("200".to_string()),
                response_msg: Some("payment initiated (non-JSON response)".to_string()),
            });
        };

        let response_msg = param_str(&body, "responseMsg");
        if !resp.http_ok {
            return Err(PaymentError::GatewayRejected(
                response_msg.unwrap_or_else(|| "gateway request failed".to_string()),
            ));
        }

        let response_code = param_str(&body, "responseCode");
        if let Some(code) = response_code.as_deref() {
            if code != "200" && code != "0" {
                return Err(PaymentError::GatewayRejected(
                    response_msg.unwrap_or_else(|| format!("gateway response code {}", code)),
                ));
            }
        }

        Ok(GatewayAck {
            transaction_id: param_str(&body, "transactionId"),
            reference_id,
            status: param_str(&body, "status").or_else(|| Some("PENDING".to_string())),
            response_code,
            response_msg,
        })
    }

    async fn check_status(
        &self,
        transaction_id: &str,
        reference_id: &str,
    ) -> Result<StatusInquiry, PaymentError> {
        let payload = self.envelope(
            "API_TRANSACTION_INQUIRY",
            json!({
                "merchantUid": self.merchant_uid,
                "apiUserId": self.api_user_id,
                "apiKey": self.api_key,
                "transactionId": transaction_id,
                "referenceId": reference_id,
            }),
        );

        let resp = self.post(&payload).await?;

        let Some(body) = resp.body else {
            return Ok(StatusInquiry {
                status: Some("PENDING".to_string()),
                response_code: Some(if resp.http_ok { "200" } else { "500" }.to_string()),
                response_msg: Some("status inquiry returned a non-JSON response".to_string()),
                ..Default::default()
            });
        };

        Ok(StatusInquiry {
            transaction_id: param_str(&body, "transactionId"),
            reference_id: param_str(&body, "referenceId"),
            status: param_str(&body, "status"),
            response_code: param_str(&body, "responseCode"),
            response_msg: param_str(&body, "responseMsg"),
            amount: param_str(&body, "amount"),
            currency: param_str(&body, "currency"),
        })
    }
}

fn request_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();
    format!("REQ-{}-{}", chrono::Utc::now().timestamp_millis(), suffix.to_lowercase())
}

/// Minor units to a decimal string, e.g. 1000 -> "10.00".
fn format_amount(amount_minor: i64) -> String {
    format!("{}.{:02}", amount_minor / 100, amount_minor % 100)
}

fn param_str(body: &serde_json::Value, key: &str) -> Option<String> {
    body.get("serviceParams")
        .and_then(|p| p.get(key))
        .and_then(|v| match v {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
