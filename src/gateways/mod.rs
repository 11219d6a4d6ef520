use crate::config::GatewayConfig;
use crate::error::PaymentError;
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub mod mock;
pub mod waafipay;

/// Validated input to a gateway initiation call.
#[derive(Debug, Clone)]
pub struct InitiateRequest {
    pub subject_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub payer: PayerInfo,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayerInfo {
    Account(String),
    Phone(String),
}

impl PayerInfo {
    /// The gateway carries phone numbers in the accountNo field, without
    /// the leading `+`.
    pub fn account_no(&self) -> String {
        match self {
            PayerInfo::Account(a) => a.clone(),
            PayerInfo::Phone(p) => p.trim_start_matches('+').to_string(),
        }
    }
}

/// Gateway acknowledgement of an initiation request. The transaction id may
/// be absent when the gateway degrades to a non-JSON response; a webhook can
/// still resolve such a payment through the reference id.
#[derive(Debug, Clone)]
pub struct GatewayAck {
    pub transaction_id: Option<String>,
    pub reference_id: String,
    pub status: Option<String>,
    pub response_code: Option<String>,
    pub response_msg: Option<String>,
}

/// Normalized response of a status inquiry.
#[derive(Debug, Clone, Default)]
pub struct StatusInquiry {
    pub transaction_id: Option<String>,
    pub reference_id: Option<String>,
    pub status: Option<String>,
    pub response_code: Option<String>,
    pub response_msg: Option<String>,
    pub amount: Option<String>,
    pub currency: Option<String>,
}

#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &'static str;

    async fn initiate(&self, request: &InitiateRequest) -> Result<GatewayAck, PaymentError>;

    async fn check_status(
        &self,
        transaction_id: &str,
        reference_id: &str,
    ) -> Result<StatusInquiry, PaymentError>;
}

/// Inbound gateway callback, mirroring the outbound envelope shape.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayCallback {
    #[serde(default)]
    pub schema_version: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub channel_name: Option<String>,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub service_params: Option<CallbackParams>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackParams {
    #[serde(default)]
    pub response_code: Option<String>,
    #[serde(default)]
    pub response_msg: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub reference_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Caller-side correlation id, unique independent of the gateway.
pub fn make_reference_id(subject_id: &str) -> String {
    format!("PAY-{}-{}", subject_id, Utc::now().timestamp_millis())
}

/// Payer identifier rules: a fixed-length numeric merchant account, or a
/// phone number in the configured country's international format. Checked
/// before any network call is made.
pub struct PayerValidator {
    account_re: Regex,
    phone_re: Regex,
    default_account: String,
}

impl PayerValidator {
    pub fn new(cfg: &GatewayConfig) -> Result<Self, regex::Error> {
        let phone_pattern = format!(
            r"^{}\d{{{}}}$",
            regex::escape(&cfg.phone_country_code),
            cfg.phone_subscriber_digits
        );
        Ok(Self {
            account_re: Regex::new(r"^\d{6}$")?,
            phone_re: Regex::new(&phone_pattern)?,
            default_account: cfg.default_account.clone(),
        })
    }

    /// Resolves the payer for an initiation request. With neither identifier
    /// supplied the configured merchant account is charged.
    pub fn resolve(
        &self,
        account_number: Option<&str>,
        phone_number: Option<&str>,
    ) -> Result<PayerInfo, PaymentError> {
        if let Some(account) = account_number {
            if !self.account_re.is_match(account) {
                return Err(PaymentError::Validation(
                    "account number must be exactly 6 digits".to_string(),
                ));
            }
            return Ok(PayerInfo::Account(account.to_string()));
        }

        if let Some(phone) = phone_number {
            if !self.phone_re.is_match(phone) {
                return Err(PaymentError::Validation(format!(
                    "phone number must match {}",
                    self.phone_re.as_str()
                )));
            }
            return Ok(PayerInfo::Phone(phone.to_string()));
        }

        Ok(PayerInfo::Account(self.default_account.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;

    fn validator() -> PayerValidator {
        PayerValidator::new(&GatewayConfig {
            api_url: String::new(),
            merchant_uid: String::new(),
            api_user_id: String::new(),
            api_key: String::new(),
            default_account: "529988".to_string(),
            phone_country_code: "+252".to_string(),
            phone_subscriber_digits: 9,
            timeout_ms: 1000,
        })
        .unwrap()
    }

    #[test]
    fn six_digit_account_accepted() {
        let payer = validator().resolve(Some("123456"), None).unwrap();
        assert_eq!(payer, PayerInfo::Account("123456".to_string()));
    }

    #[test]
    fn short_account_rejected() {
        assert!(validator().resolve(Some("12345"), None).is_err());
    }

    #[test]
    fn phone_without_country_code_rejected() {
        let err = validator().resolve(None, Some("0907700949")).unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
    }

    #[test]
    fn phone_in_international_format_accepted() {
        let payer = validator().resolve(None, Some("+252907700949")).unwrap();
        assert_eq!(payer, PayerInfo::Phone("+252907700949".to_string()));
    }

    #[test]
    fn missing_payer_falls_back_to_merchant_account() {
        let payer = validator().resolve(None, None).unwrap();
        assert_eq!(payer, PayerInfo::Account("529988".to_string()));
    }

    #[test]
    fn phone_loses_plus_on_the_wire() {
        assert_eq!(
            PayerInfo::Phone("+252907700949".to_string()).account_no(),
            "252907700949"
        );
    }
}
