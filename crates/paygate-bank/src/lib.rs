//! Bank adapter contract
//!
//! The gateway never talks to a banking network directly; it drives an
//! abstract [`BankAdapter`]. Timeout and retry policy live behind the
//! adapter. The engine treats [`BankError`] as retryable only when the
//! payment is not parked in a persisted intermediate state, and never
//! auto-retries across the network inside a request.

pub mod stub;

use async_trait::async_trait;
use thiserror::Error;

use paygate_types::Currency;

pub use stub::StubBank;

/// Raw card input from the hosted form. Never logged, never persisted.
#[derive(Clone)]
pub struct CardDetails {
    pub pan: String,
    pub exp_month: u32,
    pub exp_year: u32,
    pub cvv: String,
    pub holder: Option<String>,
}

// Manual Debug so card data cannot leak through a formatter.
impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardDetails")
            .field("pan", &mask_pan(&self.pan))
            .field("exp", &"**/**")
            .field("cvv", &"***")
            .finish()
    }
}

/// Successful authorization hold
#[derive(Debug, Clone)]
pub struct BankAuthorization {
    pub bank_ref: String,
    pub auth_code: String,
    pub rrn: String,
    pub masked_pan: String,
}

/// Authorization result: the issuer either approves or declines;
/// transport-level failures surface as [`BankError`].
#[derive(Debug, Clone)]
pub enum AuthorizeOutcome {
    Approved(BankAuthorization),
    Declined { code: String, message: String },
}

#[derive(Debug, Clone)]
pub struct CaptureReceipt {
    pub bank_ref: String,
}

#[derive(Debug, Clone)]
pub struct RefundReceipt {
    pub refund_ref: String,
}

#[derive(Debug, Error)]
pub enum BankError {
    #[error("bank unavailable: {0}")]
    Unavailable(String),

    #[error("bank call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

#[async_trait]
pub trait BankAdapter: Send + Sync {
    /// Place an authorization hold for `amount` minor units.
    async fn authorize(
        &self,
        card: &CardDetails,
        amount: i64,
        currency: Currency,
    ) -> Result<AuthorizeOutcome, BankError>;

    /// Capture a previously authorized hold in full.
    async fn capture(&self, bank_ref: &str, amount: i64) -> Result<CaptureReceipt, BankError>;

    /// Release an uncaptured hold.
    async fn release(&self, bank_ref: &str) -> Result<(), BankError>;

    /// Refund a captured payment.
    async fn refund(&self, bank_ref: &str, amount: i64) -> Result<RefundReceipt, BankError>;
}

/// First six and last four digits, middle starred: `411111******1111`.
/// Short inputs are fully starred.
pub fn mask_pan(pan: &str) -> String {
    let digits: String = pan.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 13 {
        return "*".repeat(digits.len());
    }
    format!(
        "{}{}{}",
        &digits[..6],
        "*".repeat(digits.len() - 10),
        &digits[digits.len() - 4..]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_standard_pan() {
        assert_eq!(mask_pan("4111111111111111"), "411111******1111");
        assert_eq!(mask_pan("4111 1111 1111 1111"), "411111******1111");
    }

    #[test]
    fn masks_short_input_entirely() {
        assert_eq!(mask_pan("1234"), "****");
    }

    #[test]
    fn debug_never_shows_card_data() {
        let card = CardDetails {
            pan: "4111111111111111".into(),
            exp_month: 12,
            exp_year: 2029,
            cvv: "123".into(),
            holder: Some("J DOE".into()),
        };
        let rendered = format!("{card:?}");
        assert!(!rendered.contains("4111111111111111"));
        assert!(!rendered.contains("123\""));
        assert!(rendered.contains("411111******1111"));
    }
}
