//! Deterministic in-memory bank
//!
//! Approves everything by default; individual PANs can be scripted to
//! decline and whole operations to fail at the transport level. Call
//! counters let tests assert exactly-once adapter effects.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use paygate_types::Currency;

use crate::{
    mask_pan, AuthorizeOutcome, BankAdapter, BankAuthorization, BankError, CaptureReceipt,
    CardDetails, RefundReceipt,
};

#[derive(Default)]
pub struct StubBank {
    seq: AtomicU64,
    authorize_calls: AtomicU64,
    capture_calls: AtomicU64,
    release_calls: AtomicU64,
    refund_calls: AtomicU64,
    fail_authorize: AtomicBool,
    fail_capture: AtomicBool,
    fail_release: AtomicBool,
    fail_refund: AtomicBool,
    decline_pans: Mutex<HashSet<String>>,
}

impl StubBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the issuer to decline this PAN.
    pub fn decline_pan(&self, pan: &str) {
        let digits: String = pan.chars().filter(|c| c.is_ascii_digit()).collect();
        self.decline_pans
            .lock()
            .expect("decline set lock poisoned")
            .insert(digits);
    }

    pub fn set_fail_authorize(&self, fail: bool) {
        self.fail_authorize.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_capture(&self, fail: bool) {
        self.fail_capture.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_release(&self, fail: bool) {
        self.fail_release.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_refund(&self, fail: bool) {
        self.fail_refund.store(fail, Ordering::SeqCst);
    }

    pub fn authorize_calls(&self) -> u64 {
        self.authorize_calls.load(Ordering::SeqCst)
    }

    pub fn capture_calls(&self) -> u64 {
        self.capture_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> u64 {
        self.release_calls.load(Ordering::SeqCst)
    }

    pub fn refund_calls(&self) -> u64 {
        self.refund_calls.load(Ordering::SeqCst)
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl BankAdapter for StubBank {
    async fn authorize(
        &self,
        card: &CardDetails,
        amount: i64,
        _currency: Currency,
    ) -> Result<AuthorizeOutcome, BankError> {
        self.authorize_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_authorize.load(Ordering::SeqCst) {
            return Err(BankError::Unavailable("stub authorize failure".into()));
        }

        let digits: String = card.pan.chars().filter(|c| c.is_ascii_digit()).collect();
        let declined = self
            .decline_pans
            .lock()
            .expect("decline set lock poisoned")
            .contains(&digits);
        if declined {
            return Ok(AuthorizeOutcome::Declined {
                code: "05".into(),
                message: "do not honor".into(),
            });
        }

        let seq = self.next_seq();
        let _ = amount;
        Ok(AuthorizeOutcome::Approved(BankAuthorization {
            bank_ref: format!("stub-auth-{seq:08}"),
            auth_code: format!("{:06}", seq % 1_000_000),
            rrn: format!("{seq:012}"),
            masked_pan: mask_pan(&card.pan),
        }))
    }

    async fn capture(&self, bank_ref: &str, _amount: i64) -> Result<CaptureReceipt, BankError> {
        self.capture_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_capture.load(Ordering::SeqCst) {
            return Err(BankError::Unavailable("stub capture failure".into()));
        }
        Ok(CaptureReceipt {
            bank_ref: bank_ref.to_string(),
        })
    }

    async fn release(&self, _bank_ref: &str) -> Result<(), BankError> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_release.load(Ordering::SeqCst) {
            return Err(BankError::Unavailable("stub release failure".into()));
        }
        Ok(())
    }

    async fn refund(&self, bank_ref: &str, _amount: i64) -> Result<RefundReceipt, BankError> {
        self.refund_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_refund.load(Ordering::SeqCst) {
            return Err(BankError::Unavailable("stub refund failure".into()));
        }
        Ok(RefundReceipt {
            refund_ref: format!("stub-refund-{bank_ref}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(pan: &str) -> CardDetails {
        CardDetails {
            pan: pan.into(),
            exp_month: 12,
            exp_year: 2029,
            cvv: "123".into(),
            holder: None,
        }
    }

    #[tokio::test]
    async fn approves_by_default_with_unique_refs() {
        let bank = StubBank::new();
        let a = bank
            .authorize(&card("4111111111111111"), 1000, Currency::RUB)
            .await
            .unwrap();
        let b = bank
            .authorize(&card("4111111111111111"), 1000, Currency::RUB)
            .await
            .unwrap();
        match (a, b) {
            (AuthorizeOutcome::Approved(x), AuthorizeOutcome::Approved(y)) => {
                assert_ne!(x.bank_ref, y.bank_ref);
                assert_eq!(x.masked_pan, "411111******1111");
            }
            other => panic!("expected approvals, got {other:?}"),
        }
        assert_eq!(bank.authorize_calls(), 2);
    }

    #[tokio::test]
    async fn scripted_decline() {
        let bank = StubBank::new();
        bank.decline_pan("4000 0000 0000 0002");
        let outcome = bank
            .authorize(&card("4000000000000002"), 1000, Currency::RUB)
            .await
            .unwrap();
        assert!(matches!(outcome, AuthorizeOutcome::Declined { .. }));
    }

    #[tokio::test]
    async fn scripted_transport_failure() {
        let bank = StubBank::new();
        bank.set_fail_capture(true);
        let err = bank.capture("stub-auth-00000001", 1000).await.unwrap_err();
        assert!(matches!(err, BankError::Unavailable(_)));
        assert_eq!(bank.capture_calls(), 1);

        bank.set_fail_capture(false);
        assert!(bank.capture("stub-auth-00000001", 1000).await.is_ok());
    }
}
