//! Payment status machine
//!
//! The declarative transition table below is the single source of truth
//! for legal status changes. Every write path goes through
//! [`transition`]; anything not in the table is rejected.

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};

/// Payment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Init,
    New,
    FormShowed,
    Authorizing,
    Authorized,
    AuthFail,
    Confirming,
    Confirmed,
    Completed,
    Captured,
    Rejected,
    Cancelled,
    Refunded,
    PartiallyRefunded,
    Failed,
    Expired,
    DeadlineExpired,
    Processing,
}

/// Events that drive the status machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEvent {
    /// INIT -> NEW once the payment record is accepted
    Ready,
    /// Hosted form first rendered
    FormShow,
    /// Card data submitted, adapter call in flight
    AuthStart,
    /// Adapter approved the authorization
    AuthOk,
    /// Adapter reported a hard authorization failure
    AuthFail,
    /// Adapter declined the card
    Reject,
    /// Capture requested for an authorized payment
    ConfirmStart,
    /// Capture approved
    ConfirmOk,
    /// Capture attempt failed at the adapter; the hold stays in place
    ConfirmRollback,
    /// Post-confirmation capture settlement
    Capture,
    /// Post-confirmation completion settlement
    Complete,
    /// Caller cancelled before authorization
    Cancel,
    /// Authorization released without capture
    Reverse,
    /// Full refund of a captured payment
    RefundFull,
    /// Partial refund of a captured payment
    RefundPartial,
    /// Refund of the remaining partially-refunded balance
    RefundRemainder,
    /// Expiry sweep fired before authorization
    Expire,
    /// Expiry sweep fired after the bank deadline passed
    DeadlineExpire,
}

impl PaymentStatus {
    /// Settled statuses: excluded from the expiry sweep and cached with
    /// the long TTL. The refund family stays legal from the captured
    /// subset, so "settled" is not "no outgoing edges".
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Confirmed
                | Self::Completed
                | Self::Captured
                | Self::Rejected
                | Self::Cancelled
                | Self::Refunded
                | Self::AuthFail
                | Self::Failed
                | Self::Expired
                | Self::DeadlineExpired
        )
    }

    /// Wire representation, e.g. `FORM_SHOWED`
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::New => "NEW",
            Self::FormShowed => "FORM_SHOWED",
            Self::Authorizing => "AUTHORIZING",
            Self::Authorized => "AUTHORIZED",
            Self::AuthFail => "AUTH_FAIL",
            Self::Confirming => "CONFIRMING",
            Self::Confirmed => "CONFIRMED",
            Self::Completed => "COMPLETED",
            Self::Captured => "CAPTURED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
            Self::Refunded => "REFUNDED",
            Self::PartiallyRefunded => "PARTIALLY_REFUNDED",
            Self::Failed => "FAILED",
            Self::Expired => "EXPIRED",
            Self::DeadlineExpired => "DEADLINE_EXPIRED",
            Self::Processing => "PROCESSING",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INIT" => Ok(Self::Init),
            "NEW" => Ok(Self::New),
            "FORM_SHOWED" => Ok(Self::FormShowed),
            "AUTHORIZING" => Ok(Self::Authorizing),
            "AUTHORIZED" => Ok(Self::Authorized),
            "AUTH_FAIL" => Ok(Self::AuthFail),
            "CONFIRMING" => Ok(Self::Confirming),
            "CONFIRMED" => Ok(Self::Confirmed),
            "COMPLETED" => Ok(Self::Completed),
            "CAPTURED" => Ok(Self::Captured),
            "REJECTED" => Ok(Self::Rejected),
            "CANCELLED" => Ok(Self::Cancelled),
            "REFUNDED" => Ok(Self::Refunded),
            "PARTIALLY_REFUNDED" => Ok(Self::PartiallyRefunded),
            "FAILED" => Ok(Self::Failed),
            "EXPIRED" => Ok(Self::Expired),
            "DEADLINE_EXPIRED" => Ok(Self::DeadlineExpired),
            "PROCESSING" => Ok(Self::Processing),
            other => Err(GatewayError::validation(format!(
                "unknown payment status: {other}"
            ))),
        }
    }
}

/// Resolve the target status for `event` fired on `from`, or
/// `InvalidState` when the edge is not in the table.
pub fn transition(from: PaymentStatus, event: TransitionEvent) -> GatewayResult<PaymentStatus> {
    use PaymentStatus as S;
    use TransitionEvent as E;

    let to = match (from, event) {
        (S::Init, E::Ready) => S::New,
        (S::Init | S::New, E::FormShow) => S::FormShowed,
        (S::FormShowed, E::AuthStart) => S::Authorizing,
        (S::Authorizing, E::AuthOk) => S::Authorized,
        (S::Authorizing | S::FormShowed, E::AuthFail) => S::AuthFail,
        (S::Authorizing | S::FormShowed, E::Reject) => S::Rejected,
        (S::Authorized, E::ConfirmStart) => S::Confirming,
        (S::Confirming, E::ConfirmOk) => S::Confirmed,
        (S::Confirming, E::ConfirmRollback) => S::Authorized,
        (S::Confirmed, E::Capture) => S::Captured,
        (S::Confirmed, E::Complete) => S::Completed,
        (S::New | S::Init, E::Cancel) => S::Cancelled,
        (S::Authorized, E::Reverse) => S::Cancelled,
        (S::Confirmed | S::Captured | S::Completed, E::RefundFull) => S::Refunded,
        (S::Confirmed | S::Captured | S::Completed, E::RefundPartial) => S::PartiallyRefunded,
        (S::PartiallyRefunded, E::RefundRemainder) => S::Refunded,
        (s, E::Expire) if !s.is_terminal() => S::Expired,
        (S::Authorizing | S::Authorized, E::DeadlineExpire) => S::DeadlineExpired,
        (s, e) => {
            return Err(GatewayError::invalid_state(format!(
                "transition {e:?} is not allowed from {s}"
            )))
        }
    };
    Ok(to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use PaymentStatus as S;
    use TransitionEvent as E;

    const ALL_STATUSES: [S; 18] = [
        S::Init,
        S::New,
        S::FormShowed,
        S::Authorizing,
        S::Authorized,
        S::AuthFail,
        S::Confirming,
        S::Confirmed,
        S::Completed,
        S::Captured,
        S::Rejected,
        S::Cancelled,
        S::Refunded,
        S::PartiallyRefunded,
        S::Failed,
        S::Expired,
        S::DeadlineExpired,
        S::Processing,
    ];

    #[test]
    fn happy_path_edges() {
        assert_eq!(transition(S::Init, E::Ready).unwrap(), S::New);
        assert_eq!(transition(S::New, E::FormShow).unwrap(), S::FormShowed);
        assert_eq!(transition(S::FormShowed, E::AuthStart).unwrap(), S::Authorizing);
        assert_eq!(transition(S::Authorizing, E::AuthOk).unwrap(), S::Authorized);
        assert_eq!(transition(S::Authorized, E::ConfirmStart).unwrap(), S::Confirming);
        assert_eq!(transition(S::Confirming, E::ConfirmOk).unwrap(), S::Confirmed);
    }

    #[test]
    fn cancel_branches_by_origin() {
        assert_eq!(transition(S::New, E::Cancel).unwrap(), S::Cancelled);
        assert_eq!(transition(S::Init, E::Cancel).unwrap(), S::Cancelled);
        assert_eq!(transition(S::Authorized, E::Reverse).unwrap(), S::Cancelled);
        assert!(transition(S::Confirmed, E::Cancel).is_err());
        assert!(transition(S::Authorized, E::Cancel).is_err());
    }

    #[test]
    fn refund_branches() {
        for s in [S::Confirmed, S::Captured, S::Completed] {
            assert_eq!(transition(s, E::RefundFull).unwrap(), S::Refunded);
            assert_eq!(transition(s, E::RefundPartial).unwrap(), S::PartiallyRefunded);
        }
        assert_eq!(
            transition(S::PartiallyRefunded, E::RefundRemainder).unwrap(),
            S::Refunded
        );
        assert!(transition(S::Refunded, E::RefundFull).is_err());
    }

    #[test]
    fn terminal_statuses_never_mutate() {
        let terminal = ALL_STATUSES.iter().copied().filter(|s| s.is_terminal());
        for s in terminal {
            // Refund family is the only legal continuation from the
            // captured subset; everything else must be rejected.
            for e in [E::Ready, E::FormShow, E::AuthStart, E::AuthOk, E::ConfirmStart, E::Cancel, E::Expire] {
                assert!(
                    transition(s, e).is_err(),
                    "{s} should reject {e:?}"
                );
            }
        }
    }

    #[test]
    fn expiry_edges() {
        assert_eq!(transition(S::Init, E::Expire).unwrap(), S::Expired);
        assert_eq!(transition(S::New, E::Expire).unwrap(), S::Expired);
        assert_eq!(transition(S::FormShowed, E::Expire).unwrap(), S::Expired);
        assert_eq!(
            transition(S::Authorized, E::DeadlineExpire).unwrap(),
            S::DeadlineExpired
        );
        assert_eq!(
            transition(S::Authorizing, E::DeadlineExpire).unwrap(),
            S::DeadlineExpired
        );
        assert!(transition(S::Confirmed, E::Expire).is_err());
        assert!(transition(S::Cancelled, E::Expire).is_err());
    }

    #[test]
    fn wire_names_round_trip() {
        for s in ALL_STATUSES {
            let parsed: S = s.as_str().parse().unwrap();
            assert_eq!(parsed, s);
            let json = serde_json::to_string(&s).unwrap();
            assert_eq!(json, format!("\"{}\"", s.as_str()));
        }
    }
}
