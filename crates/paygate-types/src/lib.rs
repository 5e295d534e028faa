//! Paygate domain types
//!
//! Foundation crate shared by every other paygate crate. Contains the
//! payment aggregate and its status machine, team/merchant records,
//! per-adapter-call transactions, the audit entry shape, the gateway
//! error taxonomy with its four-digit wire codes, and the clock/ID
//! primitives the rest of the system is built on.

pub mod audit;
pub mod clock;
pub mod currency;
pub mod error;
pub mod id;
pub mod payment;
pub mod status;
pub mod team;
pub mod transaction;

pub use audit::{AuditEntry, AuditOutcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use currency::Currency;
pub use error::{GatewayError, GatewayResult, OpFamily};
pub use id::{new_payment_id, new_request_id};
pub use payment::Payment;
pub use status::{PaymentStatus, TransitionEvent};
pub use team::{FeeConfig, Team, TeamFeatures, TeamLimits};
pub use transaction::{Transaction, TransactionStatus, TransactionType};
