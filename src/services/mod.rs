//! Engine services.
//!
//! Control flow: the eligibility evaluator gates the issuance service;
//! redemption ingestion invokes the split resolver and appends to the
//! ledger; the payout processor reads balances derived from the ledger.

pub mod eligibility;
pub mod ingestion;
pub mod issuance;
pub mod ledger;
pub mod payout;
pub mod split;

pub use eligibility::{Eligibility, EligibilityEvaluator, IneligibleReason};
pub use ingestion::{FailedEvent, IngestFailure, IngestReport, IngestionEngine};
pub use issuance::{IssuanceService, JoinGrant};
pub use ledger::LedgerService;
pub use payout::PayoutProcessor;
pub use split::{commission, resolve_split};
