//! Payout request documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// Payout delivery method with its method-specific details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PayoutMethod {
    BankTransfer {
        account_number: String,
        routing_number: String,
    },
    Paypal {
        email: String,
    },
    Stripe {
        account_id: String,
    },
    Check {
        mailing_address: String,
    },
}

impl PayoutMethod {
    /// Validate the method-specific details.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidPayoutMethod`] describing the first problem found.
    pub fn validate(&self) -> Result<(), EngineError> {
        let problem = match self {
            PayoutMethod::BankTransfer {
                account_number,
                routing_number,
            } => {
                if account_number.len() < 4 || !account_number.chars().all(|c| c.is_ascii_digit())
                {
                    Some("bank account number must be at least 4 digits")
                } else if routing_number.len() != 9
                    || !routing_number.chars().all(|c| c.is_ascii_digit())
                {
                    Some("routing number must be exactly 9 digits")
                } else {
                    None
                }
            }
            PayoutMethod::Paypal { email } => {
                let domain_has_dot = email
                    .split_once('@')
                    .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'));
                if domain_has_dot {
                    None
                } else {
                    Some("paypal email is not a valid address")
                }
            }
            PayoutMethod::Stripe { account_id } => {
                if account_id.starts_with("acct_") && account_id.len() > 5 {
                    None
                } else {
                    Some("stripe account id must start with 'acct_'")
                }
            }
            PayoutMethod::Check { mailing_address } => {
                if mailing_address.trim().is_empty() {
                    Some("mailing address must not be empty")
                } else {
                    None
                }
            }
        };
        match problem {
            Some(message) => Err(EngineError::InvalidPayoutMethod {
                message: message.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Stable label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            PayoutMethod::BankTransfer { .. } => "bank_transfer",
            PayoutMethod::Paypal { .. } => "paypal",
            PayoutMethod::Stripe { .. } => "stripe",
            PayoutMethod::Check { .. } => "check",
        }
    }
}

/// Payout request lifecycle. Transitions are one-directional; `Paid` and
/// `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    Approved,
    Paid,
    Rejected,
}

impl PayoutStatus {
    /// Whether the requested amount is still locked against the balance.
    pub fn locks_funds(self) -> bool {
        matches!(self, PayoutStatus::Pending | PayoutStatus::Approved)
    }

    /// Whether `self -> to` is a legal transition.
    pub fn can_transition_to(self, to: PayoutStatus) -> bool {
        matches!(
            (self, to),
            (PayoutStatus::Pending, PayoutStatus::Approved)
                | (PayoutStatus::Pending, PayoutStatus::Rejected)
                | (PayoutStatus::Approved, PayoutStatus::Paid)
        )
    }
}

/// A request to withdraw available balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub id: Uuid,
    pub influencer_id: Uuid,
    /// Requested amount, positive minor units.
    pub amount: i64,
    #[serde(flatten)]
    pub method: PayoutMethod,
    pub status: PayoutStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_transfer_validation() {
        assert!(PayoutMethod::BankTransfer {
            account_number: "12345678".into(),
            routing_number: "021000021".into(),
        }
        .validate()
        .is_ok());

        assert!(PayoutMethod::BankTransfer {
            account_number: "12345678".into(),
            routing_number: "123".into(),
        }
        .validate()
        .is_err());

        assert!(PayoutMethod::BankTransfer {
            account_number: "12ab".into(),
            routing_number: "021000021".into(),
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_paypal_validation() {
        assert!(PayoutMethod::Paypal {
            email: "ada@example.com".into()
        }
        .validate()
        .is_ok());
        assert!(PayoutMethod::Paypal {
            email: "not-an-email".into()
        }
        .validate()
        .is_err());
        assert!(PayoutMethod::Paypal {
            email: "@example.com".into()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_stripe_and_check_validation() {
        assert!(PayoutMethod::Stripe {
            account_id: "acct_1ABC".into()
        }
        .validate()
        .is_ok());
        assert!(PayoutMethod::Stripe {
            account_id: "1ABC".into()
        }
        .validate()
        .is_err());
        assert!(PayoutMethod::Check {
            mailing_address: "  ".into()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_transition_rules() {
        use PayoutStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Paid));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Paid.can_transition_to(Rejected));
        assert!(!Approved.can_transition_to(Rejected));
    }

    #[test]
    fn test_locked_funds() {
        assert!(PayoutStatus::Pending.locks_funds());
        assert!(PayoutStatus::Approved.locks_funds());
        assert!(!PayoutStatus::Paid.locks_funds());
        assert!(!PayoutStatus::Rejected.locks_funds());
    }
}
