//! Refund detail submission.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tote_core::OrderId;

use crate::gateway::GatewayError;

/// Where a refund for a cancelled order should be paid.
///
/// Either a UPI ID or bank account details are expected; the backend decides
/// which combinations it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundDetails {
    pub order_id: OrderId,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upi_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ifsc_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
}

/// Errors from submitting refund details.
#[derive(Debug, Error)]
pub enum RefundError {
    /// Details for this order were already submitted (HTTP 409).
    #[error("refund details already submitted for order {0}")]
    AlreadySubmitted(OrderId),

    /// Neither a UPI ID nor an account number was given.
    #[error("refund details need a UPI ID or a bank account number")]
    MissingPayoutMethod,

    /// Any other gateway failure.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl RefundDetails {
    /// Check the payout method before sending.
    ///
    /// # Errors
    ///
    /// Returns `RefundError::MissingPayoutMethod` if no payout target is set.
    pub fn validate(&self) -> Result<(), RefundError> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        if present(&self.upi_id) || present(&self.account_number) {
            Ok(())
        } else {
            Err(RefundError::MissingPayoutMethod)
        }
    }
}
