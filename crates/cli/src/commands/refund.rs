//! Refund detail submission for cancelled orders.
//!
//! # Usage
//!
//! ```bash
//! tote refund submit --order-id 1042 --full-name "Ann Lee" --upi-id ann@upi
//! tote refund submit --order-id 1042 --full-name "Ann Lee" \
//!     --account-number 001234567890 --ifsc-code HDFC0000123 --bank-name HDFC
//! ```

use tote_client::ToteClient;
use tote_client::api::{RefundDetails, RefundError};

use crate::error::CliError;

/// Submit `details`. A repeat submission is reported, not treated as failure.
pub async fn submit(client: &ToteClient, details: RefundDetails) -> Result<(), CliError> {
    match client.api().submit_refund_details(&details).await {
        Ok(_) => {
            tracing::info!(order_id = %details.order_id, "Refund details submitted");
            Ok(())
        }
        Err(RefundError::AlreadySubmitted(order_id)) => {
            tracing::warn!(%order_id, "Refund details were already submitted for this order");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
