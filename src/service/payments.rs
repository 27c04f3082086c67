//! Student payment ledger. Admins record amounts and read them back by
//! month; nothing else touches the collection.

use chrono::NaiveDate;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::lessons::month_key_regex;
use crate::domain::Payment;
use crate::error::ApiError;
use crate::store::PaymentStore;

#[derive(ToSchema, Clone, Debug, serde::Deserialize)]
pub struct RecordPayment {
    pub name: String,
    pub cost: i64,
    /// Payment date, `YYYY-MM-DD`.
    pub date: String,
}

pub struct PaymentService {
    payments: Arc<dyn PaymentStore>,
}

impl PaymentService {
    pub fn new(payments: Arc<dyn PaymentStore>) -> Self {
        Self { payments }
    }

    pub async fn add(&self, payload: RecordPayment) -> Result<Uuid, ApiError> {
        let name = payload.name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::Validation("Name must not be empty".to_string()));
        }
        NaiveDate::parse_from_str(&payload.date, "%Y-%m-%d").map_err(|_| {
            ApiError::Validation("Invalid date format. Use YYYY-MM-DD".to_string())
        })?;

        let payment = Payment {
            id: Uuid::new_v4(),
            name,
            cost: payload.cost,
            date: payload.date,
        };
        Ok(self.payments.insert(payment).await?)
    }

    /// Payments recorded in a `YYYY-MM` month, date-ordered.
    pub async fn in_month(&self, month: &str) -> Result<Vec<Payment>, ApiError> {
        if !month_key_regex().is_match(month) {
            return Err(ApiError::Validation(
                "Invalid month format. Use YYYY-MM".to_string(),
            ));
        }
        Ok(self.payments.list_in_month(month).await?)
    }
}
