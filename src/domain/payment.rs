//! Student payment record, an admin-kept ledger entry.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(ToSchema, Clone, Debug, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub name: String,
    /// Amount in whole currency units.
    pub cost: i64,
    /// Payment date, `YYYY-MM-DD`.
    pub date: String,
}
