use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote collections a queued mutation can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Merchants,
    Transactions,
    Invoices,
    CustomerCredits,
    StockMovements,
    Entities,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Merchants,
        EntityKind::Transactions,
        EntityKind::Invoices,
        EntityKind::CustomerCredits,
        EntityKind::StockMovements,
        EntityKind::Entities,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Merchants => "merchants",
            EntityKind::Transactions => "transactions",
            EntityKind::Invoices => "invoices",
            EntityKind::CustomerCredits => "customer_credits",
            EntityKind::StockMovements => "stock_movements",
            EntityKind::Entities => "entities",
        }
    }

    /// リモート側のテーブル名
    pub fn collection(&self) -> &'static str {
        self.as_str()
    }

    pub fn from_value(value: &str) -> Result<Self, String> {
        match value.trim() {
            "merchants" => Ok(EntityKind::Merchants),
            "transactions" => Ok(EntityKind::Transactions),
            "invoices" => Ok(EntityKind::Invoices),
            "customer_credits" => Ok(EntityKind::CustomerCredits),
            "stock_movements" => Ok(EntityKind::StockMovements),
            "entities" => Ok(EntityKind::Entities),
            other => Err(format!("Unknown entity kind: {other}")),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
