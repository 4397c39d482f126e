//! Product stock snapshot and product registration input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockmaster_core::{DomainError, DomainResult, Entity, ProductId};

/// What the ledger needs to know about a product: identity, stock pool, threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStock {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub quantity_on_hand: i64,
    pub minimum_threshold: i64,
    pub created_at: DateTime<Utc>,
    /// Set by the last stock mutation; `None` until the first movement.
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProductStock {
    /// Low-stock classification: at or below the minimum threshold.
    pub fn is_low_stock(&self) -> bool {
        self.quantity_on_hand <= self.minimum_threshold
    }
}

impl Entity for ProductStock {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Command: register a product with its initial stock pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub initial_quantity: i64,
    #[serde(default)]
    pub minimum_threshold: i64,
}

impl NewProduct {
    /// Validate and normalize (trimmed SKU and name).
    pub fn validate(self) -> DomainResult<Self> {
        let sku = self.sku.trim().to_string();
        let name = self.name.trim().to_string();

        if sku.is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if sku.chars().count() > 50 {
            return Err(DomainError::validation("sku cannot exceed 50 characters"));
        }
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if name.chars().count() > 200 {
            return Err(DomainError::validation("name cannot exceed 200 characters"));
        }
        if self.initial_quantity < 0 {
            return Err(DomainError::validation("initial quantity cannot be negative"));
        }
        if self.minimum_threshold < 0 {
            return Err(DomainError::validation("minimum threshold cannot be negative"));
        }

        Ok(Self {
            sku,
            name,
            initial_quantity: self.initial_quantity,
            minimum_threshold: self.minimum_threshold,
        })
    }

    pub fn into_stock(self, id: ProductId, created_at: DateTime<Utc>) -> ProductStock {
        ProductStock {
            id,
            sku: self.sku,
            name: self.name,
            quantity_on_hand: self.initial_quantity,
            minimum_threshold: self.minimum_threshold,
            created_at,
            updated_at: None,
        }
    }
}
