use serde::Deserialize;

use stockmaster_inventory::{Movement, MovementSummary, NewProduct, ProductStock};

// -------------------------
// Request DTOs
// -------------------------

/// `POST /movements`. `product_id` and `kind` arrive as strings so malformed values
/// map to `invalid_id` / `validation_error` instead of a generic JSON rejection.
#[derive(Debug, Deserialize)]
pub struct CreateMovementRequest {
    pub product_id: String,
    pub kind: String,
    pub quantity: i64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub initial_quantity: i64,
    #[serde(default)]
    pub minimum_threshold: i64,
}

impl From<CreateProductRequest> for NewProduct {
    fn from(body: CreateProductRequest) -> Self {
        NewProduct {
            sku: body.sku,
            name: body.name,
            initial_quantity: body.initial_quantity,
            minimum_threshold: body.minimum_threshold,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    /// `YYYY-MM-DD`; today (UTC) when absent.
    pub date: Option<String>,
}

// -------------------------
// Response mapping
// -------------------------

pub fn movement_to_json(m: &Movement) -> serde_json::Value {
    serde_json::json!({
        "id": m.id.value(),
        "product_id": m.product_id.to_string(),
        "kind": m.kind.as_str(),
        "quantity": m.quantity,
        "reason": m.reason,
        "actor": m.actor,
        "occurred_at": m.occurred_at.to_rfc3339(),
        "quantity_after": m.quantity_after,
    })
}

pub fn movements_to_json(items: &[Movement]) -> serde_json::Value {
    serde_json::json!({
        "items": items.iter().map(movement_to_json).collect::<Vec<_>>(),
    })
}

pub fn product_to_json(p: &ProductStock) -> serde_json::Value {
    serde_json::json!({
        "id": p.id.to_string(),
        "sku": p.sku,
        "name": p.name,
        "quantity_on_hand": p.quantity_on_hand,
        "minimum_threshold": p.minimum_threshold,
        "is_low_stock": p.is_low_stock(),
        "created_at": p.created_at.to_rfc3339(),
        "updated_at": p.updated_at.map(|t| t.to_rfc3339()),
    })
}

pub fn stats_to_json(summary: &MovementSummary, month_movement_count: u64) -> serde_json::Value {
    serde_json::json!({
        "date": summary.date.format("%Y-%m-%d").to_string(),
        "movement_count": summary.movement_count,
        "total_inbound_quantity": summary.total_inbound_quantity,
        "total_outbound_quantity": summary.total_outbound_quantity,
        "adjustment_count": summary.adjustment_count,
        "month_movement_count": month_movement_count,
    })
}
