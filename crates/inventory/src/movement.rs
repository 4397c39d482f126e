use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockmaster_core::{DomainError, DomainResult, Entity, MovementId, ProductId};

/// Maximum length of a movement's free-text reason.
pub const MAX_REASON_LEN: usize = 500;

/// Maximum length of the actor identifier recorded with a movement.
pub const MAX_ACTOR_LEN: usize = 100;

/// Kind of stock-changing event.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Additive increase (goods received).
    Inbound,
    /// Additive decrease (goods shipped); subject to the no-negative-stock rule.
    Outbound,
    /// Absolute overwrite (stock count correction).
    Adjustment,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Inbound => "inbound",
            MovementKind::Outbound => "outbound",
            MovementKind::Adjustment => "adjustment",
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inbound" => Ok(MovementKind::Inbound),
            "outbound" => Ok(MovementKind::Outbound),
            "adjustment" => Ok(MovementKind::Adjustment),
            _ => Err(DomainError::validation(
                "kind must be one of: inbound, outbound, adjustment",
            )),
        }
    }
}

/// The effect a validated movement has on a product's stock pool.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StockEffect {
    /// Add `delta` (negative for outbound) to the current quantity.
    Delta(i64),
    /// Overwrite the current quantity.
    SetTo(i64),
}

impl StockEffect {
    /// Resolve the quantity this effect produces when applied to `current`.
    ///
    /// `Delta` is subject to the no-negative-stock rule; `SetTo` is a correction and
    /// never fails for insufficient stock.
    pub fn resolve(self, current: i64) -> DomainResult<i64> {
        match self {
            StockEffect::Delta(delta) => checked_apply(current, delta, 0),
            StockEffect::SetTo(quantity) if quantity < 0 => Err(DomainError::validation(
                "stock quantity cannot be negative",
            )),
            StockEffect::SetTo(quantity) => Ok(quantity),
        }
    }
}

/// `current + delta`, rejected if the result would fall below `minimum_result`.
///
/// The rejection carries `current` as the available quantity so callers can display
/// it. Overflow is a validation failure, not a wrap.
pub fn checked_apply(current: i64, delta: i64, minimum_result: i64) -> DomainResult<i64> {
    let next = current
        .checked_add(delta)
        .ok_or_else(|| DomainError::validation("stock quantity overflow"))?;
    if next < minimum_result {
        return Err(DomainError::insufficient_stock(
            current,
            delta.saturating_neg(),
        ));
    }
    Ok(next)
}

/// Command: submit a movement against a product's stock pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRequest {
    pub product_id: ProductId,
    pub kind: MovementKind,
    pub quantity: i64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
}

impl MovementRequest {
    pub fn new(product_id: ProductId, kind: MovementKind, quantity: i64) -> Self {
        Self {
            product_id,
            kind,
            quantity,
            reason: None,
            actor: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Validate the request and compute its stock effect.
    ///
    /// This is the pure part of the ledger pipeline: it never looks at current stock.
    /// `default_actor` is recorded when the caller did not identify itself.
    pub fn plan(self, default_actor: &str) -> DomainResult<MovementPlan> {
        let effect = match self.kind {
            MovementKind::Inbound | MovementKind::Outbound if self.quantity <= 0 => {
                return Err(DomainError::validation(format!(
                    "quantity must be greater than zero for {} movements",
                    self.kind
                )));
            }
            MovementKind::Inbound => StockEffect::Delta(self.quantity),
            MovementKind::Outbound => StockEffect::Delta(-self.quantity),
            MovementKind::Adjustment if self.quantity < 0 => {
                return Err(DomainError::validation(
                    "adjustment quantity cannot be negative",
                ));
            }
            MovementKind::Adjustment => StockEffect::SetTo(self.quantity),
        };

        let reason = match self.reason.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(r) if r.chars().count() > MAX_REASON_LEN => {
                return Err(DomainError::validation(format!(
                    "reason cannot exceed {MAX_REASON_LEN} characters"
                )));
            }
            Some(r) => Some(r.to_string()),
        };

        let actor = match self.actor.as_deref().map(str::trim) {
            None | Some("") => default_actor.to_string(),
            Some(a) if a.chars().count() > MAX_ACTOR_LEN => {
                return Err(DomainError::validation(format!(
                    "actor cannot exceed {MAX_ACTOR_LEN} characters"
                )));
            }
            Some(a) => a.to_string(),
        };

        Ok(MovementPlan {
            product_id: self.product_id,
            kind: self.kind,
            quantity: self.quantity,
            effect,
            reason,
            actor,
        })
    }
}

/// A validated movement request with its resolved effect, not yet timestamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementPlan {
    pub product_id: ProductId,
    pub kind: MovementKind,
    pub quantity: i64,
    pub effect: StockEffect,
    pub reason: Option<String>,
    pub actor: String,
}

impl MovementPlan {
    pub fn into_draft(self, occurred_at: DateTime<Utc>) -> MovementDraft {
        MovementDraft {
            product_id: self.product_id,
            kind: self.kind,
            quantity: self.quantity,
            reason: self.reason,
            actor: self.actor,
            occurred_at,
        }
    }
}

/// A movement ready to be appended (not yet assigned an id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementDraft {
    pub product_id: ProductId,
    pub kind: MovementKind,
    pub quantity: i64,
    pub reason: Option<String>,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
}

impl MovementDraft {
    pub fn into_movement(self, id: MovementId, quantity_after: i64) -> Movement {
        Movement {
            id,
            product_id: self.product_id,
            kind: self.kind,
            quantity: self.quantity,
            reason: self.reason,
            actor: self.actor,
            occurred_at: self.occurred_at,
            quantity_after,
        }
    }
}

/// Immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub kind: MovementKind,
    /// Delta magnitude for inbound/outbound, absolute target for adjustment.
    pub quantity: i64,
    pub reason: Option<String>,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
    /// Quantity on hand right after this movement was applied.
    pub quantity_after: i64,
}

impl Entity for Movement {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Newest first: `occurred_at` descending, ties broken by id descending.
pub fn newest_first(a: &Movement, b: &Movement) -> core::cmp::Ordering {
    b.occurred_at
        .cmp(&a.occurred_at)
        .then_with(|| b.id.cmp(&a.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_product_id() -> ProductId {
        ProductId::new()
    }

    fn plan(kind: MovementKind, quantity: i64) -> DomainResult<MovementPlan> {
        MovementRequest::new(test_product_id(), kind, quantity).plan("system")
    }

    #[test]
    fn inbound_plans_positive_delta() {
        let p = plan(MovementKind::Inbound, 10).unwrap();
        assert_eq!(p.effect, StockEffect::Delta(10));
        assert_eq!(p.actor, "system");
        assert_eq!(p.reason, None);
    }

    #[test]
    fn outbound_plans_negative_delta() {
        let p = plan(MovementKind::Outbound, 4).unwrap();
        assert_eq!(p.effect, StockEffect::Delta(-4));
    }

    #[test]
    fn zero_or_negative_flow_quantities_are_rejected() {
        for kind in [MovementKind::Inbound, MovementKind::Outbound] {
            for quantity in [0, -1] {
                let err = plan(kind, quantity).unwrap_err();
                assert!(matches!(err, DomainError::Validation(_)), "{kind} {quantity}");
            }
        }
    }

    #[test]
    fn adjustment_accepts_zero_but_not_negative() {
        assert_eq!(
            plan(MovementKind::Adjustment, 0).unwrap().effect,
            StockEffect::SetTo(0)
        );
        assert!(matches!(
            plan(MovementKind::Adjustment, -3),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn reason_and_actor_are_normalized() {
        let p = MovementRequest::new(test_product_id(), MovementKind::Inbound, 1)
            .with_reason("   ")
            .with_actor("  warehouse-7 ")
            .plan("system")
            .unwrap();
        assert_eq!(p.reason, None);
        assert_eq!(p.actor, "warehouse-7");
    }

    #[test]
    fn oversized_reason_is_rejected() {
        let err = MovementRequest::new(test_product_id(), MovementKind::Inbound, 1)
            .with_reason("x".repeat(MAX_REASON_LEN + 1))
            .plan("system")
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("reason")));
    }

    #[test]
    fn outbound_beyond_stock_reports_available_quantity() {
        let err = StockEffect::Delta(-30).resolve(25).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(25, 30));
    }

    #[test]
    fn adjustment_ignores_current_quantity() {
        assert_eq!(StockEffect::SetTo(0).resolve(25).unwrap(), 0);
        assert_eq!(StockEffect::SetTo(90).resolve(0).unwrap(), 90);
    }

    #[test]
    fn overflow_is_a_validation_failure() {
        let err = checked_apply(i64::MAX, 1, 0).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("Outbound".parse::<MovementKind>().unwrap(), MovementKind::Outbound);
        assert!("transfer".parse::<MovementKind>().is_err());
        assert_eq!(
            serde_json::to_value(MovementKind::Adjustment).unwrap(),
            serde_json::json!("adjustment")
        );
    }

    #[test]
    fn example_scenario_against_pure_rules() {
        let mut stock = 15;
        stock = StockEffect::Delta(10).resolve(stock).unwrap();
        assert_eq!(stock, 25);
        assert!(StockEffect::Delta(-30).resolve(stock).is_err());
        stock = StockEffect::SetTo(0).resolve(stock).unwrap();
        assert_eq!(stock, 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: replaying any sequence of inbound/outbound movements yields the
        /// initial quantity plus the sum of accepted signed effects, and no prefix
        /// ever goes negative.
        #[test]
        fn replay_never_goes_negative(
            initial in 0i64..1_000,
            steps in prop::collection::vec((any::<bool>(), 1i64..500), 0..64)
        ) {
            let mut stock = initial;
            let mut accepted_sum = 0i64;

            for (inbound, quantity) in steps {
                let kind = if inbound { MovementKind::Inbound } else { MovementKind::Outbound };
                let plan = MovementRequest::new(test_product_id(), kind, quantity)
                    .plan("system")
                    .unwrap();

                match plan.effect.resolve(stock) {
                    Ok(next) => {
                        let StockEffect::Delta(delta) = plan.effect else {
                            unreachable!("flow kinds always plan a delta")
                        };
                        accepted_sum += delta;
                        stock = next;
                    }
                    Err(DomainError::InsufficientStock { available, requested }) => {
                        prop_assert_eq!(available, stock);
                        prop_assert_eq!(requested, quantity);
                        prop_assert!(!inbound);
                    }
                    Err(other) => prop_assert!(false, "unexpected error {other:?}"),
                }
                prop_assert!(stock >= 0);
            }

            prop_assert_eq!(stock, initial + accepted_sum);
        }
    }
}
