use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use super::catalog::BranchRates;

/// Rounds to cents, halves away from zero.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedModifier {
    pub modifier_id: Uuid,
    pub name: String,
    pub extra_price: Decimal,
}

/// An order line with every price already snapshotted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub menu_item_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub note: Option<String>,
    pub modifiers: Vec<PricedModifier>,
}

impl PricedLine {
    /// `(unit_price + Σ modifier prices) × quantity`. Modifiers apply per unit.
    pub fn line_total(&self) -> Decimal {
        let per_unit: Decimal =
            self.unit_price + self.modifiers.iter().map(|m| m.extra_price).sum::<Decimal>();
        per_unit * Decimal::from(self.quantity)
    }
}

/// Tax and service charge are kept at full precision; only the total is
/// rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceBreakdown {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub service_charge: Decimal,
    pub total: Decimal,
}

impl PriceBreakdown {
    /// Tax as stored and shown on the receipt.
    pub fn tax_cents(&self) -> Decimal {
        round2(self.tax)
    }

    pub fn service_charge_cents(&self) -> Decimal {
        round2(self.service_charge)
    }
}

/// Prices an order: `total = round2(subtotal + tax + service_charge)`, rounded
/// once over the unrounded components.
pub fn price_order(lines: &[PricedLine], rates: BranchRates) -> PriceBreakdown {
    let subtotal: Decimal = lines.iter().map(PricedLine::line_total).sum();
    let tax = subtotal * rates.tax_rate;
    let service_charge = subtotal * rates.service_rate;
    PriceBreakdown {
        subtotal,
        tax,
        service_charge,
        total: round2(subtotal + tax + service_charge),
    }
}
