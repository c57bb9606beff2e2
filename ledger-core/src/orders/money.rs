//! Money calculation utilities using rust_decimal for precision
//!
//! All calculations are done using `Decimal` internally, then converted to
//! `f64` for storage/serialization. The server is the source of truth for
//! totals: client-submitted totals are always discarded and recalculated
//! from line items.

use rust_decimal::prelude::*;

use crate::core::{LedgerError, LedgerResult};
use shared::models::OrderType;

/// Rounding: 2 decimal places, half-up
const DECIMAL_PLACES: u32 = 2;

/// Standard tax rate (14%)
pub const TAX_RATE: Decimal = Decimal::from_parts(14, 0, 0, false, 2);

/// Dine-in service charge rate (12%)
pub const DINE_IN_SERVICE_RATE: Decimal = Decimal::from_parts(12, 0, 0, false, 2);

/// Maximum allowed unit price
const MAX_PRICE: f64 = 1_000_000.0;
/// Maximum allowed quantity per line
const MAX_QUANTITY: i32 = 9999;

/// Derived monetary fields of an order.
///
/// Invariant: `total == (subtotal - discount) + tax + service_charge +
/// delivery_fee`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderTotals {
    pub subtotal: f64,
    pub discount: f64,
    pub tax: f64,
    pub service_charge: f64,
    pub delivery_fee: f64,
    pub total: f64,
}

/// Effective rates of an existing order, used by split/merge to re-derive
/// totals while holding the original rates constant instead of
/// recomputing from policy.
#[derive(Debug, Clone, Copy)]
pub struct RateSet {
    pub discount_rate: Decimal,
    pub tax_rate: Decimal,
    pub service_rate: Decimal,
}

#[inline]
fn require_finite(value: f64, field_name: &str) -> LedgerResult<()> {
    if !value.is_finite() {
        return Err(LedgerError::Validation(format!(
            "{field_name} must be a finite number, got {value}"
        )));
    }
    Ok(())
}

fn decimal(value: f64, field_name: &str) -> LedgerResult<Decimal> {
    require_finite(value, field_name)?;
    Decimal::from_f64(value).ok_or_else(|| {
        LedgerError::Validation(format!("{field_name} is out of range: {value}"))
    })
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Validate one submitted line item.
pub fn validate_line(unit_price: f64, quantity: i32) -> LedgerResult<()> {
    require_finite(unit_price, "unit_price")?;
    if unit_price < 0.0 {
        return Err(LedgerError::Validation(format!(
            "unit_price must be non-negative, got {unit_price}"
        )));
    }
    if unit_price > MAX_PRICE {
        return Err(LedgerError::Validation(format!(
            "unit_price exceeds maximum allowed ({MAX_PRICE}), got {unit_price}"
        )));
    }
    if quantity <= 0 {
        return Err(LedgerError::Validation(format!(
            "quantity must be positive, got {quantity}"
        )));
    }
    if quantity > MAX_QUANTITY {
        return Err(LedgerError::Validation(format!(
            "quantity exceeds maximum allowed ({MAX_QUANTITY}), got {quantity}"
        )));
    }
    Ok(())
}

/// Validate one submitted payment.
pub fn validate_payment(amount: f64) -> LedgerResult<()> {
    require_finite(amount, "payment amount")?;
    if amount <= 0.0 {
        return Err(LedgerError::Validation(format!(
            "payment amount must be positive, got {amount}"
        )));
    }
    if amount > MAX_PRICE {
        return Err(LedgerError::Validation(format!(
            "payment amount exceeds maximum allowed ({MAX_PRICE}), got {amount}"
        )));
    }
    Ok(())
}

/// Rounded line total: `unit_price x quantity`.
pub fn line_total(unit_price: f64, quantity: i32) -> LedgerResult<f64> {
    let price = decimal(unit_price, "unit_price")?;
    Ok(to_f64(round2(price * Decimal::from(quantity))))
}

/// Recompute order totals from line totals.
///
/// Tax is 14% of net (subtotal - discount); the 12% service charge
/// applies to DINE_IN only; the delivery fee is added verbatim.
pub fn compute_totals(
    line_totals: &[f64],
    discount: f64,
    order_type: OrderType,
    delivery_fee: f64,
) -> LedgerResult<OrderTotals> {
    let mut subtotal = Decimal::ZERO;
    for (i, line) in line_totals.iter().enumerate() {
        subtotal += decimal(*line, &format!("line_total[{i}]"))?;
    }
    subtotal = round2(subtotal);

    let discount = round2(decimal(discount, "discount")?);
    if discount < Decimal::ZERO {
        return Err(LedgerError::Validation(format!(
            "discount must be non-negative, got {discount}"
        )));
    }
    if discount > subtotal {
        return Err(LedgerError::Validation(format!(
            "discount ({discount}) exceeds subtotal ({subtotal})"
        )));
    }

    let delivery_fee = round2(decimal(delivery_fee, "delivery_fee")?);
    if delivery_fee < Decimal::ZERO {
        return Err(LedgerError::Validation(format!(
            "delivery_fee must be non-negative, got {delivery_fee}"
        )));
    }

    let net = subtotal - discount;
    let tax = round2(net * TAX_RATE);
    let service_charge = if order_type == OrderType::DineIn {
        round2(net * DINE_IN_SERVICE_RATE)
    } else {
        Decimal::ZERO
    };
    let total = net + tax + service_charge + delivery_fee;

    Ok(OrderTotals {
        subtotal: to_f64(subtotal),
        discount: to_f64(discount),
        tax: to_f64(tax),
        service_charge: to_f64(service_charge),
        delivery_fee: to_f64(delivery_fee),
        total: to_f64(round2(total)),
    })
}

/// Effective rates of an existing order. Zero-valued denominators yield
/// zero rates.
pub fn rates_of(subtotal: f64, discount: f64, tax: f64, service_charge: f64) -> RateSet {
    let subtotal = Decimal::from_f64(subtotal).unwrap_or(Decimal::ZERO);
    let discount = Decimal::from_f64(discount).unwrap_or(Decimal::ZERO);
    let net = subtotal - discount;

    let discount_rate = if subtotal > Decimal::ZERO {
        discount / subtotal
    } else {
        Decimal::ZERO
    };
    let (tax_rate, service_rate) = if net > Decimal::ZERO {
        (
            Decimal::from_f64(tax).unwrap_or(Decimal::ZERO) / net,
            Decimal::from_f64(service_charge).unwrap_or(Decimal::ZERO) / net,
        )
    } else {
        (TAX_RATE, Decimal::ZERO)
    };

    RateSet {
        discount_rate,
        tax_rate,
        service_rate,
    }
}

/// Re-derive totals for a new subtotal while holding an order's original
/// rates constant (split/merge proportional allocation).
pub fn totals_with_rates(
    line_totals: &[f64],
    rates: RateSet,
    delivery_fee: f64,
) -> LedgerResult<OrderTotals> {
    let mut subtotal = Decimal::ZERO;
    for (i, line) in line_totals.iter().enumerate() {
        subtotal += decimal(*line, &format!("line_total[{i}]"))?;
    }
    subtotal = round2(subtotal);

    let discount = round2(subtotal * rates.discount_rate);
    let net = subtotal - discount;
    let tax = round2(net * rates.tax_rate);
    let service_charge = round2(net * rates.service_rate);
    let delivery_fee = round2(decimal(delivery_fee, "delivery_fee")?);
    let total = net + tax + service_charge + delivery_fee;

    Ok(OrderTotals {
        subtotal: to_f64(subtotal),
        discount: to_f64(discount),
        tax: to_f64(tax),
        service_charge: to_f64(service_charge),
        delivery_fee: to_f64(delivery_fee),
        total: to_f64(round2(total)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dine_in_totals_scenario() {
        // 2 x 10.00 DINE_IN: subtotal 20.00, tax 2.80, service 2.40, total 25.20
        let line = line_total(10.0, 2).unwrap();
        let totals = compute_totals(&[line], 0.0, OrderType::DineIn, 0.0).unwrap();
        assert_eq!(totals.subtotal, 20.0);
        assert_eq!(totals.tax, 2.8);
        assert_eq!(totals.service_charge, 2.4);
        assert_eq!(totals.delivery_fee, 0.0);
        assert_eq!(totals.total, 25.2);
    }

    #[test]
    fn invariant_holds_with_discount_and_delivery() {
        let totals =
            compute_totals(&[30.0, 12.5], 5.0, OrderType::Delivery, 3.0).unwrap();
        assert_eq!(totals.subtotal, 42.5);
        assert_eq!(totals.discount, 5.0);
        // No service charge outside DINE_IN
        assert_eq!(totals.service_charge, 0.0);
        let expected =
            (totals.subtotal - totals.discount) + totals.tax + totals.service_charge
                + totals.delivery_fee;
        assert!((totals.total - expected).abs() < 0.005);
    }

    #[test]
    fn discount_cannot_exceed_subtotal() {
        let err = compute_totals(&[10.0], 11.0, OrderType::Pickup, 0.0).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn line_validation_bounds() {
        assert!(validate_line(10.0, 1).is_ok());
        assert!(validate_line(-1.0, 1).is_err());
        assert!(validate_line(10.0, 0).is_err());
        assert!(validate_line(f64::NAN, 1).is_err());
        assert!(validate_line(10.0, 10_000).is_err());
    }

    #[test]
    fn rates_round_trip_preserves_proportions() {
        let original = compute_totals(&[50.0], 10.0, OrderType::DineIn, 0.0).unwrap();
        let rates = rates_of(
            original.subtotal,
            original.discount,
            original.tax,
            original.service_charge,
        );
        // Half the items keep half of everything.
        let half = totals_with_rates(&[25.0], rates, 0.0).unwrap();
        assert_eq!(half.subtotal, 25.0);
        assert_eq!(half.discount, 5.0);
        assert_eq!(half.tax, original.tax / 2.0);
        assert_eq!(half.service_charge, original.service_charge / 2.0);
    }
}
