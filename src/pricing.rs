//! Purchase totals and trade assembly.
//!
//! Consumption tax is a flat 10% of the pre-tax subtotal, rounded down, and is
//! applied once per trade rather than per line.

use crate::models::product::Product;
use crate::models::trade::{NewTrade, NewTradeDetail, PurchaseItem, PurchaseRequest};

pub const TAX_RATE_DIVISOR: i64 = 10;
pub const TAX_CODE: &str = "10";

pub const DEFAULT_CASHIER_CODE: &str = "9999999999";
pub const DEFAULT_STORE_CODE: &str = "30";
/// Mobile register.
pub const DEFAULT_POS_NO: &str = "90";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("items[{line}].product_code must not be blank")]
    BlankCode { line: usize },

    #[error("items[{line}].quantity must be at least 1, got {quantity}")]
    InvalidQuantity { line: usize, quantity: i64 },

    #[error("items[{line}].unit_price must not be negative, got {price}")]
    NegativePrice { line: usize, price: i64 },

    #[error("purchase amount overflows")]
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseTotals {
    pub subtotal: i64,
    pub tax: i64,
    pub total: i64,
}

impl PurchaseTotals {
    pub fn from_subtotal(subtotal: i64) -> Result<Self, PricingError> {
        let tax = tax_of(subtotal);
        let total = subtotal.checked_add(tax).ok_or(PricingError::Overflow)?;
        Ok(Self {
            subtotal,
            tax,
            total,
        })
    }
}

pub fn tax_of(subtotal: i64) -> i64 {
    subtotal.div_euclid(TAX_RATE_DIVISOR)
}

fn or_default(value: Option<&str>, default: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

pub fn validate_items(items: &[PurchaseItem]) -> Result<(), PricingError> {
    for (line, item) in items.iter().enumerate() {
        if item.product_code.trim().is_empty() {
            return Err(PricingError::BlankCode { line });
        }
        if item.quantity < 1 {
            return Err(PricingError::InvalidQuantity {
                line,
                quantity: item.quantity,
            });
        }
        if let Some(price) = item.unit_price.filter(|p| *p < 0) {
            return Err(PricingError::NegativePrice { line, price });
        }
    }
    Ok(())
}

/// Price every line and assemble the trade.
///
/// `catalogue[i]` is the catalogue entry for `items[i]`, if any. An explicit
/// `unit_price` wins over the catalogue price; unknown products price at 0
/// unless one is given, and keep their code as the line name.
pub fn build_trade(
    req: &PurchaseRequest,
    items: &[PurchaseItem],
    catalogue: &[Option<Product>],
    datetime: String,
) -> Result<(NewTrade, PurchaseTotals), PricingError> {
    validate_items(items)?;

    let mut subtotal: i64 = 0;
    let mut details = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let code = item.product_code.trim();
        let product = catalogue.get(idx).and_then(Option::as_ref);
        let unit_price = item
            .unit_price
            .or_else(|| product.map(|p| p.price))
            .unwrap_or(0);

        let line_amount = unit_price
            .checked_mul(item.quantity)
            .ok_or(PricingError::Overflow)?;
        subtotal = subtotal
            .checked_add(line_amount)
            .ok_or(PricingError::Overflow)?;

        details.push(NewTradeDetail {
            line_no: idx as i64 + 1,
            prd_id: product.map(|p| p.id),
            prd_code: code.to_string(),
            prd_name: product.map_or_else(|| code.to_string(), |p| p.name.clone()),
            prd_price: unit_price,
            tax_cd: TAX_CODE.to_string(),
            qty: item.quantity,
        });
    }

    let totals = PurchaseTotals::from_subtotal(subtotal)?;
    let trade = NewTrade {
        datetime,
        emp_cd: or_default(req.cashier_code.as_deref(), DEFAULT_CASHIER_CODE),
        store_cd: or_default(req.store_code.as_deref(), DEFAULT_STORE_CODE),
        pos_no: or_default(req.pos_id.as_deref(), DEFAULT_POS_NO),
        subtotal: totals.subtotal,
        total: totals.total,
        details,
    };
    Ok((trade, totals))
}
