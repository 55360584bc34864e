use shared_models::error::AppError;

use crate::models::{DiscountType, VisitError, VisitServiceLine};

/// Money fields of a visit, derived from its lines, discount and the doctor's share.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitCharge {
    pub lines: Vec<VisitServiceLine>,
    pub subtotal: f64,
    pub discount_amount: f64,
    pub total: f64,
    pub doctor_earning: f64,
}

/// Recomputes every derived amount. Client-sent subtotals are ignored and the
/// discount is clamped into `[0, subtotal]`.
pub fn calculate(
    mut lines: Vec<VisitServiceLine>,
    discount_type: DiscountType,
    discount_value: f64,
    doctor_share: f64,
) -> VisitCharge {
    for line in &mut lines {
        line.subtotal = round2(line.price * f64::from(line.quantity));
    }
    let subtotal = round2(lines.iter().map(|line| line.subtotal).sum());

    let raw_discount = match discount_type {
        DiscountType::None => 0.0,
        DiscountType::Percentage => subtotal * discount_value / 100.0,
        DiscountType::Fixed => discount_value,
    };
    let discount_amount = round2(raw_discount.clamp(0.0, subtotal.max(0.0)));

    let total = round2((subtotal - discount_amount).max(0.0));
    let doctor_earning = round2(total * doctor_share / 100.0);

    VisitCharge {
        lines,
        subtotal,
        discount_amount,
        total,
        doctor_earning,
    }
}

/// Bounds enforced when a visit is completed, before anything is written.
pub fn validate_discount(subtotal: f64, discount_type: DiscountType, discount_value: f64) -> Result<(), VisitError> {
    if discount_value < 0.0 || !discount_value.is_finite() {
        return Err(AppError::ValidationError("Discount value must not be negative".to_string()).into());
    }

    match discount_type {
        DiscountType::Fixed if discount_value > subtotal => {
            Err(VisitError::InvalidDiscount("Discount cannot exceed subtotal"))
        }
        DiscountType::Percentage if discount_value > 100.0 => {
            Err(VisitError::InvalidDiscount("Percentage discount cannot exceed 100%"))
        }
        _ => Ok(()),
    }
}

pub fn lines_subtotal(lines: &[VisitServiceLine]) -> f64 {
    round2(lines.iter().map(|line| line.price * f64::from(line.quantity)).sum())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
