//! Discount vouchers and the rules deciding whether one may be applied.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use storefront_core::ValueObject;

/// How a voucher reduces the order total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    /// Subtract `amount_off` from the total.
    Amount,
    /// Subtract `percent_off`% of the total.
    Percentage,
}

/// A discount offer, issued by whatever promotion source the caller uses.
///
/// Only one of `amount_off` / `percent_off` is meaningful, selected by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    pub code: String,
    pub kind: DiscountKind,
    pub amount_off: Option<Decimal>,
    pub percent_off: Option<Decimal>,
    pub remaining_quantity: i64,
    pub valid_until: DateTime<Utc>,
    pub is_active: bool,
    pub is_used: bool,
}

impl ValueObject for Voucher {}

impl Voucher {
    /// Active, unused, single-use voucher taking a fixed amount off.
    pub fn fixed_amount(
        code: impl Into<String>,
        amount_off: Decimal,
        valid_until: DateTime<Utc>,
    ) -> Self {
        Self {
            code: code.into(),
            kind: DiscountKind::Amount,
            amount_off: Some(amount_off),
            percent_off: None,
            remaining_quantity: 1,
            valid_until,
            is_active: true,
            is_used: false,
        }
    }

    /// Active, unused, single-use voucher taking a percentage off.
    pub fn percentage(
        code: impl Into<String>,
        percent_off: Decimal,
        valid_until: DateTime<Utc>,
    ) -> Self {
        Self {
            code: code.into(),
            kind: DiscountKind::Percentage,
            amount_off: None,
            percent_off: Some(percent_off),
            remaining_quantity: 1,
            valid_until,
            is_active: true,
            is_used: false,
        }
    }

    /// Discount this voucher grants on `total`, before any flooring.
    ///
    /// `None` when a percentage discount of `total` does not fit a `Decimal`.
    pub fn discount_for(&self, total: Decimal) -> Option<Decimal> {
        match self.kind {
            DiscountKind::Amount => Some(self.amount_off.unwrap_or(Decimal::ZERO)),
            DiscountKind::Percentage => total
                .checked_mul(self.percent_off.unwrap_or(Decimal::ZERO))?
                .checked_div(Decimal::ONE_HUNDRED),
        }
    }

    /// Evaluate every eligibility rule against the current time.
    pub fn check_eligibility(&self) -> VoucherValidation {
        self.check_eligibility_at(Utc::now())
    }

    /// Evaluate every eligibility rule as of `now`.
    ///
    /// Rules never short-circuit: each failing rule contributes one entry, in
    /// rule order.
    pub fn check_eligibility_at(&self, now: DateTime<Utc>) -> VoucherValidation {
        let errors = ELIGIBILITY_RULES
            .iter()
            .filter(|rule| !(rule.check)(self, now))
            .map(|rule| ValidationFailure {
                field: rule.field.to_string(),
                message: rule.message.to_string(),
            })
            .collect();

        VoucherValidation { errors }
    }
}

/// Messages reported by the eligibility rules.
pub mod messages {
    pub const CODE_MISSING: &str = "voucher has no valid code";
    pub const EXPIRED: &str = "this voucher has expired";
    pub const INACTIVE: &str = "this voucher is no longer valid";
    pub const ALREADY_USED: &str = "this voucher has already been used";
    pub const EXHAUSTED: &str = "this voucher is no longer available";
    pub const AMOUNT_NOT_POSITIVE: &str = "discount amount must be greater than 0";
    pub const PERCENT_NOT_POSITIVE: &str = "discount percentage must be greater than 0";
}

struct EligibilityRule {
    field: &'static str,
    message: &'static str,
    check: fn(&Voucher, DateTime<Utc>) -> bool,
}

fn is_positive(value: Option<Decimal>) -> bool {
    value.is_some_and(|v| v > Decimal::ZERO)
}

const ELIGIBILITY_RULES: &[EligibilityRule] = &[
    EligibilityRule {
        field: "code",
        message: messages::CODE_MISSING,
        check: |v, _| !v.code.trim().is_empty(),
    },
    EligibilityRule {
        field: "valid_until",
        message: messages::EXPIRED,
        check: |v, now| v.valid_until >= now,
    },
    EligibilityRule {
        field: "is_active",
        message: messages::INACTIVE,
        check: |v, _| v.is_active,
    },
    EligibilityRule {
        field: "is_used",
        message: messages::ALREADY_USED,
        check: |v, _| !v.is_used,
    },
    EligibilityRule {
        field: "remaining_quantity",
        message: messages::EXHAUSTED,
        check: |v, _| v.remaining_quantity > 0,
    },
    // Kind-specific: only the field selected by `kind` is inspected.
    EligibilityRule {
        field: "amount_off",
        message: messages::AMOUNT_NOT_POSITIVE,
        check: |v, _| v.kind != DiscountKind::Amount || is_positive(v.amount_off),
    },
    EligibilityRule {
        field: "percent_off",
        message: messages::PERCENT_NOT_POSITIVE,
        check: |v, _| v.kind != DiscountKind::Percentage || is_positive(v.percent_off),
    },
];

/// One failed eligibility rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub field: String,
    pub message: String,
}

/// Outcome of an eligibility check. Valid when no rule failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherValidation {
    errors: Vec<ValidationFailure>,
}

impl VoucherValidation {
    pub fn valid() -> Self {
        Self::default()
    }

    /// A result carrying a single failure that did not come from a rule.
    pub fn rejected(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![ValidationFailure {
                field: field.into(),
                message: message.into(),
            }],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationFailure] {
        &self.errors
    }

    pub fn has_error_on(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl core::fmt::Display for VoucherValidation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.errors.is_empty() {
            return f.write_str("valid");
        }
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", e.field, e.message)?;
        }
        Ok(())
    }
}
