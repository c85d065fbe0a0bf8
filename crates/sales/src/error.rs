use rust_decimal::Decimal;
use thiserror::Error;

use storefront_core::{DomainError, ProductId};

use crate::voucher::VoucherValidation;

/// Failures raised by the order aggregate and its line items.
///
/// Every variant aborts only the call that produced it; the order keeps its
/// previous state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("minimum of {min} unit(s) per product, got {actual}")]
    InvalidQuantity { min: i64, actual: i64 },

    #[error("unit price must not be negative, got {0}")]
    InvalidUnitPrice(Decimal),

    #[error("maximum of {max} units per product: {product_id} would reach {requested}")]
    MaxUnitsExceeded {
        product_id: ProductId,
        max: i64,
        requested: i64,
    },

    #[error("order has no item for product {0}")]
    ItemNotFound(ProductId),

    /// Only produced when `ApplyVoucher` is handled directly; `Order::apply_voucher`
    /// reports the same outcome as a returned `VoucherValidation`.
    #[error("voucher is not applicable: {0}")]
    VoucherIneligible(VoucherValidation),

    /// A line value, total or discount would not fit a `Decimal`.
    #[error("order amount out of range: {0}")]
    AmountOverflow(&'static str),

    #[error("order has not been created")]
    NotCreated,

    #[error("order already exists")]
    AlreadyCreated,

    #[error("command targets order {command} but this is order {actual}")]
    OrderMismatch { command: String, actual: String },
}

impl From<OrderError> for DomainError {
    fn from(err: OrderError) -> Self {
        let msg = err.to_string();
        match err {
            OrderError::InvalidQuantity { .. }
            | OrderError::InvalidUnitPrice(_)
            | OrderError::VoucherIneligible(_) => DomainError::validation(msg),
            OrderError::MaxUnitsExceeded { .. }
            | OrderError::AmountOverflow(_)
            | OrderError::OrderMismatch { .. } => DomainError::invariant(msg),
            OrderError::ItemNotFound(_) | OrderError::NotCreated => DomainError::not_found(msg),
            OrderError::AlreadyCreated => DomainError::conflict(msg),
        }
    }
}
