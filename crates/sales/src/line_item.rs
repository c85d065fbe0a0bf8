use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use storefront_core::{Entity, ProductId};

use crate::error::OrderError;

/// Fewest units a single order line may carry.
pub const MIN_UNITS_PER_ITEM: i64 = 1;

/// Most units of one product a single order may carry.
pub const MAX_UNITS_PER_ITEM: i64 = 15;

/// One product line on an order.
///
/// Identified by `product_id`; the order holds at most one line per product and
/// swaps the whole line out whenever its quantity changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    product_id: ProductId,
    name: String,
    quantity: i64,
    unit_price: Decimal,
}

impl LineItem {
    /// Build a line, rejecting quantities below [`MIN_UNITS_PER_ITEM`].
    ///
    /// The upper bound depends on what the order already holds for this
    /// product, so it is checked by the order, not here.
    pub fn new(
        product_id: ProductId,
        name: impl Into<String>,
        quantity: i64,
        unit_price: Decimal,
    ) -> Result<Self, OrderError> {
        if quantity < MIN_UNITS_PER_ITEM {
            return Err(OrderError::InvalidQuantity {
                min: MIN_UNITS_PER_ITEM,
                actual: quantity,
            });
        }
        if unit_price < Decimal::ZERO {
            return Err(OrderError::InvalidUnitPrice(unit_price));
        }

        Ok(Self {
            product_id,
            name: name.into(),
            quantity,
            unit_price,
        })
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    /// `quantity × unit_price`, saturating at `Decimal::MAX`.
    pub fn line_value(&self) -> Decimal {
        Decimal::from(self.quantity).saturating_mul(self.unit_price)
    }

    /// `quantity × unit_price`, or `None` when it does not fit a `Decimal`.
    pub fn checked_line_value(&self) -> Option<Decimal> {
        Decimal::from(self.quantity).checked_mul(self.unit_price)
    }

    /// Saturating; the order validates the projected quantity first.
    pub(crate) fn increase_quantity(&mut self, delta: i64) {
        self.quantity = self.quantity.saturating_add(delta);
    }
}

impl Entity for LineItem {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.product_id
    }
}
