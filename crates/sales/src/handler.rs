//! Application-level orchestration for order commands.
//!
//! ```text
//! AddOrderItem
//!   ↓
//! 1. Load the customer's order (or start a new draft)
//!   ↓
//! 2. Execute AddItem on the aggregate (pure, may be rejected)
//!   ↓
//! 3. Register the order / line with the repository
//!   ↓
//! 4. Commit the unit of work
//! ```
//!
//! Rejections are published as [`DomainNotification`]s on the injected bus
//! before being returned to the caller.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_core::{CustomerId, ProductId};
use storefront_events::{Event, EventBus, execute};

use crate::error::OrderError;
use crate::line_item::LineItem;
use crate::order::{AddItem, Order, OrderCommand, OrderId};

/// Commits everything registered with a repository in one go.
pub trait UnitOfWork {
    /// Returns whether the changes were persisted.
    fn commit(&self) -> bool;
}

/// Persistence port for orders.
///
/// Registration calls only stage changes; nothing is durable until
/// [`UnitOfWork::commit`] succeeds. Implementations are expected to guard
/// concurrent commits for the same customer (optimistic or pessimistic).
pub trait OrderRepository {
    type UnitOfWork: UnitOfWork;

    fn find_by_customer(&self, customer_id: CustomerId) -> anyhow::Result<Option<Order>>;

    /// Stage a newly created order.
    fn add(&self, order: &Order);

    /// Stage changes to an existing order.
    fn update(&self, order: &Order);

    /// Stage a line that is new to `order_id`.
    fn add_item(&self, order_id: OrderId, item: &LineItem);

    /// Stage a line whose quantity changed on `order_id`.
    fn update_item(&self, order_id: OrderId, item: &LineItem);

    fn unit_of_work(&self) -> &Self::UnitOfWork;
}

/// Command: add a product to the customer's current draft order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOrderItem {
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Decimal,
}

impl AddOrderItem {
    pub const MESSAGE_TYPE: &'static str = "AddOrderItem";
}

/// User-facing notice that a command was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainNotification {
    pub key: String,
    pub message: String,
}

impl DomainNotification {
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Domain(#[from] OrderError),

    #[error("order repository failure: {0}")]
    Repository(#[from] anyhow::Error),
}

/// Handles order commands against a repository, publishing rejections.
pub struct OrderCommandHandler<R, B> {
    repository: R,
    notifications: B,
}

impl<R, B> OrderCommandHandler<R, B>
where
    R: OrderRepository,
    B: EventBus<DomainNotification>,
{
    pub fn new(repository: R, notifications: B) -> Self {
        Self {
            repository,
            notifications,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Add an item to the customer's draft order, creating one if needed.
    ///
    /// Returns the unit-of-work commit result.
    pub fn handle_add_item(&self, cmd: AddOrderItem) -> Result<bool, HandlerError> {
        let item = LineItem::new(cmd.product_id, cmd.name.clone(), cmd.quantity, cmd.unit_price)
            .map_err(|e| self.reject(&cmd, e))?;

        let (mut order, is_new_order) = match self.repository.find_by_customer(cmd.customer_id)? {
            Some(order) => (order, false),
            None => (Order::new_draft(cmd.customer_id), true),
        };
        let item_existed = order.contains_item(cmd.product_id);

        let add = OrderCommand::AddItem(AddItem {
            order_id: order.id_typed(),
            item: item.clone(),
            occurred_at: Utc::now(),
        });
        let events = execute(&mut order, &add).map_err(|e| self.reject(&cmd, e))?;
        for event in events {
            tracing::debug!(
                stream = event.stream(),
                event_type = event.event_type(),
                "order event recorded"
            );
            order.record_event(event);
        }

        if is_new_order {
            self.repository.add(&order);
        } else {
            match order.item(cmd.product_id) {
                Some(merged) if item_existed => {
                    self.repository.update_item(order.id_typed(), merged)
                }
                _ => self.repository.add_item(order.id_typed(), &item),
            }
            self.repository.update(&order);
        }

        tracing::info!(
            customer_id = %cmd.customer_id,
            order_id = %order.id_typed(),
            product_id = %cmd.product_id,
            quantity = cmd.quantity,
            new_order = is_new_order,
            "item added to order"
        );

        let committed = self.repository.unit_of_work().commit();
        tracing::debug!(order_id = %order.id_typed(), committed, "order unit of work committed");

        Ok(committed)
    }

    fn reject(&self, cmd: &AddOrderItem, err: OrderError) -> OrderError {
        tracing::warn!(
            customer_id = %cmd.customer_id,
            product_id = %cmd.product_id,
            error = %err,
            "add item rejected"
        );

        let notification = DomainNotification::new(AddOrderItem::MESSAGE_TYPE, err.to_string());
        if let Err(publish_err) = self.notifications.publish(notification) {
            tracing::warn!(error = ?publish_err, "failed to publish domain notification");
        }

        err
    }
}
