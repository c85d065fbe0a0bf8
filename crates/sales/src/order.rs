use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use storefront_core::{Aggregate, AggregateId, AggregateRoot, CustomerId, ProductId};
use storefront_events::{Event, PendingEvents, execute};

use crate::error::OrderError;
use crate::line_item::{LineItem, MAX_UNITS_PER_ITEM};
use crate::voucher::{Voucher, VoucherValidation};

/// Order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Order status lifecycle.
///
/// Only `Draft` is reached from here; later states belong to the checkout,
/// payment and delivery workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Draft,
    Started,
    Paid,
    Delivered,
    Cancelled,
}

/// Aggregate root: Order.
///
/// Holds at most one line per product and at most one voucher. `total_value`
/// and `discount_value` are derived and rebuilt from scratch after every
/// applied event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    customer_id: Option<CustomerId>,
    status: OrderStatus,
    items: Vec<LineItem>,
    voucher: Option<Voucher>,
    voucher_applied: bool,
    total_value: Decimal,
    discount_value: Decimal,
    pending: PendingEvents<OrderEvent>,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            customer_id: None,
            status: OrderStatus::Draft,
            items: Vec::new(),
            voucher: None,
            voucher_applied: false,
            total_value: Decimal::ZERO,
            discount_value: Decimal::ZERO,
            pending: PendingEvents::new(),
            version: 0,
            created: false,
        }
    }

    /// Start a new draft order for `customer_id`.
    pub fn new_draft(customer_id: CustomerId) -> Self {
        let id = OrderId::new(AggregateId::new());
        let mut order = Self::empty(id);
        order.apply(&OrderEvent::DraftOrderCreated(DraftOrderCreated {
            order_id: id,
            customer_id,
            occurred_at: Utc::now(),
        }));
        order
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn item(&self, product_id: ProductId) -> Option<&LineItem> {
        self.items.iter().find(|i| i.product_id() == product_id)
    }

    pub fn contains_item(&self, product_id: ProductId) -> bool {
        self.item(product_id).is_some()
    }

    /// Items total minus the applied discount, never below zero.
    pub fn total_value(&self) -> Decimal {
        self.total_value
    }

    /// Full discount granted by the applied voucher.
    ///
    /// Not capped: it may exceed the pre-discount total, in which case
    /// `total_value` sits at zero.
    pub fn discount_value(&self) -> Decimal {
        self.discount_value
    }

    pub fn applied_voucher(&self) -> Option<&Voucher> {
        self.voucher.as_ref()
    }

    pub fn voucher_applied(&self) -> bool {
        self.voucher_applied
    }

    /// Add a line, merging quantities with any existing line for the product.
    pub fn add_item(&mut self, item: LineItem) -> Result<(), OrderError> {
        let cmd = OrderCommand::AddItem(AddItem {
            order_id: self.id,
            item,
            occurred_at: Utc::now(),
        });
        execute(self, &cmd).map(|_| ())
    }

    /// Replace the existing line for the item's product wholesale.
    pub fn update_item(&mut self, item: LineItem) -> Result<(), OrderError> {
        let cmd = OrderCommand::UpdateItem(UpdateItem {
            order_id: self.id,
            item,
            occurred_at: Utc::now(),
        });
        execute(self, &cmd).map(|_| ())
    }

    pub fn remove_item(&mut self, product_id: ProductId) -> Result<(), OrderError> {
        let cmd = OrderCommand::RemoveItem(RemoveItem {
            order_id: self.id,
            product_id,
            occurred_at: Utc::now(),
        });
        execute(self, &cmd).map(|_| ())
    }

    /// Attach `voucher` if it is currently eligible.
    ///
    /// Ineligibility is an expected outcome, not an error: the returned
    /// validation carries the failures and the order is left untouched.
    pub fn apply_voucher(&mut self, voucher: Voucher) -> VoucherValidation {
        self.apply_voucher_at(voucher, Utc::now())
    }

    /// Same as [`Order::apply_voucher`], judging eligibility as of `now`.
    pub fn apply_voucher_at(&mut self, voucher: Voucher, now: DateTime<Utc>) -> VoucherValidation {
        let cmd = OrderCommand::ApplyVoucher(ApplyVoucher {
            order_id: self.id,
            voucher,
            occurred_at: now,
        });
        match execute(self, &cmd) {
            Ok(_) => VoucherValidation::valid(),
            Err(OrderError::VoucherIneligible(rejected)) => rejected,
            Err(other) => VoucherValidation::rejected("order", other.to_string()),
        }
    }

    /// Attach an event for the application layer to publish later.
    pub fn record_event(&mut self, event: OrderEvent) {
        self.pending.record(event);
    }

    pub fn remove_event(&mut self, event: &OrderEvent) -> bool {
        self.pending.remove(event)
    }

    pub fn clear_events(&mut self) {
        self.pending.clear();
    }

    pub fn pending_events(&self) -> &[OrderEvent] {
        self.pending.as_slice()
    }

    pub fn take_events(&mut self) -> Vec<OrderEvent> {
        self.pending.take()
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateDraftOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDraftOrder {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItem {
    pub order_id: OrderId,
    pub item: LineItem,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItem {
    pub order_id: OrderId,
    pub item: LineItem,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApplyVoucher. Eligibility is judged as of `occurred_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyVoucher {
    pub order_id: OrderId,
    pub voucher: Voucher,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    CreateDraftOrder(CreateDraftOrder),
    AddItem(AddItem),
    UpdateItem(UpdateItem),
    RemoveItem(RemoveItem),
    ApplyVoucher(ApplyVoucher),
}

/// Event: DraftOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftOrderCreated {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemAdded. `item` is the line as requested, before merging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAdded {
    pub order_id: OrderId,
    pub item: LineItem,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUpdated {
    pub order_id: OrderId,
    pub item: LineItem,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRemoved {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: VoucherApplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherApplied {
    pub order_id: OrderId,
    pub voucher: Voucher,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    DraftOrderCreated(DraftOrderCreated),
    ItemAdded(ItemAdded),
    ItemUpdated(ItemUpdated),
    ItemRemoved(ItemRemoved),
    VoucherApplied(VoucherApplied),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::DraftOrderCreated(_) => "sales.order.draft_created",
            OrderEvent::ItemAdded(_) => "sales.order.item_added",
            OrderEvent::ItemUpdated(_) => "sales.order.item_updated",
            OrderEvent::ItemRemoved(_) => "sales.order.item_removed",
            OrderEvent::VoucherApplied(_) => "sales.order.voucher_applied",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::DraftOrderCreated(e) => e.occurred_at,
            OrderEvent::ItemAdded(e) => e.occurred_at,
            OrderEvent::ItemUpdated(e) => e.occurred_at,
            OrderEvent::ItemRemoved(e) => e.occurred_at,
            OrderEvent::VoucherApplied(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = OrderError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::DraftOrderCreated(e) => {
                self.id = e.order_id;
                self.customer_id = Some(e.customer_id);
                self.items.clear();
                self.voucher = None;
                self.voucher_applied = false;
                self.mark_as_draft();
                self.created = true;
            }
            OrderEvent::ItemAdded(e) => {
                let merged = match self.take_item(e.item.product_id()) {
                    Some(mut existing) => {
                        existing.increase_quantity(e.item.quantity());
                        existing
                    }
                    None => e.item.clone(),
                };
                self.items.push(merged);
            }
            OrderEvent::ItemUpdated(e) => {
                self.take_item(e.item.product_id());
                self.items.push(e.item.clone());
            }
            OrderEvent::ItemRemoved(e) => {
                self.take_item(e.product_id);
            }
            OrderEvent::VoucherApplied(e) => {
                self.voucher = Some(e.voucher.clone());
                self.voucher_applied = true;
            }
        }

        self.recompute_totals();

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::CreateDraftOrder(cmd) => self.handle_create(cmd),
            OrderCommand::AddItem(cmd) => self.handle_add_item(cmd),
            OrderCommand::UpdateItem(cmd) => self.handle_update_item(cmd),
            OrderCommand::RemoveItem(cmd) => self.handle_remove_item(cmd),
            OrderCommand::ApplyVoucher(cmd) => self.handle_apply_voucher(cmd),
        }
    }
}

impl Order {
    fn mark_as_draft(&mut self) {
        self.status = OrderStatus::Draft;
    }

    /// Pull the line for `product_id` out of the collection, if any.
    fn take_item(&mut self, product_id: ProductId) -> Option<LineItem> {
        let idx = self.items.iter().position(|i| i.product_id() == product_id)?;
        Some(self.items.remove(idx))
    }

    fn active_voucher(&self) -> Option<&Voucher> {
        self.voucher.as_ref().filter(|_| self.voucher_applied)
    }

    fn recompute_totals(&mut self) {
        // Commands reject anything that would overflow; only hand-built
        // events can land here with unrepresentable amounts.
        let (total, discount) = order_totals(&self.items, self.active_voucher())
            .unwrap_or((Decimal::MAX, Decimal::ZERO));
        self.total_value = total;
        self.discount_value = discount;
    }

    fn ensure_created(&self) -> Result<(), OrderError> {
        if !self.created {
            return Err(OrderError::NotCreated);
        }
        Ok(())
    }

    fn ensure_order_id(&self, order_id: OrderId) -> Result<(), OrderError> {
        if self.id != order_id {
            return Err(OrderError::OrderMismatch {
                command: order_id.to_string(),
                actual: self.id.to_string(),
            });
        }
        Ok(())
    }

    /// Existing units of the product plus the incoming ones must stay within
    /// [`MAX_UNITS_PER_ITEM`]. Update deliberately uses the same sum as add.
    fn ensure_units_allowed(&self, item: &LineItem) -> Result<(), OrderError> {
        let existing = self
            .item(item.product_id())
            .map(LineItem::quantity)
            .unwrap_or(0);
        let exceeded = |requested| OrderError::MaxUnitsExceeded {
            product_id: item.product_id(),
            max: MAX_UNITS_PER_ITEM,
            requested,
        };

        let requested = existing
            .checked_add(item.quantity())
            .ok_or_else(|| exceeded(i64::MAX))?;
        if requested > MAX_UNITS_PER_ITEM {
            return Err(exceeded(requested));
        }
        Ok(())
    }

    /// Lines as they would stand once `item` is added (merged) or swapped in.
    fn projected_items(&self, item: &LineItem, merge: bool) -> Vec<LineItem> {
        let mut items = self.items.clone();
        match items.iter_mut().find(|i| i.product_id() == item.product_id()) {
            Some(existing) if merge => existing.increase_quantity(item.quantity()),
            Some(existing) => *existing = item.clone(),
            None => items.push(item.clone()),
        }
        items
    }

    fn ensure_item_exists(&self, product_id: ProductId) -> Result<(), OrderError> {
        if !self.contains_item(product_id) {
            return Err(OrderError::ItemNotFound(product_id));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateDraftOrder) -> Result<Vec<OrderEvent>, OrderError> {
        if self.created {
            return Err(OrderError::AlreadyCreated);
        }

        Ok(vec![OrderEvent::DraftOrderCreated(DraftOrderCreated {
            order_id: cmd.order_id,
            customer_id: cmd.customer_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_item(&self, cmd: &AddItem) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_created()?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_units_allowed(&cmd.item)?;
        order_totals(&self.projected_items(&cmd.item, true), self.active_voucher())?;

        Ok(vec![OrderEvent::ItemAdded(ItemAdded {
            order_id: cmd.order_id,
            item: cmd.item.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_item(&self, cmd: &UpdateItem) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_created()?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_item_exists(cmd.item.product_id())?;
        self.ensure_units_allowed(&cmd.item)?;
        order_totals(&self.projected_items(&cmd.item, false), self.active_voucher())?;

        Ok(vec![OrderEvent::ItemUpdated(ItemUpdated {
            order_id: cmd.order_id,
            item: cmd.item.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_item(&self, cmd: &RemoveItem) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_created()?;
        self.ensure_order_id(cmd.order_id)?;
        self.ensure_item_exists(cmd.product_id)?;

        Ok(vec![OrderEvent::ItemRemoved(ItemRemoved {
            order_id: cmd.order_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_apply_voucher(&self, cmd: &ApplyVoucher) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_created()?;
        self.ensure_order_id(cmd.order_id)?;

        let validation = cmd.voucher.check_eligibility_at(cmd.occurred_at);
        if !validation.is_valid() {
            return Err(OrderError::VoucherIneligible(validation));
        }
        order_totals(&self.items, Some(&cmd.voucher))?;

        Ok(vec![OrderEvent::VoucherApplied(VoucherApplied {
            order_id: cmd.order_id,
            voucher: cmd.voucher.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

/// `(total_value, discount_value)` for `items` with an optional discount.
///
/// The discount is kept whole; only the total is floored at zero.
fn order_totals(
    items: &[LineItem],
    voucher: Option<&Voucher>,
) -> Result<(Decimal, Decimal), OrderError> {
    let items_total = items.iter().try_fold(Decimal::ZERO, |acc, item| {
        let value = item
            .checked_line_value()
            .ok_or(OrderError::AmountOverflow("line value"))?;
        acc.checked_add(value)
            .ok_or(OrderError::AmountOverflow("order total"))
    })?;

    let discount = match voucher {
        Some(voucher) => voucher
            .discount_for(items_total)
            .ok_or(OrderError::AmountOverflow("discount"))?,
        None => Decimal::ZERO,
    };
    let total = items_total
        .checked_sub(discount)
        .ok_or(OrderError::AmountOverflow("order total"))?
        .max(Decimal::ZERO);

    Ok((total, discount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draft() -> Order {
        Order::new_draft(CustomerId::new())
    }

    fn item(product_id: ProductId, name: &str, quantity: i64, unit_price: i64) -> LineItem {
        LineItem::new(product_id, name, quantity, Decimal::from(unit_price)).unwrap()
    }

    fn tomorrow() -> DateTime<Utc> {
        Utc::now() + Duration::days(1)
    }

    /// 2 × 100 + 3 × 15 = 245
    fn order_worth_245() -> Order {
        let mut order = draft();
        order.add_item(item(ProductId::new(), "Product 1", 2, 100)).unwrap();
        order.add_item(item(ProductId::new(), "Product 2", 3, 15)).unwrap();
        order
    }

    #[test]
    fn new_draft_starts_empty_in_draft_status() {
        let customer_id = CustomerId::new();
        let order = Order::new_draft(customer_id);

        assert_eq!(order.status(), OrderStatus::Draft);
        assert_eq!(order.customer_id(), Some(customer_id));
        assert!(order.items().is_empty());
        assert_eq!(order.total_value(), Decimal::ZERO);
        assert_eq!(order.discount_value(), Decimal::ZERO);
        assert!(order.applied_voucher().is_none());
        assert_eq!(order.version(), 1);
        assert!(order.pending_events().is_empty());
    }

    #[test]
    fn add_new_item_updates_total() {
        let mut order = draft();
        order.add_item(item(ProductId::new(), "Test product", 2, 100)).unwrap();

        assert_eq!(order.total_value(), Decimal::from(200));
        assert_eq!(order.items().len(), 1);
    }

    #[test]
    fn add_existing_item_accumulates_quantity_and_total() {
        let mut order = draft();
        let pid = ProductId::new();
        order.add_item(item(pid, "Test product", 2, 100)).unwrap();
        order.add_item(item(pid, "Test product", 1, 100)).unwrap();

        assert_eq!(order.total_value(), Decimal::from(300));
        assert_eq!(order.items().len(), 1);
        assert_eq!(order.item(pid).unwrap().quantity(), 3);
    }

    #[test]
    fn add_item_above_maximum_fails() {
        let mut order = draft();
        let pid = ProductId::new();
        let err = order
            .add_item(item(pid, "Test product", MAX_UNITS_PER_ITEM + 1, 100))
            .unwrap_err();

        assert_eq!(
            err,
            OrderError::MaxUnitsExceeded {
                product_id: pid,
                max: 15,
                requested: 16
            }
        );
        assert!(order.items().is_empty());
    }

    #[test]
    fn add_existing_item_summing_above_maximum_fails_without_mutation() {
        let mut order = draft();
        let pid = ProductId::new();
        order.add_item(item(pid, "Test product", MAX_UNITS_PER_ITEM, 100)).unwrap();
        let before = order.clone();

        let err = order.add_item(item(pid, "Test product", 1, 100)).unwrap_err();

        assert!(matches!(err, OrderError::MaxUnitsExceeded { requested: 16, .. }));
        assert_eq!(order, before);
    }

    #[test]
    fn maximum_applies_per_product_not_per_order() {
        let mut order = draft();
        order.add_item(item(ProductId::new(), "A", MAX_UNITS_PER_ITEM, 1)).unwrap();
        order.add_item(item(ProductId::new(), "B", MAX_UNITS_PER_ITEM, 1)).unwrap();
        assert_eq!(order.total_value(), Decimal::from(30));
    }

    #[test]
    fn quantity_sum_past_i64_range_is_rejected_without_mutation() {
        let mut order = draft();
        let pid = ProductId::new();
        order.add_item(item(pid, "Test product", 1, 100)).unwrap();
        let before = order.clone();

        let err = order
            .add_item(item(pid, "Test product", i64::MAX, 100))
            .unwrap_err();

        assert_eq!(
            err,
            OrderError::MaxUnitsExceeded {
                product_id: pid,
                max: 15,
                requested: i64::MAX
            }
        );
        assert_eq!(order, before);
    }

    #[test]
    fn update_with_quantity_past_i64_range_is_rejected() {
        let mut order = draft();
        let pid = ProductId::new();
        order.add_item(item(pid, "Test product", 3, 100)).unwrap();
        let before = order.clone();

        let err = order
            .update_item(item(pid, "Test product", i64::MAX - 1, 100))
            .unwrap_err();

        assert!(matches!(err, OrderError::MaxUnitsExceeded { requested: i64::MAX, .. }));
        assert_eq!(order, before);
    }

    #[test]
    fn line_value_out_of_range_is_rejected_without_mutation() {
        let mut order = order_worth_245();
        let before = order.clone();
        let huge = LineItem::new(ProductId::new(), "Huge", 2, Decimal::MAX).unwrap();

        let err = order.add_item(huge).unwrap_err();

        assert_eq!(err, OrderError::AmountOverflow("line value"));
        assert_eq!(order, before);
    }

    #[test]
    fn order_total_out_of_range_is_rejected_on_add_and_update() {
        let mut order = draft();
        let pid = ProductId::new();
        order
            .add_item(LineItem::new(ProductId::new(), "Big", 1, Decimal::MAX).unwrap())
            .unwrap();
        order.add_item(item(pid, "Small", 1, 1)).unwrap_err();
        assert_eq!(order.items().len(), 1);

        let mut order = draft();
        order
            .add_item(LineItem::new(ProductId::new(), "Big", 1, Decimal::MAX).unwrap())
            .unwrap();
        let small = ProductId::new();
        order.add_item(item(small, "Small", 1, 0)).unwrap();
        let before = order.clone();

        let err = order.update_item(item(small, "Small", 1, 1)).unwrap_err();

        assert_eq!(err, OrderError::AmountOverflow("order total"));
        assert_eq!(order, before);
    }

    #[test]
    fn update_missing_item_fails_and_keeps_total() {
        let mut order = draft();
        order.add_item(item(ProductId::new(), "Kept", 2, 100)).unwrap();

        let missing = ProductId::new();
        let err = order
            .update_item(item(missing, "Test product", MAX_UNITS_PER_ITEM + 1, 100))
            .unwrap_err();

        assert_eq!(err, OrderError::ItemNotFound(missing));
        assert_eq!(order.total_value(), Decimal::from(200));
    }

    #[test]
    fn update_item_replaces_quantity() {
        let mut order = draft();
        let pid = ProductId::new();
        order.add_item(item(pid, "Test product", 1, 100)).unwrap();

        order.update_item(item(pid, "Test product", 5, 100)).unwrap();

        assert_eq!(order.item(pid).unwrap().quantity(), 5);
        assert_eq!(order.items().len(), 1);
    }

    #[test]
    fn update_item_recomputes_total() {
        let mut order = draft();
        let pid = ProductId::new();
        order.add_item(item(ProductId::new(), "Product A", 2, 100)).unwrap();
        order.add_item(item(pid, "Product B", 3, 15)).unwrap();

        order.update_item(item(pid, "Product B", 5, 15)).unwrap();

        assert_eq!(order.total_value(), Decimal::from(2 * 100 + 5 * 15));
    }

    #[test]
    fn update_checks_existing_plus_incoming_units() {
        let mut order = draft();
        let pid = ProductId::new();
        order.add_item(item(pid, "Test product", 10, 1)).unwrap();

        // 10 existing + 6 incoming > 15, even though the line would end at 6.
        let err = order.update_item(item(pid, "Test product", 6, 1)).unwrap_err();
        assert!(matches!(err, OrderError::MaxUnitsExceeded { requested: 16, .. }));
        assert_eq!(order.item(pid).unwrap().quantity(), 10);

        order.update_item(item(pid, "Test product", 5, 1)).unwrap();
        assert_eq!(order.item(pid).unwrap().quantity(), 5);
    }

    #[test]
    fn remove_missing_item_fails_and_keeps_total() {
        let mut order = draft();
        order.add_item(item(ProductId::new(), "Kept", 1, 40)).unwrap();

        let missing = ProductId::new();
        assert_eq!(
            order.remove_item(missing).unwrap_err(),
            OrderError::ItemNotFound(missing)
        );
        assert_eq!(order.total_value(), Decimal::from(40));
    }

    #[test]
    fn remove_item_recomputes_total() {
        let mut order = draft();
        let first = ProductId::new();
        order.add_item(item(first, "Product 1", 2, 100)).unwrap();
        order.add_item(item(ProductId::new(), "Product 2", 3, 15)).unwrap();

        order.remove_item(first).unwrap();

        assert_eq!(order.total_value(), Decimal::from(45));
        assert!(!order.contains_item(first));
    }

    #[test]
    fn valid_voucher_is_applied() {
        let mut order = draft();
        let voucher = Voucher::fixed_amount("PROMO-15-OFF", Decimal::from(15), tomorrow());

        let result = order.apply_voucher(voucher.clone());

        assert!(result.is_valid());
        assert!(order.voucher_applied());
        assert_eq!(order.applied_voucher(), Some(&voucher));
    }

    #[test]
    fn invalid_voucher_is_rejected_without_mutation() {
        let mut order = order_worth_245();
        let before = order.clone();
        let voucher = Voucher {
            code: String::new(),
            kind: crate::voucher::DiscountKind::Amount,
            amount_off: None,
            percent_off: None,
            remaining_quantity: 0,
            valid_until: Utc::now() - Duration::days(1),
            is_active: false,
            is_used: true,
        };

        let result = order.apply_voucher(voucher);

        assert!(!result.is_valid());
        assert_eq!(result.errors().len(), 6);
        assert!(order.applied_voucher().is_none());
        assert!(!order.voucher_applied());
        assert_eq!(order, before);
    }

    #[test]
    fn voucher_whose_discount_is_out_of_range_is_not_applied() {
        let mut order = draft();
        order
            .add_item(LineItem::new(ProductId::new(), "Big", 1, Decimal::MAX).unwrap())
            .unwrap();
        let before = order.clone();

        let result = order.apply_voucher(Voucher::percentage("HALF", Decimal::from(50), tomorrow()));

        assert!(!result.is_valid());
        assert!(result.has_error_on("order"));
        assert!(!order.voucher_applied());
        assert_eq!(order, before);
    }

    #[test]
    fn handle_apply_voucher_reports_discount_overflow() {
        let mut order = draft();
        order
            .add_item(LineItem::new(ProductId::new(), "Big", 1, Decimal::MAX).unwrap())
            .unwrap();

        let err = order
            .handle(&OrderCommand::ApplyVoucher(ApplyVoucher {
                order_id: order.id_typed(),
                voucher: Voucher::percentage("HALF", Decimal::from(50), tomorrow()),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();

        assert_eq!(err, OrderError::AmountOverflow("discount"));
    }

    #[test]
    fn amount_voucher_discounts_total() {
        let mut order = draft();
        order.add_item(item(ProductId::new(), "Product 1", 2, 100)).unwrap();
        order.add_item(item(ProductId::new(), "Product 2", 2, 15)).unwrap();
        assert_eq!(order.total_value(), Decimal::from(230));

        order.apply_voucher(Voucher::fixed_amount("PROMO-15-OFF", Decimal::from(15), tomorrow()));

        assert_eq!(order.total_value(), Decimal::from(215));
        assert_eq!(order.discount_value(), Decimal::from(15));
    }

    #[test]
    fn percentage_voucher_discounts_total() {
        let mut order = order_worth_245();

        order.apply_voucher(Voucher::percentage("PROMO-15-PCT", Decimal::from(15), tomorrow()));

        assert_eq!(order.discount_value(), Decimal::new(3675, 2));
        assert_eq!(order.total_value(), Decimal::new(20825, 2));
    }

    #[test]
    fn discount_above_total_floors_total_but_keeps_full_discount() {
        let mut order = draft();
        order.add_item(item(ProductId::new(), "Test product", 2, 100)).unwrap();

        order.apply_voucher(Voucher::fixed_amount("PROMO-300-OFF", Decimal::from(300), tomorrow()));

        assert_eq!(order.total_value(), Decimal::ZERO);
        assert_eq!(order.discount_value(), Decimal::from(300));
    }

    #[test]
    fn adding_items_after_voucher_recomputes_discount() {
        let mut order = draft();
        order.add_item(item(ProductId::new(), "Product 1", 2, 100)).unwrap();
        order.apply_voucher(Voucher::fixed_amount("PROMO-50-OFF", Decimal::from(50), tomorrow()));

        order.add_item(item(ProductId::new(), "Product 2", 1, 50)).unwrap();

        assert_eq!(order.total_value(), Decimal::from(200));
        assert_eq!(order.discount_value(), Decimal::from(50));
    }

    #[test]
    fn percentage_discount_follows_item_changes() {
        let mut order = draft();
        let pid = ProductId::new();
        order.add_item(item(pid, "Product", 2, 100)).unwrap();
        order.apply_voucher(Voucher::percentage("TEN", Decimal::from(10), tomorrow()));
        assert_eq!(order.discount_value(), Decimal::from(20));

        order.update_item(item(pid, "Product", 4, 100)).unwrap();
        assert_eq!(order.discount_value(), Decimal::from(40));
        assert_eq!(order.total_value(), Decimal::from(360));

        order.remove_item(pid).unwrap();
        assert_eq!(order.discount_value(), Decimal::ZERO);
        assert_eq!(order.total_value(), Decimal::ZERO);
    }

    #[test]
    fn applying_second_voucher_replaces_first() {
        let mut order = order_worth_245();
        order.apply_voucher(Voucher::fixed_amount("FIRST", Decimal::from(5), tomorrow()));
        order.apply_voucher(Voucher::fixed_amount("SECOND", Decimal::from(45), tomorrow()));

        assert_eq!(order.applied_voucher().unwrap().code, "SECOND");
        assert_eq!(order.total_value(), Decimal::from(200));
    }

    #[test]
    fn apply_voucher_on_uncreated_order_is_rejected() {
        let mut order = Order::empty(OrderId::new(AggregateId::new()));
        let result = order.apply_voucher(Voucher::fixed_amount("X", Decimal::ONE, tomorrow()));

        assert!(!result.is_valid());
        assert!(result.has_error_on("order"));
        assert!(order.applied_voucher().is_none());
    }

    #[test]
    fn handle_apply_voucher_reports_ineligibility_as_error() {
        let order = draft();
        let mut voucher = Voucher::fixed_amount("USED", Decimal::from(10), tomorrow());
        voucher.is_used = true;

        let err = order
            .handle(&OrderCommand::ApplyVoucher(ApplyVoucher {
                order_id: order.id_typed(),
                voucher,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();

        match err {
            OrderError::VoucherIneligible(v) => assert!(v.has_error_on("is_used")),
            other => panic!("Expected VoucherIneligible, got {other:?}"),
        }
    }

    #[test]
    fn create_twice_is_a_conflict() {
        let order = draft();
        let err = order
            .handle(&OrderCommand::CreateDraftOrder(CreateDraftOrder {
                order_id: order.id_typed(),
                customer_id: CustomerId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, OrderError::AlreadyCreated);
    }

    #[test]
    fn commands_for_other_orders_are_rejected() {
        let order = draft();
        let err = order
            .handle(&OrderCommand::RemoveItem(RemoveItem {
                order_id: OrderId::new(AggregateId::new()),
                product_id: ProductId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, OrderError::OrderMismatch { .. }));
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let order = order_worth_245();
        let before = order.clone();
        let cmd = OrderCommand::AddItem(AddItem {
            order_id: order.id_typed(),
            item: item(ProductId::new(), "Extra", 1, 10),
            occurred_at: Utc::now(),
        });

        let events1 = order.handle(&cmd).unwrap();
        let events2 = order.handle(&cmd).unwrap();

        assert_eq!(order, before);
        assert_eq!(events1, events2);
    }

    #[test]
    fn version_increments_on_apply() {
        let mut order = draft();
        assert_eq!(order.version(), 1);
        order.add_item(item(ProductId::new(), "A", 1, 1)).unwrap();
        assert_eq!(order.version(), 2);
        let _ = order.remove_item(ProductId::new());
        assert_eq!(order.version(), 2);
    }

    #[test]
    fn replaying_events_rebuilds_the_same_state() {
        let order_id = OrderId::new(AggregateId::new());
        let customer_id = CustomerId::new();
        let pid = ProductId::new();
        let now = Utc::now();

        let events = vec![
            OrderEvent::DraftOrderCreated(DraftOrderCreated {
                order_id,
                customer_id,
                occurred_at: now,
            }),
            OrderEvent::ItemAdded(ItemAdded {
                order_id,
                item: item(pid, "A", 2, 100),
                occurred_at: now,
            }),
            OrderEvent::ItemAdded(ItemAdded {
                order_id,
                item: item(pid, "A", 1, 100),
                occurred_at: now,
            }),
            OrderEvent::VoucherApplied(VoucherApplied {
                order_id,
                voucher: Voucher::fixed_amount("TEN", Decimal::from(10), tomorrow()),
                occurred_at: now,
            }),
        ];

        let mut first = Order::empty(order_id);
        let mut second = Order::empty(order_id);
        for e in &events {
            first.apply(e);
            second.apply(e);
        }

        assert_eq!(first, second);
        assert_eq!(first.item(pid).unwrap().quantity(), 3);
        assert_eq!(first.total_value(), Decimal::from(290));
        assert_eq!(first.version(), 4);
    }

    #[test]
    fn event_bag_supports_record_remove_and_clear() {
        let mut order = draft();
        let event = OrderEvent::ItemRemoved(ItemRemoved {
            order_id: order.id_typed(),
            product_id: ProductId::new(),
            occurred_at: Utc::now(),
        });

        order.record_event(event.clone());
        assert_eq!(order.pending_events(), std::slice::from_ref(&event));
        assert!(order.remove_event(&event));
        assert!(order.pending_events().is_empty());

        order.record_event(event.clone());
        order.record_event(event);
        order.clear_events();
        assert!(order.pending_events().is_empty());
    }

    #[test]
    fn event_type_names_are_stable() {
        let order = draft();
        let events = order
            .handle(&OrderCommand::AddItem(AddItem {
                order_id: order.id_typed(),
                item: item(ProductId::new(), "A", 1, 1),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        assert_eq!(events[0].event_type(), "sales.order.item_added");
        assert_eq!(events[0].stream(), "sales.order");
        assert_eq!(events[0].schema_version(), 1);
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&OrderStatus::Draft).unwrap();
        assert_eq!(json, "\"draft\"");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Add(usize, i64),
            Update(usize, i64),
            Remove(usize),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0usize..4, 1i64..=15).prop_map(|(p, q)| Op::Add(p, q)),
                (0usize..4, 1i64..=15).prop_map(|(p, q)| Op::Update(p, q)),
                (0usize..4).prop_map(Op::Remove),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: after any sequence of item operations the total equals
            /// the items sum minus the discount, floored at zero, and every
            /// product stays within bounds.
            #[test]
            fn totals_always_match_items(
                prices in prop::collection::vec(0i64..10_000, 4),
                ops in prop::collection::vec(op(), 1..40),
                discount in prop::option::of(1i64..5_000),
            ) {
                let products: Vec<ProductId> = (0..4).map(|_| ProductId::new()).collect();
                let mut order = draft();
                if let Some(amount) = discount {
                    let applied = order.apply_voucher(
                        Voucher::fixed_amount("PROP", Decimal::from(amount), tomorrow()),
                    );
                    prop_assert!(applied.is_valid());
                }

                for op in ops {
                    let before = order.clone();
                    let result = match op {
                        Op::Add(p, q) => order.add_item(item(products[p], "P", q, prices[p])),
                        Op::Update(p, q) => order.update_item(item(products[p], "P", q, prices[p])),
                        Op::Remove(p) => order.remove_item(products[p]),
                    };
                    if result.is_err() {
                        prop_assert_eq!(&order, &before);
                    }

                    let gross: Decimal = order.items().iter().map(LineItem::line_value).sum();
                    let expected_discount = discount.map(Decimal::from).unwrap_or(Decimal::ZERO);
                    prop_assert_eq!(order.discount_value(), expected_discount);
                    prop_assert_eq!(order.total_value(), (gross - expected_discount).max(Decimal::ZERO));
                    prop_assert!(order.total_value() >= Decimal::ZERO);

                    for line in order.items() {
                        prop_assert!(line.quantity() >= 1 && line.quantity() <= MAX_UNITS_PER_ITEM);
                        prop_assert_eq!(
                            order.items().iter().filter(|i| i.product_id() == line.product_id()).count(),
                            1
                        );
                    }
                }
            }

            /// Property: two adds of one product merge into one line.
            #[test]
            fn same_product_adds_accumulate(q1 in 1i64..=15, q2 in 1i64..=15, price in 0i64..1_000) {
                prop_assume!(q1 + q2 <= MAX_UNITS_PER_ITEM);
                let pid = ProductId::new();
                let mut order = draft();

                order.add_item(item(pid, "P", q1, price)).unwrap();
                order.add_item(item(pid, "P", q2, price)).unwrap();

                prop_assert_eq!(order.items().len(), 1);
                prop_assert_eq!(order.item(pid).unwrap().quantity(), q1 + q2);
                prop_assert_eq!(order.total_value(), Decimal::from((q1 + q2) * price));
            }
        }
    }
}
