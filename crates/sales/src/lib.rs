//! Sales domain module: draft orders, line items and discount vouchers.
//!
//! The `order`, `line_item` and `voucher` modules are pure domain logic (no IO,
//! no logging). `handler` is the thin application layer that loads an order
//! through a repository, drives the aggregate and commits the result.

pub mod error;
pub mod handler;
pub mod line_item;
pub mod order;
pub mod voucher;

pub use error::OrderError;
pub use handler::{
    AddOrderItem, DomainNotification, HandlerError, OrderCommandHandler, OrderRepository,
    UnitOfWork,
};
pub use line_item::{LineItem, MAX_UNITS_PER_ITEM, MIN_UNITS_PER_ITEM};
pub use order::{
    AddItem, ApplyVoucher, CreateDraftOrder, DraftOrderCreated, ItemAdded, ItemRemoved,
    ItemUpdated, Order, OrderCommand, OrderEvent, OrderId, OrderStatus, RemoveItem, UpdateItem,
    VoucherApplied,
};
pub use voucher::{DiscountKind, ValidationFailure, Voucher, VoucherValidation};
