use chrono::{DateTime, Utc};

/// A fact emitted by an aggregate after a command was accepted.
///
/// Names are dotted `<context>.<aggregate>.<fact>` strings, e.g.
/// `sales.order.item_added`; the stream is the part before the last dot.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn event_type(&self) -> &'static str;

    /// Business time the fact happened at.
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Payload layout version; bump when a variant's fields change shape.
    fn schema_version(&self) -> u32 {
        1
    }

    /// `sales.order` for `sales.order.item_added`.
    fn stream(&self) -> &'static str {
        let name = self.event_type();
        name.rsplit_once('.').map_or(name, |(stream, _)| stream)
    }
}
