pub mod order_status;
pub mod order_view;
pub mod stock_view;

pub use order_status::{OrderStatus, PaymentMethod, PaymentStatus};
pub use order_view::{OrderItemModifierView, OrderItemView, OrderReceipt, OrderView};
pub use stock_view::{StockItemView, StockMovementView};
