//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod notification;

pub use product::{Product, ProductError, ProductStatus};
pub use order::{Order, OrderError, OrderLine, OrderStatus, OrderTotals, PaymentInfo, PaymentMethod, PaymentStatus, ShippingAddress, Viewer};
pub use cart::{Cart, CartError, CartItem};
pub use notification::Notification;
