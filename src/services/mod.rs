pub mod fanout;
pub mod order_service;

pub use order_service::{CreateOrder, OrderError, OrderService};
