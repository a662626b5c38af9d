pub mod category;
pub mod order;
pub mod product;
pub mod user;

pub use category::{Category, CategoryInput};
pub use order::{
    LineItem, LineItemDetail, NewLineItem, NewOrder, Order, OrderDetail, OrderStatus, OrderSummary,
    ShippingInfo,
};
pub use product::{NewProduct, PopulatedProduct, Product};
pub use user::{NewUser, User, UserName};
