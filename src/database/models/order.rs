use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::product::PopulatedProduct;
use super::user::UserName;

/// One product + quantity entry, owned by exactly one order
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct LineItem {
    pub id: Uuid,
    #[sqlx(rename = "product_id")]
    pub product: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct NewLineItem {
    pub product: Uuid,
    pub quantity: i32,
}

/// Order status. Known states get variants; anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    #[default]
    Pending,
    Shipped,
    Delivered,
    Other(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Other(s) => s,
        }
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => OrderStatus::Pending,
            "shipped" => OrderStatus::Shipped,
            "delivered" => OrderStatus::Delivered,
            _ => OrderStatus::Other(value),
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    pub shipping_address1: String,
    pub shipping_address2: Option<String>,
    pub zip: String,
    pub city: String,
    pub country: String,
    pub phone: String,
}

/// Persisted order. `total_price` is the snapshot taken at creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_items: Vec<Uuid>,
    #[serde(flatten)]
    pub shipping: ShippingInfo,
    pub status: OrderStatus,
    pub total_price: Decimal,
    pub user: Uuid,
    pub date_created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub order_items: Vec<Uuid>,
    pub shipping: ShippingInfo,
    pub status: OrderStatus,
    pub total_price: Decimal,
    pub user: Uuid,
}

/// List view: the owning user's name is inlined, line items stay as ids
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: Uuid,
    pub order_items: Vec<Uuid>,
    #[serde(flatten)]
    pub shipping: ShippingInfo,
    pub status: OrderStatus,
    pub total_price: Decimal,
    pub user: Option<UserName>,
    pub date_created: DateTime<Utc>,
}

impl OrderSummary {
    pub fn new(order: Order, user: Option<UserName>) -> Self {
        Self {
            id: order.id,
            order_items: order.order_items,
            shipping: order.shipping,
            status: order.status,
            total_price: order.total_price,
            user,
            date_created: order.date_created,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LineItemDetail {
    pub id: Uuid,
    pub quantity: i32,
    pub product: Option<PopulatedProduct>,
}

/// Detail view: line items -> product -> category fully inflated
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    pub id: Uuid,
    pub order_items: Vec<LineItemDetail>,
    #[serde(flatten)]
    pub shipping: ShippingInfo,
    pub status: OrderStatus,
    pub total_price: Decimal,
    pub user: Option<UserName>,
    pub date_created: DateTime<Utc>,
}

impl OrderDetail {
    pub fn new(order: Order, order_items: Vec<LineItemDetail>, user: Option<UserName>) -> Self {
        Self {
            id: order.id,
            order_items,
            shipping: order.shipping,
            status: order.status,
            total_price: order.total_price,
            user,
            date_created: order.date_created,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_keeps_unknown_values() {
        assert_eq!(OrderStatus::from("Shipped".to_string()), OrderStatus::Shipped);
        assert_eq!(
            OrderStatus::from("on-hold".to_string()),
            OrderStatus::Other("on-hold".to_string())
        );
        assert_eq!(String::from(OrderStatus::Other("on-hold".into())), "on-hold");
    }

    #[test]
    fn order_serializes_flat_camel_case() {
        let order = Order {
            id: Uuid::nil(),
            order_items: vec![],
            shipping: ShippingInfo {
                shipping_address1: "1 Main St".into(),
                shipping_address2: None,
                zip: "12345".into(),
                city: "Springfield".into(),
                country: "US".into(),
                phone: "555-0100".into(),
            },
            status: OrderStatus::Pending,
            total_price: Decimal::ZERO,
            user: Uuid::nil(),
            date_created: Utc::now(),
        };

        let value = serde_json::to_value(&order).unwrap();
        assert_eq!(value["shippingAddress1"], "1 Main St");
        assert_eq!(value["status"], "pending");
        assert!(value.get("shipping").is_none());
        assert!(value.get("totalPrice").is_some());
    }
}
