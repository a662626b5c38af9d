//! Order assembly: turns a cart into line items plus one priced order,
//! and reads orders back with their line items, products and categories
//! inflated.

use futures::future::{join_all, try_join_all};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    LineItem, LineItemDetail, NewLineItem, NewOrder, Order, OrderDetail, OrderStatus, OrderSummary,
    PopulatedProduct, ShippingInfo, UserName,
};
use crate::services::fanout::{TaskFailed, TaskGroup};
use crate::store::{CategoryStore, LineItemStore, OrderStore, ProductStore, Stores, UserStore};

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("invalid order: {0:?}")]
    Validation(HashMap<String, String>),

    #[error("product {0} not found")]
    ProductNotFound(Uuid),

    #[error("order {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("{0}")]
    TaskFailed(String),
}

impl From<TaskFailed> for OrderError {
    fn from(err: TaskFailed) -> Self {
        OrderError::TaskFailed(err.to_string())
    }
}

/// One cart entry as posted by the client
#[derive(Debug, Clone, Deserialize)]
pub struct CartItem {
    pub product: Uuid,
    pub quantity: i64,
}

/// Order creation payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrder {
    pub order_items: Option<Vec<CartItem>>,
    pub shipping_address1: Option<String>,
    pub shipping_address2: Option<String>,
    pub zip: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub status: Option<OrderStatus>,
    pub user: Option<Uuid>,
}

/// A payload that passed validation and can be written
#[derive(Debug, Clone)]
struct OrderDraft {
    items: Vec<NewLineItem>,
    shipping: ShippingInfo,
    status: OrderStatus,
    user: Uuid,
}

const REQUIRED: &str = "This field is required";

fn required(
    errors: &mut HashMap<String, String>,
    field: &str,
    value: Option<String>,
) -> String {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) => v,
        None => {
            errors.insert(field.to_string(), REQUIRED.to_string());
            String::new()
        }
    }
}

impl CreateOrder {
    fn validate(self) -> Result<OrderDraft, OrderError> {
        let mut errors = HashMap::new();

        let shipping = ShippingInfo {
            shipping_address1: required(&mut errors, "shippingAddress1", self.shipping_address1),
            shipping_address2: self.shipping_address2.filter(|v| !v.trim().is_empty()),
            zip: required(&mut errors, "zip", self.zip),
            city: required(&mut errors, "city", self.city),
            country: required(&mut errors, "country", self.country),
            phone: required(&mut errors, "phone", self.phone),
        };

        if self.user.is_none() {
            errors.insert("user".to_string(), REQUIRED.to_string());
        }

        let mut items = Vec::new();
        match self.order_items {
            None => {
                errors.insert("orderItems".to_string(), REQUIRED.to_string());
            }
            Some(cart) => {
                for (index, entry) in cart.into_iter().enumerate() {
                    match i32::try_from(entry.quantity) {
                        Ok(quantity) if quantity > 0 => items.push(NewLineItem {
                            product: entry.product,
                            quantity,
                        }),
                        _ => {
                            errors.insert(
                                format!("orderItems[{}].quantity", index),
                                "Quantity must be a positive integer".to_string(),
                            );
                        }
                    }
                }
            }
        }

        match self.user {
            Some(user) if errors.is_empty() => Ok(OrderDraft {
                items,
                shipping,
                status: self.status.unwrap_or_default(),
                user,
            }),
            _ => Err(OrderError::Validation(errors)),
        }
    }
}

pub struct OrderService {
    line_items: Arc<dyn LineItemStore>,
    orders: Arc<dyn OrderStore>,
    products: Arc<dyn ProductStore>,
    categories: Arc<dyn CategoryStore>,
    users: Arc<dyn UserStore>,
}

impl OrderService {
    pub fn new(stores: &Stores) -> Self {
        Self {
            line_items: stores.line_items.clone(),
            orders: stores.orders.clone(),
            products: stores.products.clone(),
            categories: stores.categories.clone(),
            users: stores.users.clone(),
        }
    }

    /// Create line items, price them, persist the order.
    ///
    /// Both fan-out phases run every sub-operation concurrently and wait for
    /// all of them. If anything fails after line items were written, those
    /// line items are deleted again before the error is returned.
    pub async fn create_order(&self, request: CreateOrder) -> Result<Order, OrderError> {
        let draft = request.validate()?;

        let created = self.create_line_items(&draft.items).await?;

        let total_price = match self.price_line_items(&created).await {
            Ok(total) => total,
            Err(err) => {
                self.rollback(&created).await;
                return Err(err);
            }
        };

        let new_order = NewOrder {
            order_items: created.iter().map(|item| item.id).collect(),
            shipping: draft.shipping,
            status: draft.status,
            total_price,
            user: draft.user,
        };

        match self.orders.insert_order(new_order).await {
            Ok(order) => {
                info!(
                    "Created order {} for user {} ({} items, total {})",
                    order.id,
                    order.user,
                    order.order_items.len(),
                    order.total_price
                );
                Ok(order)
            }
            Err(err) => {
                self.rollback(&created).await;
                Err(err.into())
            }
        }
    }

    /// Phase one: one insert per cart entry, results in cart order
    async fn create_line_items(&self, items: &[NewLineItem]) -> Result<Vec<LineItem>, OrderError> {
        let mut group = TaskGroup::new();
        for item in items.iter().copied() {
            let store = self.line_items.clone();
            group.spawn(async move { store.insert_line_item(item).await });
        }

        let mut created = Vec::with_capacity(items.len());
        let mut failure: Option<OrderError> = None;
        for joined in group.join().await {
            match joined {
                Ok(Ok(line_item)) => created.push(line_item),
                Ok(Err(err)) => {
                    failure.get_or_insert(OrderError::from(err));
                }
                Err(err) => {
                    failure.get_or_insert(OrderError::from(err));
                }
            }
        }

        match failure {
            Some(err) => {
                self.rollback(&created).await;
                Err(err)
            }
            None => Ok(created),
        }
    }

    /// Phase two: look up each product's price and sum `quantity * price`
    async fn price_line_items(&self, items: &[LineItem]) -> Result<Decimal, OrderError> {
        let mut group = TaskGroup::new();
        for item in items.iter().cloned() {
            let products = self.products.clone();
            group.spawn(async move {
                let product = products
                    .find_product(item.product)
                    .await?
                    .ok_or(OrderError::ProductNotFound(item.product))?;
                let subtotal = Decimal::from(item.quantity)
                    .checked_mul(product.price)
                    .ok_or_else(|| overflow(&item))?;
                Ok::<_, OrderError>(subtotal)
            });
        }

        let mut total = Decimal::ZERO;
        for (joined, item) in group.join().await.into_iter().zip(items) {
            let subtotal = joined??;
            total = total.checked_add(subtotal).ok_or_else(|| overflow(item))?;
        }
        Ok(total)
    }

    /// Best-effort removal of line items written by a failed creation
    async fn rollback(&self, created: &[LineItem]) {
        if created.is_empty() {
            return;
        }

        warn!("Rolling back {} line items of a failed order", created.len());
        let deletions = created.iter().map(|item| self.line_items.delete_line_item(item.id));
        for (item, result) in created.iter().zip(join_all(deletions).await) {
            if let Err(err) = result {
                warn!("Failed to roll back line item {}: {}", item.id, err);
            }
        }
    }

    /// Single order with line items -> product -> category inflated
    pub async fn get_order(&self, id: Uuid) -> Result<OrderDetail, OrderError> {
        let order = self
            .orders
            .find_order(id)
            .await?
            .ok_or(OrderError::NotFound(id))?;
        self.inflate(order).await
    }

    /// Plain order record, used for ownership checks
    pub async fn find_order(&self, id: Uuid) -> Result<Order, OrderError> {
        self.orders
            .find_order(id)
            .await?
            .ok_or(OrderError::NotFound(id))
    }

    /// All orders, newest first, each with its user's name
    pub async fn list_orders(&self) -> Result<Vec<OrderSummary>, OrderError> {
        let orders = self.orders.list_orders().await?;

        let mut names: HashMap<Uuid, Option<UserName>> = HashMap::new();
        for order in &orders {
            if !names.contains_key(&order.user) {
                let user = self.users.find_user(order.user).await?;
                names.insert(order.user, user.as_ref().map(UserName::from));
            }
        }

        Ok(orders
            .into_iter()
            .map(|order| {
                let user = names.get(&order.user).cloned().flatten();
                OrderSummary::new(order, user)
            })
            .collect())
    }

    /// One user's orders, newest first, fully inflated
    pub async fn user_orders(&self, user: Uuid) -> Result<Vec<OrderDetail>, OrderError> {
        let orders = self.orders.list_orders_for_user(user).await?;
        try_join_all(orders.into_iter().map(|order| self.inflate(order))).await
    }

    /// Status is the only mutable field of an order
    pub async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, OrderError> {
        let order = self
            .orders
            .update_order_status(id, status)
            .await?
            .ok_or(OrderError::NotFound(id))?;
        info!("Order {} is now {}", order.id, order.status);
        Ok(order)
    }

    /// Delete the order, then every line item it referenced
    pub async fn delete_order(&self, id: Uuid) -> Result<Order, OrderError> {
        let existing = self.find_order(id).await?;

        let order = self
            .orders
            .delete_order(existing.id)
            .await?
            .ok_or(OrderError::NotFound(id))?;

        // The order is already gone, so every line item gets its delete
        // attempt; the first failure is reported once all have run.
        let mut first_error = None;
        for item_id in &order.order_items {
            match self.line_items.delete_line_item(*item_id).await {
                Ok(true) => {}
                Ok(false) => warn!("Order {} referenced missing line item {}", order.id, item_id),
                Err(err) => {
                    warn!("Failed to delete line item {} of order {}: {}", item_id, order.id, err);
                    first_error.get_or_insert(err);
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err.into());
        }
        info!("Deleted order {} and {} line items", order.id, order.order_items.len());
        Ok(order)
    }

    /// Sum of all order totals; `None` when no orders exist
    pub async fn total_sales(&self) -> Result<Option<Decimal>, OrderError> {
        Ok(self.orders.total_sales().await?)
    }

    pub async fn order_count(&self) -> Result<i64, OrderError> {
        Ok(self.orders.count_orders().await?)
    }

    async fn inflate(&self, order: Order) -> Result<OrderDetail, OrderError> {
        let user = self
            .users
            .find_user(order.user)
            .await?
            .as_ref()
            .map(UserName::from);

        let items = try_join_all(order.order_items.iter().map(|id| self.line_item_detail(*id))).await?;
        let items: Vec<LineItemDetail> = items.into_iter().flatten().collect();

        debug!("Inflated order {} with {} line items", order.id, items.len());
        Ok(OrderDetail::new(order, items, user))
    }

    async fn line_item_detail(&self, id: Uuid) -> Result<Option<LineItemDetail>, OrderError> {
        let Some(item) = self.line_items.find_line_item(id).await? else {
            return Ok(None);
        };

        let product = match self.products.find_product(item.product).await? {
            Some(product) => {
                let category = self.categories.find_category(product.category).await?;
                Some(PopulatedProduct::new(product, category))
            }
            None => None,
        };

        Ok(Some(LineItemDetail {
            id: item.id,
            quantity: item.quantity,
            product,
        }))
    }
}

fn overflow(item: &LineItem) -> OrderError {
    let mut errors = HashMap::new();
    errors.insert(
        "orderItems".to_string(),
        format!("Total for product {} is out of range", item.product),
    );
    OrderError::Validation(errors)
}
