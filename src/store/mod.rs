//! Storage seams. Handlers and the order service only ever see these
//! traits; `memory` and `crate::database::postgres` provide backends.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    Category, CategoryInput, LineItem, NewLineItem, NewOrder, NewProduct, NewUser, Order,
    OrderStatus, Product, User,
};

pub mod memory;

pub use memory::MemoryStore;

#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<Category>, DatabaseError>;
    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, DatabaseError>;
    async fn insert_category(&self, input: CategoryInput) -> Result<Category, DatabaseError>;
    async fn update_category(
        &self,
        id: Uuid,
        input: CategoryInput,
    ) -> Result<Option<Category>, DatabaseError>;
    /// Fails with `DatabaseError::Conflict` while products still use the category
    async fn delete_category(&self, id: Uuid) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// All products, optionally restricted to a set of categories
    async fn list_products(&self, categories: Option<Vec<Uuid>>) -> Result<Vec<Product>, DatabaseError>;
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, DatabaseError>;
    async fn featured_products(&self, limit: i64) -> Result<Vec<Product>, DatabaseError>;
    async fn count_products(&self) -> Result<i64, DatabaseError>;
    async fn insert_product(&self, product: NewProduct) -> Result<Product, DatabaseError>;
    async fn update_product(&self, id: Uuid, product: NewProduct) -> Result<Option<Product>, DatabaseError>;
    async fn set_gallery(&self, id: Uuid, images: Vec<String>) -> Result<Option<Product>, DatabaseError>;
    /// Returns the removed record so callers can clean up its files
    async fn delete_product(&self, id: Uuid) -> Result<Option<Product>, DatabaseError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn list_users(&self) -> Result<Vec<User>, DatabaseError>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;
    /// Fails with `DatabaseError::Conflict` when the email is taken
    async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError>;
    async fn delete_user(&self, id: Uuid) -> Result<bool, DatabaseError>;
    async fn count_users(&self) -> Result<i64, DatabaseError>;
}

/// Line-Item Store
#[async_trait]
pub trait LineItemStore: Send + Sync {
    async fn insert_line_item(&self, item: NewLineItem) -> Result<LineItem, DatabaseError>;
    async fn find_line_item(&self, id: Uuid) -> Result<Option<LineItem>, DatabaseError>;
    async fn delete_line_item(&self, id: Uuid) -> Result<bool, DatabaseError>;
}

/// Order Store
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, DatabaseError>;
    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, DatabaseError>;
    /// Newest first
    async fn list_orders(&self) -> Result<Vec<Order>, DatabaseError>;
    /// Orders placed by one user, newest first
    async fn list_orders_for_user(&self, user: Uuid) -> Result<Vec<Order>, DatabaseError>;
    async fn update_order_status(
        &self,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<Option<Order>, DatabaseError>;
    async fn delete_order(&self, id: Uuid) -> Result<Option<Order>, DatabaseError>;
    /// Sum of all order totals; `None` when there are no orders at all
    async fn total_sales(&self) -> Result<Option<Decimal>, DatabaseError>;
    async fn count_orders(&self) -> Result<i64, DatabaseError>;
}

/// Every store the application needs, as shared trait objects
#[derive(Clone)]
pub struct Stores {
    pub categories: Arc<dyn CategoryStore>,
    pub products: Arc<dyn ProductStore>,
    pub users: Arc<dyn UserStore>,
    pub line_items: Arc<dyn LineItemStore>,
    pub orders: Arc<dyn OrderStore>,
}

impl Stores {
    /// Back every store with one shared implementation
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: CategoryStore + ProductStore + UserStore + LineItemStore + OrderStore + 'static,
    {
        Self {
            categories: backend.clone(),
            products: backend.clone(),
            users: backend.clone(),
            line_items: backend.clone(),
            orders: backend,
        }
    }

    pub fn memory() -> Self {
        Self::from_backend(Arc::new(MemoryStore::new()))
    }
}
