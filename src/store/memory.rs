//! In-process backend selected with `STORE_BACKEND=memory`.
//! Rows live in insertion order; nothing survives a restart.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CategoryStore, LineItemStore, OrderStore, ProductStore, UserStore};
use crate::database::manager::DatabaseError;
use crate::database::models::{
    Category, CategoryInput, LineItem, NewLineItem, NewOrder, NewProduct, NewUser, Order,
    OrderStatus, Product, User,
};

#[derive(Default)]
pub struct MemoryStore {
    categories: RwLock<Vec<Category>>,
    products: RwLock<Vec<Product>>,
    users: RwLock<Vec<User>>,
    line_items: RwLock<Vec<LineItem>>,
    orders: RwLock<Vec<Order>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn line_items_snapshot(&self) -> Vec<LineItem> {
        self.line_items.read().await.clone()
    }
}

/// Newest first; among equal timestamps the later insert wins
fn newest_first(orders: impl DoubleEndedIterator<Item = Order>) -> Vec<Order> {
    let mut list: Vec<Order> = orders.rev().collect();
    list.sort_by(|a, b| b.date_created.cmp(&a.date_created));
    list
}

#[async_trait]
impl CategoryStore for MemoryStore {
    async fn list_categories(&self) -> Result<Vec<Category>, DatabaseError> {
        Ok(self.categories.read().await.clone())
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, DatabaseError> {
        Ok(self.categories.read().await.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_category(&self, input: CategoryInput) -> Result<Category, DatabaseError> {
        let category = Category {
            id: Uuid::new_v4(),
            name: input.name.unwrap_or_default(),
            icon: input.icon,
            color: input.color,
        };
        self.categories.write().await.push(category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        id: Uuid,
        input: CategoryInput,
    ) -> Result<Option<Category>, DatabaseError> {
        let mut categories = self.categories.write().await;
        Ok(categories.iter_mut().find(|c| c.id == id).map(|category| {
            if let Some(name) = input.name {
                category.name = name;
            }
            if input.icon.is_some() {
                category.icon = input.icon;
            }
            if input.color.is_some() {
                category.color = input.color;
            }
            category.clone()
        }))
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool, DatabaseError> {
        if self.products.read().await.iter().any(|p| p.category == id) {
            return Err(DatabaseError::Conflict(format!("category {} is still referenced", id)));
        }
        let mut categories = self.categories.write().await;
        let before = categories.len();
        categories.retain(|c| c.id != id);
        Ok(categories.len() != before)
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn list_products(&self, categories: Option<Vec<Uuid>>) -> Result<Vec<Product>, DatabaseError> {
        let products = self.products.read().await;
        Ok(products
            .iter()
            .filter(|p| categories.as_ref().map_or(true, |ids| ids.contains(&p.category)))
            .cloned()
            .collect())
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, DatabaseError> {
        Ok(self.products.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn featured_products(&self, limit: i64) -> Result<Vec<Product>, DatabaseError> {
        let products = self.products.read().await;
        let featured = products.iter().filter(|p| p.is_featured).cloned();
        // A zero limit means no limit
        Ok(if limit > 0 {
            featured.take(limit as usize).collect()
        } else {
            featured.collect()
        })
    }

    async fn count_products(&self) -> Result<i64, DatabaseError> {
        Ok(self.products.read().await.len() as i64)
    }

    async fn insert_product(&self, new: NewProduct) -> Result<Product, DatabaseError> {
        let product = Product {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            rich_description: new.rich_description,
            image: new.image,
            images: Vec::new(),
            brand: new.brand,
            price: new.price,
            category: new.category,
            count_in_stock: new.count_in_stock,
            rating: new.rating,
            num_reviews: new.num_reviews,
            is_featured: new.is_featured,
            date_created: Utc::now(),
        };
        self.products.write().await.push(product.clone());
        Ok(product)
    }

    async fn update_product(&self, id: Uuid, new: NewProduct) -> Result<Option<Product>, DatabaseError> {
        let mut products = self.products.write().await;
        Ok(products.iter_mut().find(|p| p.id == id).map(|product| {
            product.name = new.name;
            product.description = new.description;
            product.rich_description = new.rich_description;
            product.image = new.image;
            product.brand = new.brand;
            product.price = new.price;
            product.category = new.category;
            product.count_in_stock = new.count_in_stock;
            product.rating = new.rating;
            product.num_reviews = new.num_reviews;
            product.is_featured = new.is_featured;
            product.clone()
        }))
    }

    async fn set_gallery(&self, id: Uuid, images: Vec<String>) -> Result<Option<Product>, DatabaseError> {
        let mut products = self.products.write().await;
        Ok(products.iter_mut().find(|p| p.id == id).map(|product| {
            product.images = images;
            product.clone()
        }))
    }

    async fn delete_product(&self, id: Uuid) -> Result<Option<Product>, DatabaseError> {
        let mut products = self.products.write().await;
        let position = products.iter().position(|p| p.id == id);
        Ok(position.map(|i| products.remove(i)))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn list_users(&self) -> Result<Vec<User>, DatabaseError> {
        Ok(self.users.read().await.clone())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        Ok(self.users.read().await.iter().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, new: NewUser) -> Result<User, DatabaseError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == new.email) {
            return Err(DatabaseError::Conflict(format!("user with email {} already exists", new.email)));
        }

        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            phone: new.phone,
            is_admin: new.is_admin,
            street: new.street,
            apartment: new.apartment,
            zip: new.zip,
            city: new.city,
            country: new.country,
            date_created: Utc::now(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() != before)
    }

    async fn count_users(&self) -> Result<i64, DatabaseError> {
        Ok(self.users.read().await.len() as i64)
    }
}

#[async_trait]
impl LineItemStore for MemoryStore {
    async fn insert_line_item(&self, item: NewLineItem) -> Result<LineItem, DatabaseError> {
        let line_item = LineItem {
            id: Uuid::new_v4(),
            product: item.product,
            quantity: item.quantity,
        };
        self.line_items.write().await.push(line_item.clone());
        Ok(line_item)
    }

    async fn find_line_item(&self, id: Uuid) -> Result<Option<LineItem>, DatabaseError> {
        Ok(self.line_items.read().await.iter().find(|i| i.id == id).cloned())
    }

    async fn delete_line_item(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut items = self.line_items.write().await;
        let before = items.len();
        items.retain(|i| i.id != id);
        Ok(items.len() != before)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, new: NewOrder) -> Result<Order, DatabaseError> {
        let order = Order {
            id: Uuid::new_v4(),
            order_items: new.order_items,
            shipping: new.shipping,
            status: new.status,
            total_price: new.total_price,
            user: new.user,
            date_created: Utc::now(),
        };
        self.orders.write().await.push(order.clone());
        Ok(order)
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, DatabaseError> {
        Ok(self.orders.read().await.iter().find(|o| o.id == id).cloned())
    }

    async fn list_orders(&self) -> Result<Vec<Order>, DatabaseError> {
        let orders = self.orders.read().await;
        Ok(newest_first(orders.iter().cloned()))
    }

    async fn list_orders_for_user(&self, user: Uuid) -> Result<Vec<Order>, DatabaseError> {
        let orders = self.orders.read().await;
        let mine: Vec<Order> = orders.iter().filter(|o| o.user == user).cloned().collect();
        Ok(newest_first(mine.into_iter()))
    }

    async fn update_order_status(
        &self,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<Option<Order>, DatabaseError> {
        let mut orders = self.orders.write().await;
        Ok(orders.iter_mut().find(|o| o.id == id).map(|order| {
            order.status = status;
            order.clone()
        }))
    }

    async fn delete_order(&self, id: Uuid) -> Result<Option<Order>, DatabaseError> {
        let mut orders = self.orders.write().await;
        let position = orders.iter().position(|o| o.id == id);
        Ok(position.map(|i| orders.remove(i)))
    }

    async fn total_sales(&self) -> Result<Option<Decimal>, DatabaseError> {
        let orders = self.orders.read().await;
        if orders.is_empty() {
            return Ok(None);
        }
        Ok(Some(orders.iter().map(|o| o.total_price).sum()))
    }

    async fn count_orders(&self) -> Result<i64, DatabaseError> {
        Ok(self.orders.read().await.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::ShippingInfo;

    fn new_order(user: Uuid, total: Decimal) -> NewOrder {
        NewOrder {
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
            total_price: total,
            user,
        }
    }

    #[tokio::test]
    async fn total_sales_distinguishes_empty_from_zero() {
        let store = MemoryStore::new();
        assert_eq!(store.total_sales().await.unwrap(), None);

        store.insert_order(new_order(Uuid::new_v4(), Decimal::ZERO)).await.unwrap();
        assert_eq!(store.total_sales().await.unwrap(), Some(Decimal::ZERO));

        store.insert_order(new_order(Uuid::new_v4(), Decimal::new(1250, 2))).await.unwrap();
        assert_eq!(store.total_sales().await.unwrap(), Some(Decimal::new(1250, 2)));
    }

    #[tokio::test]
    async fn orders_list_newest_first() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let first = store.insert_order(new_order(user, Decimal::ONE)).await.unwrap();
        let second = store.insert_order(new_order(user, Decimal::TWO)).await.unwrap();
        store.insert_order(new_order(Uuid::new_v4(), Decimal::TEN)).await.unwrap();

        let mine = store.list_orders_for_user(user).await.unwrap();
        let ids: Vec<Uuid> = mine.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert_eq!(store.list_orders().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = MemoryStore::new();
        let user = NewUser {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password_hash: "x".into(),
            phone: "1".into(),
            is_admin: false,
            street: String::new(),
            apartment: String::new(),
            zip: String::new(),
            city: String::new(),
            country: String::new(),
        };

        store.insert_user(user.clone()).await.unwrap();
        let err = store.insert_user(user).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));
    }
}
