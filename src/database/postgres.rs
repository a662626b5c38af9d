//! Postgres implementations of the store traits

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    Category, CategoryInput, LineItem, NewLineItem, NewOrder, NewProduct, NewUser, Order,
    OrderStatus, Product, ShippingInfo, User,
};
use crate::database::repository::Repository;
use crate::store::{CategoryStore, LineItemStore, OrderStore, ProductStore, UserStore};

/// Row shape of `orders`; status is stored as free text
#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    order_items: Vec<Uuid>,
    #[sqlx(flatten)]
    shipping: ShippingInfo,
    status: String,
    total_price: Decimal,
    user_id: Uuid,
    date_created: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            order_items: row.order_items,
            shipping: row.shipping,
            status: OrderStatus::from(row.status),
            total_price: row.total_price,
            user: row.user_id,
            date_created: row.date_created,
        }
    }
}

pub struct PgStore {
    pool: PgPool,
    categories: Repository<Category>,
    products: Repository<Product>,
    users: Repository<User>,
    line_items: Repository<LineItem>,
    orders: Repository<OrderRow>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Result<Self, DatabaseError> {
        Ok(Self {
            categories: Repository::new("categories", pool.clone())?,
            products: Repository::new("products", pool.clone())?,
            users: Repository::new("users", pool.clone())?,
            line_items: Repository::new("order_items", pool.clone())?,
            orders: Repository::new("orders", pool.clone())?,
            pool,
        })
    }
}

#[async_trait]
impl CategoryStore for PgStore {
    async fn list_categories(&self) -> Result<Vec<Category>, DatabaseError> {
        self.categories.select_all("name").await
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, DatabaseError> {
        self.categories.select_id(id).await
    }

    async fn insert_category(&self, input: CategoryInput) -> Result<Category, DatabaseError> {
        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (id, name, icon, color) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(input.name.unwrap_or_default())
        .bind(input.icon)
        .bind(input.color)
        .fetch_one(&self.pool)
        .await?;
        Ok(category)
    }

    async fn update_category(
        &self,
        id: Uuid,
        input: CategoryInput,
    ) -> Result<Option<Category>, DatabaseError> {
        let category = sqlx::query_as::<_, Category>(
            "UPDATE categories
             SET name = COALESCE($2, name), icon = COALESCE($3, icon), color = COALESCE($4, color)
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(input.name)
        .bind(input.icon)
        .bind(input.color)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let deleted = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_write(e, &format!("category {}", id)))?;
        Ok(deleted.rows_affected() > 0)
    }
}

#[async_trait]
impl ProductStore for PgStore {
    async fn list_products(&self, categories: Option<Vec<Uuid>>) -> Result<Vec<Product>, DatabaseError> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products
             WHERE $1::uuid[] IS NULL OR category_id = ANY($1)
             ORDER BY date_created",
        )
        .bind(categories)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>, DatabaseError> {
        self.products.select_id(id).await
    }

    async fn featured_products(&self, limit: i64) -> Result<Vec<Product>, DatabaseError> {
        // LIMIT NULL means no limit
        let limit = (limit > 0).then_some(limit);
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE is_featured ORDER BY date_created LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    async fn count_products(&self) -> Result<i64, DatabaseError> {
        self.products.count().await
    }

    async fn insert_product(&self, new: NewProduct) -> Result<Product, DatabaseError> {
        let product = sqlx::query_as::<_, Product>(
            "INSERT INTO products
                (id, name, description, rich_description, image, brand, price, category_id,
                 count_in_stock, rating, num_reviews, is_featured)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(new.name)
        .bind(new.description)
        .bind(new.rich_description)
        .bind(new.image)
        .bind(new.brand)
        .bind(new.price)
        .bind(new.category)
        .bind(new.count_in_stock)
        .bind(new.rating)
        .bind(new.num_reviews)
        .bind(new.is_featured)
        .fetch_one(&self.pool)
        .await?;
        Ok(product)
    }

    async fn update_product(&self, id: Uuid, new: NewProduct) -> Result<Option<Product>, DatabaseError> {
        let product = sqlx::query_as::<_, Product>(
            "UPDATE products
             SET name = $2, description = $3, rich_description = $4, image = $5, brand = $6,
                 price = $7, category_id = $8, count_in_stock = $9, rating = $10,
                 num_reviews = $11, is_featured = $12
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(new.name)
        .bind(new.description)
        .bind(new.rich_description)
        .bind(new.image)
        .bind(new.brand)
        .bind(new.price)
        .bind(new.category)
        .bind(new.count_in_stock)
        .bind(new.rating)
        .bind(new.num_reviews)
        .bind(new.is_featured)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn set_gallery(&self, id: Uuid, images: Vec<String>) -> Result<Option<Product>, DatabaseError> {
        let product = sqlx::query_as::<_, Product>(
            "UPDATE products SET images = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(images)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn delete_product(&self, id: Uuid) -> Result<Option<Product>, DatabaseError> {
        self.products.delete_id(id).await
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn list_users(&self) -> Result<Vec<User>, DatabaseError> {
        self.users.select_all("date_created").await
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        self.users.select_id(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn insert_user(&self, new: NewUser) -> Result<User, DatabaseError> {
        let email = new.email.clone();
        sqlx::query_as::<_, User>(
            "INSERT INTO users
                (id, name, email, password_hash, phone, is_admin, street, apartment, zip, city, country)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(new.name)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.phone)
        .bind(new.is_admin)
        .bind(new.street)
        .bind(new.apartment)
        .bind(new.zip)
        .bind(new.city)
        .bind(new.country)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_write(e, &format!("user with email {}", email)))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.users.delete_id(id).await?.is_some())
    }

    async fn count_users(&self) -> Result<i64, DatabaseError> {
        self.users.count().await
    }
}

#[async_trait]
impl LineItemStore for PgStore {
    async fn insert_line_item(&self, item: NewLineItem) -> Result<LineItem, DatabaseError> {
        let line_item = sqlx::query_as::<_, LineItem>(
            "INSERT INTO order_items (id, product_id, quantity) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(item.product)
        .bind(item.quantity)
        .fetch_one(&self.pool)
        .await?;
        Ok(line_item)
    }

    async fn find_line_item(&self, id: Uuid) -> Result<Option<LineItem>, DatabaseError> {
        self.line_items.select_id(id).await
    }

    async fn delete_line_item(&self, id: Uuid) -> Result<bool, DatabaseError> {
        Ok(self.line_items.delete_id(id).await?.is_some())
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert_order(&self, new: NewOrder) -> Result<Order, DatabaseError> {
        let row = sqlx::query_as::<_, OrderRow>(
            "INSERT INTO orders
                (id, order_items, shipping_address1, shipping_address2, zip, city, country, phone,
                 status, total_price, user_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(new.order_items)
        .bind(new.shipping.shipping_address1)
        .bind(new.shipping.shipping_address2)
        .bind(new.shipping.zip)
        .bind(new.shipping.city)
        .bind(new.shipping.country)
        .bind(new.shipping.phone)
        .bind(String::from(new.status))
        .bind(new.total_price)
        .bind(new.user)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>, DatabaseError> {
        Ok(self.orders.select_id(id).await?.map(Order::from))
    }

    async fn list_orders(&self) -> Result<Vec<Order>, DatabaseError> {
        let rows = self.orders.select_all("date_created DESC").await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn list_orders_for_user(&self, user: Uuid) -> Result<Vec<Order>, DatabaseError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY date_created DESC",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn update_order_status(
        &self,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<Option<Order>, DatabaseError> {
        let row = sqlx::query_as::<_, OrderRow>(
            "UPDATE orders SET status = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(String::from(status))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Order::from))
    }

    async fn delete_order(&self, id: Uuid) -> Result<Option<Order>, DatabaseError> {
        Ok(self.orders.delete_id(id).await?.map(Order::from))
    }

    async fn total_sales(&self) -> Result<Option<Decimal>, DatabaseError> {
        // SUM over zero rows is NULL, which is exactly the "no orders" case
        let total: (Option<Decimal>,) = sqlx::query_as("SELECT SUM(total_price) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(total.0)
    }

    async fn count_orders(&self) -> Result<i64, DatabaseError> {
        self.orders.count().await
    }
}
