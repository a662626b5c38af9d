#![allow(dead_code)]

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use uuid::Uuid;

use eshop_api::config::{AppConfig, RevocationPolicy, StoreBackend};
use eshop_api::database::models::{CategoryInput, NewProduct, Product};
use eshop_api::handlers::users::{insert_user, UserPayload};
use eshop_api::state::AppState;
use eshop_api::store::Stores;

pub const PASSWORD: &str = "correct horse battery staple";

/// One in-process server per test, backed by the memory store
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub state: AppState,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        Self::with_policy(RevocationPolicy::AdminOnly).await
    }

    pub async fn with_policy(policy: RevocationPolicy) -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut config = AppConfig::development();
        config.database.backend = StoreBackend::Memory;
        config.api.host = "127.0.0.1".to_string();
        config.api.port = port;
        config.api.upload_dir = std::env::temp_dir().join(format!("eshop-test-{}", Uuid::new_v4()));
        config.security.jwt_secret = "integration-test-secret".to_string();
        config.security.bcrypt_cost = 4;
        config.security.revocation_policy = policy;

        let state = AppState::new(config, Stores::memory());
        state.uploads.ensure_dir().await?;

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test port")?;
        let app = eshop_api::app(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let server = Self {
            port,
            base_url,
            state,
            client: reqwest::Client::new(),
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL of a route under the API prefix
    pub fn api(&self, path: &str) -> String {
        self.url(&self.state.config.api_path(path))
    }

    /// Store a user directly and return it with a freshly issued token
    pub async fn seed_user(&self, email: &str, is_admin: bool) -> Result<(Uuid, String)> {
        let user = insert_user(
            &self.state,
            UserPayload {
                name: Some(email.split('@').next().unwrap_or("user").to_string()),
                email: Some(email.to_string()),
                password: Some(PASSWORD.to_string()),
                phone: Some("555-0100".to_string()),
                is_admin,
                ..UserPayload::default()
            },
        )
        .await
        .map_err(|e| anyhow::anyhow!("seed user: {}", e))?;

        let token = self.state.keys.issue(user.id, user.is_admin)?;
        Ok((user.id, token))
    }

    pub async fn admin_token(&self) -> Result<String> {
        let (_, token) = self.seed_user(&format!("admin-{}@example.com", Uuid::new_v4()), true).await?;
        Ok(token)
    }

    pub async fn seed_category(&self, name: &str) -> Result<Uuid> {
        let category = self
            .state
            .stores
            .categories
            .insert_category(CategoryInput {
                name: Some(name.to_string()),
                icon: None,
                color: None,
            })
            .await?;
        Ok(category.id)
    }

    pub async fn seed_product(&self, name: &str, price: Decimal, category: Uuid) -> Result<Product> {
        let product = self
            .state
            .stores
            .products
            .insert_product(NewProduct {
                name: name.to_string(),
                description: format!("{} description", name),
                rich_description: String::new(),
                image: String::new(),
                brand: "Acme".to_string(),
                price,
                category,
                count_in_stock: 10,
                rating: 4.5,
                num_reviews: 2,
                is_featured: false,
            })
            .await?;
        Ok(product)
    }
}

/// Shipping block shared by order payloads
pub fn shipping() -> serde_json::Value {
    serde_json::json!({
        "shippingAddress1": "1 Main St",
        "zip": "12345",
        "city": "Springfield",
        "country": "US",
        "phone": "555-0100"
    })
}

/// Order payload for `user` with (product, quantity) entries
pub fn order_payload(user: Uuid, items: &[(Uuid, i64)]) -> serde_json::Value {
    let mut body = shipping();
    body["user"] = serde_json::json!(user);
    body["orderItems"] = items
        .iter()
        .map(|(product, quantity)| serde_json::json!({ "product": product, "quantity": quantity }))
        .collect();
    body
}
