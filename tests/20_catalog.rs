mod common;

use anyhow::Result;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use common::TestServer;

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot really a picture";

fn image(name: &str, mime: &str) -> Result<Part> {
    Ok(Part::bytes(PNG_BYTES.to_vec()).file_name(name.to_string()).mime_str(mime)?)
}

fn product_form(name: &str, category: Uuid, price: &str) -> Form {
    Form::new()
        .text("name", name.to_string())
        .text("description", format!("{} description", name))
        .text("brand", "Acme")
        .text("price", price.to_string())
        .text("category", category.to_string())
        .text("countInStock", "7")
        .text("isFeatured", "true")
}

#[tokio::test]
async fn category_lifecycle() -> Result<()> {
    let server = TestServer::start().await?;
    let token = server.admin_token().await?;
    let client = &server.client;

    let res = client
        .post(server.api("/categories"))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "name": "Books", "icon": "book", "color": "#333" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = res.json::<Value>().await?;
    let id = body["data"]["id"].as_str().expect("category id").to_string();
    assert_eq!(body["data"]["name"], "Books");

    let res = client
        .put(server.api(&format!("/categories/{}", id)))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "color": "#fff" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["name"], "Books");
    assert_eq!(body["data"]["color"], "#fff");

    let res = client.get(server.api(&format!("/categories/{}", id))).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .delete(server.api(&format!("/categories/{}", id)))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(server.api(&format!("/categories/{}", id))).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn category_requires_a_name() -> Result<()> {
    let server = TestServer::start().await?;
    let token = server.admin_token().await?;

    let res = server
        .client
        .post(server.api("/categories"))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "icon": "book" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert!(body["field_errors"]["name"].is_string());

    Ok(())
}

#[tokio::test]
async fn category_in_use_cannot_be_deleted() -> Result<()> {
    let server = TestServer::start().await?;
    let token = server.admin_token().await?;
    let category = server.seed_category("Books").await?;
    server.seed_product("Novel", Decimal::new(999, 2), category).await?;

    let res = server
        .client
        .delete(server.api(&format!("/categories/{}", category)))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    Ok(())
}

#[tokio::test]
async fn malformed_id_is_bad_request() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server.client.get(server.api("/products/6114196235f8692078ed8629")).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn product_upload_is_served_back() -> Result<()> {
    let server = TestServer::start().await?;
    let token = server.admin_token().await?;
    let category = server.seed_category("Books").await?;

    let form = product_form("Field Guide", category, "19.50").part("image", image("cover photo.png", "image/png")?);
    let res = server
        .client
        .post(server.api("/products"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let body = res.json::<Value>().await?;
    let product = &body["data"];
    assert_eq!(product["price"], "19.50");
    assert_eq!(product["countInStock"], 7);
    assert_eq!(product["isFeatured"], true);

    let image_url = product["image"].as_str().expect("image url");
    assert!(image_url.contains("/public/uploads/cover-photo.png-"));
    assert!(image_url.ends_with(".png"));

    // The stored file is reachable without a token
    let path = &image_url[image_url.find("/public/uploads/").expect("upload path")..];
    let res = server.client.get(server.url(path)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.bytes().await?.as_ref(), PNG_BYTES);

    // Listing inlines the category record
    let res = server.client.get(server.api("/products")).send().await?;
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"][0]["category"]["name"], "Books");

    Ok(())
}

#[tokio::test]
async fn product_without_image_is_rejected() -> Result<()> {
    let server = TestServer::start().await?;
    let token = server.admin_token().await?;
    let category = server.seed_category("Books").await?;

    let res = server
        .client
        .post(server.api("/products"))
        .bearer_auth(&token)
        .multipart(product_form("Field Guide", category, "19.50"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert!(body["field_errors"]["image"].is_string());

    Ok(())
}

#[tokio::test]
async fn product_image_type_is_checked() -> Result<()> {
    let server = TestServer::start().await?;
    let token = server.admin_token().await?;
    let category = server.seed_category("Books").await?;

    let form = product_form("Field Guide", category, "19.50").part("image", image("notes.gif", "image/gif")?);
    let res = server
        .client
        .post(server.api("/products"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server.client.get(server.api("/products/get/count")).send().await?;
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["productCount"], 0);

    Ok(())
}

#[tokio::test]
async fn product_with_unknown_category_is_rejected() -> Result<()> {
    let server = TestServer::start().await?;
    let token = server.admin_token().await?;

    let form = product_form("Field Guide", Uuid::new_v4(), "19.50").part("image", image("cover.png", "image/png")?);
    let res = server
        .client
        .post(server.api("/products"))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert_eq!(body["field_errors"]["category"], "Invalid category");

    Ok(())
}

#[tokio::test]
async fn products_filter_by_category_and_feature_flag() -> Result<()> {
    let server = TestServer::start().await?;
    let books = server.seed_category("Books").await?;
    let games = server.seed_category("Games").await?;
    server.seed_product("Novel", Decimal::new(1000, 2), books).await?;
    server.seed_product("Atlas", Decimal::new(2500, 2), books).await?;
    let chess = server.seed_product("Chess", Decimal::new(4000, 2), games).await?;

    let res = server
        .client
        .get(server.api(&format!("/products?categories={}", games)))
        .send()
        .await?;
    let body = res.json::<Value>().await?;
    let listed = body["data"].as_array().expect("product list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["name"], "Chess");

    let res = server
        .client
        .get(server.api(&format!("/products?categories={},{}", games, books)))
        .send()
        .await?;
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(3));

    // Nothing is featured yet
    let res = server.client.get(server.api("/products/get/featured/0")).send().await?;
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"], serde_json::json!([]));

    let res = server.client.get(server.api("/products/get/featured/-1")).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server.client.get(server.api(&format!("/products/{}", chess.id))).send().await?;
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["category"]["name"], "Games");

    Ok(())
}

#[tokio::test]
async fn gallery_is_capped_and_product_delete_is_404_after() -> Result<()> {
    let server = TestServer::start().await?;
    let token = server.admin_token().await?;
    let category = server.seed_category("Books").await?;
    let product = server.seed_product("Novel", Decimal::new(1000, 2), category).await?;

    let mut form = Form::new();
    for i in 0..11 {
        form = form.part("images", image(&format!("page{}.png", i), "image/png")?);
    }
    let res = server
        .client
        .put(server.api(&format!("/products/gallery-images/{}", product.id)))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let form = Form::new()
        .part("images", image("front.png", "image/png")?)
        .part("images", image("back.jpg", "image/jpeg")?);
    let res = server
        .client
        .put(server.api(&format!("/products/gallery-images/{}", product.id)))
        .bearer_auth(&token)
        .multipart(form)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["images"].as_array().map(Vec::len), Some(2));

    let res = server
        .client
        .delete(server.api(&format!("/products/{}", product.id)))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server
        .client
        .delete(server.api(&format!("/products/{}", product.id)))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    Ok(())
}
