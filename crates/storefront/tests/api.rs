//! End-to-end tests of the HTTP API against an in-memory database.

use std::path::PathBuf;

use axum::body::{to_bytes, Body, Bytes};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use storefront::api::{router, AppState};
use storefront::auth::Authenticator;
use storefront::model::{NewBrand, NewCategory, NewProduct, NewUser};
use storefront::{Config, Money, Storage};

const PASSWORD: &str = "Blue-Tractor-42";
const BOUNDARY: &str = "storefront-test-boundary";
const FONT_FAMILY: &str = "LiberationSans";

struct TestApp {
    router: Router,
    /// Ids of an available and an unavailable product.
    on_sale: i64,
    hidden: i64,
    category: i64,
    brand: i64,
    dir: TempDir,
}

/// A directory with the Liberation Sans family, if installed.
fn font_dir() -> Option<PathBuf> {
    std::env::var_os("STOREFRONT_TEST_FONT_DIR")
        .map(PathBuf::from)
        .into_iter()
        .chain(
            [
                "/usr/share/fonts/truetype/liberation",
                "/usr/share/fonts/truetype/liberation2",
                "/usr/share/fonts/liberation-sans",
                "/usr/share/fonts/liberation",
                "/usr/share/fonts/TTF",
            ]
            .iter()
            .map(PathBuf::from),
        )
        .find(|dir| {
            ["Regular", "Bold", "Italic", "BoldItalic"]
                .iter()
                .all(|style| dir.join(format!("{FONT_FAMILY}-{style}.ttf")).is_file())
        })
}

fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.auth.pbkdf2_iterations = 1_000;
    config.storage.media_root = Some(dir.path().join("media"));
    if let Some(fonts) = font_dir() {
        config.invoice.font_dir = fonts;
        config.invoice.font_family = FONT_FAMILY.to_string();
    }
    config
}

/// A multipart body with text `fields` and one file part.
fn multipart(fields: &[(&str, &str)], file: (&str, &str, &[u8])) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    let (name, file_name, bytes) = file;
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn register(storage: &Storage, auth: &Authenticator, username: &str) -> i64 {
    auth.register(
        storage,
        &NewUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password: PASSWORD.to_string(),
            password2: PASSWORD.to_string(),
            first_name: String::new(),
            last_name: String::new(),
        },
    )
    .unwrap()
    .id
}

fn product(storage: &Storage, category: i64, brand: i64, name: &str, available: bool) -> i64 {
    storage
        .create_product(&NewProduct {
            name: name.to_string(),
            slug: None,
            description: None,
            category,
            brand,
            price: Money::from_major(250),
            stock: 3,
            warranty_months: 12,
            is_available: available,
            is_featured: false,
        })
        .unwrap()
        .summary
        .id
}

fn app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let storage = Storage::open(dir.path().join("storefront.db")).unwrap();
    let auth = Authenticator::from_config(&config.auth);

    let admin = register(&storage, &auth, "admin");
    storage.set_staff(admin, true).unwrap();
    register(&storage, &auth, "alice");
    register(&storage, &auth, "bob");

    let category = storage
        .create_category(&NewCategory {
            name: "Phones".to_string(),
            slug: None,
            parent: None,
        })
        .unwrap()
        .id;
    let brand = storage
        .create_brand(&NewBrand {
            name: "Acme".to_string(),
            slug: None,
            official_website: None,
            description: None,
        })
        .unwrap()
        .id;
    let on_sale = product(&storage, category, brand, "Acme One", true);
    let hidden = product(&storage, category, brand, "Acme Prototype", false);

    TestApp {
        router: router(AppState::new(storage, config)),
        on_sale,
        hidden,
        category,
        brand,
        dir,
    }
}

impl TestApp {
    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Token {token}"));
        }
        let body = match body {
            Some(value) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let (status, _, bytes) = self.send(request.body(body).unwrap()).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, bytes)
    }

    /// `GET` returning the raw response.
    async fn fetch(&self, uri: &str, token: Option<&str>) -> (StatusCode, HeaderMap, Bytes) {
        let mut request = Request::builder().method(Method::GET).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Token {token}"));
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    async fn upload(
        &self,
        uri: &str,
        token: &str,
        fields: &[(&str, &str)],
        file: (&str, &str, &[u8]),
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Token {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart(fields, file)))
            .unwrap();
        let (status, _, bytes) = self.send(request).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    /// Put one unit of the available product in the user's cart and check
    /// out. Returns the order.
    async fn place_order(&self, token: &str) -> Value {
        let (status, item) = self
            .call(
                Method::POST,
                "/api/cart-items",
                Some(token),
                Some(json!({ "product": self.on_sale })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{item}");
        let (_, cart) = self.call(Method::GET, "/api/carts/me", Some(token), None).await;
        let (status, order) = self
            .call(
                Method::POST,
                "/api/orders",
                Some(token),
                Some(json!({
                    "cart_id": cart["id"],
                    "shipping_address": "Казань, Баумана 5",
                    "phone_number": "+7 999 123-45-67",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{order}");
        order
    }

    /// A second connection to the app's database.
    fn storage(&self) -> Storage {
        Storage::open(self.dir.path().join("storefront.db")).unwrap()
    }

    async fn login(&self, username: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "username": username, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }
}

fn ids(list: &Value) -> Vec<i64> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = app.call(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_register_then_login() {
    let app = app();
    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "username": "carol",
                "email": "carol@example.com",
                "password": PASSWORD,
                "password2": PASSWORD,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["username"], "carol");
    assert!(body.get("password_hash").is_none());

    let token = app.login("carol").await;
    assert_eq!(token.len(), 40);
    let (status, me) = app.call(Method::GET, "/api/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "carol@example.com");
}

#[tokio::test]
async fn test_register_rejects_mismatched_passwords() {
    let app = app();
    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "username": "dave",
                "email": "dave@example.com",
                "password": PASSWORD,
                "password2": "something-else-1",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_login_with_wrong_password() {
    let app = app();
    let (status, _) = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "wrong-password-1" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unavailable_products_hidden_from_customers() {
    let app = app();

    let (status, list) = app.call(Method::GET, "/api/products", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&list), vec![app.on_sale]);

    let uri = format!("/api/products/{}", app.hidden);
    let (status, _) = app.call(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let admin = app.login("admin").await;
    let (_, list) = app.call(Method::GET, "/api/products", Some(&admin), None).await;
    let mut seen = ids(&list);
    seen.sort_unstable();
    assert_eq!(seen, vec![app.on_sale, app.hidden]);
    let (status, _) = app.call(Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_price_filter_names_field() {
    let app = app();
    let (status, body) = app
        .call(Method::GET, "/api/products?min_price=cheap", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "min_price");
}

#[tokio::test]
async fn test_catalog_writes_require_staff() {
    let app = app();
    let category = json!({ "name": "Tablets" });

    let (status, _) = app
        .call(Method::POST, "/api/categories", None, Some(category.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let alice = app.login("alice").await;
    let (status, _) = app
        .call(Method::POST, "/api/categories", Some(&alice), Some(category.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = app.login("admin").await;
    let (status, body) = app
        .call(Method::POST, "/api/categories", Some(&admin), Some(category))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["slug"], "tablets");
}

#[tokio::test]
async fn test_cart_checkout_and_stock() {
    let app = app();
    let alice = app.login("alice").await;

    let (status, item) = app
        .call(
            Method::POST,
            "/api/cart-items",
            Some(&alice),
            Some(json!({ "product": app.on_sale, "quantity": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{item}");

    let (_, cart) = app.call(Method::GET, "/api/carts/me", Some(&alice), None).await;
    assert_eq!(cart["total_price"], "500.00");

    let (status, order) = app
        .call(
            Method::POST,
            "/api/orders",
            Some(&alice),
            Some(json!({
                "cart_id": cart["id"],
                "shipping_address": "Moscow, Tverskaya 1",
                "phone_number": "+7 999 123-45-67",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["status"], "pending");
    assert_eq!(order["total_amount"], "500.00");
    assert!(order["order_number"].as_str().unwrap().starts_with("ORD-"));

    let (_, cart) = app.call(Method::GET, "/api/carts/me", Some(&alice), None).await;
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(0));

    let uri = format!("/api/products/{}", app.on_sale);
    let (_, product) = app.call(Method::GET, &uri, None, None).await;
    assert_eq!(product["stock"], 1);
}

#[tokio::test]
async fn test_checkout_rejects_more_than_stock() {
    let app = app();
    let alice = app.login("alice").await;
    app.call(
        Method::POST,
        "/api/cart-items",
        Some(&alice),
        Some(json!({ "product": app.on_sale, "quantity": 3 })),
    )
    .await;
    let admin = app.login("admin").await;
    let uri = format!("/api/products/{}", app.on_sale);
    let (status, _) = app
        .call(Method::PATCH, &uri, Some(&admin), Some(json!({ "stock": 1 })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, cart) = app.call(Method::GET, "/api/carts/me", Some(&alice), None).await;
    let (status, body) = app
        .call(
            Method::POST,
            "/api/orders",
            Some(&alice),
            Some(json!({
                "cart_id": cart["id"],
                "shipping_address": "Kazan, Baumana 5",
                "phone_number": "+7 999 000-00-00",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "quantity");

    let (_, orders) = app.call(Method::GET, "/api/orders", Some(&alice), None).await;
    assert_eq!(orders.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_orders_private_to_owner() {
    let app = app();
    let alice = app.login("alice").await;
    app.call(
        Method::POST,
        "/api/cart-items",
        Some(&alice),
        Some(json!({ "product": app.on_sale })),
    )
    .await;
    let (_, cart) = app.call(Method::GET, "/api/carts/me", Some(&alice), None).await;
    let (_, order) = app
        .call(
            Method::POST,
            "/api/orders",
            Some(&alice),
            Some(json!({
                "cart_id": cart["id"],
                "shipping_address": "Omsk, Lenina 10",
                "phone_number": "89991234567",
            })),
        )
        .await;
    let uri = format!("/api/orders/{}", order["id"]);

    let bob = app.login("bob").await;
    let (status, _) = app.call(Method::GET, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, listed) = app.call(Method::GET, "/api/orders", Some(&bob), None).await;
    assert_eq!(listed.as_array().map(Vec::len), Some(0));

    let admin = app.login("admin").await;
    let (status, _) = app.call(Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);

    let status_uri = format!("{uri}/status");
    let (status, _) = app
        .call(
            Method::PATCH,
            &status_uri,
            Some(&alice),
            Some(json!({ "status": "delivered" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, updated) = app
        .call(
            Method::PATCH,
            &status_uri,
            Some(&admin),
            Some(json!({ "status": "shipped" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "shipped");

    let (status, _) = app
        .call(Method::POST, &format!("{uri}/cancel"), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_review_moderation_rights() {
    let app = app();
    let alice = app.login("alice").await;
    let (status, review) = app
        .call(
            Method::POST,
            "/api/reviews",
            Some(&alice),
            Some(json!({ "product": app.on_sale, "rating": 4, "comment": "Solid" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{review}");
    let uri = format!("/api/reviews/{}", review["id"]);

    let bob = app.login("bob").await;
    let (status, _) = app
        .call(Method::PATCH, &uri, Some(&bob), Some(json!({ "rating": 1 })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = app.login("admin").await;
    let (status, answered) = app
        .call(
            Method::PATCH,
            &uri,
            Some(&admin),
            Some(json!({ "admin_response": "Thank you!" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{answered}");
    assert_eq!(answered["admin_response"], "Thank you!");
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let app = app();
    let alice = app.login("alice").await;
    let (status, _) = app
        .call(Method::POST, "/api/auth/logout", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.call(Method::GET, "/api/users/me", Some(&alice), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_rejects_taken_email() {
    let app = app();
    let (status, body) = app
        .call(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "username": "alice2",
                "email": "ALICE@example.com",
                "password": PASSWORD,
                "password2": PASSWORD,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "email");
}

#[tokio::test]
async fn test_image_upload_switches_primary() {
    let app = app();
    let admin = app.login("admin").await;
    let product = app.on_sale.to_string();

    let alice = app.login("alice").await;
    let (status, _) = app
        .upload(
            "/api/product-images",
            &alice,
            &[("product", product.as_str())],
            ("image", "front.png", b"front"),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, first) = app
        .upload(
            "/api/product-images",
            &admin,
            &[("product", product.as_str()), ("is_primary", "true")],
            ("image", "front.png", b"front-bytes"),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{first}");
    assert_eq!(first["is_primary"], true);
    let stored = first["image"].as_str().unwrap().to_string();
    assert!(stored.ends_with("front.png"));
    assert!(app.dir.path().join("media").join(&stored).is_file());

    let (status, second) = app
        .upload(
            "/api/product-images",
            &admin,
            &[("product", product.as_str()), ("is_primary", "on"), ("order", "1")],
            ("image", "back.png", b"back-bytes"),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{second}");

    let uri = format!("/api/product-images?product={product}");
    let (_, images) = app.call(Method::GET, &uri, None, None).await;
    let flags: Vec<(i64, bool)> = images
        .as_array()
        .unwrap()
        .iter()
        .map(|image| (image["id"].as_i64().unwrap(), image["is_primary"].as_bool().unwrap()))
        .collect();
    assert_eq!(
        flags,
        vec![
            (first["id"].as_i64().unwrap(), false),
            (second["id"].as_i64().unwrap(), true),
        ]
    );

    let (status, _, bytes) = app.fetch(&format!("/media/{stored}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&bytes[..], b"front-bytes");

    let (status, body) = app
        .upload(
            "/api/product-images",
            &admin,
            &[("product", "not-a-number")],
            ("image", "x.png", b"x"),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "product");
}

#[tokio::test]
async fn test_file_download_counts() {
    let app = app();
    let admin = app.login("admin").await;
    let product = app.on_sale.to_string();

    let (status, file) = app
        .upload(
            "/api/product-files",
            &admin,
            &[
                ("product", product.as_str()),
                ("file_type", "manual"),
                ("description", "Quick start"),
            ],
            ("file", "manual.pdf", b"%PDF-1.4 manual"),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{file}");
    assert_eq!(file["name"], "manual.pdf");
    assert_eq!(file["size"], 15);
    assert_eq!(file["downloads_count"], 0);

    let uri = format!("/api/product-files/{}/download", file["id"]);
    for _ in 0..2 {
        let (status, headers, bytes) = app.fetch(&uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&bytes[..], b"%PDF-1.4 manual");
        let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.starts_with("attachment; filename=\""));
        assert!(disposition.ends_with("manual.pdf\""));
    }

    let (_, fetched) = app
        .call(Method::GET, &format!("/api/product-files/{}", file["id"]), None, None)
        .await;
    assert_eq!(fetched["downloads_count"], 2);

    let (status, _, _) = app.fetch("/api/product-files/999/download", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wishlist_endpoints() {
    let app = app();
    let alice = app.login("alice").await;

    let (status, _) = app.call(Method::GET, "/api/wishlists/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, item) = app
        .call(
            Method::POST,
            "/api/wishlist-items",
            Some(&alice),
            Some(json!({ "product": app.on_sale })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{item}");
    assert_eq!(item["product_price"], "250.00");

    let (status, _) = app
        .call(
            Method::POST,
            "/api/wishlist-items",
            Some(&alice),
            Some(json!({ "product": app.on_sale })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/wishlist-items",
            Some(&alice),
            Some(json!({ "product": app.hidden })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "product");

    let (_, wishlist) = app.call(Method::GET, "/api/wishlists/me", Some(&alice), None).await;
    assert_eq!(wishlist["items_count"], 1);
    assert_eq!(wishlist["user_email"], "alice@example.com");
    let (_, items) = app.call(Method::GET, "/api/wishlist-items", Some(&alice), None).await;
    assert_eq!(ids(&items), vec![item["id"].as_i64().unwrap()]);

    let bob = app.login("bob").await;
    let (status, _) = app.call(Method::GET, "/api/wishlists", Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let uri = format!("/api/wishlist-items/{}", item["id"]);
    let (status, _) = app.call(Method::DELETE, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.call(Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, wishlist) = app.call(Method::GET, "/api/wishlists/me", Some(&alice), None).await;
    assert_eq!(wishlist["items_count"], 0);

    let admin = app.login("admin").await;
    let (status, all) = app.call(Method::GET, "/api/wishlists", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_unavailable_product_cannot_be_bought() {
    let app = app();
    let alice = app.login("alice").await;
    let (status, body) = app
        .call(
            Method::POST,
            "/api/cart-items",
            Some(&alice),
            Some(json!({ "product": app.hidden, "quantity": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "product");
}

#[tokio::test]
async fn test_category_stats_cache_invalidation() {
    let app = app();
    let stats = |body: &Value| -> Vec<(String, i64)> {
        body.as_array()
            .unwrap()
            .iter()
            .map(|c| {
                (
                    c["slug"].as_str().unwrap().to_string(),
                    c["products_count"].as_i64().unwrap(),
                )
            })
            .collect()
    };

    let (status, body) = app.call(Method::GET, "/api/categories/stats", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats(&body), vec![("phones".to_string(), 2)]);

    // A write behind the API's back is not seen until the entry expires.
    app.storage()
        .create_product(&NewProduct {
            name: "Acme Two".to_string(),
            slug: None,
            description: None,
            category: app.category,
            brand: app.brand,
            price: Money::from_major(300),
            stock: 1,
            warranty_months: 0,
            is_available: true,
            is_featured: false,
        })
        .unwrap();
    let (_, body) = app.call(Method::GET, "/api/categories/stats", None, None).await;
    assert_eq!(stats(&body), vec![("phones".to_string(), 2)]);

    let admin = app.login("admin").await;
    let (status, created) = app
        .call(
            Method::POST,
            "/api/products",
            Some(&admin),
            Some(json!({
                "name": "Acme Three",
                "category": app.category,
                "brand": app.brand,
                "price": "99.90",
                "stock": 4,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");

    let (_, body) = app.call(Method::GET, "/api/categories/stats", None, None).await;
    assert_eq!(stats(&body), vec![("phones".to_string(), 4)]);
}

#[tokio::test]
async fn test_price_above_ten_digits_rejected() {
    let app = app();
    let admin = app.login("admin").await;
    let (status, body) = app
        .call(
            Method::POST,
            "/api/products",
            Some(&admin),
            Some(json!({
                "name": "Acme Gold",
                "category": app.category,
                "brand": app.brand,
                "price": "50000000000000000.00",
                "stock": 2,
            })),
        )
        .await;
    assert!(status.is_client_error(), "{status} {body}");

    let uri = format!("/api/products/{}", app.on_sale);
    let (status, body) = app
        .call(
            Method::PATCH,
            &uri,
            Some(&admin),
            Some(json!({ "price": "99999999.99" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let alice = app.login("alice").await;
    let (status, body) = app
        .call(
            Method::POST,
            "/api/cart-items",
            Some(&alice),
            Some(json!({ "product": app.on_sale, "quantity": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "quantity");
}

#[tokio::test]
async fn test_invoice_access() {
    let app = app();
    let alice = app.login("alice").await;
    let order = app.place_order(&alice).await;
    let invoice = format!("/api/orders/{}/invoice", order["id"]);
    let admin_pdf = format!("/admin/orders/order/{}/pdf", order["id"]);

    let (status, _, _) = app.fetch(&invoice, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let bob = app.login("bob").await;
    let (status, _, _) = app.fetch(&invoice, Some(&bob)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = app.fetch(&admin_pdf, Some(&alice)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let admin = app.login("admin").await;
    let (status, _, _) = app.fetch("/admin/orders/order/999/pdf", Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    if font_dir().is_none() {
        eprintln!("skipping PDF checks: Liberation Sans not installed");
        return;
    }
    let number = order["order_number"].as_str().unwrap();
    for (uri, token) in [(&invoice, &alice), (&admin_pdf, &admin)] {
        let (status, headers, bytes) = app.fetch(uri, Some(token)).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
        let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(
            disposition.starts_with(&format!("attachment; filename=\"{number}_")),
            "{disposition}"
        );
        assert!(disposition.ends_with(".pdf\""));
        assert!(bytes.starts_with(b"%PDF"));
    }
}
