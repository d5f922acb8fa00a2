//! REST API.
//!
//! JSON endpoints are mounted under `/api`, uploaded media under `/media`
//! and the staff invoice download under `/admin/orders/order/{id}/pdf`.
//! Handlers lock the storage only around synchronous calls (see
//! [`AppState::db`]).

mod accounts;
mod catalog;
mod error;
mod extract;
mod orders;
mod products;
mod reviews;
mod shopping;
mod state;
mod upload;

pub use error::{ApiError, ApiResult};
pub use extract::{CurrentUser, MaybeUser, Staff};
pub use state::AppState;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{Config, ServerConfig};
use crate::error::Result;
use crate::storage::Storage;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let media = ServeDir::new(state.media.root());
    let cors = cors_layer(&state.config.server);
    let body_limit = state.config.server.max_upload_bytes;

    Router::new()
        .nest("/api", api_routes())
        .route(
            "/admin/orders/order/:id/pdf",
            get(orders::admin_order_pdf),
        )
        .nest_service("/media", media)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        // Accounts
        .route("/auth/register", post(accounts::register))
        .route("/auth/login", post(accounts::login))
        .route("/auth/logout", post(accounts::logout))
        .route("/users", get(accounts::list_users))
        .route("/users/me", get(accounts::me).patch(accounts::update_me))
        .route("/users/:id", get(accounts::get_user))
        .route(
            "/profiles/me",
            get(accounts::my_profile).patch(accounts::update_profile),
        )
        .route("/profiles/me/picture", put(accounts::upload_picture))
        // Catalog
        .route(
            "/categories",
            get(catalog::list_categories).post(catalog::create_category),
        )
        .route("/categories/stats", get(catalog::category_stats))
        .route(
            "/categories/:id",
            get(catalog::get_category)
                .patch(catalog::update_category)
                .delete(catalog::delete_category),
        )
        .route(
            "/brands",
            get(catalog::list_brands).post(catalog::create_brand),
        )
        .route(
            "/brands/:id",
            get(catalog::get_brand)
                .patch(catalog::update_brand)
                .delete(catalog::delete_brand),
        )
        .route("/tags", get(catalog::list_tags).post(catalog::create_tag))
        .route(
            "/tags/:id",
            get(catalog::get_tag)
                .patch(catalog::update_tag)
                .delete(catalog::delete_tag),
        )
        // Products
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        .route("/products/featured", get(products::featured_products))
        .route("/products/by-slug/:slug", get(products::product_by_slug))
        .route(
            "/products/:id",
            get(products::get_product)
                .patch(products::update_product)
                .delete(products::delete_product),
        )
        .route("/products/:id/tags", post(products::tag_product))
        .route(
            "/products/:id/tags/:tag_id",
            delete(products::untag_product),
        )
        .route(
            "/product-images",
            get(products::list_images).post(products::upload_image),
        )
        .route(
            "/product-images/:id",
            get(products::get_image)
                .patch(products::update_image)
                .delete(products::delete_image),
        )
        .route(
            "/product-files",
            get(products::list_files).post(products::upload_file),
        )
        .route(
            "/product-files/:id",
            get(products::get_file).delete(products::delete_file),
        )
        .route("/product-files/:id/download", get(products::download_file))
        // Reviews
        .route(
            "/reviews",
            get(reviews::list_reviews).post(reviews::create_review),
        )
        .route(
            "/reviews/:id",
            get(reviews::get_review)
                .patch(reviews::update_review)
                .delete(reviews::delete_review),
        )
        // Wishlists and carts
        .route("/wishlists", get(shopping::list_wishlists))
        .route("/wishlists/me", get(shopping::my_wishlist))
        .route(
            "/wishlist-items",
            get(shopping::list_wishlist_items).post(shopping::add_wishlist_item),
        )
        .route(
            "/wishlist-items/:id",
            delete(shopping::remove_wishlist_item),
        )
        .route(
            "/carts/me",
            get(shopping::my_cart).delete(shopping::clear_cart),
        )
        .route(
            "/cart-items",
            get(shopping::list_cart_items).post(shopping::add_cart_item),
        )
        .route(
            "/cart-items/:id",
            patch(shopping::update_cart_item)
                .delete(shopping::remove_cart_item),
        )
        // Orders
        .route("/orders", get(orders::list_orders).post(orders::checkout))
        .route("/orders/by-number/:number", get(orders::order_by_number))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/cancel", post(orders::cancel_order))
        .route(
            "/orders/:id/status",
            patch(orders::set_status),
        )
        .route("/orders/:id/invoice", get(orders::order_invoice))
        .route("/order-items", get(orders::list_order_items))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": crate::VERSION }))
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if config.cors_origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(origins)
}

/// Open the database and serve the API until Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or the listener cannot
/// bind.
pub async fn serve(config: Config) -> Result<()> {
    let addr = config.bind_addr()?;
    let storage = Storage::open(config.database_path())?;
    let state = AppState::new(storage, config);
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Storefront listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
