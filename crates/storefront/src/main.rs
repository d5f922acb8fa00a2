//! `storefront` - server and administration console
//!
//! This binary runs the REST API and provides the command-line tools staff
//! use to manage the catalog, customers and orders.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;

use storefront::auth::Authenticator;
use storefront::cli::output::{rating_stars, stock_display, truncate, Table};
use storefront::cli::{
    BrandCommand, CategoryCommand, Cli, Command, ConfigCommand, OrderCommand, OutputFormat,
    ProductCommand, ReviewCommand, SeedCommand, ServeCommand, UserCommand,
};
use storefront::invoice::render_order_invoice;
use storefront::model::{
    NewUser, OrderFilter, OrderStatus, ProductFilter, ProductPatch, RatingFilter, ReviewFilter,
};
use storefront::storage::CategoryQuery;
use storefront::{api, init_logging, seed, Config, Money, Storage};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    // Execute the command
    match cli.command {
        Command::Serve(cmd) => handle_serve(config, cmd),
        Command::Migrate => handle_migrate(&config),
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::Seed(cmd) => handle_seed(&config, &cmd),
        Command::User(cmd) => handle_user(&config, cmd),
        Command::Category(cmd) => handle_category(&config, &cmd),
        Command::Brand(cmd) => handle_brand(&config, cmd),
        Command::Product(cmd) => handle_product(&config, cmd),
        Command::Review(cmd) => handle_review(&config, cmd),
        Command::Order(cmd) => handle_order(&config, cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_storage(config: &Config) -> anyhow::Result<Storage> {
    let path = config.database_path();
    Storage::open(&path).with_context(|| format!("failed to open {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn yes_no(value: bool) -> String {
    let text = if value { "yes" } else { "no" };
    text.to_string()
}

fn print_table(table: &Table, empty: &str) {
    if table.is_empty() {
        println!("{empty}");
    } else {
        print!("{}", table.render());
    }
}

fn handle_serve(mut config: Config, cmd: ServeCommand) -> anyhow::Result<()> {
    if let Some(host) = cmd.host {
        config.server.host = host;
    }
    if let Some(port) = cmd.port {
        config.server.port = port;
    }
    config.validate()?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(api::serve(config))?;
    Ok(())
}

fn handle_migrate(config: &Config) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let stats = storage.stats()?;
    println!(
        "Database {} is at schema version {}",
        storage.path().display(),
        stats.schema_version
    );
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let stats = storage.stats()?;
    let pending = storage.pending_orders()?.len();
    let recent = storage.recent_orders(None)?.len();
    if json {
        let status = serde_json::json!({
            "database_path": config.database_path(),
            "media_root": config.media_root(),
            "stats": stats,
            "pending_orders": pending,
            "recent_orders": recent,
        });
        return print_json(&status);
    }

    println!("storefront status");
    println!("-----------------");
    println!("Database:       {}", config.database_path().display());
    println!("Media:          {}", config.media_root().display());
    println!("Schema version: {}", stats.schema_version);
    // Precision loss is irrelevant for a size display.
    #[allow(clippy::cast_precision_loss)]
    let size_mb = stats.db_size_bytes as f64 / (1024.0 * 1024.0);
    println!("Size:           {size_mb:.2} MB");
    println!("Pending orders: {pending}");
    println!("Orders (30 d):  {recent}");
    println!();
    for count in &stats.tables {
        println!("  {:<16}{}", count.table, count.rows);
    }
    Ok(())
}

fn handle_seed(config: &Config, cmd: &SeedCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    println!(
        "Seeding {} products and {} users...",
        cmd.count, cmd.users
    );
    let report = seed::seed(&storage, &mut rand::thread_rng(), cmd.count, cmd.users)?;
    println!("Created:");
    println!("  categories      {}", report.categories);
    println!("  brands          {}", report.brands);
    println!("  users           {}", report.users);
    println!("  products        {}", report.products);
    println!("  images          {}", report.images);
    println!("  reviews         {}", report.reviews);
    println!("  profiles        {}", report.profiles);
    println!("  wishlist items  {}", report.wishlist_items);
    println!("  cart items      {}", report.cart_items);
    println!("  orders          {}", report.orders);
    println!("Seeded accounts use the password \"{}\".", seed::SEED_PASSWORD);
    Ok(())
}

fn handle_user(config: &Config, cmd: UserCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    match cmd {
        UserCommand::Create {
            username,
            email,
            password,
            first_name,
            last_name,
            staff,
        } => {
            let auth = Authenticator::from_config(&config.auth);
            let mut user = auth.register(
                &storage,
                &NewUser {
                    username,
                    email,
                    password2: password.clone(),
                    password,
                    first_name,
                    last_name,
                },
            )?;
            if staff {
                user = storage.set_staff(user.id, true)?;
            }
            println!(
                "Created user {} (id {}){}",
                user.username,
                user.id,
                if user.is_staff { " with staff rights" } else { "" }
            );
        }
        UserCommand::List { limit, format } => {
            let users = storage.list_users(limit)?;
            if format == OutputFormat::Json {
                return print_json(&users);
            }
            let mut table = Table::new(&["ID", "Username", "E-mail", "Name", "Staff", "Active"]);
            for user in &users {
                table.row(vec![
                    user.id.to_string(),
                    user.username.clone(),
                    user.email.clone(),
                    user.display_name(),
                    yes_no(user.is_staff),
                    yes_no(user.is_active),
                ]);
            }
            print_table(&table, "No users.");
        }
        UserCommand::Promote { username } => {
            let user = find_user(&storage, &username)?;
            storage.set_staff(user, true)?;
            println!("{username} is now staff");
        }
        UserCommand::Deactivate { username } => {
            let user = find_user(&storage, &username)?;
            storage.set_active(user, false)?;
            storage.delete_token(user)?;
            println!("{username} deactivated");
        }
    }
    Ok(())
}

fn find_user(storage: &Storage, username: &str) -> anyhow::Result<i64> {
    match storage.get_user_by_username(username)? {
        Some(user) => Ok(user.id),
        None => bail!("no user named {username}"),
    }
}

fn handle_category(config: &Config, cmd: &CategoryCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let CategoryCommand::List { format } = cmd;

    let categories = storage.list_categories(&CategoryQuery::default())?;
    let counts: HashMap<i64, i64> = storage
        .category_stats()?
        .into_iter()
        .map(|s| (s.id, s.products_count))
        .collect();

    if *format == OutputFormat::Json {
        let rows: Vec<_> = categories
            .iter()
            .map(|c| {
                serde_json::json!({
                    "category": c,
                    "products_count": counts.get(&c.id).copied().unwrap_or(0),
                })
            })
            .collect();
        return print_json(&rows);
    }

    let mut table = Table::new(&["ID", "Name", "Slug", "Parent", "Subcategories", "Products"]);
    for category in &categories {
        table.row(vec![
            category.id.to_string(),
            category.name.clone(),
            category.slug.clone(),
            category.parent_name.clone().unwrap_or_default(),
            category.children_count.to_string(),
            counts.get(&category.id).copied().unwrap_or(0).to_string(),
        ]);
    }
    print_table(&table, "No categories.");
    Ok(())
}

fn handle_brand(config: &Config, cmd: BrandCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let BrandCommand::List { search, format } = cmd;

    let brands = storage.list_brands(search.as_deref())?;
    if format == OutputFormat::Json {
        return print_json(&brands);
    }
    let mut table = Table::new(&["ID", "Name", "Slug", "Website", "Products"]);
    for brand in &brands {
        table.row(vec![
            brand.id.to_string(),
            brand.name.clone(),
            brand.slug.clone(),
            brand.official_website.clone().unwrap_or_default(),
            brand.products_count.to_string(),
        ]);
    }
    print_table(&table, "No brands.");
    Ok(())
}

fn handle_product(config: &Config, cmd: ProductCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let threshold = config.catalog.low_stock_threshold;
    match cmd {
        ProductCommand::List {
            stock,
            category,
            search,
            limit,
            top_rated,
            format,
        } => {
            let products = if top_rated {
                let mut rated =
                    storage.products_with_high_rating(config.catalog.high_rating_threshold)?;
                rated.truncate(limit.unwrap_or(usize::MAX));
                rated
            } else {
                storage.list_products(&ProductFilter {
                    category_slug: category,
                    search,
                    stock: stock.map(Into::into),
                    low_stock_threshold: Some(threshold),
                    limit,
                    ..ProductFilter::default()
                })?
            };
            if format == OutputFormat::Json {
                return print_json(&products);
            }
            let mut table = Table::new(&[
                "ID", "Name", "Brand", "Category", "Price", "Stock", "Rating", "Available",
                "Featured",
            ]);
            for product in &products {
                table.row(vec![
                    product.id.to_string(),
                    truncate(&product.name, 40),
                    product.brand_name.clone(),
                    product.category_name.clone(),
                    format!("{} {}", product.price, config.invoice.currency),
                    stock_display(product.stock, threshold),
                    rating_stars(product.average_rating),
                    yes_no(product.is_available),
                    yes_no(product.is_featured),
                ]);
            }
            print_table(&table, "No products match.");
            println!("{} product(s)", products.len());
        }
        ProductCommand::Update {
            id,
            price,
            stock,
            available,
            featured,
        } => {
            let price = price
                .map(|p| p.parse::<Money>())
                .transpose()
                .context("invalid --price")?;
            let patch = ProductPatch {
                price,
                stock,
                is_available: available,
                is_featured: featured,
                ..ProductPatch::default()
            };
            let product = storage.update_product(id, &patch)?;
            println!(
                "Updated {}: price {} {}, stock {}, available {}, featured {}",
                product.summary.name,
                product.summary.price,
                config.invoice.currency,
                product.summary.stock,
                yes_no(product.summary.is_available),
                yes_no(product.summary.is_featured)
            );
        }
    }
    Ok(())
}

fn handle_review(config: &Config, cmd: ReviewCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    match cmd {
        ReviewCommand::List {
            rating,
            product,
            answered,
            format,
        } => {
            let filter = ReviewFilter {
                product,
                rating_band: rating.map(RatingFilter::new).transpose()?,
                with_response: answered.then_some(true),
                ..ReviewFilter::default()
            };
            let reviews = storage.list_reviews(&filter)?;
            if format == OutputFormat::Json {
                return print_json(&reviews);
            }
            let mut table = Table::new(&["ID", "Product", "User", "Rating", "Comment", "Response"]);
            for review in &reviews {
                table.row(vec![
                    review.id.to_string(),
                    truncate(&review.product_name, 30),
                    review.user_name.clone(),
                    "★".repeat(usize::try_from(review.rating).unwrap_or(0)),
                    truncate(review.comment.as_deref().unwrap_or_default(), 40),
                    yes_no(review.admin_response.is_some()),
                ]);
            }
            print_table(&table, "No reviews match.");
        }
        ReviewCommand::Respond { id, text } => {
            let review = storage.respond_to_review(id, &text)?;
            println!(
                "Responded to review {} on {}",
                review.id, review.product_name
            );
        }
    }
    Ok(())
}

fn handle_order(config: &Config, cmd: OrderCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    match cmd {
        OrderCommand::List {
            status,
            recent,
            limit,
            format,
        } => {
            let filter = OrderFilter {
                user: None,
                status: status.map(Into::into),
                recent_days: recent,
                limit,
            };
            let orders = storage.list_orders(&filter)?;
            if format == OutputFormat::Json {
                return print_json(&orders);
            }
            let mut table =
                Table::new(&["ID", "Number", "Customer", "Status", "Total", "Items", "Created"]);
            for order in &orders {
                table.row(vec![
                    order.id.to_string(),
                    order.order_number.clone(),
                    order.user_email.clone(),
                    order.status_display.to_string(),
                    format!("{} {}", order.total_amount, config.invoice.currency),
                    order.items.len().to_string(),
                    order.created_at.format("%d.%m.%Y %H:%M").to_string(),
                ]);
            }
            print_table(&table, "No orders match.");
        }
        OrderCommand::Mark { status, ids } => {
            let status: OrderStatus = status.into();
            let changed = storage.bulk_set_status(&ids, status)?;
            println!("{changed} order(s) marked as {}", status.label().to_lowercase());
        }
        OrderCommand::Invoice { id, out } => {
            let invoice = render_order_invoice(&storage, id, &config.invoice)?;
            let path = out.unwrap_or_else(|| PathBuf::from(&invoice.filename));
            std::fs::write(&path, &invoice.pdf)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {} ({} bytes)", path.display(), invoice.pdf.len());
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                return print_json(config);
            }
            println!("Current Configuration");
            println!("=====================");
            println!();
            println!("[Server]");
            println!("  Address:            {}:{}", config.server.host, config.server.port);
            println!("  CORS origins:       {}", config.server.cors_origins.join(", "));
            println!("  Max upload bytes:   {}", config.server.max_upload_bytes);
            println!();
            println!("[Storage]");
            println!("  Database path:      {}", config.database_path().display());
            println!("  Media root:         {}", config.media_root().display());
            println!("  Media URL:          {}", config.storage.media_url);
            println!();
            println!("[Catalog]");
            println!("  Featured cache (s): {}", config.catalog.featured_cache_secs);
            println!("  Category cache (s): {}", config.catalog.categories_cache_secs);
            println!("  Low stock below:    {}", config.catalog.low_stock_threshold);
            println!("  High rating from:   {}", config.catalog.high_rating_threshold);
            println!();
            println!("[Auth]");
            println!("  PBKDF2 iterations:  {}", config.auth.pbkdf2_iterations);
            println!("  Min password len:   {}", config.auth.min_password_length);
            println!();
            println!("[Invoice]");
            println!("  Font:               {} in {}", config.invoice.font_family, config.invoice.font_dir.display());
            println!("  Currency:           {}", config.invoice.currency);
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
