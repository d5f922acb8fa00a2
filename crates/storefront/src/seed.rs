//! Fake shop data for development databases.
//!
//! Everything is written through the regular [`Storage`] operations inside a
//! single savepoint, so a failed run leaves the database untouched.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};

use crate::auth::hash_password;
use crate::error::{Error, Result};
use crate::model::{
    Category, NewBrand, NewCategory, NewOrder, NewProduct, NewProductImage, NewReview,
    OrderStatus, ProfilePatch,
};
use crate::money::Money;
use crate::storage::{NewAccount, Storage};
use crate::validate::slugify;

/// Password of every seeded account.
pub const SEED_PASSWORD: &str = "user_password";

/// Iterations used for the shared seed password hash.
const SEED_ITERATIONS: u32 = 10_000;

const MAIN_CATEGORIES: &[&str] = &[
    "Electronics",
    "Clothing",
    "Books",
    "Home and Garden",
    "Sports",
    "Beauty",
    "Toys",
    "Automotive",
];

const ADJECTIVES: &[&str] = &[
    "Smart", "Classic", "Compact", "Premium", "Wireless", "Portable", "Ultra", "Eco", "Pro",
    "Deluxe", "Modern", "Vintage", "Rapid", "Silent", "Solid",
];

const NOUNS: &[&str] = &[
    "Speaker", "Jacket", "Lamp", "Backpack", "Kettle", "Monitor", "Sneakers", "Novel", "Drill",
    "Blender", "Headphones", "Watch", "Tent", "Camera", "Chair", "Keyboard", "Mirror",
];

const BRAND_STEMS: &[&str] = &[
    "Nord", "Vega", "Orion", "Atlas", "Lumen", "Kedr", "Polar", "Ural", "Baikal", "Terra",
    "Zenit", "Astra", "Volna", "Sever", "Granit",
];

const BRAND_SUFFIXES: &[&str] = &["Tech", "Group", "Works", "Labs", "Trade", "Home", "Line"];

const FIRST_NAMES: &[&str] = &[
    "Anna", "Ivan", "Maria", "Pavel", "Olga", "Dmitry", "Elena", "Sergey", "Irina", "Alexey",
];

const LAST_NAMES: &[&str] = &[
    "Ivanova", "Petrov", "Smirnova", "Kuznetsov", "Popova", "Volkov", "Sokolova", "Lebedev",
];

const STREETS: &[&str] = &["Lenina", "Mira", "Sadovaya", "Tverskaya", "Nevsky", "Pushkina"];

const CITIES: &[&str] = &["Moscow", "Kazan", "Novosibirsk", "Samara", "Tula", "Omsk"];

const SENTENCES: &[&str] = &[
    "Works exactly as described.",
    "Delivery was quick and the packaging was intact.",
    "Good value for the price.",
    "The build quality could be better.",
    "I would buy this again.",
    "Comfortable to use every day.",
    "Battery life is shorter than advertised.",
    "Looks great and feels solid.",
];

/// Row counts produced by a seeding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub categories: usize,
    pub brands: usize,
    pub users: usize,
    pub products: usize,
    pub images: usize,
    pub reviews: usize,
    pub profiles: usize,
    pub wishlist_items: usize,
    pub cart_items: usize,
    pub orders: usize,
}

/// Populate `storage` with `products` products and `users` customers.
///
/// # Errors
///
/// Returns the first storage error; nothing is written in that case.
pub fn seed<R: Rng>(
    storage: &Storage,
    rng: &mut R,
    products: usize,
    users: usize,
) -> Result<SeedReport> {
    info!(products, users, "Seeding database");
    let report = storage.atomic(|| Seeder { storage, rng }.run(products, users))?;
    info!(?report, "Seeding finished");
    Ok(report)
}

struct Seeder<'a, R> {
    storage: &'a Storage,
    rng: &'a mut R,
}

impl<R: Rng> Seeder<'_, R> {
    fn run(mut self, product_count: usize, user_count: usize) -> Result<SeedReport> {
        let mut report = SeedReport::default();

        let categories = self.categories()?;
        report.categories = categories.len();
        let brands = self.brands()?;
        report.brands = brands.len();
        let users = self.users(user_count)?;
        report.users = users.len();
        let products = self.products(product_count, &categories, &brands)?;
        report.products = products.len();

        report.images = self.images(&products)?;
        report.reviews = self.reviews(&users, &products)?;
        report.profiles = self.profiles(&users)?;
        report.wishlist_items = self.wishlists(&users, &products)?;
        report.orders = self.orders(&users, &products)?;
        report.cart_items = self.carts(&users, &products)?;
        Ok(report)
    }

    fn pick<'s>(&mut self, items: &[&'s str]) -> &'s str {
        items.choose(&mut *self.rng).copied().unwrap_or_default()
    }

    fn chance(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p)
    }

    fn text(&mut self, sentences: usize) -> String {
        (0..sentences)
            .map(|_| self.pick(SENTENCES))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn phone(&mut self) -> String {
        format!(
            "+7 9{:02} {:03}-{:02}-{:02}",
            self.rng.gen_range(0..100),
            self.rng.gen_range(0..1000),
            self.rng.gen_range(0..100),
            self.rng.gen_range(0..100)
        )
    }

    fn address(&mut self) -> String {
        let city = self.pick(CITIES);
        let street = self.pick(STREETS);
        let house = self.rng.gen_range(1..200);
        let flat = self.rng.gen_range(1..300);
        format!("{city}, {street} st. {house}, apt. {flat}")
    }

    fn sample<T: Copy>(&mut self, items: &[T], max: usize) -> Vec<T> {
        let amount = self.rng.gen_range(0..=max).min(items.len());
        items.choose_multiple(&mut *self.rng, amount).copied().collect()
    }

    /// Find a category by name or create it.
    fn category(&self, name: &str, parent: Option<i64>) -> Result<Category> {
        if let Some(existing) = self.storage.category_by_slug(&slugify(name))? {
            return Ok(existing);
        }
        self.storage.create_category(&NewCategory {
            name: name.to_string(),
            slug: None,
            parent,
        })
    }

    fn categories(&mut self) -> Result<Vec<i64>> {
        let mut ids = Vec::new();
        for name in MAIN_CATEGORIES {
            let main = self.category(name, None)?;
            ids.push(main.id);
            for _ in 0..self.rng.gen_range(2..=5) {
                let sub = format!("{} {} {}", name, self.pick(ADJECTIVES), self.pick(NOUNS));
                ids.push(self.category(&sub, Some(main.id))?.id);
            }
        }
        let mut seen = HashSet::new();
        ids.retain(|id| seen.insert(*id));
        debug!(count = ids.len(), "Seeded categories");
        Ok(ids)
    }

    fn brands(&mut self) -> Result<Vec<i64>> {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        while ids.len() < 30 && seen.len() < BRAND_STEMS.len() * BRAND_SUFFIXES.len() {
            let name = format!("{} {}", self.pick(BRAND_STEMS), self.pick(BRAND_SUFFIXES));
            if !seen.insert(name.clone()) {
                continue;
            }
            let brand = match self.storage.brand_by_slug(&slugify(&name))? {
                Some(existing) => existing,
                None => {
                    let description = self.chance(0.7).then(|| self.text(3));
                    self.storage.create_brand(&NewBrand {
                        name,
                        slug: None,
                        official_website: None,
                        description,
                    })?
                }
            };
            ids.push(brand.id);
        }
        debug!(count = ids.len(), "Seeded brands");
        Ok(ids)
    }

    fn users(&mut self, count: usize) -> Result<Vec<i64>> {
        let password_hash = hash_password(SEED_PASSWORD, SEED_ITERATIONS)?;
        let mut ids = Vec::with_capacity(count);
        while ids.len() < count {
            let first = self.pick(FIRST_NAMES);
            let last = self.pick(LAST_NAMES);
            let username = format!(
                "{}.{}{}",
                first.to_lowercase(),
                last.to_lowercase(),
                self.rng.gen_range(1..10_000)
            );
            let account = NewAccount {
                email: format!("{username}@example.com"),
                username,
                password_hash: password_hash.clone(),
                first_name: first.to_string(),
                last_name: last.to_string(),
                is_staff: false,
            };
            match self.storage.create_user(&account) {
                Ok(user) => ids.push(user.id),
                Err(Error::Conflict(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(ids)
    }

    fn products(&mut self, count: usize, categories: &[i64], brands: &[i64]) -> Result<Vec<i64>> {
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            let name = format!(
                "{} {} {}",
                self.pick(ADJECTIVES),
                self.pick(NOUNS),
                self.rng.gen_range(100..1000)
            );
            let input = NewProduct {
                name,
                slug: None,
                description: self.chance(0.8).then(|| self.text(4)),
                category: *categories.choose(&mut *self.rng).ok_or_else(|| Error::internal("no categories"))?,
                brand: *brands.choose(&mut *self.rng).ok_or_else(|| Error::internal("no brands"))?,
                price: Money::from_minor(self.rng.gen_range(10_000..=5_000_000)),
                stock: self.rng.gen_range(0..=1000),
                warranty_months: *[0, 6, 12, 24, 36].choose(&mut *self.rng).unwrap_or(&0),
                is_available: self.chance(0.9),
                is_featured: self.chance(0.2),
            };
            ids.push(self.storage.create_product(&input)?.summary.id);
        }
        Ok(ids)
    }

    fn images(&mut self, products: &[i64]) -> Result<usize> {
        let mut count = 0;
        for &product in products {
            for position in 0..self.rng.gen_range(1..=4) {
                let image = format!("products/placeholder_{}.jpg", self.rng.gen_range(1..=10));
                self.storage.add_image(&NewProductImage {
                    product,
                    image,
                    is_primary: position == 0,
                    order: position,
                })?;
                count += 1;
            }
        }
        Ok(count)
    }

    fn reviews(&mut self, users: &[i64], products: &[i64]) -> Result<usize> {
        let mut count = 0;
        for &product in products {
            for user in self.sample(users, 8) {
                if self.chance(0.3) {
                    continue;
                }
                let input = NewReview {
                    product,
                    rating: self.rng.gen_range(1..=5),
                    comment: self.chance(0.7).then(|| self.text(2)),
                };
                let review = match self.storage.create_review(user, &input) {
                    Ok(review) => review,
                    Err(Error::Conflict(_)) => continue,
                    Err(err) => return Err(err),
                };
                if self.chance(0.2) {
                    let response = format!("Thank you for your feedback! {}", self.text(1));
                    self.storage.respond_to_review(review.id, &response)?;
                }
                count += 1;
            }
        }
        Ok(count)
    }

    fn profiles(&mut self, users: &[i64]) -> Result<usize> {
        for &user in users {
            let patch = ProfilePatch {
                delivery_address: Some(self.chance(0.6).then(|| self.address())),
                phone_number: Some(self.chance(0.7).then(|| self.phone())),
            };
            self.storage.update_profile(user, &patch)?;
            if self.chance(0.4) {
                let picture = format!("profile_pics/avatar_{}.jpg", self.rng.gen_range(1..=5));
                self.storage.set_profile_picture(user, &picture)?;
            }
        }
        Ok(users.len())
    }

    fn wishlists(&mut self, users: &[i64], products: &[i64]) -> Result<usize> {
        let mut count = 0;
        for &user in users {
            self.storage.wishlist(user)?;
            for product in self.sample(products, 15) {
                match self.storage.add_to_wishlist(user, product) {
                    Ok(_) => count += 1,
                    Err(Error::Conflict(_)) => {}
                    Err(err) if err.is_validation() => {}
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(count)
    }

    /// Fill the cart with up to `max` products; out-of-stock and unavailable
    /// picks are skipped.
    fn fill_cart(&mut self, user: i64, products: &[i64], max: usize, qty: u32) -> Result<usize> {
        let mut count = 0;
        for product in self.sample(products, max) {
            let quantity = self.rng.gen_range(1..=qty);
            match self.storage.add_to_cart(user, product, quantity) {
                Ok(_) => count += 1,
                Err(err) if err.is_validation() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(count)
    }

    fn orders(&mut self, users: &[i64], products: &[i64]) -> Result<usize> {
        let mut count = 0;
        for &user in users {
            for _ in 0..self.rng.gen_range(0..=5) {
                if self.fill_cart(user, products, 6, 3)? == 0 {
                    continue;
                }
                let cart = self.storage.cart(user)?;
                let order = self.storage.checkout(
                    user,
                    &NewOrder {
                        cart_id: cart.id,
                        shipping_address: self.address(),
                        phone_number: self.phone(),
                        customer_notes: self.chance(0.3).then(|| self.text(1)),
                    },
                )?;
                let status = *OrderStatus::ALL
                    .choose(&mut *self.rng)
                    .unwrap_or(&OrderStatus::Pending);
                if status != OrderStatus::Pending {
                    self.storage.set_order_status(order.id, status)?;
                }
                count += 1;
            }
        }
        Ok(count)
    }

    fn carts(&mut self, users: &[i64], products: &[i64]) -> Result<usize> {
        let mut count = 0;
        for &user in users {
            self.storage.cart(user)?;
            count += self.fill_cart(user, products, 8, 5)?;
        }
        Ok(count)
    }
}
