//! Wishlists and carts. Both are created on first access.

use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::{now, Storage};
use crate::error::{ConstraintExt, Error, FoundExt, Result};
use crate::model::{parse_timestamp, CartItemView, CartView, WishlistItemView, WishlistView};
use crate::money::Money;

const WISHLIST_ITEM_SELECT: &str = r"
SELECT wi.id, wi.wishlist_id, wi.product_id, p.name, p.price, pi.image, wi.added_at
FROM wishlist_items wi
JOIN products p ON p.id = wi.product_id
LEFT JOIN product_images pi ON pi.product_id = p.id AND pi.is_primary = 1
";

const CART_ITEM_SELECT: &str = r"
SELECT ci.id, ci.cart_id, ci.product_id, p.name, p.price, pi.image, ci.quantity
FROM cart_items ci
JOIN products p ON p.id = ci.product_id
LEFT JOIN product_images pi ON pi.product_id = p.id AND pi.is_primary = 1
";

/// Identity columns shared by wishlists and carts.
struct Owned {
    id: i64,
    user: i64,
    user_email: String,
    created_at: String,
    updated_at: String,
}

impl Storage {
    /// The user's wishlist with its items.
    ///
    /// # Errors
    ///
    /// Returns not found for unknown users.
    pub fn wishlist(&self, user_id: i64) -> Result<WishlistView> {
        let owned = self.ensure_owned("wishlists", user_id)?;
        self.wishlist_view(owned)
    }

    /// Every wishlist, by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_wishlists(&self) -> Result<Vec<WishlistView>> {
        let owned = self.all_owned("wishlists")?;
        owned.into_iter().map(|o| self.wishlist_view(o)).collect()
    }

    /// Add a product to the user's wishlist.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown or unavailable product and a
    /// conflict when it is already on the wishlist.
    pub fn add_to_wishlist(&self, user_id: i64, product: i64) -> Result<WishlistItemView> {
        self.require_available_product(product)?;
        let wishlist = self.ensure_owned("wishlists", user_id)?;

        self.conn
            .execute(
                "INSERT INTO wishlist_items (wishlist_id, product_id, added_at) VALUES (?1, ?2, ?3)",
                params![wishlist.id, product, now()],
            )
            .on_constraint("wishlist item")?;
        let id = self.conn.last_insert_rowid();
        self.touch("wishlists", wishlist.id)?;
        debug!(user_id, product, "Added to wishlist");

        self.conn
            .query_row(
                &format!("{WISHLIST_ITEM_SELECT} WHERE wi.id = ?1"),
                [id],
                |row| self.wishlist_item_from_row(row),
            )
            .optional()
            .map_err(Error::from)
            .found("wishlist item")
    }

    /// Remove an item from the user's wishlist.
    ///
    /// # Errors
    ///
    /// Returns not found when the item is not on this user's wishlist.
    pub fn remove_wishlist_item(&self, user_id: i64, item_id: i64) -> Result<()> {
        let affected = self.conn.execute(
            r"
            DELETE FROM wishlist_items
            WHERE id = ?1 AND wishlist_id IN (SELECT id FROM wishlists WHERE user_id = ?2)
            ",
            [item_id, user_id],
        )?;
        if affected == 0 {
            return Err(Error::not_found("wishlist item"));
        }
        Ok(())
    }

    /// The user's cart with items and totals.
    ///
    /// # Errors
    ///
    /// Returns not found for unknown users.
    pub fn cart(&self, user_id: i64) -> Result<CartView> {
        let owned = self.ensure_owned("carts", user_id)?;
        self.cart_view(owned)
    }

    /// A cart by id, without creating anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn cart_by_id(&self, cart_id: i64) -> Result<Option<CartView>> {
        let owned = self
            .conn
            .query_row(
                &owned_select("carts", "t.id = ?1"),
                [cart_id],
                row_to_owned,
            )
            .optional()?;
        owned.map(|o| self.cart_view(o)).transpose()
    }

    /// Put `quantity` units of a product into the user's cart. Adding a
    /// product that is already there increases its quantity.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown or unavailable product, a
    /// quantity below 1, a total above the product's stock or a cart total
    /// above [`Money::MAX`].
    pub fn add_to_cart(&self, user_id: i64, product: i64, quantity: u32) -> Result<CartItemView> {
        check_quantity(quantity)?;
        self.require_available_product(product)?;
        let cart = self.ensure_owned("carts", user_id)?;

        let existing: Option<(i64, u32)> = self
            .conn
            .query_row(
                "SELECT id, quantity FROM cart_items WHERE cart_id = ?1 AND product_id = ?2",
                [cart.id, product],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let item_id = match existing {
            Some((id, current)) => {
                let total = current.saturating_add(quantity);
                self.check_line(cart.id, product, total)?;
                self.conn.execute(
                    "UPDATE cart_items SET quantity = ?1 WHERE id = ?2",
                    params![total, id],
                )?;
                id
            }
            None => {
                self.check_line(cart.id, product, quantity)?;
                self.conn.execute(
                    "INSERT INTO cart_items (cart_id, product_id, quantity) VALUES (?1, ?2, ?3)",
                    params![cart.id, product, quantity],
                )?;
                self.conn.last_insert_rowid()
            }
        };
        self.touch("carts", cart.id)?;
        debug!(user_id, product, quantity, "Added to cart");
        self.cart_item(item_id).found("cart item")
    }

    /// Set the quantity of an item in the user's cart.
    ///
    /// # Errors
    ///
    /// Returns not found when the item is not in this user's cart and a
    /// validation error for a quantity outside 1..=stock, an unavailable
    /// product or a cart total above [`Money::MAX`].
    pub fn update_cart_item(&self, user_id: i64, item_id: i64, quantity: u32) -> Result<CartItemView> {
        check_quantity(quantity)?;
        let (cart_id, product) = self.owned_cart_item(user_id, item_id)?;
        self.check_line(cart_id, product, quantity)?;

        self.conn.execute(
            "UPDATE cart_items SET quantity = ?1 WHERE id = ?2",
            params![quantity, item_id],
        )?;
        self.touch("carts", cart_id)?;
        self.cart_item(item_id).found("cart item")
    }

    /// Remove an item from the user's cart.
    ///
    /// # Errors
    ///
    /// Returns not found when the item is not in this user's cart.
    pub fn remove_cart_item(&self, user_id: i64, item_id: i64) -> Result<()> {
        let (cart_id, _) = self.owned_cart_item(user_id, item_id)?;
        self.conn
            .execute("DELETE FROM cart_items WHERE id = ?1", [item_id])?;
        self.touch("carts", cart_id)
    }

    /// Empty the user's cart.
    ///
    /// # Errors
    ///
    /// Returns not found for unknown users.
    pub fn clear_cart(&self, user_id: i64) -> Result<CartView> {
        let cart = self.ensure_owned("carts", user_id)?;
        self.conn
            .execute("DELETE FROM cart_items WHERE cart_id = ?1", [cart.id])?;
        self.touch("carts", cart.id)?;
        self.cart(user_id)
    }

    fn cart_item(&self, item_id: i64) -> Result<Option<CartItemView>> {
        self.conn
            .query_row(
                &format!("{CART_ITEM_SELECT} WHERE ci.id = ?1"),
                [item_id],
                |row| self.cart_item_from_row(row),
            )
            .optional()?
            .map(with_line_total)
            .transpose()
    }

    fn cart_items(&self, cart_id: i64) -> Result<Vec<CartItemView>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CART_ITEM_SELECT} WHERE ci.cart_id = ?1 ORDER BY ci.id"))?;
        let items = stmt
            .query_map([cart_id], |row| self.cart_item_from_row(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        items.into_iter().map(with_line_total).collect()
    }

    fn owned_cart_item(&self, user_id: i64, item_id: i64) -> Result<(i64, i64)> {
        self.conn
            .query_row(
                r"
                SELECT ci.cart_id, ci.product_id FROM cart_items ci
                JOIN carts c ON c.id = ci.cart_id
                WHERE ci.id = ?1 AND c.user_id = ?2
                ",
                [item_id, user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(Error::from)
            .found("cart item")
    }

    /// Check `quantity` units of `product` against its stock, and the cart
    /// total with that line in place against [`Money::MAX`].
    fn check_line(&self, cart_id: i64, product: i64, quantity: u32) -> Result<()> {
        let (price, stock): (i64, i64) = self.conn.query_row(
            "SELECT price, stock FROM products WHERE id = ?1",
            [product],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        if i64::from(quantity) > stock {
            return Err(Error::field(
                "quantity",
                format!("only {stock} in stock"),
            ));
        }

        let line = Money::from_minor(price).checked_mul(quantity)?;
        let others = self
            .cart_items(cart_id)?
            .into_iter()
            .filter(|item| item.product != product)
            .map(|item| item.total_price);
        Money::checked_sum(others.chain(std::iter::once(line))).map_err(|_| {
            Error::field("quantity", format!("cart total cannot exceed {}", Money::MAX))
        })?;
        Ok(())
    }

    /// Fetch the user's wishlist/cart row, creating it if missing.
    fn ensure_owned(&self, table: &'static str, user_id: i64) -> Result<Owned> {
        if self.get_user(user_id)?.is_none() {
            return Err(Error::not_found("user"));
        }
        let ts = now();
        self.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {table} (user_id, created_at, updated_at) VALUES (?1, ?2, ?2)"
            ),
            params![user_id, ts],
        )?;
        self.conn
            .query_row(
                &owned_select(table, "t.user_id = ?1"),
                [user_id],
                row_to_owned,
            )
            .map_err(Error::from)
    }

    fn all_owned(&self, table: &'static str) -> Result<Vec<Owned>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY t.id", owned_select(table, "1 = 1")))?;
        let owned = stmt
            .query_map([], row_to_owned)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(owned)
    }

    fn touch(&self, table: &'static str, id: i64) -> Result<()> {
        self.conn.execute(
            &format!("UPDATE {table} SET updated_at = ?1 WHERE id = ?2"),
            params![now(), id],
        )?;
        Ok(())
    }

    fn wishlist_view(&self, owned: Owned) -> Result<WishlistView> {
        let mut stmt = self.conn.prepare(&format!(
            "{WISHLIST_ITEM_SELECT} WHERE wi.wishlist_id = ?1 ORDER BY wi.added_at DESC, wi.id DESC"
        ))?;
        let items = stmt
            .query_map([owned.id], |row| self.wishlist_item_from_row(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(WishlistView {
            id: owned.id,
            user: owned.user,
            user_email: owned.user_email,
            items_count: i64::try_from(items.len()).unwrap_or(i64::MAX),
            items,
            created_at: parse_timestamp(&owned.created_at),
            updated_at: parse_timestamp(&owned.updated_at),
        })
    }

    fn cart_view(&self, owned: Owned) -> Result<CartView> {
        let items = self.cart_items(owned.id)?;

        Ok(CartView {
            id: owned.id,
            user: owned.user,
            user_email: owned.user_email,
            total_price: CartView::compute_total(&items)?,
            items_count: i64::try_from(items.len()).unwrap_or(i64::MAX),
            items,
            created_at: parse_timestamp(&owned.created_at),
            updated_at: parse_timestamp(&owned.updated_at),
        })
    }

    fn wishlist_item_from_row(&self, row: &Row) -> rusqlite::Result<WishlistItemView> {
        let image: Option<String> = row.get(5)?;
        let added_at: String = row.get(6)?;
        Ok(WishlistItemView {
            id: row.get(0)?,
            wishlist: row.get(1)?,
            product: row.get(2)?,
            product_name: row.get(3)?,
            product_price: Money::from_minor(row.get(4)?),
            product_image: image.map(|i| self.media_url(&i)),
            added_at: parse_timestamp(&added_at),
        })
    }

    fn cart_item_from_row(&self, row: &Row) -> rusqlite::Result<CartItemView> {
        let price = Money::from_minor(row.get(4)?);
        let image: Option<String> = row.get(5)?;
        let quantity: u32 = row.get(6)?;
        Ok(CartItemView {
            id: row.get(0)?,
            cart: row.get(1)?,
            product: row.get(2)?,
            product_name: row.get(3)?,
            product_price: price,
            product_image: image.map(|i| self.media_url(&i)),
            quantity,
            total_price: Money::ZERO,
        })
    }
}

fn with_line_total(mut item: CartItemView) -> Result<CartItemView> {
    item.total_price = item.product_price.checked_mul(item.quantity)?;
    Ok(item)
}

fn owned_select(table: &str, predicate: &str) -> String {
    format!(
        "SELECT t.id, t.user_id, u.email, t.created_at, t.updated_at \
         FROM {table} t JOIN users u ON u.id = t.user_id WHERE {predicate}"
    )
}

fn row_to_owned(row: &Row) -> rusqlite::Result<Owned> {
    Ok(Owned {
        id: row.get(0)?,
        user: row.get(1)?,
        user_email: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn check_quantity(quantity: u32) -> Result<()> {
    if quantity < 1 {
        return Err(Error::field("quantity", "quantity must be at least 1"));
    }
    Ok(())
}
