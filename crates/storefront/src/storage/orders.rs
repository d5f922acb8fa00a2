//! Orders: checkout, lookups and status changes.

use chrono::{Duration, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use storefront_invoice::{InvoiceData, InvoiceLine};
use tracing::{debug, info};

use super::{now, sql_limit, Storage};
use crate::error::{Error, FoundExt, Result};
use crate::model::{
    display_name, generate_order_number, parse_timestamp, NewOrder, OrderFilter, OrderItemView,
    OrderStatus, OrderView,
};
use crate::money::Money;
use crate::validate;

/// Window used by [`Storage::recent_orders`] when no other is given.
pub const DEFAULT_RECENT_DAYS: i64 = 30;

const ORDER_SELECT: &str = r"
SELECT o.id, o.user_id, u.email, u.first_name, u.last_name, u.username,
       o.order_number, o.status, o.total_amount, o.shipping_address, o.phone_number,
       o.customer_notes, o.created_at, o.updated_at
FROM orders o
JOIN users u ON u.id = o.user_id
";

const ORDER_ITEM_SELECT: &str = r"
SELECT oi.id, oi.order_id, oi.product_id, p.name, p.slug, oi.quantity, oi.price
FROM order_items oi
JOIN products p ON p.id = oi.product_id
";

/// One cart line as seen at checkout.
struct CheckoutLine {
    product: i64,
    name: String,
    price: Money,
    stock: i64,
    is_available: bool,
    quantity: u32,
}

impl Storage {
    /// Turn a cart into an order.
    ///
    /// Prices are snapshotted, stock is decremented and the cart is emptied
    /// in one transaction.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the cart is not the caller's or is
    /// empty, when a product is unavailable or short of stock, when the total
    /// exceeds [`Money::MAX`] and when contact details are missing.
    pub fn checkout(&self, user_id: i64, input: &NewOrder) -> Result<OrderView> {
        validate::required("shipping_address", &input.shipping_address, usize::MAX)?;
        validate::required("phone_number", &input.phone_number, 20)?;
        validate::phone(&input.phone_number)?;

        let owner: Option<i64> = self
            .conn
            .query_row(
                "SELECT user_id FROM carts WHERE id = ?1",
                [input.cart_id],
                |row| row.get(0),
            )
            .optional()?;
        if owner != Some(user_id) {
            return Err(Error::field("cart_id", "cart does not belong to you"));
        }

        let (order_id, order_number, count) = self.atomic(|| {
            let lines = {
                let mut stmt = self.conn.prepare(
                    r"
                    SELECT ci.product_id, p.name, p.price, p.stock, p.is_available, ci.quantity
                    FROM cart_items ci JOIN products p ON p.id = ci.product_id
                    WHERE ci.cart_id = ?1 ORDER BY ci.id
                    ",
                )?;
                let lines = stmt
                    .query_map([input.cart_id], |row| {
                        Ok(CheckoutLine {
                            product: row.get(0)?,
                            name: row.get(1)?,
                            price: Money::from_minor(row.get(2)?),
                            stock: row.get(3)?,
                            is_available: row.get(4)?,
                            quantity: row.get(5)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                lines
            };

            if lines.is_empty() {
                return Err(Error::field("cart_id", "cart is empty"));
            }
            for line in &lines {
                if !line.is_available {
                    return Err(Error::field(
                        "product",
                        format!("{} is not available", line.name),
                    ));
                }
                if i64::from(line.quantity) > line.stock {
                    return Err(Error::field(
                        "quantity",
                        format!("only {} of {} in stock", line.stock, line.name),
                    ));
                }
            }
            let total = lines
                .iter()
                .map(|line| line.price.checked_mul(line.quantity))
                .collect::<Result<Vec<_>>>()
                .and_then(Money::checked_sum)
                .map_err(|_| {
                    Error::field("cart_id", format!("order total cannot exceed {}", Money::MAX))
                })?;

            let ts = now();
            let order_number = generate_order_number(Utc::now());
            self.conn.execute(
                r"
                INSERT INTO orders (user_id, order_number, status, total_amount, shipping_address,
                                    phone_number, customer_notes, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                ",
                params![
                    user_id,
                    order_number,
                    OrderStatus::Pending.as_str(),
                    total.minor(),
                    input.shipping_address.trim(),
                    input.phone_number.trim(),
                    input
                        .customer_notes
                        .as_deref()
                        .map(str::trim)
                        .filter(|n| !n.is_empty()),
                    ts
                ],
            )?;
            let order_id = self.conn.last_insert_rowid();

            for line in &lines {
                self.conn.execute(
                    "INSERT INTO order_items (order_id, product_id, quantity, price) VALUES (?1, ?2, ?3, ?4)",
                    params![order_id, line.product, line.quantity, line.price.minor()],
                )?;
                self.conn.execute(
                    "UPDATE products SET stock = stock - ?1, updated_at = ?2 WHERE id = ?3",
                    params![line.quantity, ts, line.product],
                )?;
            }

            self.conn.execute("DELETE FROM cart_items WHERE cart_id = ?1", [input.cart_id])?;
            self.conn.execute(
                "UPDATE carts SET updated_at = ?1 WHERE id = ?2",
                params![ts, input.cart_id],
            )?;
            Ok((order_id, order_number, lines.len()))
        })?;

        info!(order_id, %order_number, user_id, items = count, "Placed order");
        self.get_order(order_id).found("order")
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_order(&self, id: i64) -> Result<Option<OrderView>> {
        self.order_where("o.id = ?1", Value::Integer(id))
    }

    /// Find an order by its order number.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn order_by_number(&self, order_number: &str) -> Result<Option<OrderView>> {
        self.order_where("o.order_number = ?1", Value::Text(order_number.to_string()))
    }

    /// Orders matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<OrderView>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(user) = filter.user {
            clauses.push("o.user_id = ?");
            values.push(Value::Integer(user));
        }
        if let Some(status) = filter.status {
            clauses.push("o.status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(days) = filter.recent_days {
            clauses.push("o.created_at >= ?");
            values.push(Value::Text((Utc::now() - Duration::days(days)).to_rfc3339()));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        values.push(Value::Integer(sql_limit(filter.limit)));

        let rows = {
            let mut stmt = self.conn.prepare(&format!(
                "{ORDER_SELECT}{where_sql} ORDER BY o.created_at DESC, o.id DESC LIMIT ?"
            ))?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), row_to_order)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        rows.into_iter()
            .map(|mut order| {
                order.items = self.order_items(order.id)?;
                Ok(order)
            })
            .collect()
    }

    /// Orders still awaiting processing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn pending_orders(&self) -> Result<Vec<OrderView>> {
        self.list_orders(&OrderFilter {
            status: Some(OrderStatus::Pending),
            ..OrderFilter::default()
        })
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn orders_for_user(&self, user_id: i64) -> Result<Vec<OrderView>> {
        self.list_orders(&OrderFilter {
            user: Some(user_id),
            ..OrderFilter::default()
        })
    }

    /// Orders placed within the last `days` days.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn recent_orders(&self, days: Option<i64>) -> Result<Vec<OrderView>> {
        self.list_orders(&OrderFilter {
            recent_days: Some(days.unwrap_or(DEFAULT_RECENT_DAYS)),
            ..OrderFilter::default()
        })
    }

    /// Line items of an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn order_items(&self, order_id: i64) -> Result<Vec<OrderItemView>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ORDER_ITEM_SELECT} WHERE oi.order_id = ?1 ORDER BY oi.id"))?;
        let items = stmt
            .query_map([order_id], row_to_order_item)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Cancel one of the user's own orders.
    ///
    /// # Errors
    ///
    /// Returns not found when the order is not the user's and a validation
    /// error when it is no longer pending.
    pub fn cancel_order(&self, user_id: i64, id: i64) -> Result<OrderView> {
        let order = self.get_order(id).found("order")?;
        if order.user != user_id {
            return Err(Error::not_found("order"));
        }
        if order.status != OrderStatus::Pending {
            return Err(Error::field(
                "status",
                format!("cannot cancel an order that is {}", order.status),
            ));
        }
        self.set_order_status(id, OrderStatus::Cancelled)
    }

    /// Move an order to `status`.
    ///
    /// # Errors
    ///
    /// Returns not found for unknown orders.
    pub fn set_order_status(&self, id: i64, status: OrderStatus) -> Result<OrderView> {
        let affected = self.conn.execute(
            "UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), now(), id],
        )?;
        if affected == 0 {
            return Err(Error::not_found("order"));
        }
        info!(order_id = id, %status, "Changed order status");
        self.get_order(id).found("order")
    }

    /// Move several orders to `status` at once. Unknown ids are skipped.
    ///
    /// Returns the number of orders changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn bulk_set_status(&self, ids: &[i64], status: OrderStatus) -> Result<usize> {
        let ts = now();
        let changed = self.atomic(|| {
            let mut changed = 0;
            for id in ids {
                changed += self.conn.execute(
                    "UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    params![status.as_str(), ts, id],
                )?;
            }
            Ok(changed)
        })?;
        info!(changed, %status, "Bulk status change");
        Ok(changed)
    }

    /// Snapshot of an order for invoice rendering.
    ///
    /// # Errors
    ///
    /// Returns not found for unknown orders.
    pub fn invoice_data(&self, order_id: i64) -> Result<InvoiceData> {
        let order = self.get_order(order_id).found("order")?;
        debug!(order_id, items = order.items.len(), "Building invoice data");

        Ok(InvoiceData {
            customer: format!("{} ({})", order.user_name, order.user_email),
            lines: order
                .items
                .iter()
                .map(|item| InvoiceLine::new(&item.product_name, item.price.minor(), item.quantity))
                .collect(),
            order_number: order.order_number,
            created_at: order.created_at,
            status: order.status.label().to_string(),
            phone: order.phone_number,
            shipping_address: order.shipping_address,
            notes: order.customer_notes,
            total_minor: order.total_amount.minor(),
        })
    }

    fn order_where(&self, predicate: &str, value: Value) -> Result<Option<OrderView>> {
        let order = self
            .conn
            .query_row(
                &format!("{ORDER_SELECT} WHERE {predicate}"),
                [value],
                row_to_order,
            )
            .optional()?;
        match order {
            Some(mut order) => {
                order.items = self.order_items(order.id)?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }
}

/// Order columns without items; callers attach them.
fn row_to_order(row: &Row) -> rusqlite::Result<OrderView> {
    let first: String = row.get(3)?;
    let last: String = row.get(4)?;
    let username: String = row.get(5)?;
    let status: String = row.get(7)?;
    let created_at: String = row.get(12)?;
    let updated_at: String = row.get(13)?;
    let status = status.parse::<OrderStatus>().unwrap_or_default();

    Ok(OrderView {
        id: row.get(0)?,
        user: row.get(1)?,
        user_email: row.get(2)?,
        user_name: display_name(&first, &last, &username),
        order_number: row.get(6)?,
        status,
        status_display: status.label(),
        total_amount: Money::from_minor(row.get(8)?),
        shipping_address: row.get(9)?,
        phone_number: row.get(10)?,
        customer_notes: row.get(11)?,
        items: Vec::new(),
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn row_to_order_item(row: &Row) -> rusqlite::Result<OrderItemView> {
    let quantity: u32 = row.get(5)?;
    let price = Money::from_minor(row.get(6)?);
    Ok(OrderItemView {
        id: row.get(0)?,
        order: row.get(1)?,
        product: row.get(2)?,
        product_name: row.get(3)?,
        product_slug: row.get(4)?,
        quantity,
        price,
        total_price: price
            .checked_mul(quantity)
            .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(5, i64::from(quantity)))?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{product, storage, user};
    use super::*;

    fn new_order(cart_id: i64) -> NewOrder {
        NewOrder {
            cart_id,
            shipping_address: "Lenina 1, Moscow".to_string(),
            phone_number: "+7 900 000-00-00".to_string(),
            customer_notes: Some("ring twice".to_string()),
        }
    }

    fn placed(storage: &Storage, username: &str) -> (i64, OrderView) {
        let u = user(storage, username);
        let p = product(storage, "Phone", 10_000, 5);
        storage.add_to_cart(u, p, 2).unwrap();
        let cart = storage.cart(u).unwrap();
        (u, storage.checkout(u, &new_order(cart.id)).unwrap())
    }

    #[test]
    fn test_checkout_snapshots_and_decrements() {
        let storage = storage();
        let u = user(&storage, "ivan");
        let phone = product(&storage, "Phone", 10_000, 5);
        let case = product(&storage, "Case", 500, 10);
        storage.add_to_cart(u, phone, 2).unwrap();
        storage.add_to_cart(u, case, 1).unwrap();
        let cart = storage.cart(u).unwrap();

        let order = storage.checkout(u, &new_order(cart.id)).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.status_display, "Awaiting processing");
        assert_eq!(order.total_amount, Money::from_minor(20_500));
        assert_eq!(order.items.len(), 2);
        assert!(order.order_number.starts_with("ORD-"));
        assert_eq!(order.customer_notes.as_deref(), Some("ring twice"));

        assert!(storage.cart(u).unwrap().is_empty());
        let detail = storage.get_product(phone).unwrap().unwrap();
        assert_eq!(detail.summary.stock, 3);

        storage
            .update_product(
                phone,
                &crate::model::ProductPatch {
                    price: Some(Money::from_minor(99)),
                    ..crate::model::ProductPatch::default()
                },
            )
            .unwrap();
        let order = storage.get_order(order.id).unwrap().unwrap();
        assert_eq!(order.items[0].price, Money::from_minor(10_000));
        assert_eq!(order.total_amount, Money::from_minor(20_500));
    }

    #[test]
    fn test_checkout_rejects_empty_cart() {
        let storage = storage();
        let u = user(&storage, "ivan");
        let cart = storage.cart(u).unwrap();

        let err = storage.checkout(u, &new_order(cart.id)).unwrap_err();
        assert!(err.is_validation());
        assert!(storage.list_orders(&OrderFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_checkout_rejects_foreign_cart() {
        let storage = storage();
        let u = user(&storage, "ivan");
        let thief = user(&storage, "olga");
        let p = product(&storage, "Phone", 100, 5);
        storage.add_to_cart(u, p, 1).unwrap();
        let cart = storage.cart(u).unwrap();

        let err = storage.checkout(thief, &new_order(cart.id)).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation {
                field: Some("cart_id"),
                ..
            }
        ));
    }

    #[test]
    fn test_checkout_rechecks_stock() {
        let storage = storage();
        let u = user(&storage, "ivan");
        let p = product(&storage, "Phone", 100, 5);
        storage.add_to_cart(u, p, 4).unwrap();
        storage
            .update_product(
                p,
                &crate::model::ProductPatch {
                    stock: Some(2),
                    ..crate::model::ProductPatch::default()
                },
            )
            .unwrap();
        let cart = storage.cart(u).unwrap();

        let err = storage.checkout(u, &new_order(cart.id)).unwrap_err();
        assert!(err.to_string().contains("only 2 of Phone"));
        assert_eq!(storage.cart(u).unwrap().items_count, 1);
        assert_eq!(storage.get_product(p).unwrap().unwrap().summary.stock, 2);
    }

    #[test]
    fn test_checkout_rejects_unavailable_products() {
        let storage = storage();
        let u = user(&storage, "ivan");
        let p = product(&storage, "Phone", 100, 5);
        storage.add_to_cart(u, p, 1).unwrap();
        storage
            .update_product(
                p,
                &crate::model::ProductPatch {
                    is_available: Some(false),
                    ..crate::model::ProductPatch::default()
                },
            )
            .unwrap();
        let cart = storage.cart(u).unwrap();

        let err = storage.checkout(u, &new_order(cart.id)).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation {
                field: Some("product"),
                ..
            }
        ));
        assert_eq!(storage.get_product(p).unwrap().unwrap().summary.stock, 5);
    }

    #[test]
    fn test_checkout_rejects_total_past_max() {
        let storage = storage();
        let u = user(&storage, "ivan");
        let p = product(&storage, "Yacht", 100, 5);
        storage.add_to_cart(u, p, 3).unwrap();
        let cart = storage.cart(u).unwrap();
        storage
            .update_product(
                p,
                &crate::model::ProductPatch {
                    price: Some(Money::MAX),
                    ..crate::model::ProductPatch::default()
                },
            )
            .unwrap();

        let err = storage.checkout(u, &new_order(cart.id)).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation {
                field: Some("cart_id"),
                ..
            }
        ));
        assert!(storage.list_orders(&OrderFilter::default()).unwrap().is_empty());
        assert_eq!(storage.get_product(p).unwrap().unwrap().summary.stock, 5);
    }

    #[test]
    fn test_checkout_requires_contact_details() {
        let storage = storage();
        let u = user(&storage, "ivan");
        let cart = storage.cart(u).unwrap();
        let mut input = new_order(cart.id);
        input.phone_number = "call me".to_string();
        assert!(storage.checkout(u, &input).unwrap_err().is_validation());
    }

    #[test]
    fn test_lookup_by_number() {
        let storage = storage();
        let (_, order) = placed(&storage, "ivan");

        let found = storage.order_by_number(&order.order_number).unwrap().unwrap();
        assert_eq!(found.id, order.id);
        assert!(storage.order_by_number("ORD-0").unwrap().is_none());
    }

    #[test]
    fn test_cancel_only_own_pending() {
        let storage = storage();
        let (u, order) = placed(&storage, "ivan");
        let other = user(&storage, "olga");

        assert!(storage.cancel_order(other, order.id).unwrap_err().is_not_found());
        let cancelled = storage.cancel_order(u, order.id).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(storage.cancel_order(u, order.id).unwrap_err().is_validation());
    }

    #[test]
    fn test_filters_and_helpers() {
        let storage = storage();
        let (u, first) = placed(&storage, "ivan");
        let (_, second) = placed(&storage, "olga");
        storage
            .set_order_status(second.id, OrderStatus::Shipped)
            .unwrap();

        assert_eq!(storage.orders_for_user(u).unwrap().len(), 1);
        let pending = storage.pending_orders().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, first.id);
        assert_eq!(storage.recent_orders(None).unwrap().len(), 2);

        let all = storage.list_orders(&OrderFilter::default()).unwrap();
        assert_eq!(all[0].id, second.id);
    }

    #[test]
    fn test_bulk_set_status() {
        let storage = storage();
        let (_, a) = placed(&storage, "ivan");
        let (_, b) = placed(&storage, "olga");

        let changed = storage
            .bulk_set_status(&[a.id, b.id, 999], OrderStatus::Processing)
            .unwrap();
        assert_eq!(changed, 2);
        assert_eq!(
            storage.get_order(a.id).unwrap().unwrap().status,
            OrderStatus::Processing
        );
        assert!(storage
            .set_order_status(999, OrderStatus::Shipped)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_invoice_data() {
        let storage = storage();
        let (_, order) = placed(&storage, "ivan");

        let data = storage.invoice_data(order.id).unwrap();
        assert_eq!(data.order_number, order.order_number);
        assert_eq!(data.customer, "ivan (ivan@example.com)");
        assert_eq!(data.status, "Awaiting processing");
        assert_eq!(data.lines.len(), 1);
        assert_eq!(data.lines[0].total_minor(), 20_000);
        assert_eq!(data.total_minor, 20_000);
        assert!(storage.invoice_data(999).unwrap_err().is_not_found());
    }

    #[test]
    fn test_ordered_product_cannot_be_deleted() {
        let storage = storage();
        let (_, order) = placed(&storage, "ivan");
        let err = storage.delete_product(order.items[0].product).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }
}
