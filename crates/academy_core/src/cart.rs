//! crates/academy_core/src/cart.rs
//!
//! The per-user shopping cart, as a view over the `cart` collection joined with `products`.

use futures::future::try_join_all;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::checkout::{CURRENCY, SHIPPING_COST};
use crate::domain::{CartItem, Language, Product};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::ports::{Collection, DataStore, PortError, Query, SortDirection};
use crate::records::{by_id, decode, fetch_all, fetch_by_id, fetch_optional};

/// One displayed cart line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: u32,
    pub unit_name: String,
    pub unit_price: f64,
}

impl CartLine {
    pub fn line_total(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}

/// Sum of `unit_price * quantity`; zero for an empty cart.
pub fn compute_subtotal(items: &[CartLine]) -> f64 {
    items.iter().map(CartLine::line_total).sum()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub subtotal: f64,
    pub shipping_cost: f64,
    pub total: f64,
    pub currency: &'static str,
    /// Units across all lines.
    pub item_count: u32,
    /// Products still in the cart that no longer resolve; their rows are not in `items`.
    pub unavailable: Vec<Uuid>,
}

impl CartView {
    pub fn new(items: Vec<CartLine>) -> Self {
        let subtotal = compute_subtotal(&items);
        // no shipping is charged on an empty cart
        let shipping_cost = if items.is_empty() { 0.0 } else { SHIPPING_COST };
        let item_count = items.iter().map(|l| l.quantity).sum();
        Self {
            items,
            subtotal,
            shipping_cost,
            total: subtotal + shipping_cost,
            currency: CURRENCY,
            item_count,
            unavailable: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Clone)]
pub struct Cart {
    store: Arc<dyn DataStore>,
}

impl Cart {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn load_cart(&self, user_id: Uuid, language: Language) -> CoreResult<CartView> {
        let store = self.store.as_ref();
        let query = Query::new(Collection::Cart)
            .eq("user_id", user_id)
            .order_by("created_at", SortDirection::Ascending);
        let rows: Vec<CartItem> = fetch_all(store, &query).await?;

        let mut product_ids: Vec<Uuid> = rows.iter().map(|r| r.product_id).collect();
        product_ids.sort();
        product_ids.dedup();
        let products = try_join_all(product_ids.iter().map(|id| {
            fetch_optional::<Product>(store, Query::new(Collection::Products).eq("id", id))
        }))
        .await?;
        let products: HashMap<Uuid, Product> = products
            .into_iter()
            .flatten()
            .map(|p| (p.id, p))
            .collect();

        let mut unavailable = Vec::new();
        let items = rows
            .into_iter()
            .filter_map(|row| match products.get(&row.product_id) {
                Some(product) => Some(CartLine {
                    id: row.id,
                    product_id: row.product_id,
                    quantity: row.quantity,
                    unit_name: product.name(language).to_string(),
                    unit_price: product.price,
                }),
                None => {
                    warn!(product_id = %row.product_id, "Cart references a missing product; skipping");
                    unavailable.push(row.product_id);
                    None
                }
            })
            .collect();
        Ok(CartView {
            unavailable,
            ..CartView::new(items)
        })
    }

    /// Inserts the product with quantity 1; if it is already in the cart the
    /// uniqueness conflict is recovered by incrementing the existing row.
    #[instrument(skip(self))]
    pub async fn add_to_cart(&self, user_id: Uuid, product_id: Uuid) -> CoreResult<CartItem> {
        let row = json!({ "user_id": user_id, "product_id": product_id, "quantity": 1 });
        match self.store.insert(Collection::Cart, row).await {
            Ok(inserted) => Ok(decode(Collection::Cart, inserted)?),
            Err(PortError::Conflict(reason)) => {
                debug!("Product already in cart ({}); incrementing", reason);
                let existing: CartItem = fetch_optional(
                    self.store.as_ref(),
                    Query::new(Collection::Cart)
                        .eq("user_id", user_id)
                        .eq("product_id", product_id),
                )
                .await?
                .ok_or_else(|| CoreError::Remote(reason.clone()))?;

                let patch = json!({ "quantity": existing.quantity.saturating_add(1) });
                let updated = self.store.update(Collection::Cart, &by_id(existing.id), patch).await?;
                let row = updated
                    .into_iter()
                    .next()
                    .ok_or_else(|| CoreError::NotFound(format!("Cart item {}", existing.id)))?;
                Ok(decode(Collection::Cart, row)?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Rejects quantities below 1 without touching the store; removal is `remove_from_cart`.
    #[instrument(skip(self))]
    pub async fn update_quantity(&self, cart_item_id: Uuid, new_quantity: i64) -> CoreResult<CartItem> {
        let quantity = u32::try_from(new_quantity)
            .ok()
            .filter(|q| *q >= 1)
            .ok_or(ValidationError::InvalidQuantity(new_quantity))?;
        let updated = self
            .store
            .update(Collection::Cart, &by_id(cart_item_id), json!({ "quantity": quantity }))
            .await?;
        match updated.into_iter().next() {
            Some(row) => Ok(decode(Collection::Cart, row)?),
            None => Err(CoreError::NotFound(format!("Cart item {}", cart_item_id))),
        }
    }

    #[instrument(skip(self))]
    pub async fn remove_from_cart(&self, cart_item_id: Uuid) -> CoreResult<()> {
        self.store.delete(Collection::Cart, &by_id(cart_item_id)).await?;
        Ok(())
    }

    /// Looks up a single cart row, used to check ownership before mutating it.
    pub async fn get_item(&self, cart_item_id: Uuid) -> CoreResult<CartItem> {
        Ok(fetch_by_id(self.store.as_ref(), Collection::Cart, cart_item_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;

    async fn seed_product(backend: &MemoryBackend, name: &str, price: f64) -> Uuid {
        let id = Uuid::new_v4();
        backend
            .seed(
                Collection::Products,
                json!({
                    "id": id, "name_ar": name, "name_en": name, "price": price,
                    "stock_quantity": 10, "is_active": true,
                }),
            )
            .await
            .unwrap();
        id
    }

    fn line(price: f64, quantity: u32) -> CartLine {
        CartLine {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity,
            unit_name: "item".to_string(),
            unit_price: price,
        }
    }

    #[test]
    fn test_subtotal_of_empty_cart_is_zero() {
        assert_eq!(compute_subtotal(&[]), 0.0);
        let view = CartView::new(Vec::new());
        assert_eq!(view.total, 0.0);
        assert!(view.is_empty());
    }

    #[test]
    fn test_subtotal_and_total_with_shipping() {
        let view = CartView::new(vec![line(500.0, 1), line(300.0, 2)]);
        assert_eq!(view.subtotal, 1100.0);
        assert_eq!(view.total, 1600.0);
        assert_eq!(view.item_count, 3);
    }

    #[tokio::test]
    async fn test_adding_same_product_twice_increments_one_row() {
        let backend = MemoryBackend::new();
        let product_id = seed_product(&backend, "Workbook", 500.0).await;
        let user_id = Uuid::new_v4();
        let cart = Cart::new(backend.backend(Some(user_id)).store);

        let first = cart.add_to_cart(user_id, product_id).await.unwrap();
        assert_eq!(first.quantity, 1);
        let second = cart.add_to_cart(user_id, product_id).await.unwrap();
        assert_eq!(second.quantity, 2);

        let rows = backend.rows(Collection::Cart).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["quantity"], 2);
    }

    #[tokio::test]
    async fn test_load_cart_joins_products_in_requested_language() {
        let backend = MemoryBackend::new();
        let a = seed_product(&backend, "A", 500.0).await;
        let b = seed_product(&backend, "B", 300.0).await;
        let user_id = Uuid::new_v4();
        let cart = Cart::new(backend.backend(Some(user_id)).store);
        cart.add_to_cart(user_id, a).await.unwrap();
        cart.add_to_cart(user_id, b).await.unwrap();
        cart.add_to_cart(user_id, b).await.unwrap();

        let view = cart.load_cart(user_id, Language::En).await.unwrap();

        assert_eq!(view.items.len(), 2);
        assert_eq!(view.subtotal, 1100.0);
        assert_eq!(view.total, 1600.0);
        assert!(cart.load_cart(Uuid::new_v4(), Language::Ar).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_quantity_rejects_zero_and_negative() {
        let backend = MemoryBackend::new();
        let product_id = seed_product(&backend, "A", 500.0).await;
        let user_id = Uuid::new_v4();
        let cart = Cart::new(backend.backend(Some(user_id)).store);
        let item = cart.add_to_cart(user_id, product_id).await.unwrap();

        for bad in [0, -3] {
            let err = cart.update_quantity(item.id, bad).await.unwrap_err();
            assert_eq!(err, CoreError::Validation(ValidationError::InvalidQuantity(bad)));
        }
        assert_eq!(backend.rows(Collection::Cart).await[0]["quantity"], 1);

        let updated = cart.update_quantity(item.id, 4).await.unwrap();
        assert_eq!(updated.quantity, 4);
    }

    #[tokio::test]
    async fn test_remove_from_cart_deletes_row() {
        let backend = MemoryBackend::new();
        let product_id = seed_product(&backend, "A", 500.0).await;
        let user_id = Uuid::new_v4();
        let cart = Cart::new(backend.backend(Some(user_id)).store);
        let item = cart.add_to_cart(user_id, product_id).await.unwrap();

        cart.remove_from_cart(item.id).await.unwrap();

        assert!(backend.rows(Collection::Cart).await.is_empty());
    }

    #[tokio::test]
    async fn test_increment_saturates_at_the_quantity_limit() {
        let backend = MemoryBackend::new();
        let product_id = seed_product(&backend, "A", 500.0).await;
        let user_id = Uuid::new_v4();
        backend
            .seed(
                Collection::Cart,
                json!({ "user_id": user_id, "product_id": product_id, "quantity": u32::MAX }),
            )
            .await
            .unwrap();
        let cart = Cart::new(backend.backend(Some(user_id)).store);

        let item = cart.add_to_cart(user_id, product_id).await.unwrap();

        assert_eq!(item.quantity, u32::MAX);
    }

    #[tokio::test]
    async fn test_lines_for_missing_products_are_reported() {
        let backend = MemoryBackend::new();
        let kept = seed_product(&backend, "A", 500.0).await;
        let gone = seed_product(&backend, "B", 300.0).await;
        let user_id = Uuid::new_v4();
        let cart = Cart::new(backend.backend(Some(user_id)).store);
        cart.add_to_cart(user_id, kept).await.unwrap();
        cart.add_to_cart(user_id, gone).await.unwrap();
        backend
            .client(None)
            .delete(Collection::Products, &by_id(gone))
            .await
            .unwrap();

        let view = cart.load_cart(user_id, Language::En).await.unwrap();

        assert_eq!(view.items.len(), 1);
        assert_eq!(view.subtotal, 500.0);
        assert_eq!(view.unavailable, vec![gone]);
    }
}
