//! crates/academy_core/src/admin.rs
//!
//! Role gating for the back-office. The role is read from the remote profile on
//! every `verify` call; nothing is cached between admin page loads.

use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{Order, OrderStatus, Profile, Role};
use crate::error::{CoreError, CoreResult};
use crate::ports::{Collection, DataStore, PortError, Query, SortDirection};
use crate::records::{by_id, decode, fetch_all, fetch_by_id};

#[derive(Clone)]
pub struct AdminGate {
    store: Arc<dyn DataStore>,
}

impl AdminGate {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// Re-reads the caller's profile and opens an admin session only for role `admin`.
    #[instrument(skip(self))]
    pub async fn verify(&self, user_id: Uuid) -> CoreResult<AdminSession> {
        let profile: Profile = match fetch_by_id(self.store.as_ref(), Collection::Profiles, user_id).await {
            Ok(profile) => profile,
            Err(PortError::NotFound(_)) => return Err(CoreError::Forbidden),
            Err(e) => return Err(e.into()),
        };
        if profile.role != Role::Admin {
            warn!(role = ?profile.role, "Admin access denied");
            return Err(CoreError::Forbidden);
        }
        Ok(AdminSession {
            store: self.store.clone(),
            profile,
        })
    }
}

/// Back-office operations, only obtainable through [`AdminGate::verify`].
pub struct AdminSession {
    store: Arc<dyn DataStore>,
    pub profile: Profile,
}

impl AdminSession {
    pub async fn list_orders(&self) -> CoreResult<Vec<Order>> {
        let query = Query::new(Collection::Orders).order_by("created_at", SortDirection::Descending);
        Ok(fetch_all(self.store.as_ref(), &query).await?)
    }

    /// Moves an order one step along pending -> processing -> delivered.
    #[instrument(skip(self), fields(admin = %self.profile.id))]
    pub async fn advance_order_status(&self, order_id: Uuid) -> CoreResult<Order> {
        let order: Order = fetch_by_id(self.store.as_ref(), Collection::Orders, order_id).await?;
        let next = order.status.next().ok_or_else(|| {
            CoreError::Remote(format!("Order {} is already delivered", order_id))
        })?;

        let updated = self
            .store
            .update(Collection::Orders, &by_id(order_id), json!({ "status": next }))
            .await?;
        let row = updated
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::NotFound(format!("Order {}", order_id)))?;
        info!(from = ?order.status, to = ?next, "Order status advanced");
        Ok(decode(Collection::Orders, row)?)
    }

    pub async fn set_order_status(&self, order_id: Uuid, status: OrderStatus) -> CoreResult<Order> {
        let current: Order = fetch_by_id(self.store.as_ref(), Collection::Orders, order_id).await?;
        if current.status.next() != Some(status) {
            return Err(CoreError::Remote(format!(
                "Cannot move order from {:?} to {:?}",
                current.status, status
            )));
        }
        self.advance_order_status(order_id).await
    }
}
