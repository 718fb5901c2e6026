//! crates/academy_core/src/checkout.rs
//!
//! Turns a cart snapshot plus shipping and payment details into a single
//! `create-order` call. Validation happens entirely client-side before any
//! request is sent; atomicity of the order itself is the backend's job.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::cart::{Cart, CartLine, CartView};
use crate::domain::{Language, PaymentMethod, ShippingAddress};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::inflight::InFlight;
use crate::ports::{functions, Backend};
use crate::records::encode;

/// Flat shipping charge added to every non-empty order.
pub const SHIPPING_COST: f64 = 500.0;
pub const CURRENCY: &str = "DZD";
pub const CASH_ON_DELIVERY_NOTE: &str = "Cash on delivery";

/// Reference numbers of the payer's postal account, required for postal payment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostalDetails {
    pub rip_number: String,
    pub ccp_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLine {
    pub product_id: Uuid,
    pub quantity: u32,
    /// The unit price at the time the order is placed.
    #[serde(rename = "unitPriceAtOrderTime")]
    pub unit_price: f64,
}

/// The body sent to `create-order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutLine>,
    pub payment_method: PaymentMethod,
    pub shipping_address: ShippingAddress,
    pub shipping_cost: f64,
    pub currency: String,
    pub notes: String,
}

/// What the checkout page submits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutForm {
    /// Missing fields decode as empty and are reported by `build_checkout_request`.
    #[serde(default)]
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub postal_details: Option<PostalDetails>,
}

fn require(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingShippingField(field));
    }
    Ok(())
}

pub fn postal_note(details: &PostalDetails) -> String {
    format!(
        "Postal payment | RIP: {} | CCP: {}",
        details.rip_number.trim(),
        details.ccp_number.trim()
    )
}

/// Validates the form and builds the order payload. Pure: nothing is sent.
pub fn build_checkout_request(
    items: &[CartLine],
    shipping_address: &ShippingAddress,
    payment_method: PaymentMethod,
    postal_details: Option<&PostalDetails>,
) -> Result<CheckoutRequest, ValidationError> {
    require(&shipping_address.full_name, "fullName")?;
    require(&shipping_address.phone, "phone")?;
    require(&shipping_address.address, "address")?;
    require(&shipping_address.city, "city")?;
    require(&shipping_address.region, "region")?;

    let notes = match payment_method {
        PaymentMethod::Postal => {
            let details = postal_details.ok_or(ValidationError::MissingPostalReference("RIP"))?;
            if details.rip_number.trim().is_empty() {
                return Err(ValidationError::MissingPostalReference("RIP"));
            }
            if details.ccp_number.trim().is_empty() {
                return Err(ValidationError::MissingPostalReference("CCP"));
            }
            postal_note(details)
        }
        PaymentMethod::CashOnDelivery => CASH_ON_DELIVERY_NOTE.to_string(),
    };

    if items.is_empty() {
        return Err(ValidationError::EmptyCart);
    }

    Ok(CheckoutRequest {
        items: items
            .iter()
            .map(|line| CheckoutLine {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect(),
        payment_method,
        shipping_address: shipping_address.clone(),
        shipping_cost: SHIPPING_COST,
        currency: CURRENCY.to_string(),
        notes,
    })
}

/// The result of a successful checkout: the backend's order and the reloaded (now empty) cart.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOutcome {
    pub order: Value,
    pub cart: CartView,
}

#[derive(Clone)]
pub struct Checkout {
    backend: Backend,
    cart: Cart,
    in_flight: InFlight<Uuid>,
}

impl Checkout {
    pub fn new(backend: Backend, in_flight: InFlight<Uuid>) -> Self {
        let cart = Cart::new(backend.store.clone());
        Self {
            backend,
            cart,
            in_flight,
        }
    }

    /// Submits the user's current cart. While one submission for a user is
    /// outstanding, further ones fail with `Busy`. On failure the cart is left intact.
    #[instrument(skip(self, form))]
    pub async fn submit_checkout(
        &self,
        user_id: Uuid,
        form: &CheckoutForm,
        language: Language,
    ) -> CoreResult<CheckoutOutcome> {
        let _guard = self.in_flight.try_acquire(user_id).ok_or(CoreError::Busy)?;

        let cart = self.cart.load_cart(user_id, language).await?;
        // create-order consumes every row, so lines that no longer resolve must not be dropped silently
        if let Some(&product_id) = cart.unavailable.first() {
            return Err(ValidationError::UnavailableProduct(product_id).into());
        }
        let request = build_checkout_request(
            &cart.items,
            &form.shipping_address,
            form.payment_method,
            form.postal_details.as_ref(),
        )?;

        let order = self
            .backend
            .functions
            .invoke(functions::CREATE_ORDER, encode(&request)?)
            .await
            .map_err(|e| {
                error!("Order creation failed: {}", e);
                CoreError::from(e)
            })?;
        info!(items = request.items.len(), "Order created");

        // The order exists at this point; a failed reload must not read as a failed checkout.
        let cart = match self.cart.load_cart(user_id, language).await {
            Ok(cart) => cart,
            Err(e) => {
                warn!("Failed to reload the cart after checkout: {}", e);
                CartView::new(Vec::new())
            }
        };
        Ok(CheckoutOutcome { order, cart })
    }
}
