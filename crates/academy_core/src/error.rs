//! crates/academy_core/src/error.rs
//!
//! The error type surfaced by every core operation.

use crate::ports::PortError;

/// Client-detected problems. No network call is made when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Shipping field '{0}' is required")]
    MissingShippingField(&'static str),
    #[error("Postal payment requires the {0} number")]
    MissingPostalReference(&'static str),
    #[error("The cart is empty")]
    EmptyCart,
    #[error("Quantity must be at least 1, got {0}")]
    InvalidQuantity(i64),
    #[error("Product {0} is no longer available")]
    UnavailableProduct(uuid::Uuid),
}

impl ValidationError {
    /// The dotted translation key for the message shown to the user.
    pub fn message_key(&self) -> &'static str {
        match self {
            ValidationError::MissingShippingField(_) => "checkout.errors.missing_field",
            ValidationError::MissingPostalReference(_) => "checkout.errors.missing_postal_reference",
            ValidationError::EmptyCart => "cart.empty",
            ValidationError::InvalidQuantity(_) => "cart.errors.invalid_quantity",
            ValidationError::UnavailableProduct(_) => "cart.errors.unavailable_product",
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The remote store or a remote function rejected the call. The message is shown verbatim.
    #[error("{0}")]
    Remote(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Sign in required")]
    Unauthenticated,

    /// The same submission is already in flight.
    #[error("Request already in progress")]
    Busy,
}

impl CoreError {
    /// The dotted translation key for the message shown to the user.
    pub fn message_key(&self) -> &'static str {
        match self {
            CoreError::Validation(v) => v.message_key(),
            CoreError::Remote(_) => "errors.remote",
            CoreError::NotFound(_) => "errors.not_found",
            CoreError::Forbidden => "errors.forbidden",
            CoreError::Unauthenticated => "errors.unauthenticated",
            CoreError::Busy => "errors.busy",
        }
    }
}

impl From<PortError> for CoreError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::NotFound(what) => CoreError::NotFound(what),
            PortError::Unauthorized => CoreError::Unauthenticated,
            PortError::Remote(message) | PortError::Conflict(message) | PortError::Unexpected(message) => {
                CoreError::Remote(message)
            }
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
