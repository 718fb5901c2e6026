pub mod admin;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod context;
pub mod course_access;
pub mod dashboard;
pub mod domain;
pub mod error;
pub mod i18n;
pub mod inflight;
pub mod memory;
pub mod ports;
mod records;

pub use admin::{AdminGate, AdminSession};
pub use cart::{compute_subtotal, Cart, CartLine, CartView};
pub use catalog::Catalog;
pub use checkout::{build_checkout_request, Checkout, CheckoutForm, CheckoutRequest, PostalDetails};
pub use context::{AppContext, LocaleContext, SessionContext};
pub use course_access::{can_access_lesson, select_default_lesson, CourseAccess, CourseView, LessonState};
pub use dashboard::{load_dashboard, Dashboard};
pub use domain::{
    AuthSession, CartItem, Course, Enrollment, Language, Lesson, Locale, Order, OrderStatus,
    PaymentMethod, Product, Profile, Role, ShippingAddress, Testimonial,
};
pub use error::{CoreError, CoreResult, ValidationError};
pub use i18n::Translator;
pub use inflight::{InFlight, ViewSlot};
pub use ports::{AuthProvider, Backend, DataStore, PortError, PortResult, RemoteFunctions};
