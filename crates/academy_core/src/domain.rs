//! crates/academy_core/src/domain.rs
//!
//! Defines the core data structures for the platform.
//! Every entity is owned by the remote store; these are read-through copies
//! decoded from the store's JSON rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Language and Text Direction
//=========================================================================================

/// The two interface languages supported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Ar,
    En,
}

impl Language {
    pub fn direction(self) -> Direction {
        match self {
            Language::Ar => Direction::Rtl,
            Language::En => Direction::Ltr,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::Ar => "ar",
            Language::En => "en",
        }
    }

    /// Picks the string for this language out of a bilingual pair.
    pub fn pick<'a>(self, ar: &'a str, en: &'a str) -> &'a str {
        match self {
            Language::Ar => ar,
            Language::En => en,
        }
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ar" => Ok(Language::Ar),
            "en" => Ok(Language::En),
            other => Err(format!("unsupported language '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ltr,
    Rtl,
}

/// The active language together with the text direction it implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locale {
    pub language: Language,
    pub direction: Direction,
}

impl From<Language> for Locale {
    fn from(language: Language) -> Self {
        Self {
            language,
            direction: language.direction(),
        }
    }
}

impl Default for Locale {
    fn default() -> Self {
        Language::default().into()
    }
}

//=========================================================================================
// Courses and Lessons
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseLevel {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub title_ar: String,
    pub title_en: String,
    #[serde(default)]
    pub description_ar: Option<String>,
    #[serde(default)]
    pub description_en: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub is_free: bool,
    #[serde(default)]
    pub duration_hours: Option<f64>,
    pub level: CourseLevel,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Course {
    pub fn title(&self, language: Language) -> &str {
        language.pick(&self.title_ar, &self.title_en)
    }
}

/// A single lesson. `order_index` is unique within its course and defines the sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title_ar: String,
    pub title_en: String,
    #[serde(default)]
    pub description_ar: Option<String>,
    #[serde(default)]
    pub description_en: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    pub order_index: i32,
    #[serde(default)]
    pub is_preview: bool,
}

impl Lesson {
    pub fn title(&self, language: Language) -> &str {
        language.pick(&self.title_ar, &self.title_en)
    }
}

/// Grants a user full access to a course. `progress_percentage` is computed server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    #[serde(default)]
    pub progress_percentage: f64,
    #[serde(default)]
    pub enrolled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonProgress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub lesson_id: Uuid,
    #[serde(default)]
    pub completed: bool,
}

//=========================================================================================
// Shop
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name_ar: String,
    pub name_en: String,
    #[serde(default)]
    pub description_ar: Option<String>,
    #[serde(default)]
    pub description_en: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub stock_quantity: i32,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

impl Product {
    pub fn name(&self, language: Language) -> &str {
        language.pick(&self.name_ar, &self.name_en)
    }
}

/// One row of a user's cart. (user_id, product_id) is unique in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Postal,
    #[serde(rename = "cod")]
    CashOnDelivery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Delivered,
}

impl OrderStatus {
    /// The next status in the linear lifecycle, or `None` once delivered.
    pub fn next(self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::Processing),
            OrderStatus::Processing => Some(OrderStatus::Delivered),
            OrderStatus::Delivered => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

//=========================================================================================
// Users
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Teacher,
    Admin,
}

/// Per-user metadata. `id` is the auth user's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub preferred_language: Language,
}

// Represents the signed-in user as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Testimonial {
    pub id: Uuid,
    pub author_name: String,
    pub content_ar: String,
    pub content_en: String,
    #[serde(default)]
    pub rating: Option<u8>,
}
