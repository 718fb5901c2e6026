//! crates/academy_core/src/i18n.rs
//!
//! Translation lookup keyed by dotted identifiers.

use std::collections::{BTreeMap, HashMap};

use crate::domain::Language;

// (key, arabic, english)
const ENTRIES: &[(&str, &str, &str)] = &[
    ("nav.home", "الرئيسية", "Home"),
    ("nav.courses", "الدورات", "Courses"),
    ("nav.shop", "المتجر", "Shop"),
    ("nav.cart", "السلة", "Cart"),
    ("nav.dashboard", "لوحة التحكم", "Dashboard"),
    ("nav.admin", "الإدارة", "Admin"),
    ("course.enroll", "سجّل في الدورة", "Enroll"),
    ("course.sign_in_to_enroll", "سجّل الدخول للتسجيل", "Sign in to enroll"),
    ("course.enrolled", "أنت مسجّل", "Enrolled"),
    ("course.locked", "مقفل", "Locked"),
    ("course.completed", "مكتمل", "Completed"),
    ("course.mark_complete", "تحديد كمكتمل", "Mark as complete"),
    ("course.lesson_of", "الدرس {n} من {m}", "Lesson {n} of {m}"),
    ("course.no_lessons", "لا توجد دروس بعد", "No lessons yet"),
    ("course.not_found", "الدورة غير موجودة", "Course not found"),
    ("cart.empty", "سلتك فارغة", "Your cart is empty"),
    ("cart.subtotal", "المجموع الفرعي", "Subtotal"),
    ("cart.shipping", "الشحن", "Shipping"),
    ("cart.total", "المجموع", "Total"),
    ("cart.errors.invalid_quantity", "الكمية يجب أن تكون 1 على الأقل", "Quantity must be at least 1"),
    ("cart.errors.unavailable_product", "أحد المنتجات في سلتك لم يعد متوفرا", "A product in your cart is no longer available"),
    ("checkout.submit", "تأكيد الطلب", "Place order"),
    ("checkout.cod", "الدفع عند الاستلام", "Cash on delivery"),
    ("checkout.postal", "الدفع البريدي", "Postal payment"),
    ("checkout.success", "تم إنشاء طلبك بنجاح", "Your order has been placed"),
    ("checkout.errors.missing_field", "يرجى ملء جميع حقول عنوان الشحن", "Please fill in every shipping field"),
    ("checkout.errors.missing_postal_reference", "يرجى إدخال رقم RIP ورقم CCP", "Please enter both the RIP and CCP numbers"),
    ("errors.remote", "حدث خطأ، يرجى المحاولة مجددًا", "Something went wrong, please try again"),
    ("errors.not_found", "غير موجود", "Not found"),
    ("errors.forbidden", "ليس لديك صلاحية", "You do not have access"),
    ("errors.unauthenticated", "يرجى تسجيل الدخول", "Please sign in"),
    ("errors.busy", "جارٍ معالجة طلبك", "Your request is being processed"),
];

pub struct Translator {
    entries: HashMap<&'static str, (&'static str, &'static str)>,
}

impl Default for Translator {
    fn default() -> Self {
        Self::new()
    }
}

impl Translator {
    pub fn new() -> Self {
        Self {
            entries: ENTRIES.iter().map(|(k, ar, en)| (*k, (*ar, *en))).collect(),
        }
    }

    /// Falls back to the key itself when it is unknown.
    pub fn translate<'a>(&self, key: &'a str, language: Language) -> &'a str {
        match self.entries.get(key) {
            Some(&(ar, en)) => language.pick(ar, en),
            None => key,
        }
    }

    pub fn table(&self, language: Language) -> BTreeMap<&'static str, &'static str> {
        self.entries
            .iter()
            .map(|(key, &(ar, en))| (*key, language.pick(ar, en)))
            .collect()
    }
}
