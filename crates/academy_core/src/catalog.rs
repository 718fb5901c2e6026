//! crates/academy_core/src/catalog.rs
//!
//! Public listings: published courses, active products and testimonials.

use std::sync::Arc;
use tracing::instrument;

use crate::domain::{Course, Product, Testimonial};
use crate::error::CoreResult;
use crate::ports::{Collection, DataStore, Query, SortDirection};
use crate::records::fetch_all;

#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn DataStore>,
}

impl Catalog {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn list_published_courses(&self) -> CoreResult<Vec<Course>> {
        let query = Query::new(Collection::Courses)
            .eq("is_published", true)
            .order_by("created_at", SortDirection::Descending);
        Ok(fetch_all(self.store.as_ref(), &query).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_active_products(&self) -> CoreResult<Vec<Product>> {
        let query = Query::new(Collection::Products)
            .eq("is_active", true)
            .order_by("created_at", SortDirection::Descending);
        Ok(fetch_all(self.store.as_ref(), &query).await?)
    }

    pub async fn list_testimonials(&self) -> CoreResult<Vec<Testimonial>> {
        let query = Query::new(Collection::Testimonials);
        Ok(fetch_all(self.store.as_ref(), &query).await?)
    }
}
