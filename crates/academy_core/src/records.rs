//! crates/academy_core/src/records.rs
//!
//! Typed reads and writes over the generic `DataStore` port.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::ports::{Collection, DataStore, Filter, PortError, PortResult, Query};

pub(crate) fn decode<T: DeserializeOwned>(collection: Collection, row: Value) -> PortResult<T> {
    serde_json::from_value(row)
        .map_err(|e| PortError::Unexpected(format!("Malformed {} row: {}", collection, e)))
}

pub(crate) fn encode<T: Serialize>(value: &T) -> PortResult<Value> {
    serde_json::to_value(value).map_err(|e| PortError::Unexpected(e.to_string()))
}

pub(crate) async fn fetch_all<T: DeserializeOwned>(
    store: &dyn DataStore,
    query: &Query,
) -> PortResult<Vec<T>> {
    store
        .select(query)
        .await?
        .into_iter()
        .map(|row| decode(query.collection, row))
        .collect()
}

pub(crate) async fn fetch_optional<T: DeserializeOwned>(
    store: &dyn DataStore,
    query: Query,
) -> PortResult<Option<T>> {
    let query = query.limit(1);
    match store.select(&query).await?.into_iter().next() {
        Some(row) => decode(query.collection, row).map(Some),
        None => Ok(None),
    }
}

pub(crate) async fn fetch_by_id<T: DeserializeOwned>(
    store: &dyn DataStore,
    collection: Collection,
    id: impl ToString,
) -> PortResult<T> {
    let id = id.to_string();
    fetch_optional(store, Query::new(collection).eq("id", &id))
        .await?
        .ok_or_else(|| PortError::NotFound(format!("{} {}", collection, id)))
}

pub(crate) fn by_id(id: impl ToString) -> [Filter; 1] {
    [Filter::eq("id", id)]
}
