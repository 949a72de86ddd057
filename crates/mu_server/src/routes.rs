//! Route handlers: path/body binding, one directory call, JSON response.

use crate::error::ApiError;
use crate::{Directory, SharedDirectory};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use mu_core::{
    DirectoryResult, Item, ItemKey, ItemPatch, NewItem, Site, SiteIndex, SitePatch,
};
use serde::Serialize;

const SITE_UPDATED: &str = "Site information updated.";
const ITEM_ADDED: &str = "Item has been added.";
const ITEM_UPDATED: &str = "Item updated.";
const ITEM_DELETED: &str = "Item deleted.";

/// `{ "message": ..., "data": ... }` envelope for mutating routes.
#[derive(Debug, Serialize)]
pub struct MessageBody<T> {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> MessageBody<T> {
    fn with_data(message: &'static str, data: T) -> Self {
        Self {
            message,
            data: Some(data),
        }
    }
}

impl MessageBody<()> {
    fn plain(message: &'static str) -> Self {
        Self {
            message,
            data: None,
        }
    }
}

type ItemPath = Path<(String, String, String)>;

pub async fn index(State(directory): State<SharedDirectory>) -> Result<Json<SiteIndex>, ApiError> {
    let index = blocking(directory, |directory| directory.site_index()).await?;
    Ok(Json(index))
}

pub async fn get_site(
    State(directory): State<SharedDirectory>,
    Path(reference): Path<String>,
) -> Result<Json<Site>, ApiError> {
    let site = blocking(directory, move |directory| directory.get_site(&reference)).await?;
    Ok(Json(site))
}

pub async fn update_site(
    State(directory): State<SharedDirectory>,
    Path(reference): Path<String>,
    payload: Result<Json<SitePatch>, JsonRejection>,
) -> Result<Json<MessageBody<Site>>, ApiError> {
    let Json(patch) = payload?;
    let site = blocking(directory, move |directory| {
        directory.update_site(&reference, &patch)
    })
    .await?;
    Ok(Json(MessageBody::with_data(SITE_UPDATED, site)))
}

pub async fn list_items(
    State(directory): State<SharedDirectory>,
    Path(reference): Path<String>,
) -> Result<Json<Vec<Item>>, ApiError> {
    let items = blocking(directory, move |directory| directory.list_items(&reference)).await?;
    Ok(Json(items))
}

pub async fn add_item(
    State(directory): State<SharedDirectory>,
    Path(reference): Path<String>,
    payload: Result<Json<NewItem>, JsonRejection>,
) -> Result<Json<MessageBody<Item>>, ApiError> {
    let Json(new_item) = payload?;
    let item = blocking(directory, move |directory| {
        directory.add_item(&reference, new_item)
    })
    .await?;
    Ok(Json(MessageBody::with_data(ITEM_ADDED, item)))
}

pub async fn get_item(
    State(directory): State<SharedDirectory>,
    Path((reference, kind, title)): ItemPath,
) -> Result<Json<Item>, ApiError> {
    let key = ItemKey::new(kind, title);
    let item = blocking(directory, move |directory| {
        directory.find_item(&reference, &key)
    })
    .await?;
    Ok(Json(item))
}

pub async fn update_item(
    State(directory): State<SharedDirectory>,
    Path((reference, kind, title)): ItemPath,
    payload: Result<Json<ItemPatch>, JsonRejection>,
) -> Result<Json<MessageBody<Item>>, ApiError> {
    let Json(patch) = payload?;
    let key = ItemKey::new(kind, title);
    let item = blocking(directory, move |directory| {
        directory.update_item(&reference, &key, &patch)
    })
    .await?;
    Ok(Json(MessageBody::with_data(ITEM_UPDATED, item)))
}

pub async fn delete_item(
    State(directory): State<SharedDirectory>,
    Path((reference, kind, title)): ItemPath,
) -> Result<Json<MessageBody<()>>, ApiError> {
    let key = ItemKey::new(kind, title);
    blocking(directory, move |directory| {
        directory.delete_item(&reference, &key)
    })
    .await?;
    Ok(Json(MessageBody::plain(ITEM_DELETED)))
}

/// Runs one directory call off the async runtime; the store API is synchronous.
async fn blocking<T, F>(directory: SharedDirectory, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Directory) -> DirectoryResult<T> + Send + 'static,
{
    let outcome = tokio::task::spawn_blocking(move || op(&directory)).await?;
    Ok(outcome?)
}
