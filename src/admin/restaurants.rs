use axum::{debug_handler, extract::{Path, State}, Json};
use serde::Deserialize;

use crate::{
    auth::AdminUser,
    db::{Restaurant, RestaurantId},
    store::Store,
    AppError, AppResult, AppState,
};

#[derive(Debug, Deserialize)]
pub struct RestaurantQuery {
    #[serde(default)]
    pub name: String,
    pub image: Option<String>,
}

pub async fn get_restaurant(store: &Store, id: RestaurantId) -> AppResult<Restaurant> {
    store
        .restaurant_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("restaurant {id} not found")))
}

fn restaurant_fields(query: &RestaurantQuery) -> AppResult<(&str, Option<&str>)> {
    let name = query.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("restaurant name is required"));
    }
    let image = query.image.as_deref().map(str::trim).filter(|image| !image.is_empty());
    Ok((name, image))
}

pub async fn create_restaurant(store: &Store, query: &RestaurantQuery) -> AppResult<Restaurant> {
    let (name, image) = restaurant_fields(query)?;
    store.insert_restaurant(name, image).await
}

pub async fn update_restaurant(store: &Store, id: RestaurantId, query: &RestaurantQuery) -> AppResult<Restaurant> {
    let (name, image) = restaurant_fields(query)?;
    store
        .update_restaurant(id, name, image)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("restaurant {id} not found")))
}

pub async fn delete_restaurant(store: &Store, id: RestaurantId) -> AppResult<()> {
    if !store.delete_restaurant(id).await? {
        return Err(AppError::NotFound(format!("restaurant {id} not found")));
    }
    Ok(())
}

#[debug_handler(state = AppState)]
pub(super) async fn list(
    State(store): State<Store>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<Vec<Restaurant>>> {
    Ok(Json(store.list_restaurants().await?))
}

#[debug_handler(state = AppState)]
pub(super) async fn show(
    State(store): State<Store>,
    AdminUser(_): AdminUser,
    Path(id): Path<RestaurantId>,
) -> AppResult<Json<Restaurant>> {
    Ok(Json(get_restaurant(&store, id).await?))
}

#[debug_handler(state = AppState)]
pub(super) async fn create(
    State(store): State<Store>,
    AdminUser(admin): AdminUser,
    Json(query): Json<RestaurantQuery>,
) -> AppResult<Json<Restaurant>> {
    let restaurant = create_restaurant(&store, &query).await?;
    tracing::info!(admin_id = admin.id, restaurant_id = restaurant.id, "restaurant created");
    Ok(Json(restaurant))
}

#[debug_handler(state = AppState)]
pub(super) async fn update(
    State(store): State<Store>,
    AdminUser(admin): AdminUser,
    Path(id): Path<RestaurantId>,
    Json(query): Json<RestaurantQuery>,
) -> AppResult<Json<Restaurant>> {
    let restaurant = update_restaurant(&store, id, &query).await?;
    tracing::info!(admin_id = admin.id, restaurant_id = id, "restaurant updated");
    Ok(Json(restaurant))
}

#[debug_handler(state = AppState)]
pub(super) async fn remove(
    State(store): State<Store>,
    AdminUser(admin): AdminUser,
    Path(id): Path<RestaurantId>,
) -> AppResult<Json<serde_json::Value>> {
    delete_restaurant(&store, id).await?;
    tracing::info!(admin_id = admin.id, restaurant_id = id, "restaurant deleted");
    Ok(Json(serde_json::json!({ "status": "success" })))
}
