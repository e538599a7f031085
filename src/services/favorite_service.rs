use crate::entities::{favorite_entity as favorites, listing_entity as listings};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::browse_service::{ListingRecord, load_records};
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::collections::HashMap;

#[derive(Clone)]
pub struct FavoriteService {
    pool: DatabaseConnection,
}

impl FavoriteService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    async fn find_favorite(
        &self,
        user_id: i32,
        listing_id: i32,
    ) -> AppResult<Option<favorites::Model>> {
        Ok(favorites::Entity::find()
            .filter(favorites::Column::UserId.eq(user_id))
            .filter(favorites::Column::ListingId.eq(listing_id))
            .one(&self.pool)
            .await?)
    }

    pub async fn add_favorite(&self, user_id: i32, listing_id: i32) -> AppResult<()> {
        listings::Entity::find_by_id(listing_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))?;
        let favorite = favorites::ActiveModel {
            user_id: Set(user_id),
            listing_id: Set(listing_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        // A pair that already exists is left untouched, including under concurrent adds.
        favorites::Entity::insert(favorite)
            .on_conflict(
                OnConflict::columns([favorites::Column::UserId, favorites::Column::ListingId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn remove_favorite(&self, user_id: i32, listing_id: i32) -> AppResult<()> {
        favorites::Entity::delete_many()
            .filter(favorites::Column::UserId.eq(user_id))
            .filter(favorites::Column::ListingId.eq(listing_id))
            .exec(&self.pool)
            .await?;
        Ok(())
    }

    /// Flip the favorite flag and return the new state.
    pub async fn toggle_favorite(&self, user_id: i32, listing_id: i32) -> AppResult<bool> {
        if self.find_favorite(user_id, listing_id).await?.is_some() {
            self.remove_favorite(user_id, listing_id).await?;
            Ok(false)
        } else {
            self.add_favorite(user_id, listing_id).await?;
            Ok(true)
        }
    }

    /// Favorited listings, most recently favorited first.
    pub async fn list_favorites(&self, user_id: i32) -> AppResult<Vec<ListingCard>> {
        let rows = favorites::Entity::find()
            .filter(favorites::Column::UserId.eq(user_id))
            .order_by_desc(favorites::Column::CreatedAt)
            .order_by_desc(favorites::Column::Id)
            .all(&self.pool)
            .await?;
        let order: HashMap<i32, usize> = rows
            .iter()
            .enumerate()
            .map(|(idx, fav)| (fav.listing_id, idx))
            .collect();

        let listing_rows = listings::Entity::find()
            .filter(listings::Column::Id.is_in(rows.iter().map(|f| f.listing_id)))
            .all(&self.pool)
            .await?;
        let mut records = load_records(&self.pool, listing_rows).await?;
        records.sort_by_key(|r| order.get(&r.listing.id).copied().unwrap_or(usize::MAX));
        Ok(records.iter().map(ListingRecord::to_card).collect())
    }
}
