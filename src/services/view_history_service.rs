use crate::entities::{listing_entity as listings, view_history_entity as history};
use crate::error::AppResult;
use crate::models::*;
use crate::services::browse_service::{compare_cards, load_records};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::collections::{HashMap, HashSet};

/// Who looked at a listing, as seen by the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct ViewContext {
    pub user_id: Option<i32>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Clone)]
pub struct ViewHistoryService {
    pool: DatabaseConnection,
}

impl ViewHistoryService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// Record a view. Errors are logged and never reach the caller.
    pub async fn record_view(&self, listing_id: i32, context: ViewContext) {
        if let Err(e) = self.try_record_view(listing_id, context).await {
            log::warn!("Failed to record view of listing {listing_id}: {e}");
        }
    }

    async fn try_record_view(&self, listing_id: i32, context: ViewContext) -> AppResult<()> {
        let entry = history::ActiveModel {
            listing_id: Set(listing_id),
            user_id: Set(context.user_id),
            viewed_at: Set(Utc::now()),
            user_agent: Set(context.user_agent),
            ip_address: Set(context.ip_address),
            ..Default::default()
        };

        match context.user_id {
            Some(user_id) => {
                let txn = self.pool.begin().await?;
                history::Entity::delete_many()
                    .filter(history::Column::UserId.eq(user_id))
                    .filter(history::Column::ListingId.eq(listing_id))
                    .exec(&txn)
                    .await?;
                entry.insert(&txn).await?;
                txn.commit().await?;
            }
            None => {
                entry.insert(&self.pool).await?;
            }
        }
        Ok(())
    }

    pub async fn get_history(&self, user_id: i32, query: &HistoryQuery) -> AppResult<HistoryResponse> {
        let sort_by = SortBy::from_param(query.sort_by.as_deref());
        let rows = history::Entity::find()
            .filter(history::Column::UserId.eq(user_id))
            .order_by_desc(history::Column::ViewedAt)
            .order_by_desc(history::Column::Id)
            .all(&self.pool)
            .await?;

        // latest row per listing
        let mut seen = HashSet::new();
        let latest: Vec<history::Model> = rows
            .into_iter()
            .filter(|row| seen.insert(row.listing_id))
            .collect();

        let listing_rows = listings::Entity::find()
            .filter(listings::Column::Id.is_in(latest.iter().map(|r| r.listing_id)))
            .all(&self.pool)
            .await?;
        let mut records: HashMap<i32, _> = load_records(&self.pool, listing_rows)
            .await?
            .into_iter()
            .map(|r| (r.listing.id, r))
            .collect();

        let mut items: Vec<HistoryItem> = latest
            .into_iter()
            .filter_map(|row| {
                let record = records.remove(&row.listing_id)?;
                let matches = query
                    .search
                    .as_deref()
                    .is_none_or(|term| record.matches_search(term));
                matches.then(|| HistoryItem {
                    id: row.id,
                    viewed_at: row.viewed_at,
                    listing: record.to_card(),
                })
            })
            .collect();

        if sort_by != SortBy::Newest {
            items.sort_by(|a, b| compare_cards(&a.listing, &b.listing, sort_by));
        }

        let (items, pagination) = paginate(items, query.page.unwrap_or(1), HISTORY_PAGE_SIZE);
        Ok(HistoryResponse {
            items,
            pagination,
            sort_by,
        })
    }

    pub async fn clear_history(&self, user_id: i32) -> AppResult<u64> {
        let result = history::Entity::delete_many()
            .filter(history::Column::UserId.eq(user_id))
            .exec(&self.pool)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn remove_entry(&self, entry_id: i32, user_id: i32) -> AppResult<()> {
        history::Entity::delete_many()
            .filter(history::Column::Id.eq(entry_id))
            .filter(history::Column::UserId.eq(user_id))
            .exec(&self.pool)
            .await?;
        Ok(())
    }
}
