//! Public listing browser.
//!
//! Browsable listings are loaded once per request and filtered, sorted and
//! paginated in memory; facets always describe the unfiltered set.

use crate::entities::{
    ListingState, car_entity as cars, image_entity as images, listing_entity as listings,
    review_entity as reviews, user_entity as users,
};
use crate::error::AppResult;
use crate::models::*;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, JoinType, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait,
};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

/// Number of listings shown on the home page strip.
pub const FEATURED_LIMIT: usize = 6;

/// A listing joined with what its card needs.
#[derive(Debug, Clone)]
pub(crate) struct ListingRecord {
    pub listing: listings::Model,
    pub car: cars::Model,
    pub primary_image: Option<String>,
    pub ratings: Vec<i32>,
}

impl ListingRecord {
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        self.car.manufacturer.to_lowercase().contains(&term)
            || self.car.model.to_lowercase().contains(&term)
            || self.listing.description.to_lowercase().contains(&term)
    }

    pub fn to_card(&self) -> ListingCard {
        ListingCard {
            id: self.listing.id,
            manufacturer: self.car.manufacturer.clone(),
            model: self.car.model.clone(),
            year: self.car.year,
            fuel_type: self.car.fuel_type,
            transmission: self.car.transmission,
            listing_type: self.listing.listing_type,
            price: self.listing.effective_price(),
            old_price: self.listing.old_price,
            discount: self.listing.discount,
            state: self.listing.state,
            is_featured: self.listing.is_featured,
            views: self.listing.views,
            average_rating: average_rating(&self.ratings),
            review_count: self.ratings.len() as u32,
            primary_image: self.primary_image.clone(),
            created_at: self.listing.created_at,
        }
    }
}

/// Attach cars, primary images and ratings to `rows`, keeping their order.
pub(crate) async fn load_records<C: ConnectionTrait>(
    conn: &C,
    rows: Vec<listings::Model>,
) -> AppResult<Vec<ListingRecord>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let listing_ids: Vec<i32> = rows.iter().map(|l| l.id).collect();
    let car_ids: Vec<i32> = rows.iter().map(|l| l.car_id).collect();

    let mut cars_by_id: HashMap<i32, cars::Model> = cars::Entity::find()
        .filter(cars::Column::Id.is_in(car_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let mut primary_by_listing: HashMap<i32, String> = HashMap::new();
    for image in images::Entity::find()
        .filter(images::Column::ListingId.is_in(listing_ids.clone()))
        .filter(images::Column::IsPrimary.eq(true))
        .order_by_asc(images::Column::Id)
        .all(conn)
        .await?
    {
        primary_by_listing.insert(image.listing_id, image.path);
    }

    let mut ratings_by_listing: HashMap<i32, Vec<i32>> = HashMap::new();
    for review in reviews::Entity::find()
        .filter(reviews::Column::ListingId.is_in(listing_ids))
        .all(conn)
        .await?
    {
        ratings_by_listing
            .entry(review.listing_id)
            .or_default()
            .push(review.rating);
    }

    Ok(rows
        .into_iter()
        .filter_map(|listing| {
            let car = cars_by_id.remove(&listing.car_id)?;
            Some(ListingRecord {
                primary_image: primary_by_listing.remove(&listing.id),
                ratings: ratings_by_listing.remove(&listing.id).unwrap_or_default(),
                car,
                listing,
            })
        })
        .collect())
}

/// Apply every filter of `query` except paging and sorting.
pub(crate) fn filter_records(records: &[ListingRecord], query: &BrowseQuery) -> Vec<ListingRecord> {
    records
        .iter()
        .filter(|r| query.search.as_deref().is_none_or(|s| r.matches_search(s)))
        .filter(|r| query.min_price.is_none_or(|min| r.listing.effective_price() >= min))
        .filter(|r| query.max_price.is_none_or(|max| r.listing.effective_price() <= max))
        .filter(|r| query.year.is_none_or(|y| r.car.year == y))
        .filter(|r| query.transmission.is_none_or(|t| r.car.transmission == t))
        .filter(|r| query.fuel_type.is_none_or(|f| r.car.fuel_type == f))
        .filter(|r| query.listing_type.is_none_or(|t| r.listing.listing_type == t))
        .cloned()
        .collect()
}

/// Card ordering for every sort mode; ties fall back to newest first.
pub(crate) fn compare_cards(a: &ListingCard, b: &ListingCard, sort_by: SortBy) -> Ordering {
    let newest = b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id));
    match sort_by {
        SortBy::Newest => newest,
        SortBy::PriceAsc => a.price.cmp(&b.price).then(newest),
        SortBy::PriceDesc => b.price.cmp(&a.price).then(newest),
        SortBy::HighestRated => b
            .average_rating
            .partial_cmp(&a.average_rating)
            .unwrap_or(Ordering::Equal)
            .then(newest),
        SortBy::MostViewed => b.views.cmp(&a.views).then(newest),
    }
}

/// Distinct manufacturers (alphabetical) and model years (newest first).
pub(crate) fn facets(records: &[ListingRecord]) -> (Vec<String>, Vec<i32>) {
    let manufacturers: BTreeSet<String> =
        records.iter().map(|r| r.car.manufacturer.clone()).collect();
    let years: BTreeSet<i32> = records.iter().map(|r| r.car.year).collect();
    (
        manufacturers.into_iter().collect(),
        years.into_iter().rev().collect(),
    )
}

#[derive(Clone)]
pub struct BrowseService {
    pool: DatabaseConnection,
}

impl BrowseService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// Available listings whose owner is not banned.
    async fn browsable_records(&self, featured_only: bool) -> AppResult<Vec<ListingRecord>> {
        let mut select = listings::Entity::find()
            .join(JoinType::InnerJoin, listings::Relation::Owner.def())
            .filter(listings::Column::State.eq(ListingState::Available))
            .filter(users::Column::IsBanned.eq(false));
        if featured_only {
            select = select.filter(listings::Column::IsFeatured.eq(true));
        }
        let rows = select
            .order_by_desc(listings::Column::CreatedAt)
            .order_by_desc(listings::Column::Id)
            .all(&self.pool)
            .await?;
        load_records(&self.pool, rows).await
    }

    pub async fn browse(&self, query: &BrowseQuery) -> AppResult<BrowseResponse> {
        let sort_by = SortBy::from_param(query.sort_by.as_deref());
        let records = self.browsable_records(false).await?;
        let (manufacturers, years) = facets(&records);

        let mut cards: Vec<ListingCard> = filter_records(&records, query)
            .iter()
            .map(ListingRecord::to_card)
            .collect();
        cards.sort_by(|a, b| compare_cards(a, b, sort_by));

        let (items, pagination) = paginate(cards, query.page.unwrap_or(1), BROWSE_PAGE_SIZE);
        Ok(BrowseResponse {
            items,
            pagination,
            sort_by,
            manufacturers,
            years,
        })
    }

    pub async fn get_featured(&self) -> AppResult<Vec<ListingCard>> {
        let records = self.browsable_records(true).await?;
        Ok(records
            .iter()
            .take(FEATURED_LIMIT)
            .map(ListingRecord::to_card)
            .collect())
    }
}
