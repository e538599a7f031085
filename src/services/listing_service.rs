use crate::entities::{
    ListingState, ListingType, car_entity as cars, favorite_entity as favorites,
    image_entity as images, listing_entity as listings, review_entity as reviews,
    user_entity as users, view_history_entity as history,
};
use crate::error::{AppError, AppResult};
use crate::external::{SharedFileStorage, UploadedFile};
use crate::models::*;
use crate::services::subscription_service::{check_feature_slot, check_listing_quota};
use crate::services::user_service::{find_user, require_admin};
use crate::utils::*;
use chrono::{Datelike, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use std::collections::HashMap;

/// Year of the first production automobile.
const MIN_CAR_YEAR: i32 = 1886;
const MAX_DESCRIPTION_CHARS: usize = 5000;

/// A file already written to storage, waiting for its image row.
#[derive(Debug, Clone)]
struct StagedImage {
    path: String,
    alt_text: Option<String>,
}

fn listing_folder(owner_id: i32) -> String {
    format!("listings/{owner_id}")
}

fn validate_car(car: &CarInput) -> AppResult<()> {
    if car.manufacturer.trim().is_empty() || car.model.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Manufacturer and model are required".to_string(),
        ));
    }
    let max_year = Utc::now().year() + 1;
    if !(MIN_CAR_YEAR..=max_year).contains(&car.year) {
        return Err(AppError::ValidationError(format!(
            "Year must be between {MIN_CAR_YEAR} and {max_year}"
        )));
    }
    if car.horsepower < 0 || car.doors < 0 {
        return Err(AppError::ValidationError(
            "Horsepower and doors cannot be negative".to_string(),
        ));
    }
    Ok(())
}

fn validate_pricing(
    listing_type: ListingType,
    rent_price: i64,
    new_price: i64,
    discount: i32,
) -> AppResult<()> {
    if rent_price < 0 || new_price < 0 {
        return Err(AppError::ValidationError(
            "Prices cannot be negative".to_string(),
        ));
    }
    match listing_type {
        ListingType::ForSelling if new_price <= 0 => {
            return Err(AppError::ValidationError(
                "Listings for sale need a positive price".to_string(),
            ));
        }
        ListingType::ForRenting if rent_price <= 0 => {
            return Err(AppError::ValidationError(
                "Listings for rent need a positive rent price".to_string(),
            ));
        }
        _ => {}
    }
    if !(0..=100).contains(&discount) {
        return Err(AppError::ValidationError(
            "Discount must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

fn validate_description(description: &str) -> AppResult<()> {
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(AppError::ValidationError(format!(
            "Description cannot exceed {MAX_DESCRIPTION_CHARS} characters"
        )));
    }
    Ok(())
}

/// Ids to demote and the id to promote so that a non-empty image set has exactly
/// one primary: the highest primary id survives, otherwise the lowest id is promoted.
pub(crate) fn primary_fixups(imgs: &[images::Model]) -> (Vec<i32>, Option<i32>) {
    let primaries: Vec<i32> = imgs.iter().filter(|i| i.is_primary).map(|i| i.id).collect();
    match primaries.iter().max().copied() {
        Some(keep) => (primaries.into_iter().filter(|id| *id != keep).collect(), None),
        None => (Vec::new(), imgs.iter().map(|i| i.id).min()),
    }
}

async fn normalize_primary_image<C: ConnectionTrait>(conn: &C, listing_id: i32) -> AppResult<()> {
    let imgs = images::Entity::find()
        .filter(images::Column::ListingId.eq(listing_id))
        .all(conn)
        .await?;
    let (demote, promote) = primary_fixups(&imgs);
    if !demote.is_empty() {
        images::Entity::update_many()
            .col_expr(images::Column::IsPrimary, Expr::value(false))
            .filter(images::Column::Id.is_in(demote))
            .exec(conn)
            .await?;
    }
    if let Some(id) = promote {
        images::Entity::update_many()
            .col_expr(images::Column::IsPrimary, Expr::value(true))
            .filter(images::Column::Id.eq(id))
            .exec(conn)
            .await?;
    }
    Ok(())
}

async fn insert_images(
    txn: &DatabaseTransaction,
    listing_id: i32,
    staged: &[StagedImage],
    first_is_primary: bool,
) -> AppResult<()> {
    for (idx, image) in staged.iter().enumerate() {
        images::ActiveModel {
            listing_id: Set(listing_id),
            path: Set(image.path.clone()),
            alt_text: Set(image.alt_text.clone()),
            is_primary: Set(first_is_primary && idx == 0),
            ..Default::default()
        }
        .insert(txn)
        .await?;
    }
    Ok(())
}

/// Lock the owner's row for the rest of the transaction so quota checks serialise.
async fn lock_owner(txn: &DatabaseTransaction, owner_id: i32) -> AppResult<users::Model> {
    users::Entity::find_by_id(owner_id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

#[derive(Clone)]
pub struct ListingService {
    pool: DatabaseConnection,
    storage: SharedFileStorage,
}

impl ListingService {
    pub fn new(pool: DatabaseConnection, storage: SharedFileStorage) -> Self {
        Self { pool, storage }
    }

    /// Write uploads to storage. Files the storage rejects are skipped.
    fn stage_files(&self, files: &[UploadedFile], folder: &str) -> Vec<StagedImage> {
        files
            .iter()
            .filter_map(|file| match self.storage.save_file(file, folder) {
                Ok(path) => Some(StagedImage {
                    path,
                    alt_text: file.alt_text.clone(),
                }),
                Err(e) => {
                    log::warn!("Skipping upload {}: {e}", file.file_name);
                    None
                }
            })
            .collect()
    }

    fn discard_files<'a>(&self, paths: impl IntoIterator<Item = &'a str>) {
        for path in paths {
            if !self.storage.delete_file(path) {
                log::warn!("Could not remove stored file {path}");
            }
        }
    }

    async fn find_listing(&self, listing_id: i32) -> AppResult<listings::Model> {
        listings::Entity::find_by_id(listing_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))
    }

    /// Load the listing and check the requester may change it.
    async fn find_mutable_listing(
        &self,
        listing_id: i32,
        requester_id: i32,
    ) -> AppResult<listings::Model> {
        let requester = find_user(&self.pool, requester_id).await?;
        let listing = self.find_listing(listing_id).await?;
        if !can_mutate_listing(&requester, &listing) {
            return Err(AppError::Forbidden);
        }
        Ok(listing)
    }

    async fn listing_response<C: ConnectionTrait>(
        conn: &C,
        listing: listings::Model,
    ) -> AppResult<ListingResponse> {
        let car = cars::Entity::find_by_id(listing.car_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::NotFound("Car not found".to_string()))?;
        let imgs = images::Entity::find()
            .filter(images::Column::ListingId.eq(listing.id))
            .all(conn)
            .await?;
        Ok(ListingResponse::build(listing, car, imgs))
    }

    pub async fn create_listing(
        &self,
        owner_id: i32,
        input: NewListing,
        files: Vec<UploadedFile>,
    ) -> AppResult<ListingResponse> {
        if files.len() > MAX_LISTING_IMAGES {
            return Err(AppError::ValidationError(format!(
                "A listing can hold at most {MAX_LISTING_IMAGES} images"
            )));
        }
        validate_car(&input.car)?;
        validate_pricing(
            input.listing_type,
            input.rent_price,
            input.new_price,
            input.discount,
        )?;
        validate_description(&input.description)?;

        let owner = find_user(&self.pool, owner_id).await?;
        if !can_publish_listings(&owner) {
            return Err(AppError::Forbidden);
        }

        let staged = self.stage_files(&files, &listing_folder(owner_id));
        match self.insert_listing(owner_id, input, &staged).await {
            Ok(response) => {
                log::info!(
                    "User {owner_id} listed car {} as listing {} with {} images",
                    response.car.id,
                    response.id,
                    response.images.len()
                );
                Ok(response)
            }
            Err(e) => {
                self.discard_files(staged.iter().map(|s| s.path.as_str()));
                Err(e)
            }
        }
    }

    async fn insert_listing(
        &self,
        owner_id: i32,
        input: NewListing,
        staged: &[StagedImage],
    ) -> AppResult<ListingResponse> {
        let now = Utc::now();
        let txn = self.pool.begin().await?;

        lock_owner(&txn, owner_id).await?;
        if let QuotaCheck::Denied(denial) =
            check_listing_quota(&txn, owner_id, input.is_featured, now).await?
        {
            log::info!("Listing creation for user {owner_id} denied: {denial}");
            return Err(AppError::QuotaExceeded(denial));
        }

        let car_input = input.car;
        let car = cars::ActiveModel {
            manufacturer: Set(car_input.manufacturer.trim().to_string()),
            model: Set(car_input.model.trim().to_string()),
            year: Set(car_input.year),
            body_style: Set(car_input.body_style.trim().to_string()),
            fuel_type: Set(car_input.fuel_type),
            transmission: Set(car_input.transmission),
            horsepower: Set(car_input.horsepower),
            doors: Set(car_input.doors),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let listing = listings::ActiveModel {
            car_id: Set(car.id),
            owner_id: Set(owner_id),
            listing_type: Set(input.listing_type),
            rent_price: Set(input.rent_price),
            new_price: Set(input.new_price),
            old_price: Set(None),
            description: Set(input.description.trim().to_string()),
            color: Set(input.color.trim().to_string()),
            state: Set(ListingState::Available),
            is_featured: Set(input.is_featured),
            discount: Set(input.discount),
            views: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        insert_images(&txn, listing.id, staged, true).await?;
        let imgs = images::Entity::find()
            .filter(images::Column::ListingId.eq(listing.id))
            .all(&txn)
            .await?;
        txn.commit().await?;

        Ok(ListingResponse::build(listing, car, imgs))
    }

    pub async fn update_listing(
        &self,
        listing_id: i32,
        requester_id: i32,
        changes: ListingChanges,
        files: Vec<UploadedFile>,
    ) -> AppResult<ListingResponse> {
        let listing = self.find_mutable_listing(listing_id, requester_id).await?;

        if let Some(car) = &changes.car {
            validate_car(car)?;
        }
        validate_pricing(
            changes.listing_type.unwrap_or(listing.listing_type),
            changes.rent_price.unwrap_or(listing.rent_price),
            changes.new_price.unwrap_or(listing.new_price),
            changes.discount.unwrap_or(listing.discount),
        )?;
        if let Some(description) = &changes.description {
            validate_description(description)?;
        }

        let existing = images::Entity::find()
            .filter(images::Column::ListingId.eq(listing.id))
            .all(&self.pool)
            .await?;
        let removed: Vec<images::Model> = match &changes.keep_image_ids {
            Some(keep) => existing
                .iter()
                .filter(|img| !keep.contains(&img.id))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        if existing.len() - removed.len() + files.len() > MAX_LISTING_IMAGES {
            return Err(AppError::ValidationError(format!(
                "A listing can hold at most {MAX_LISTING_IMAGES} images"
            )));
        }

        let staged = self.stage_files(&files, &listing_folder(listing.owner_id));
        match self.apply_update(listing, changes, &removed, &staged).await {
            Ok(response) => {
                self.discard_files(removed.iter().map(|img| img.path.as_str()));
                Ok(response)
            }
            Err(e) => {
                self.discard_files(staged.iter().map(|s| s.path.as_str()));
                Err(e)
            }
        }
    }

    async fn apply_update(
        &self,
        listing: listings::Model,
        changes: ListingChanges,
        removed: &[images::Model],
        staged: &[StagedImage],
    ) -> AppResult<ListingResponse> {
        let now = Utc::now();
        let txn = self.pool.begin().await?;

        if changes.is_featured == Some(true) && !listing.is_featured {
            lock_owner(&txn, listing.owner_id).await?;
            if let QuotaCheck::Denied(denial) =
                check_feature_slot(&txn, listing.owner_id, now).await?
            {
                return Err(AppError::QuotaExceeded(denial));
            }
        }

        if let Some(input) = changes.car {
            let car = cars::Entity::find_by_id(listing.car_id)
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::NotFound("Car not found".to_string()))?;
            let mut am = car.into_active_model();
            am.manufacturer = Set(input.manufacturer.trim().to_string());
            am.model = Set(input.model.trim().to_string());
            am.year = Set(input.year);
            am.body_style = Set(input.body_style.trim().to_string());
            am.fuel_type = Set(input.fuel_type);
            am.transmission = Set(input.transmission);
            am.horsepower = Set(input.horsepower);
            am.doors = Set(input.doors);
            am.update(&txn).await?;
        }

        let previous_price = listing.new_price;
        let mut am = listing.into_active_model();
        if let Some(listing_type) = changes.listing_type {
            am.listing_type = Set(listing_type);
        }
        if let Some(rent_price) = changes.rent_price {
            am.rent_price = Set(rent_price);
        }
        if let Some(new_price) = changes.new_price
            && new_price != previous_price
        {
            am.new_price = Set(new_price);
            am.old_price = Set(Some(previous_price));
        }
        if let Some(description) = changes.description {
            am.description = Set(description.trim().to_string());
        }
        if let Some(color) = changes.color {
            am.color = Set(color.trim().to_string());
        }
        if let Some(discount) = changes.discount {
            am.discount = Set(discount);
        }
        if let Some(is_featured) = changes.is_featured {
            am.is_featured = Set(is_featured);
        }
        am.updated_at = Set(now);
        let listing = am.update(&txn).await?;

        if !removed.is_empty() {
            images::Entity::delete_many()
                .filter(images::Column::Id.is_in(removed.iter().map(|img| img.id)))
                .exec(&txn)
                .await?;
        }
        let has_primary = images::Entity::find()
            .filter(images::Column::ListingId.eq(listing.id))
            .filter(images::Column::IsPrimary.eq(true))
            .count(&txn)
            .await?
            > 0;
        insert_images(&txn, listing.id, staged, !has_primary).await?;
        normalize_primary_image(&txn, listing.id).await?;

        let response = Self::listing_response(&txn, listing).await?;
        txn.commit().await?;
        Ok(response)
    }

    pub async fn delete_listing(&self, listing_id: i32, requester_id: i32) -> AppResult<()> {
        let listing = self.find_mutable_listing(listing_id, requester_id).await?;
        let imgs = images::Entity::find()
            .filter(images::Column::ListingId.eq(listing.id))
            .all(&self.pool)
            .await?;

        let txn = self.pool.begin().await?;
        images::Entity::delete_many()
            .filter(images::Column::ListingId.eq(listing.id))
            .exec(&txn)
            .await?;
        reviews::Entity::delete_many()
            .filter(reviews::Column::ListingId.eq(listing.id))
            .exec(&txn)
            .await?;
        favorites::Entity::delete_many()
            .filter(favorites::Column::ListingId.eq(listing.id))
            .exec(&txn)
            .await?;
        history::Entity::delete_many()
            .filter(history::Column::ListingId.eq(listing.id))
            .exec(&txn)
            .await?;
        listings::Entity::delete_by_id(listing.id).exec(&txn).await?;
        cars::Entity::delete_by_id(listing.car_id).exec(&txn).await?;
        txn.commit().await?;

        self.discard_files(imgs.iter().map(|img| img.path.as_str()));
        log::info!("User {requester_id} deleted listing {listing_id}");
        Ok(())
    }

    /// Best-effort view counter; failures are only logged.
    pub async fn increment_views(&self, listing_id: i32) {
        let result = listings::Entity::update_many()
            .col_expr(
                listings::Column::Views,
                Expr::col(listings::Column::Views).add(1),
            )
            .col_expr(listings::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(listings::Column::Id.eq(listing_id))
            .exec(&self.pool)
            .await;
        if let Err(e) = result {
            log::warn!("Failed to count view of listing {listing_id}: {e}");
        }
    }

    pub async fn get_listing_details(
        &self,
        listing_id: i32,
        viewer_id: Option<i32>,
    ) -> AppResult<ListingDetailsResponse> {
        let listing = self.find_listing(listing_id).await?;
        let owner = find_user(&self.pool, listing.owner_id).await?;
        let listing = Self::listing_response(&self.pool, listing).await?;

        let review_rows = reviews::Entity::find()
            .filter(reviews::Column::ListingId.eq(listing_id))
            .order_by_desc(reviews::Column::CreatedAt)
            .order_by_desc(reviews::Column::Id)
            .find_also_related(users::Entity)
            .all(&self.pool)
            .await?;
        let ratings: Vec<i32> = review_rows.iter().map(|(r, _)| r.rating).collect();
        let reviews: Vec<ReviewResponse> = review_rows
            .into_iter()
            .map(|(review, author)| {
                ReviewResponse::build(review, author.map(|u| u.username).unwrap_or_default())
            })
            .collect();

        let favorite_count = favorites::Entity::find()
            .filter(favorites::Column::ListingId.eq(listing_id))
            .count(&self.pool)
            .await?;
        let is_favorite = match viewer_id {
            Some(user_id) => Some(
                favorites::Entity::find()
                    .filter(favorites::Column::ListingId.eq(listing_id))
                    .filter(favorites::Column::UserId.eq(user_id))
                    .count(&self.pool)
                    .await?
                    > 0,
            ),
            None => None,
        };

        Ok(ListingDetailsResponse {
            listing,
            owner: OwnerSummary {
                id: owner.id,
                username: owner.username,
            },
            average_rating: average_rating(&ratings),
            review_count: ratings.len() as u32,
            reviews,
            favorite_count,
            is_favorite,
        })
    }

    pub async fn set_primary_image(
        &self,
        listing_id: i32,
        image_id: i32,
        requester_id: i32,
    ) -> AppResult<ListingResponse> {
        let listing = self.find_mutable_listing(listing_id, requester_id).await?;

        let txn = self.pool.begin().await?;
        images::Entity::find_by_id(image_id)
            .filter(images::Column::ListingId.eq(listing.id))
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Image not found".to_string()))?;
        images::Entity::update_many()
            .col_expr(images::Column::IsPrimary, Expr::value(false))
            .filter(images::Column::ListingId.eq(listing.id))
            .exec(&txn)
            .await?;
        images::Entity::update_many()
            .col_expr(images::Column::IsPrimary, Expr::value(true))
            .filter(images::Column::Id.eq(image_id))
            .exec(&txn)
            .await?;
        let response = Self::listing_response(&txn, listing).await?;
        txn.commit().await?;
        Ok(response)
    }

    /// The owner's listings in every state, newest first.
    pub async fn list_own_listings(&self, owner_id: i32) -> AppResult<Vec<ListingResponse>> {
        let rows = listings::Entity::find()
            .filter(listings::Column::OwnerId.eq(owner_id))
            .order_by_desc(listings::Column::CreatedAt)
            .order_by_desc(listings::Column::Id)
            .all(&self.pool)
            .await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut cars_by_id: HashMap<i32, cars::Model> = cars::Entity::find()
            .filter(cars::Column::Id.is_in(rows.iter().map(|l| l.car_id)))
            .all(&self.pool)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        let mut images_by_listing: HashMap<i32, Vec<images::Model>> = HashMap::new();
        for img in images::Entity::find()
            .filter(images::Column::ListingId.is_in(rows.iter().map(|l| l.id)))
            .all(&self.pool)
            .await?
        {
            images_by_listing.entry(img.listing_id).or_default().push(img);
        }

        Ok(rows
            .into_iter()
            .filter_map(|listing| {
                let car = cars_by_id.remove(&listing.car_id)?;
                let imgs = images_by_listing.remove(&listing.id).unwrap_or_default();
                Some(ListingResponse::build(listing, car, imgs))
            })
            .collect())
    }

    pub async fn set_listing_state(
        &self,
        listing_id: i32,
        state: ListingState,
        requester_id: i32,
    ) -> AppResult<ListingResponse> {
        require_admin(&self.pool, requester_id).await?;
        let listing = self.find_listing(listing_id).await?;
        if listing.state == state {
            return Self::listing_response(&self.pool, listing).await;
        }
        if !listing.state.can_transition_to(state) {
            return Err(AppError::ValidationError(format!(
                "Cannot move listing from {} to {state}",
                listing.state
            )));
        }

        let previous = listing.state;
        let mut am = listing.into_active_model();
        am.state = Set(state);
        am.updated_at = Set(Utc::now());
        let listing = am.update(&self.pool).await?;
        log::info!("Admin {requester_id} moved listing {listing_id} from {previous} to {state}");
        Self::listing_response(&self.pool, listing).await
    }

    /// Moderator override of the featured flag; does not consume the owner's quota check.
    pub async fn set_featured(
        &self,
        listing_id: i32,
        is_featured: bool,
        requester_id: i32,
    ) -> AppResult<ListingResponse> {
        require_admin(&self.pool, requester_id).await?;
        let listing = self.find_listing(listing_id).await?;
        let mut am = listing.into_active_model();
        am.is_featured = Set(is_featured);
        am.updated_at = Set(Utc::now());
        let listing = am.update(&self.pool).await?;
        Self::listing_response(&self.pool, listing).await
    }

    /// Moderator removal; same cascade as an owner delete.
    pub async fn admin_delete_listing(&self, listing_id: i32, admin_id: i32) -> AppResult<()> {
        require_admin(&self.pool, admin_id).await?;
        self.delete_listing(listing_id, admin_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{SubscriptionTier, UserRole};
    use crate::test_support::{TestContext, rental, sale, upload};

    fn service(ctx: &TestContext) -> ListingService {
        ListingService::new(ctx.db.clone(), ctx.shared_storage())
    }

    async fn row_counts(ctx: &TestContext) -> (u64, u64, u64) {
        (
            cars::Entity::find().count(&ctx.db).await.unwrap(),
            listings::Entity::find().count(&ctx.db).await.unwrap(),
            images::Entity::find().count(&ctx.db).await.unwrap(),
        )
    }

    fn image(id: i32, is_primary: bool) -> images::Model {
        images::Model {
            id,
            listing_id: 1,
            path: format!("listings/1/{id}.jpg"),
            alt_text: None,
            is_primary,
        }
    }

    #[test]
    fn test_primary_fixups() {
        assert_eq!(primary_fixups(&[]), (vec![], None));
        assert_eq!(
            primary_fixups(&[image(3, false), image(5, false)]),
            (vec![], Some(3))
        );
        assert_eq!(
            primary_fixups(&[image(3, true), image(5, true), image(7, false)]),
            (vec![3], None)
        );
        assert_eq!(primary_fixups(&[image(4, true)]), (vec![], None));
    }

    #[test]
    fn test_validate_pricing() {
        assert!(validate_pricing(ListingType::ForSelling, 0, 100, 0).is_ok());
        assert!(validate_pricing(ListingType::ForSelling, 100, 0, 0).is_err());
        assert!(validate_pricing(ListingType::ForRenting, 0, 100, 0).is_err());
        assert!(validate_pricing(ListingType::ForRenting, 50, 0, 100).is_ok());
        assert!(validate_pricing(ListingType::ForRenting, 50, 0, 101).is_err());
        assert!(validate_pricing(ListingType::ForSelling, 0, 100, -1).is_err());
    }

    #[tokio::test]
    async fn test_create_listing_with_images() {
        let ctx = TestContext::new().await;
        let seller = ctx.provider("seller", SubscriptionTier::Pro).await;
        let svc = service(&ctx);

        let created = svc
            .create_listing(
                seller.id,
                sale("Toyota", "Corolla", 2019, 1_500_000),
                vec![upload("front.jpg"), upload("back.png")],
            )
            .await
            .unwrap();

        assert_eq!(created.state, ListingState::Available);
        assert_eq!(created.views, 0);
        assert_eq!(created.images.len(), 2);
        assert_eq!(created.images.iter().filter(|i| i.is_primary).count(), 1);
        assert!(created.images[0].is_primary);
        assert!(created.images[0].path.ends_with(".jpg"));
        assert_eq!(ctx.files_on_disk(), 2);
    }

    #[tokio::test]
    async fn test_rejected_upload_is_skipped() {
        let ctx = TestContext::new().await;
        let seller = ctx.provider("seller", SubscriptionTier::Pro).await;
        let created = service(&ctx)
            .create_listing(
                seller.id,
                sale("Opel", "Astra", 2016, 700_000),
                vec![upload("virus.exe"), upload("side.webp")],
            )
            .await
            .unwrap();
        assert_eq!(created.images.len(), 1);
        assert!(created.images[0].is_primary);
    }

    #[tokio::test]
    async fn test_quota_denial_leaves_nothing_behind() {
        let ctx = TestContext::new().await;
        let seller = ctx.create_user("nosub", UserRole::Provider).await;
        let svc = service(&ctx);

        let result = svc
            .create_listing(
                seller.id,
                sale("Fiat", "Panda", 2015, 500_000),
                vec![upload("a.jpg"), upload("b.jpg")],
            )
            .await;
        assert!(matches!(
            result,
            Err(AppError::QuotaExceeded(QuotaDenial::NoActiveSubscription))
        ));
        assert_eq!(row_counts(&ctx).await, (0, 0, 0));
        assert_eq!(ctx.files_on_disk(), 0);
    }

    #[tokio::test]
    async fn test_plan_limits_enforced() {
        let ctx = TestContext::new().await;
        let seller = ctx.provider("free", SubscriptionTier::Free).await;
        let svc = service(&ctx);

        let mut featured = sale("Seat", "Ibiza", 2018, 800_000);
        featured.is_featured = true;
        assert!(matches!(
            svc.create_listing(seller.id, featured, vec![]).await,
            Err(AppError::QuotaExceeded(QuotaDenial::FeatureSlotExceeded { limit: 0 }))
        ));

        svc.create_listing(seller.id, sale("Seat", "Ibiza", 2018, 800_000), vec![])
            .await
            .unwrap();
        assert!(matches!(
            svc.create_listing(seller.id, sale("Seat", "Leon", 2019, 900_000), vec![])
                .await,
            Err(AppError::QuotaExceeded(QuotaDenial::ListingLimitExceeded { limit: 1 }))
        ));
    }

    #[tokio::test]
    async fn test_sold_listing_frees_quota_slot() {
        let ctx = TestContext::new().await;
        let seller = ctx.provider("turnover", SubscriptionTier::Free).await;
        let admin = ctx.create_user("admin", UserRole::Admin).await;
        let svc = service(&ctx);

        let first = svc
            .create_listing(seller.id, sale("Skoda", "Fabia", 2017, 600_000), vec![])
            .await
            .unwrap();
        svc.set_listing_state(first.id, ListingState::Sold, admin.id)
            .await
            .unwrap();

        let second = svc
            .create_listing(seller.id, sale("Skoda", "Octavia", 2019, 1_100_000), vec![])
            .await
            .unwrap();
        assert_eq!(second.state, ListingState::Available);
        assert!(matches!(
            svc.create_listing(seller.id, sale("Skoda", "Superb", 2020, 1_500_000), vec![])
                .await,
            Err(AppError::QuotaExceeded(QuotaDenial::ListingLimitExceeded { limit: 1 }))
        ));
        assert_eq!(row_counts(&ctx).await.1, 2);
    }

    #[tokio::test]
    async fn test_concurrent_creates_respect_limit() {
        let ctx = TestContext::new().await;
        let seller = ctx.provider("racer", SubscriptionTier::Free).await;
        let svc = service(&ctx);

        let (a, b) = tokio::join!(
            svc.create_listing(seller.id, sale("Mini", "Cooper", 2020, 1_000_000), vec![]),
            svc.create_listing(seller.id, sale("Mini", "One", 2020, 900_000), vec![]),
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        assert_eq!(row_counts(&ctx).await.1, 1);
    }

    #[tokio::test]
    async fn test_create_validation_and_permissions() {
        let ctx = TestContext::new().await;
        let seller = ctx.provider("seller", SubscriptionTier::Elite).await;
        let svc = service(&ctx);

        assert!(matches!(
            svc.create_listing(seller.id, rental("Kia", "Ceed", 2020, 0), vec![]).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            svc.create_listing(seller.id, sale("Benz", "Motorwagen", 1800, 100), vec![])
                .await,
            Err(AppError::ValidationError(_))
        ));
        let too_many = (0..8).map(|i| upload(&format!("{i}.jpg"))).collect();
        assert!(matches!(
            svc.create_listing(seller.id, sale("Kia", "Ceed", 2020, 100), too_many)
                .await,
            Err(AppError::ValidationError(_))
        ));

        let customer = ctx.create_user("customer", UserRole::Customer).await;
        ctx.subscribe(customer.id, SubscriptionTier::Elite).await;
        assert!(matches!(
            svc.create_listing(customer.id, sale("Kia", "Ceed", 2020, 100), vec![])
                .await,
            Err(AppError::Forbidden)
        ));
        assert_eq!(row_counts(&ctx).await, (0, 0, 0));
    }

    #[tokio::test]
    async fn test_update_reconciles_images_and_price() {
        let ctx = TestContext::new().await;
        let seller = ctx.provider("seller", SubscriptionTier::Pro).await;
        let svc = service(&ctx);
        let created = svc
            .create_listing(
                seller.id,
                sale("Skoda", "Octavia", 2017, 1_200_000),
                vec![upload("1.jpg"), upload("2.jpg"), upload("3.jpg")],
            )
            .await
            .unwrap();
        let primary = created.images.iter().find(|i| i.is_primary).unwrap().id;
        let others: Vec<i32> = created
            .images
            .iter()
            .filter(|i| !i.is_primary)
            .map(|i| i.id)
            .collect();

        // dropping the primary promotes the lowest remaining id
        let updated = svc
            .update_listing(
                created.id,
                seller.id,
                ListingChanges {
                    new_price: Some(1_000_000),
                    keep_image_ids: Some(others.clone()),
                    ..Default::default()
                },
                vec![],
            )
            .await
            .unwrap();
        assert_eq!(updated.new_price, 1_000_000);
        assert_eq!(updated.old_price, Some(1_200_000));
        assert_eq!(updated.images.len(), 2);
        assert!(updated.images.iter().all(|i| i.id != primary));
        assert!(updated.images[0].is_primary);
        assert_eq!(updated.images[0].id, *others.iter().min().unwrap());
        assert_eq!(ctx.files_on_disk(), 2);

        // new uploads do not steal an existing primary
        let appended = svc
            .update_listing(created.id, seller.id, ListingChanges::default(), vec![upload("4.jpg")])
            .await
            .unwrap();
        assert_eq!(appended.images.len(), 3);
        assert_eq!(appended.images[0].id, *others.iter().min().unwrap());
        assert_eq!(appended.images.iter().filter(|i| i.is_primary).count(), 1);
        assert_eq!(appended.old_price, Some(1_200_000));

        // removing everything and uploading fresh makes the new image primary
        let replaced = svc
            .update_listing(
                created.id,
                seller.id,
                ListingChanges {
                    keep_image_ids: Some(vec![]),
                    ..Default::default()
                },
                vec![upload("5.jpg")],
            )
            .await
            .unwrap();
        assert_eq!(replaced.images.len(), 1);
        assert!(replaced.images[0].is_primary);
        assert_eq!(ctx.files_on_disk(), 1);

        let too_many = (0..7).map(|i| upload(&format!("{i}.png"))).collect();
        assert!(matches!(
            svc.update_listing(created.id, seller.id, ListingChanges::default(), too_many)
                .await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_update_permissions_and_feature_quota() {
        let ctx = TestContext::new().await;
        let seller = ctx.provider("seller", SubscriptionTier::Starter).await;
        let other = ctx.provider("other", SubscriptionTier::Starter).await;
        let svc = service(&ctx);
        let first = svc
            .create_listing(seller.id, sale("VW", "Golf", 2018, 1_000_000), vec![])
            .await
            .unwrap();
        let second = svc
            .create_listing(seller.id, sale("VW", "Polo", 2018, 800_000), vec![])
            .await
            .unwrap();

        assert!(matches!(
            svc.update_listing(first.id, other.id, ListingChanges::default(), vec![])
                .await,
            Err(AppError::Forbidden)
        ));

        let feature = || ListingChanges {
            is_featured: Some(true),
            ..Default::default()
        };
        let featured = svc
            .update_listing(first.id, seller.id, feature(), vec![])
            .await
            .unwrap();
        assert!(featured.is_featured);
        assert!(matches!(
            svc.update_listing(second.id, seller.id, feature(), vec![]).await,
            Err(AppError::QuotaExceeded(QuotaDenial::FeatureSlotExceeded { limit: 1 }))
        ));

        // switching to rental without a rent price is rejected
        let to_rent = ListingChanges {
            listing_type: Some(ListingType::ForRenting),
            ..Default::default()
        };
        assert!(matches!(
            svc.update_listing(second.id, seller.id, to_rent, vec![]).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_listing_cascades() {
        let ctx = TestContext::new().await;
        let seller = ctx.provider("seller", SubscriptionTier::Pro).await;
        let buyer = ctx.create_user("buyer", UserRole::Customer).await;
        let admin = ctx.create_user("admin", UserRole::Admin).await;
        let svc = service(&ctx);
        let created = svc
            .create_listing(
                seller.id,
                sale("Peugeot", "208", 2021, 1_100_000),
                vec![upload("a.jpg")],
            )
            .await
            .unwrap();
        let now = Utc::now();
        favorites::ActiveModel {
            user_id: Set(buyer.id),
            listing_id: Set(created.id),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&ctx.db)
        .await
        .unwrap();
        reviews::ActiveModel {
            user_id: Set(buyer.id),
            listing_id: Set(created.id),
            rating: Set(4),
            comment: Set("Nice".into()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&ctx.db)
        .await
        .unwrap();

        assert!(matches!(
            svc.delete_listing(created.id, buyer.id).await,
            Err(AppError::Forbidden)
        ));
        assert_eq!(row_counts(&ctx).await, (1, 1, 1));
        assert_eq!(reviews::Entity::find().count(&ctx.db).await.unwrap(), 1);
        assert_eq!(favorites::Entity::find().count(&ctx.db).await.unwrap(), 1);
        assert_eq!(ctx.files_on_disk(), 1);

        svc.delete_listing(created.id, admin.id).await.unwrap();

        assert_eq!(row_counts(&ctx).await, (0, 0, 0));
        assert_eq!(reviews::Entity::find().count(&ctx.db).await.unwrap(), 0);
        assert_eq!(favorites::Entity::find().count(&ctx.db).await.unwrap(), 0);
        assert_eq!(ctx.files_on_disk(), 0);
        assert!(matches!(
            svc.delete_listing(created.id, admin.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_views_details_and_primary() {
        let ctx = TestContext::new().await;
        let seller = ctx.provider("seller", SubscriptionTier::Pro).await;
        let svc = service(&ctx);
        let created = svc
            .create_listing(
                seller.id,
                sale("Renault", "Clio", 2019, 900_000),
                vec![upload("a.jpg"), upload("b.jpg")],
            )
            .await
            .unwrap();

        svc.increment_views(created.id).await;
        svc.increment_views(created.id).await;
        svc.increment_views(9999).await;

        let details = svc.get_listing_details(created.id, Some(seller.id)).await.unwrap();
        assert_eq!(details.listing.views, 2);
        assert_eq!(details.owner.username, "seller");
        assert_eq!(details.review_count, 0);
        assert_eq!(details.is_favorite, Some(false));
        assert!(svc.get_listing_details(created.id, None).await.unwrap().is_favorite.is_none());

        let second = created.images.iter().find(|i| !i.is_primary).unwrap().id;
        let switched = svc
            .set_primary_image(created.id, second, seller.id)
            .await
            .unwrap();
        assert_eq!(switched.images[0].id, second);
        assert_eq!(switched.images.iter().filter(|i| i.is_primary).count(), 1);
        assert!(matches!(
            svc.set_primary_image(created.id, 9999, seller.id).await,
            Err(AppError::NotFound(_))
        ));

        let own = svc.list_own_listings(seller.id).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].images.len(), 2);
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let ctx = TestContext::new().await;
        let seller = ctx.provider("seller", SubscriptionTier::Pro).await;
        let admin = ctx.create_user("admin", UserRole::Admin).await;
        let svc = service(&ctx);
        let created = svc
            .create_listing(seller.id, sale("Dacia", "Duster", 2022, 1_300_000), vec![])
            .await
            .unwrap();

        assert!(matches!(
            svc.set_listing_state(created.id, ListingState::Sold, seller.id).await,
            Err(AppError::Forbidden)
        ));
        let same = svc
            .set_listing_state(created.id, ListingState::Available, admin.id)
            .await
            .unwrap();
        assert_eq!(same.state, ListingState::Available);

        let hidden = svc
            .set_listing_state(created.id, ListingState::Unavailable, admin.id)
            .await
            .unwrap();
        assert_eq!(hidden.state, ListingState::Unavailable);
        svc.set_listing_state(created.id, ListingState::Available, admin.id)
            .await
            .unwrap();
        svc.set_listing_state(created.id, ListingState::Sold, admin.id)
            .await
            .unwrap();
        assert!(matches!(
            svc.set_listing_state(created.id, ListingState::Available, admin.id).await,
            Err(AppError::ValidationError(_))
        ));

        let featured = svc.set_featured(created.id, true, admin.id).await.unwrap();
        assert!(featured.is_featured);

        assert!(matches!(
            svc.admin_delete_listing(created.id, seller.id).await,
            Err(AppError::Forbidden)
        ));
        svc.admin_delete_listing(created.id, admin.id).await.unwrap();
        assert_eq!(row_counts(&ctx).await, (0, 0, 0));
    }
}
