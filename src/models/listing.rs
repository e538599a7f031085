use crate::entities::{
    FuelType, ListingState, ListingType, Transmission, car_entity as cars, image_entity as images,
    listing_entity as listings,
};
use crate::error::{AppError, AppResult};
use crate::external::UploadedFile;
use crate::models::ReviewResponse;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Maximum number of images a listing may hold.
pub const MAX_LISTING_IMAGES: usize = 7;

/// An image as it travels over the JSON API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImageUpload {
    #[schema(example = "front.jpg")]
    pub file_name: String,
    pub content_base64: String,
    pub alt_text: Option<String>,
}

impl ImageUpload {
    pub fn decode(self) -> AppResult<UploadedFile> {
        let bytes = STANDARD
            .decode(self.content_base64.trim())
            .map_err(|_| AppError::ValidationError(format!("Invalid image data: {}", self.file_name)))?;
        Ok(UploadedFile {
            file_name: self.file_name,
            bytes,
            alt_text: self.alt_text,
        })
    }
}

pub fn decode_uploads(uploads: Vec<ImageUpload>) -> AppResult<Vec<UploadedFile>> {
    uploads.into_iter().map(ImageUpload::decode).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CarInput {
    #[schema(example = "Toyota")]
    pub manufacturer: String,
    #[schema(example = "Corolla")]
    pub model: String,
    #[schema(example = 2019)]
    pub year: i32,
    #[schema(example = "Sedan")]
    pub body_style: String,
    pub fuel_type: FuelType,
    pub transmission: Transmission,
    pub horsepower: i32,
    pub doors: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateListingRequest {
    pub car: CarInput,
    pub listing_type: ListingType,
    /// cents
    #[serde(default)]
    pub rent_price: i64,
    /// cents
    #[serde(default)]
    pub new_price: i64,
    pub description: String,
    pub color: String,
    #[serde(default)]
    pub discount: i32,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub images: Vec<ImageUpload>,
}

/// Listing fields as the lifecycle engine receives them (images already decoded).
#[derive(Debug, Clone)]
pub struct NewListing {
    pub car: CarInput,
    pub listing_type: ListingType,
    pub rent_price: i64,
    pub new_price: i64,
    pub description: String,
    pub color: String,
    pub discount: i32,
    pub is_featured: bool,
}

impl CreateListingRequest {
    pub fn into_parts(self) -> AppResult<(NewListing, Vec<UploadedFile>)> {
        let files = decode_uploads(self.images)?;
        Ok((
            NewListing {
                car: self.car,
                listing_type: self.listing_type,
                rent_price: self.rent_price,
                new_price: self.new_price,
                description: self.description,
                color: self.color,
                discount: self.discount,
                is_featured: self.is_featured,
            },
            files,
        ))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateListingRequest {
    pub car: Option<CarInput>,
    pub listing_type: Option<ListingType>,
    pub rent_price: Option<i64>,
    pub new_price: Option<i64>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub discount: Option<i32>,
    pub is_featured: Option<bool>,
    /// Images to keep; `None` keeps every existing image.
    pub keep_image_ids: Option<Vec<i32>>,
    #[serde(default)]
    pub new_images: Vec<ImageUpload>,
}

#[derive(Debug, Clone, Default)]
pub struct ListingChanges {
    pub car: Option<CarInput>,
    pub listing_type: Option<ListingType>,
    pub rent_price: Option<i64>,
    pub new_price: Option<i64>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub discount: Option<i32>,
    pub is_featured: Option<bool>,
    pub keep_image_ids: Option<Vec<i32>>,
}

impl UpdateListingRequest {
    pub fn into_parts(self) -> AppResult<(ListingChanges, Vec<UploadedFile>)> {
        let files = decode_uploads(self.new_images)?;
        Ok((
            ListingChanges {
                car: self.car,
                listing_type: self.listing_type,
                rent_price: self.rent_price,
                new_price: self.new_price,
                description: self.description,
                color: self.color,
                discount: self.discount,
                is_featured: self.is_featured,
                keep_image_ids: self.keep_image_ids,
            },
            files,
        ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SetPrimaryImageRequest {
    pub image_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SetListingStateRequest {
    pub state: ListingState,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SetFeaturedRequest {
    pub is_featured: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CarResponse {
    pub id: i32,
    pub manufacturer: String,
    pub model: String,
    pub year: i32,
    pub body_style: String,
    pub fuel_type: FuelType,
    pub transmission: Transmission,
    pub horsepower: i32,
    pub doors: i32,
}

impl From<cars::Model> for CarResponse {
    fn from(m: cars::Model) -> Self {
        Self {
            id: m.id,
            manufacturer: m.manufacturer,
            model: m.model,
            year: m.year,
            body_style: m.body_style,
            fuel_type: m.fuel_type,
            transmission: m.transmission,
            horsepower: m.horsepower,
            doors: m.doors,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImageResponse {
    pub id: i32,
    pub path: String,
    pub alt_text: Option<String>,
    pub is_primary: bool,
}

impl From<images::Model> for ImageResponse {
    fn from(m: images::Model) -> Self {
        Self {
            id: m.id,
            path: m.path,
            alt_text: m.alt_text,
            is_primary: m.is_primary,
        }
    }
}

/// Compact listing representation used by browse, favorites and history pages.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListingCard {
    pub id: i32,
    pub manufacturer: String,
    pub model: String,
    pub year: i32,
    pub fuel_type: FuelType,
    pub transmission: Transmission,
    pub listing_type: ListingType,
    /// new price for sales, rent price for rentals (cents)
    pub price: i64,
    pub old_price: Option<i64>,
    pub discount: i32,
    pub state: ListingState,
    pub is_featured: bool,
    pub views: i32,
    pub average_rating: f64,
    pub review_count: u32,
    pub primary_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OwnerSummary {
    pub id: i32,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListingResponse {
    pub id: i32,
    pub owner_id: i32,
    pub listing_type: ListingType,
    pub rent_price: i64,
    pub new_price: i64,
    pub old_price: Option<i64>,
    pub description: String,
    pub color: String,
    pub state: ListingState,
    pub is_featured: bool,
    pub discount: i32,
    pub views: i32,
    pub car: CarResponse,
    pub images: Vec<ImageResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ListingResponse {
    /// Images are ordered primary first, then by id.
    pub fn build(listing: listings::Model, car: cars::Model, mut imgs: Vec<images::Model>) -> Self {
        imgs.sort_by_key(|i| (!i.is_primary, i.id));
        Self {
            id: listing.id,
            owner_id: listing.owner_id,
            listing_type: listing.listing_type,
            rent_price: listing.rent_price,
            new_price: listing.new_price,
            old_price: listing.old_price,
            description: listing.description,
            color: listing.color,
            state: listing.state,
            is_featured: listing.is_featured,
            discount: listing.discount,
            views: listing.views,
            car: CarResponse::from(car),
            images: imgs.into_iter().map(ImageResponse::from).collect(),
            created_at: listing.created_at,
            updated_at: listing.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListingDetailsResponse {
    pub listing: ListingResponse,
    pub owner: OwnerSummary,
    pub reviews: Vec<ReviewResponse>,
    pub average_rating: f64,
    pub review_count: u32,
    pub favorite_count: u64,
    /// Only present for authenticated viewers.
    pub is_favorite: Option<bool>,
}
