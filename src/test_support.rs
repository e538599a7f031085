//! In-memory fixtures for service tests.

use crate::entities::{
    FuelType, ListingType, SubscriptionStatus, SubscriptionTier, Transmission, UserRole,
    car_entity as cars, favorite_entity as favorites, image_entity as images,
    listing_entity as listings, payment_order_entity as payment_orders, review_entity as reviews,
    subscription_plan_entity as plans, user_entity as users, user_subscription_entity as subs,
    view_history_entity as history,
};
use crate::external::{LocalFileStorage, SharedFileStorage, UploadedFile};
use crate::models::{CarInput, NewListing};
use chrono::{Duration, Utc};
use sea_orm::sea_query::Index;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    QueryFilter, Schema, Set,
};
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestContext {
    pub db: DatabaseConnection,
    pub storage: Arc<LocalFileStorage>,
    _upload_dir: TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let backend = db.get_database_backend();
        let schema = Schema::new(backend);
        let tables = [
            schema.create_table_from_entity(users::Entity),
            schema.create_table_from_entity(plans::Entity),
            schema.create_table_from_entity(subs::Entity),
            schema.create_table_from_entity(payment_orders::Entity),
            schema.create_table_from_entity(cars::Entity),
            schema.create_table_from_entity(listings::Entity),
            schema.create_table_from_entity(images::Entity),
            schema.create_table_from_entity(reviews::Entity),
            schema.create_table_from_entity(favorites::Entity),
            schema.create_table_from_entity(history::Entity),
        ];
        for table in tables {
            db.execute(backend.build(&table)).await.unwrap();
        }
        let unique_pairs = [
            Index::create()
                .name("uq_reviews_user_listing")
                .table(reviews::Entity)
                .col(reviews::Column::UserId)
                .col(reviews::Column::ListingId)
                .unique()
                .to_owned(),
            Index::create()
                .name("uq_favorites_user_listing")
                .table(favorites::Entity)
                .col(favorites::Column::UserId)
                .col(favorites::Column::ListingId)
                .unique()
                .to_owned(),
        ];
        for index in unique_pairs {
            db.execute(backend.build(&index)).await.unwrap();
        }

        for (tier, name, max_listings, max_featured, price) in [
            (SubscriptionTier::Free, "Free", 1, 0, 0),
            (SubscriptionTier::Starter, "Starter", 5, 1, 999),
            (SubscriptionTier::Pro, "Pro", 20, 5, 2999),
            (SubscriptionTier::Elite, "Elite", 100, 20, 7999),
        ] {
            plans::ActiveModel {
                tier: Set(tier),
                name: Set(name.to_string()),
                max_listings: Set(max_listings),
                max_featured: Set(max_featured),
                monthly_price: Set(price),
                ..Default::default()
            }
            .insert(&db)
            .await
            .unwrap();
        }

        let upload_dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalFileStorage::new(upload_dir.path(), 1024 * 1024));
        Self {
            db,
            storage,
            _upload_dir: upload_dir,
        }
    }

    pub fn shared_storage(&self) -> SharedFileStorage {
        self.storage.clone()
    }

    pub async fn create_user(&self, name: &str, role: UserRole) -> users::Model {
        let now = Utc::now();
        users::ActiveModel {
            email: Set(format!("{name}@example.com")),
            username: Set(name.to_string()),
            password_hash: Set(String::new()),
            role: Set(role),
            is_approved: Set(true),
            is_banned: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .unwrap()
    }

    pub async fn plan(&self, tier: SubscriptionTier) -> plans::Model {
        plans::Entity::find()
            .filter(plans::Column::Tier.eq(tier))
            .one(&self.db)
            .await
            .unwrap()
            .unwrap()
    }

    /// Active 30-day subscription starting now.
    pub async fn subscribe(&self, user_id: i32, tier: SubscriptionTier) -> subs::Model {
        let plan = self.plan(tier).await;
        let now = Utc::now();
        subs::ActiveModel {
            user_id: Set(user_id),
            plan_id: Set(plan.id),
            start_date: Set(now - Duration::minutes(1)),
            end_date: Set(now + Duration::days(30)),
            status: Set(SubscriptionStatus::Active),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .unwrap()
    }

    /// Approved provider holding an active subscription of `tier`.
    pub async fn provider(&self, name: &str, tier: SubscriptionTier) -> users::Model {
        let user = self.create_user(name, UserRole::Provider).await;
        self.subscribe(user.id, tier).await;
        user
    }

    pub async fn set_banned(&self, user: &users::Model, banned: bool) {
        let mut am: users::ActiveModel = user.clone().into();
        am.is_banned = Set(banned);
        am.update(&self.db).await.unwrap();
    }

    pub fn files_on_disk(&self) -> usize {
        fn count(dir: &std::path::Path) -> usize {
            std::fs::read_dir(dir)
                .map(|entries| {
                    entries
                        .flatten()
                        .map(|e| {
                            let path = e.path();
                            if path.is_dir() { count(&path) } else { 1 }
                        })
                        .sum()
                })
                .unwrap_or(0)
        }
        count(self.storage.root())
    }
}

pub fn upload(name: &str) -> UploadedFile {
    UploadedFile {
        file_name: name.to_string(),
        bytes: vec![0xFF, 0xD8, 0xFF, 0xE0],
        alt_text: None,
    }
}

pub fn car_input(manufacturer: &str, model: &str, year: i32) -> CarInput {
    CarInput {
        manufacturer: manufacturer.to_string(),
        model: model.to_string(),
        year,
        body_style: "Sedan".to_string(),
        fuel_type: FuelType::Petrol,
        transmission: Transmission::Automatic,
        horsepower: 150,
        doors: 4,
    }
}

pub fn sale(manufacturer: &str, model: &str, year: i32, price: i64) -> NewListing {
    NewListing {
        car: car_input(manufacturer, model, year),
        listing_type: ListingType::ForSelling,
        rent_price: 0,
        new_price: price,
        description: format!("{manufacturer} {model} in good condition"),
        color: "black".to_string(),
        discount: 0,
        is_featured: false,
    }
}

pub fn rental(manufacturer: &str, model: &str, year: i32, price: i64) -> NewListing {
    NewListing {
        listing_type: ListingType::ForRenting,
        rent_price: price,
        new_price: 0,
        ..sale(manufacturer, model, year, 0)
    }
}
