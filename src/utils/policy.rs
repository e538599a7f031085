//! Authorization rules shared by every service.

use crate::entities::{UserRole, listing_entity as listings, user_entity as users};

pub fn is_admin(user: &users::Model) -> bool {
    user.role == UserRole::Admin && !user.is_banned
}

/// Owners and admins may mutate a listing; banned users may not mutate anything.
pub fn can_mutate_listing(user: &users::Model, listing: &listings::Model) -> bool {
    if user.is_banned {
        return false;
    }
    listing.owner_id == user.id || user.role == UserRole::Admin
}

/// Approved providers and admins may publish listings.
pub fn can_publish_listings(user: &users::Model) -> bool {
    if user.is_banned {
        return false;
    }
    match user.role {
        UserRole::Admin => true,
        UserRole::Provider => user.is_approved,
        UserRole::Customer => false,
    }
}
