pub mod browse;
pub mod common;
pub mod history;
pub mod listing;
pub mod pagination;
pub mod review;
pub mod subscription;
pub mod user;

pub use browse::*;
pub use common::*;
pub use history::*;
pub use listing::*;
pub use pagination::*;
pub use review::*;
pub use subscription::*;
pub use user::*;
