pub mod jwt;
pub mod password;
pub mod policy;
pub mod validation;

pub use jwt::*;
pub use password::*;
pub use policy::*;
pub use validation::*;
