pub mod extractor;
pub mod jwt;
pub mod password;

pub use extractor::{AdminUser, CurrentUser};
pub use jwt::{Claims, JwtError, JwtService};
pub use password::{hash_password, verify_password};
