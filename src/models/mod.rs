pub mod blog;
pub mod category;
pub mod comment;
pub mod relationship;
pub mod tag;
pub mod user;

pub use blog::*;
pub use category::*;
pub use comment::*;
pub use relationship::*;
pub use tag::*;
pub use user::*;
