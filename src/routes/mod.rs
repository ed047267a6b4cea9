pub mod admin;
pub mod auth;
pub mod blogs;
pub mod categories;
pub mod comments;
pub mod tags;
pub mod users;

pub use admin::admin_routes;
pub use auth::auth_routes;
pub use blogs::blogs_routes;
pub use categories::categories_routes;
pub use comments::{blog_comments_routes, comments_routes};
pub use tags::tags_routes;
pub use users::users_routes;
