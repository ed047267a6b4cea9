pub mod blogs;
pub mod comments;
pub mod relationships;
