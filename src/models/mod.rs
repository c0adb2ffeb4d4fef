pub mod application;
pub mod feed;
pub mod message;
pub mod product;
pub mod project;
pub mod user;
