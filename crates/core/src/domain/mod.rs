pub mod conversation;
pub mod message;
pub mod product;
