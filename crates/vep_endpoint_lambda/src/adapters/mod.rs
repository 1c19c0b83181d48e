pub mod inference;
pub mod object_store;
