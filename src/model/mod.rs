pub mod context;
pub mod credential;
pub mod identity;
pub mod key;
