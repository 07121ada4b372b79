pub mod core;
pub mod dto;
pub mod model;
pub mod policy;
pub mod service;
