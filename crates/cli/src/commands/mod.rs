pub mod config;
pub mod doctor;
pub mod repo;
pub mod sync;
