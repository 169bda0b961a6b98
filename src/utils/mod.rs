pub mod queries;
pub mod urls;
