pub mod datasets;
pub mod urls;
