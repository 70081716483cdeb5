pub mod config;
pub mod instruments;
pub mod lyrics;
pub mod scale;
pub mod score;
pub mod style;
