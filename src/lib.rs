#![allow(non_snake_case)]

pub mod engine;
pub mod error;
mod karaoke;
mod lyric_timing;
mod midi_exporter;
mod midi_importer;
pub mod model;
mod restyle;
mod subtitles;
mod transforms;
mod util;

pub use engine::*;
pub use error::*;
pub use karaoke::*;
pub use lyric_timing::*;
pub use midi_exporter::*;
pub use midi_importer::*;
pub use model::config::*;
pub use model::instruments::*;
pub use model::lyrics::*;
pub use model::scale::*;
pub use model::score::*;
pub use model::style::*;
pub use restyle::*;
pub use subtitles::*;
pub use transforms::*;
pub use util::*;
