//! ARD Mediathek portal: listing pages, player JSON endpoints and HLS playlists

pub mod api;
pub mod cdn;
pub mod listing;
pub mod structs;
pub mod utils;

pub use listing::Teaser;
pub use utils::DEFAULT_BASE_URL;
