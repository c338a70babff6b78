//! Per-station footfall baselines.
//!
//! Historical footfall extracts are listed from the public crowding bucket,
//! synced into a local folder, reduced to each station's maximum daily
//! footfall and joined onto the station info by normalized name.

pub mod builder;
pub mod footfall;
pub mod io;
pub mod listing;

pub use builder::build_baselines;
pub use footfall::{FootfallRecord, load_footfall_dir};
pub use io::{read_baselines, read_stations, write_baselines};
pub use listing::{FootfallSource, sync_footfall_files};
