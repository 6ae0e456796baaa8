mod beatmap_file;
mod hits;
mod mods;
mod ruleset;
mod snapshot;
mod state;

pub use beatmap_file::*;
pub use hits::*;
pub use mods::*;
pub use ruleset::*;
pub use snapshot::*;
pub use state::*;
