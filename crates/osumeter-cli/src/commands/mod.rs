pub mod offsets;
pub mod status;
pub mod tracking;

use osumeter::{HttpOffsets, OffsetRegistry, RemoteOffsets, TrackerConfig};

/// Registry from the configured candidates, falling back to the remote URL.
pub fn load_registry(config: &TrackerConfig) -> OffsetRegistry {
    let remote = config.remote_offsets_url.as_deref().map(HttpOffsets::new);
    OffsetRegistry::load(
        &config.offset_paths,
        remote.as_ref().map(|r| r as &dyn RemoteOffsets),
    )
}
