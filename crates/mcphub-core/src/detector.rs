use crate::clients::ClientRegistry;
use crate::models::ClientId;
use std::fs;
use tracing::debug;

/// Scans for registered clients whose config path resolves to an existing,
/// readable file. Side-effect-free; an empty result is not an error.
pub fn detect_available(registry: &ClientRegistry) -> Vec<ClientId> {
    let mut available = Vec::new();
    for client in ClientId::ALL {
        let Some(path) = registry.locate_config_path(client) else {
            continue;
        };
        if fs::File::open(&path).is_ok() {
            debug!(client = client.as_str(), path = %path.display(), "detected client config");
            available.push(client);
        }
    }
    available
}
