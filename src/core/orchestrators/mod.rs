mod background_coordinator;
mod offscreen_host;

pub use background_coordinator::{BackgroundCoordinator, CoordinatorPorts};
pub use offscreen_host::OffscreenHost;
