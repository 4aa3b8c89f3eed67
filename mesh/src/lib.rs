//! The overlay VPN mesh coordinator (component C4): keypair generation,
//! overlay-IP assignment, full-mesh peer-list construction, and the
//! coordinator-mode alternative driver.

mod coordinator;
mod error;
mod keypair;
mod peer;
mod wait;

pub use coordinator::{CoordinatorConfig, program_coordinator_mesh};
pub use error::MeshError;
pub use keypair::{Keypair, generate_keypair};
pub use peer::{InterfaceConfig, MeshPlan, PeerConfig, assign_overlay_ips, build_mesh_plan};
pub use wait::wait_for_peer_reachability;

pub const DEFAULT_OVERLAY_SUBNET: &str = "10.8.0.0/24";
pub const DEFAULT_LISTEN_PORT: u16 = 51820;
pub const DEFAULT_KEEPALIVE_SECS: u16 = 25;
