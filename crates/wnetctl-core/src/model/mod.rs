// ── Domain model ──
//
// Everything a site document holds. `SiteModel` is the aggregate root;
// the other types are only reachable through it.

pub mod access_point;
pub mod device_type;
pub mod mac;
mod secret;
pub mod site;
pub mod ssid;

// ── Re-exports ──────────────────────────────────────────────────────

pub use access_point::{AccessPoint, RadioState, TrustState};
pub use device_type::{Band, DeviceType, RadioDescriptor};
pub use mac::MacAddress;
pub use site::{BackendKind, DEFAULT_ADMIN_USER, SiteModel};
pub use ssid::{AuthMode, Ssid, Station};
