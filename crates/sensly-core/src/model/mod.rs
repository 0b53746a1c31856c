// ── Domain model ──
//
// Canonical types handed to consumers. Wire shapes from `sensly_api` are
// converted into these in `crate::convert`.

pub mod monitor;
pub mod session;
pub mod telemetry;

pub use monitor::{Device, Monitor};
pub use session::Session;
pub use telemetry::{ActiveDevice, RealtimeSample, TrendSample};
