//! Physics and telemetry models
//!
//! Deterministic per-tick calculations for the coupled facility system.
//! Power and thermal form the feedback loop (utilisation → heat → inlet →
//! throttle → next-tick utilisation); GPU, network, storage, cooling and
//! carbon are derived telemetry layers downstream of it.

pub mod carbon;
pub mod cooling;
pub mod gpu;
pub mod network;
pub mod power;
pub mod storage;
pub mod thermal;

pub use carbon::CarbonModel;
pub use cooling::CoolingModel;
pub use gpu::GpuModel;
pub use network::NetworkModel;
pub use power::{gpu_power_curve, server_power_w, PowerModel};
pub use storage::StorageModel;
pub use thermal::{ambient_at, ThermalModel};
