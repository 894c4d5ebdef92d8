// ============================================================
// Layer 5 — Backend and Device Selection
// ============================================================
// The backend is fixed at compile time:
//
//   default            Autodiff<NdArray>   (CPU)
//   --features wgpu    Autodiff<Wgpu>      (best available GPU,
//                                           falls back to CPU)
//
// The device is chosen once at startup and every tensor and
// model weight is created on it for the whole run.

use burn::tensor::backend::{AutodiffBackend, Backend};

#[cfg(feature = "wgpu")]
pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;
#[cfg(not(feature = "wgpu"))]
pub type TrainBackend = burn::backend::Autodiff<burn::backend::NdArray>;

/// Backend used for forward-only work (evaluation, `locate`).
pub type InferBackend = <TrainBackend as AutodiffBackend>::InnerBackend;

pub type TrainDevice = <TrainBackend as Backend>::Device;

/// Pick the compute device for this run.
pub fn select_device() -> TrainDevice {
    // WgpuDevice::default() is BestAvailable: discrete, then
    // integrated GPU, then the CPU adapter
    let device = TrainDevice::default();
    tracing::info!("Using {} device: {:?}", backend_name(), device);
    device
}

pub fn backend_name() -> &'static str {
    if cfg!(feature = "wgpu") { "wgpu" } else { "ndarray" }
}
