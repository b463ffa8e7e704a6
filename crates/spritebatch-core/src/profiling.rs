//! Profiling utilities based on the `puffin` crate.

pub use puffin::{GlobalProfiler, profile_function, profile_scope};

#[cfg(feature = "profiling")]
use std::sync::OnceLock;

/// Profiling backend options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilingBackend {
    /// Record scopes in-process only (inspect through [`GlobalProfiler`]).
    InProcess,
    /// Send profiling data to puffin_viewer via HTTP.
    #[cfg(feature = "profiling")]
    PuffinHttp,
}

/// Default address for the puffin HTTP server.
pub const PUFFIN_HTTP_ADDR: &str = "0.0.0.0:8585";

#[cfg(feature = "profiling")]
static PROFILING_SERVER: OnceLock<puffin_http::Server> = OnceLock::new();

/// Initialize profiling with the specified backend.
///
/// # Example
/// ```no_run
/// use spritebatch_core::profiling::{init_profiling, ProfilingBackend};
///
/// init_profiling(ProfilingBackend::InProcess);
/// ```
pub fn init_profiling(backend: ProfilingBackend) {
    puffin::set_scopes_on(true);

    match backend {
        ProfilingBackend::InProcess => {
            tracing::info!("Puffin scopes enabled (in-process)");
        }
        #[cfg(feature = "profiling")]
        ProfilingBackend::PuffinHttp => match puffin_http::Server::new(PUFFIN_HTTP_ADDR) {
            Ok(server) => {
                tracing::info!("Puffin profiler server started on http://{PUFFIN_HTTP_ADDR}");
                let _ = PROFILING_SERVER.set(server);
            }
            Err(e) => {
                tracing::error!("Failed to start puffin server: {}", e);
            }
        },
    }
}

/// Mark the start of a new frame for profiling.
///
/// Call this once per frame so puffin groups scopes by frame.
#[inline]
pub fn new_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}
