//! # Photon Engine
//!
//! A hybrid path-tracing/rasterization render core built on Vulkan.
//!
//! The crate owns the full GPU resource lifecycle: device and swapchain
//! bootstrap, every long-lived buffer/image/descriptor set, a declarative
//! render-stage/pipeline layer, four cooperating render passes (shadow map,
//! rasterization, path tracing, output composite), and a per-frame-in-flight
//! scheduler that decides which passes must re-record each frame.
//!
//! Scene data (triangle soup, BVH nodes, materials), compiled SPIR-V, window
//! handles, and the developer-console overlay are supplied by collaborators;
//! this crate never opens a window or compiles a shader itself.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use photon_engine::prelude::*;
//!
//! # fn window_handles() -> (raw_window_handle::RawDisplayHandle, raw_window_handle::RawWindowHandle) { unimplemented!() }
//! # fn compiled_shaders() -> ShaderSet { unimplemented!() }
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     env_logger::init();
//!
//!     let config = RendererConfig::new("Photon Viewer")
//!         .with_framebuffer_resolution(1280, 720);
//!     let (display, window) = window_handles();
//!     let mut renderer = PhotonRenderer::new(&config, display, window, compiled_shaders())?;
//!
//!     let mut console = NullConsole;
//!     loop {
//!         renderer.draw_frame(&mut console)?;
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod render;

pub use config::{Config, ConfigError, RendererConfig};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, RendererConfig},
        render::{
            vulkan::{PhotonRenderer, VulkanError, VulkanResult},
            ConsoleOverlay, FrameProfiler, LogProfiler, NullConsole,
        },
    };
    pub use crate::render::vulkan::scene::{
        BvhNode, FrameUniforms, MaterialRecord, SceneDescription, SceneGeometry, ShaderSet,
    };
}
