//! Vulkan context management
//!
//! Bootstrap of instance, debug messenger, surface, physical/logical device,
//! command units, and swapchain. Every step here is setup-path: a failure
//! aborts initialization, since a missing foundational resource makes every
//! later frame invalid.

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::{CStr, CString};
use thiserror::Error;

use crate::config::RendererConfig;
use crate::render::vulkan::arena::ArenaAllocator;
use crate::render::vulkan::command_unit::CommandUnits;
use crate::render::vulkan::swapchain::Swapchain;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// No suitable memory type found for an allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// No depth format with depth-stencil attachment support
    #[error("No suitable depth format found")]
    NoSuitableDepthFormat,

    /// Host memory allocation failed
    #[error("Out of memory: {requested} bytes")]
    OutOfMemory {
        /// Number of bytes that were requested
        requested: usize,
    },
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    debug_utils: Option<DebugUtils>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    callbacks: vk::AllocationCallbacks,
}

impl VulkanInstance {
    /// Create a new Vulkan instance with the arena's allocation callbacks
    pub fn new(
        config: &RendererConfig,
        display: RawDisplayHandle,
        callbacks: vk::AllocationCallbacks,
    ) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e:?}")))?;

        let app_name = CString::new(config.application_name.as_str())
            .map_err(|_| VulkanError::InitializationFailed("Application name contains NUL".into()))?;
        let engine_name = CString::new("PhotonEngine").unwrap();
        let (major, minor, patch) = config.application_version;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, major, minor, patch))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let validation = config.validation_enabled();

        // Surface extensions for this platform, plus caller extras
        let required_extensions = ash_window::enumerate_required_extensions(display)
            .map_err(VulkanError::Api)?;
        let extra_extensions: Vec<CString> = config
            .instance_extensions
            .iter()
            .map(|ext| CString::new(ext.as_str()).unwrap())
            .collect();

        let mut extensions: Vec<*const std::ffi::c_char> = required_extensions.to_vec();
        extensions.extend(extra_extensions.iter().map(|ext| ext.as_ptr()));
        if validation {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let mut layers: Vec<CString> = config
            .instance_layers
            .iter()
            .map(|layer| CString::new(layer.as_str()).unwrap())
            .collect();
        if validation {
            layers.push(CString::new("VK_LAYER_KHRONOS_validation").unwrap());
        }
        let layer_ptrs: Vec<*const std::ffi::c_char> = layers.iter().map(|layer| layer.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_ptrs);

        let instance = unsafe {
            entry
                .create_instance(&create_info, Some(&callbacks))
                .map_err(VulkanError::Api)?
        };

        let (debug_utils, debug_messenger) = if validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let messenger = Self::create_debug_messenger(&debug_utils, &callbacks)?;
            (Some(debug_utils), Some(messenger))
        } else {
            (None, None)
        };

        Ok(Self {
            entry,
            instance,
            debug_utils,
            debug_messenger,
            callbacks,
        })
    }

    fn create_debug_messenger(
        debug_utils: &DebugUtils,
        callbacks: &vk::AllocationCallbacks,
    ) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        // Release builds only report errors; debug builds add warnings
        let severity = if cfg!(debug_assertions) {
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
        } else {
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
        };

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(severity)
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe {
            debug_utils
                .create_debug_utils_messenger(&create_info, Some(callbacks))
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils, self.debug_messenger) {
                debug_utils.destroy_debug_utils_messenger(messenger, Some(&self.callbacks));
            }
            self.instance.destroy_instance(Some(&self.callbacks));
        }
    }
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let callback_data = *callback_data;
    let message = CStr::from_ptr(callback_data.p_message).to_string_lossy();

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::error!("[Vulkan] {message_type:?} - {message}");
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::warn!("[Vulkan] {message_type:?} - {message}");
    } else {
        log::debug!("[Vulkan] {message_type:?} - {message}");
    }

    vk::FALSE
}

/// Physical device selection and capabilities
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported device features
    pub features: vk::PhysicalDeviceFeatures,
    /// Memory heap/type layout
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Every queue family supporting both graphics and compute
    pub graphics_compute_families: Vec<u32>,
    /// The graphics+compute family that can also present to the surface
    pub primary_family: u32,
}

impl PhysicalDeviceInfo {
    /// Select the highest-scoring physical device meeting the hard
    /// requirements: anisotropic sampling, a graphics+compute queue family
    /// with surface support, swapchain extension, and at least one surface
    /// format and present mode.
    pub fn select(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let devices = unsafe {
            instance
                .enumerate_physical_devices()
                .map_err(VulkanError::Api)?
        };

        let mut best: Option<(Self, u32)> = None;
        for device in devices {
            if let Some(info) = Self::evaluate(instance, device, surface, surface_loader)? {
                let score = score_device(&info.properties);
                if best.as_ref().map_or(true, |(_, s)| score > *s) {
                    best = Some((info, score));
                }
            }
        }

        let (info, _) = best.ok_or_else(|| {
            VulkanError::InitializationFailed("No suitable GPU found".to_string())
        })?;

        let name = unsafe { CStr::from_ptr(info.properties.device_name.as_ptr()).to_string_lossy() };
        if info.properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
            log::info!("Selected GPU: {name}");
        } else {
            log::warn!("No discrete GPU available; selected {name} ({:?})", info.properties.device_type);
        }

        Ok(info)
    }

    fn evaluate(
        instance: &Instance,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Option<Self>> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };
        let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        if features.sampler_anisotropy != vk::TRUE {
            return Ok(None);
        }

        // Every graphics+compute family gets its own command unit later
        let graphics_compute_families: Vec<u32> = queue_families
            .iter()
            .enumerate()
            .filter(|(_, family)| {
                family
                    .queue_flags
                    .contains(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
            })
            .map(|(index, _)| index as u32)
            .collect();

        let mut primary_family = None;
        for &family in &graphics_compute_families {
            let present_support = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, family, surface)
                    .map_err(VulkanError::Api)?
            };
            if present_support {
                primary_family = Some(family);
                break;
            }
        }
        let Some(primary_family) = primary_family else {
            return Ok(None);
        };

        // Swapchain extension must be available
        let extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        };
        let has_swapchain = extensions.iter().any(|available| {
            let name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
            name == SwapchainLoader::name()
        });
        if !has_swapchain {
            return Ok(None);
        }

        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(device, surface)
                .map_err(VulkanError::Api)?
        };
        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(device, surface)
                .map_err(VulkanError::Api)?
        };
        if formats.is_empty() || present_modes.is_empty() {
            return Ok(None);
        }

        Ok(Some(Self {
            device,
            properties,
            features,
            memory_properties,
            graphics_compute_families,
            primary_family,
        }))
    }
}

/// Capability score for device selection; discrete GPUs dominate, larger
/// image limits break ties.
fn score_device(properties: &vk::PhysicalDeviceProperties) -> u32 {
    let base = match properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 300,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 100,
        vk::PhysicalDeviceType::CPU => 50,
        _ => 10,
    };
    base + properties.limits.max_image_dimension2_d / 1024
}

/// First depth format whose linear- or optimal-tiling features include
/// depth-stencil attachment support.
fn pick_depth_format(mut format_properties: impl FnMut(vk::Format) -> vk::FormatProperties) -> Option<vk::Format> {
    const CANDIDATES: [vk::Format; 3] = [
        vk::Format::D32_SFLOAT,
        vk::Format::D32_SFLOAT_S8_UINT,
        vk::Format::D24_UNORM_S8_UINT,
    ];

    CANDIDATES.into_iter().find(|&format| {
        let props = format_properties(format);
        let wanted = vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
        props.optimal_tiling_features.contains(wanted) || props.linear_tiling_features.contains(wanted)
    })
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
    callbacks: vk::AllocationCallbacks,
}

impl LogicalDevice {
    /// Create a logical device with one queue per graphics+compute family
    pub fn new(
        instance: &Instance,
        physical_device: &PhysicalDeviceInfo,
        callbacks: vk::AllocationCallbacks,
    ) -> VulkanResult<Self> {
        let priorities = [1.0f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = physical_device
            .graphics_compute_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];
        let device_features = vk::PhysicalDeviceFeatures::builder().sampler_anisotropy(true);

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            instance
                .create_device(physical_device.device, &create_info, Some(&callbacks))
                .map_err(VulkanError::Api)?
        };

        let swapchain_loader = SwapchainLoader::new(instance, &device);

        Ok(Self {
            device,
            swapchain_loader,
            callbacks,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(Some(&self.callbacks));
        }
    }
}

/// Main Vulkan context owning instance, surface, device, command units,
/// swapchain, and the host allocation arena.
pub struct VulkanContext {
    // Declaration order is drop order: swapchain and command units release
    // their device objects before the device itself goes away, and the arena
    // outlives everything created with its callbacks.
    swapchain: Option<Swapchain>,
    command_units: CommandUnits,
    surface: vk::SurfaceKHR,
    surface_loader: Surface,
    depth_format: vk::Format,
    frames_in_flight: usize,
    physical_device: PhysicalDeviceInfo,
    device: LogicalDevice,
    instance: VulkanInstance,
    arena: Box<ArenaAllocator>,
}

impl VulkanContext {
    /// Bootstrap the full context. Each step is fatal on failure.
    pub fn new(
        config: &RendererConfig,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> VulkanResult<Self> {
        let arena = ArenaAllocator::new("vulkan-driver");
        let callbacks = arena.callbacks();

        let instance = VulkanInstance::new(config, display, callbacks)?;

        let surface_loader = Surface::new(&instance.entry, &instance.instance);
        let surface = unsafe {
            ash_window::create_surface(&instance.entry, &instance.instance, display, window, None)
                .map_err(VulkanError::Api)?
        };

        let physical_device = PhysicalDeviceInfo::select(&instance.instance, surface, &surface_loader)?;

        let device = LogicalDevice::new(&instance.instance, &physical_device, callbacks)?;

        let requested_extent = vk::Extent2D {
            width: config.framebuffer_width,
            height: config.framebuffer_height,
        };
        let swapchain = Swapchain::new(
            device.device.clone(),
            &device.swapchain_loader,
            surface,
            &surface_loader,
            &physical_device,
            requested_extent,
        )?;

        // The negotiated image count is the frames-in-flight count for every
        // per-frame array from here on
        let frames_in_flight = swapchain.image_count() as usize;
        log::info!("Frames in flight: {frames_in_flight}");

        let command_units = CommandUnits::new(
            device.device.clone(),
            &physical_device.graphics_compute_families,
            frames_in_flight,
        )?;

        let depth_format = pick_depth_format(|format| unsafe {
            instance
                .instance
                .get_physical_device_format_properties(physical_device.device, format)
        })
        .ok_or(VulkanError::NoSuitableDepthFormat)?;
        log::info!("Depth format: {depth_format:?}");

        Ok(Self {
            swapchain: Some(swapchain),
            command_units,
            surface,
            surface_loader,
            depth_format,
            frames_in_flight,
            physical_device,
            device,
            instance,
            arena,
        })
    }

    /// Get a reference to the Vulkan instance
    pub fn instance(&self) -> &Instance {
        &self.instance.instance
    }

    /// Get the logical device
    pub fn device(&self) -> &LogicalDevice {
        &self.device
    }

    /// Get a clone of the raw device handle
    pub fn raw_device(&self) -> Device {
        self.device.device.clone()
    }

    /// Get the physical device info
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Get the memory heap/type layout
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.physical_device.memory_properties
    }

    /// Get the swapchain
    pub fn swapchain(&self) -> &Swapchain {
        self.swapchain.as_ref().expect("swapchain always present outside recreate")
    }

    /// Get the swapchain loader
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.device.swapchain_loader
    }

    /// Get the command units
    pub fn command_units(&self) -> &CommandUnits {
        &self.command_units
    }

    /// Get the probed depth format
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    /// Frames-in-flight count, equal to the swapchain image count and fixed
    /// at swapchain creation
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Queue of the primary command unit
    pub fn graphics_queue(&self) -> vk::Queue {
        self.command_units.front().queue()
    }

    /// Nanoseconds per timestamp tick
    pub fn timestamp_period(&self) -> f32 {
        self.physical_device.properties.limits.timestamp_period
    }

    /// Device limit on simultaneously bound descriptor sets
    pub fn max_bound_descriptor_sets(&self) -> u32 {
        self.physical_device.properties.limits.max_bound_descriptor_sets
    }

    /// Host allocation arena backing driver allocations
    pub fn arena(&self) -> &ArenaAllocator {
        &self.arena
    }

    /// Block until the device is idle
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device.device_wait_idle().map_err(VulkanError::Api) }
    }

    /// Recreate the swapchain at a new extent (window resize).
    ///
    /// The image count must survive recreation unchanged; per-frame
    /// resources are sized to it once at startup.
    pub fn recreate_swapchain(&mut self, extent: vk::Extent2D) -> VulkanResult<()> {
        self.wait_idle()?;

        let old = self.swapchain.take().expect("swapchain always present outside recreate");
        let new_swapchain = Swapchain::recreate(
            self.device.device.clone(),
            &self.device.swapchain_loader,
            self.surface,
            &self.surface_loader,
            &self.physical_device,
            extent,
            &old,
        )?;
        drop(old);

        if new_swapchain.image_count() as usize != self.frames_in_flight {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "swapchain image count changed across recreation ({} -> {})",
                    self.frames_in_flight,
                    new_swapchain.image_count()
                ),
            });
        }

        self.swapchain = Some(new_swapchain);
        Ok(())
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device.device_wait_idle();
            self.swapchain.take();
            self.surface_loader.destroy_surface(self.surface, None);
        }
        // Remaining fields drop in declaration order: command units, device,
        // instance, then the arena
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties_with(device_type: vk::PhysicalDeviceType, max_dim: u32) -> vk::PhysicalDeviceProperties {
        let mut properties = vk::PhysicalDeviceProperties::default();
        properties.device_type = device_type;
        properties.limits.max_image_dimension2_d = max_dim;
        properties
    }

    #[test]
    fn discrete_gpu_outscores_integrated() {
        let discrete = properties_with(vk::PhysicalDeviceType::DISCRETE_GPU, 4096);
        let integrated = properties_with(vk::PhysicalDeviceType::INTEGRATED_GPU, 16384);
        assert!(score_device(&discrete) > score_device(&integrated));
    }

    #[test]
    fn larger_limits_break_ties() {
        let small = properties_with(vk::PhysicalDeviceType::DISCRETE_GPU, 4096);
        let large = properties_with(vk::PhysicalDeviceType::DISCRETE_GPU, 16384);
        assert!(score_device(&large) > score_device(&small));
    }

    #[test]
    fn non_discrete_devices_still_score() {
        let cpu = properties_with(vk::PhysicalDeviceType::CPU, 2048);
        assert!(score_device(&cpu) > 0);
    }

    #[test]
    fn depth_probe_takes_first_supported_candidate() {
        let picked = pick_depth_format(|format| {
            let mut props = vk::FormatProperties::default();
            if format == vk::Format::D32_SFLOAT_S8_UINT {
                props.optimal_tiling_features = vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
            }
            props
        });
        assert_eq!(picked, Some(vk::Format::D32_SFLOAT_S8_UINT));
    }

    #[test]
    fn depth_probe_accepts_linear_tiling_support() {
        let picked = pick_depth_format(|format| {
            let mut props = vk::FormatProperties::default();
            if format == vk::Format::D24_UNORM_S8_UINT {
                props.linear_tiling_features = vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
            }
            props
        });
        assert_eq!(picked, Some(vk::Format::D24_UNORM_S8_UINT));
    }

    #[test]
    fn depth_probe_fails_without_support() {
        let picked = pick_depth_format(|_| vk::FormatProperties::default());
        assert_eq!(picked, None);
    }
}
