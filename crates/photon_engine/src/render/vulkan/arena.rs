//! Host memory arena for driver allocations
//!
//! Every host-side allocation the Vulkan driver makes on our behalf is
//! routed through one named arena via `vk::AllocationCallbacks`, so driver
//! memory is tracked, zero-initialized, and freed uniformly. The callbacks
//! are installed at instance and device creation; child objects inherit them
//! through Vulkan's allocation-scope rules.

use ash::vk;
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Named allocation arena backing the driver's host allocations.
///
/// The arena must stay at a stable address for as long as any Vulkan object
/// created with its callbacks is alive; callers keep it boxed and drop it
/// after the instance.
///
/// # Thread Safety
/// The driver may allocate from its own threads, so the pointer-to-layout
/// map is lock-protected even though the rest of the renderer is
/// single-threaded.
pub struct ArenaAllocator {
    name: &'static str,
    allocations: Mutex<HashMap<usize, Layout>>,
    bytes_in_use: AtomicUsize,
}

impl ArenaAllocator {
    /// Create a new arena with a diagnostic name
    pub fn new(name: &'static str) -> Box<Self> {
        Box::new(Self {
            name,
            allocations: Mutex::new(HashMap::new()),
            bytes_in_use: AtomicUsize::new(0),
        })
    }

    /// Build the callback set routing driver allocations through this arena
    pub fn callbacks(&self) -> vk::AllocationCallbacks {
        vk::AllocationCallbacks::builder()
            .user_data(self as *const Self as *mut c_void)
            .pfn_allocation(Some(arena_allocation))
            .pfn_reallocation(Some(arena_reallocation))
            .pfn_free(Some(arena_free))
            .build()
    }

    /// Bytes currently held by the driver
    pub fn bytes_in_use(&self) -> usize {
        self.bytes_in_use.load(Ordering::Relaxed)
    }

    /// Number of live driver allocations
    pub fn allocation_count(&self) -> usize {
        self.lock_map().len()
    }

    fn lock_map(&self) -> std::sync::MutexGuard<'_, HashMap<usize, Layout>> {
        // A panic while holding the lock only loses tracking data; keep
        // serving the driver rather than aborting inside an FFI callback.
        match self.allocations.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn allocate(&self, size: usize, alignment: usize) -> *mut c_void {
        if size == 0 {
            return std::ptr::null_mut();
        }
        let Ok(layout) = Layout::from_size_align(size, alignment.max(1)) else {
            log::error!("arena '{}': invalid layout ({size} bytes, align {alignment})", self.name);
            return std::ptr::null_mut();
        };

        let ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            log::error!("arena '{}': host allocation of {size} bytes failed", self.name);
            return std::ptr::null_mut();
        }

        self.lock_map().insert(ptr as usize, layout);
        self.bytes_in_use.fetch_add(size, Ordering::Relaxed);
        ptr.cast()
    }

    fn free(&self, ptr: *mut c_void) {
        if ptr.is_null() {
            return;
        }
        let Some(layout) = self.lock_map().remove(&(ptr as usize)) else {
            // Never abort on a driver bookkeeping mismatch
            log::error!("arena '{}': free of untracked pointer {ptr:p}", self.name);
            return;
        };

        self.bytes_in_use.fetch_sub(layout.size(), Ordering::Relaxed);
        unsafe { dealloc(ptr.cast(), layout) };
    }

    fn reallocate(&self, original: *mut c_void, size: usize, alignment: usize) -> *mut c_void {
        if original.is_null() {
            return self.allocate(size, alignment);
        }
        if size == 0 {
            self.free(original);
            return std::ptr::null_mut();
        }

        let old_layout = match self.lock_map().get(&(original as usize)) {
            Some(layout) => *layout,
            None => {
                log::error!("arena '{}': realloc of untracked pointer {original:p}", self.name);
                return std::ptr::null_mut();
            }
        };

        let fresh = self.allocate(size, alignment);
        if fresh.is_null() {
            return std::ptr::null_mut();
        }

        unsafe {
            std::ptr::copy_nonoverlapping(
                original.cast::<u8>(),
                fresh.cast::<u8>(),
                old_layout.size().min(size),
            );
        }
        self.free(original);
        fresh
    }
}

impl Drop for ArenaAllocator {
    fn drop(&mut self) {
        let leaked = self.lock_map().len();
        if leaked > 0 {
            log::warn!(
                "arena '{}': {} driver allocation(s) still live at shutdown ({} bytes)",
                self.name,
                leaked,
                self.bytes_in_use()
            );
        } else {
            log::debug!("arena '{}': all driver allocations returned", self.name);
        }
    }
}

unsafe extern "system" fn arena_allocation(
    user_data: *mut c_void,
    size: usize,
    alignment: usize,
    _scope: vk::SystemAllocationScope,
) -> *mut c_void {
    let arena = &*user_data.cast::<ArenaAllocator>();
    arena.allocate(size, alignment)
}

unsafe extern "system" fn arena_reallocation(
    user_data: *mut c_void,
    original: *mut c_void,
    size: usize,
    alignment: usize,
    _scope: vk::SystemAllocationScope,
) -> *mut c_void {
    let arena = &*user_data.cast::<ArenaAllocator>();
    arena.reallocate(original, size, alignment)
}

unsafe extern "system" fn arena_free(user_data: *mut c_void, memory: *mut c_void) {
    let arena = &*user_data.cast::<ArenaAllocator>();
    arena.free(memory);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_are_zeroed_and_tracked() {
        let arena = ArenaAllocator::new("test");

        let ptr = arena.allocate(64, 16);
        assert!(!ptr.is_null());
        assert_eq!(arena.bytes_in_use(), 64);
        assert_eq!(arena.allocation_count(), 1);

        let bytes = unsafe { std::slice::from_raw_parts(ptr.cast::<u8>(), 64) };
        assert!(bytes.iter().all(|&b| b == 0));

        arena.free(ptr);
        assert_eq!(arena.bytes_in_use(), 0);
        assert_eq!(arena.allocation_count(), 0);
    }

    #[test]
    fn zero_sized_allocation_returns_null() {
        let arena = ArenaAllocator::new("test");
        assert!(arena.allocate(0, 8).is_null());
        assert_eq!(arena.allocation_count(), 0);
    }

    #[test]
    fn reallocation_preserves_contents() {
        let arena = ArenaAllocator::new("test");

        let ptr = arena.allocate(16, 8);
        unsafe {
            std::slice::from_raw_parts_mut(ptr.cast::<u8>(), 16).copy_from_slice(&[0xAB; 16]);
        }

        let grown = arena.reallocate(ptr, 64, 8);
        assert!(!grown.is_null());
        assert_eq!(arena.allocation_count(), 1);
        assert_eq!(arena.bytes_in_use(), 64);

        let bytes = unsafe { std::slice::from_raw_parts(grown.cast::<u8>(), 64) };
        assert!(bytes[..16].iter().all(|&b| b == 0xAB));
        assert!(bytes[16..].iter().all(|&b| b == 0));

        arena.free(grown);
        assert_eq!(arena.bytes_in_use(), 0);
    }

    #[test]
    fn freeing_untracked_pointer_is_ignored() {
        let arena = ArenaAllocator::new("test");
        let mut stack_value = 0u64;
        arena.free((&mut stack_value as *mut u64).cast());
        assert_eq!(arena.allocation_count(), 0);
    }

    #[test]
    fn callbacks_route_through_the_arena() {
        let arena = ArenaAllocator::new("test");
        let callbacks = arena.callbacks();

        let ptr = unsafe {
            arena_allocation(
                callbacks.p_user_data,
                128,
                8,
                vk::SystemAllocationScope::INSTANCE,
            )
        };
        assert!(!ptr.is_null());
        assert_eq!(arena.bytes_in_use(), 128);

        unsafe { arena_free(callbacks.p_user_data, ptr) };
        assert_eq!(arena.bytes_in_use(), 0);
    }
}
