//! FFI export macro for native (cdylib) extensions.

/// Export the FFI symbols the host's native loader looks for.
///
/// The type must implement [`crate::Extension`] and `Default`.
///
/// # Example
///
/// ```ignore
/// use webext_sdk::prelude::*;
///
/// #[derive(Default)]
/// struct MyExtension;
///
/// #[async_trait::async_trait]
/// impl Extension for MyExtension {
///     fn name(&self) -> &str { "my-extension" }
///     fn version(&self) -> &str { "0.1.0" }
/// }
///
/// export_extension!(MyExtension);
/// ```
#[macro_export]
macro_rules! export_extension {
    ($ty:ty) => {
        #[no_mangle]
        pub extern "C" fn webext_abi_version() -> u32 {
            $crate::ABI_VERSION
        }

        /// Create a boxed instance. Ownership passes to the caller, which
        /// must release it through `webext_extension_destroy`.
        #[no_mangle]
        pub extern "C" fn webext_extension_create() -> *mut Box<dyn $crate::Extension> {
            let ext: Box<dyn $crate::Extension> = Box::new(<$ty>::default());
            Box::into_raw(Box::new(ext))
        }

        /// Destroy an instance created by `webext_extension_create`.
        ///
        /// # Safety
        /// `ptr` must come from `webext_extension_create` and must not be
        /// used afterwards.
        #[no_mangle]
        pub unsafe extern "C" fn webext_extension_destroy(ptr: *mut Box<dyn $crate::Extension>) {
            if !ptr.is_null() {
                drop(unsafe { Box::from_raw(ptr) });
            }
        }
    };
}
