//! Macros for module authors.

/// Exports `create_module_instance` and `destroy_module_instance` for a
/// module type.
///
/// Panics raised while constructing or dropping the module are contained
/// on the module side; a panicking constructor makes the factory return
/// null.
///
/// # Example
/// ```rust,ignore
/// #[derive(Default)]
/// pub struct EchoModule;
///
/// impl LauncherModule for EchoModule { /* ... */ }
///
/// wave_module::export_module!(EchoModule);
/// // or with an explicit constructor:
/// wave_module::export_module!(EchoModule, EchoModule::new);
/// ```
#[macro_export]
macro_rules! export_module {
    ($module:ty) => {
        $crate::export_module!($module, <$module as ::core::default::Default>::default);
    };
    ($module:ty, $ctor:expr) => {
        /// Module factory looked up by the Wave host.
        #[unsafe(no_mangle)]
        #[allow(improper_ctypes_definitions)]
        pub extern "C" fn create_module_instance() -> *mut $crate::abi::ModuleInstance {
            $crate::safety::instance_into_raw::<$module, _>($ctor)
        }

        /// Module destructor looked up by the Wave host.
        ///
        /// # Safety
        ///
        /// `instance` must come from `create_module_instance` of this
        /// binary and must not have been destroyed.
        #[unsafe(no_mangle)]
        #[allow(improper_ctypes_definitions)]
        pub unsafe extern "C" fn destroy_module_instance(
            instance: *mut $crate::abi::ModuleInstance,
        ) -> bool {
            unsafe { $crate::safety::drop_raw_instance(instance) }
        }
    };
}
