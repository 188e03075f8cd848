// ABOUTME: Binder module for the keyflow workflow library
// ABOUTME: Bindings, bind statuses, and the concurrent key-to-binding stores

pub mod binding;
pub mod error;
pub mod store;

pub use binding::{BindStatus, Binding, IsAbsent, SharedBindError, SharedValue};
pub use error::BinderError;
pub use store::{Binder, ExposeBinder, MapBinder, OverlayBinder, SharedBinder};
