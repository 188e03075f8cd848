// ABOUTME: Key module for the keyflow workflow library
// ABOUTME: Typed keys, key ids, derived read-only keys, and the Maybe wrapper

pub mod error;
pub mod id;
#[allow(clippy::module_inception)]
pub mod key;
pub mod maybe;

pub use error::{is_plain_absent, ReadError};
pub use id::KeyId;
pub use key::{mapped, not, optional, presence, Key, Mapped, Optional, Presence, ReadKey};
pub use maybe::{first_error, missing_names, select_single, Maybe, MaybeStatus, SelectError};
