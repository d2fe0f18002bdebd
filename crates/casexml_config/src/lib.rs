//! Case configuration files
//!
//! Env files are XML documents made of identified entries ([`entry_id::EntryId`]). A new env
//! file starts with the default header for its file name ([`headers::HeaderProvider`]), see
//! [`env_base::EnvBase`]. All env files of a case root are queried together through
//! [`case::Case`].

pub mod case;
pub mod entry_id;
pub mod env_base;
pub mod headers;
pub mod value;

pub use case::Case;
pub use entry_id::{EntryId, NewEntry};
pub use env_base::EnvBase;
pub use headers::{HeaderProvider, Headers};
pub use value::{EntryType, EntryValue};
