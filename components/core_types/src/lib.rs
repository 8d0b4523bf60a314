//! Core naming and error types for the AVM runtime.
//!
//! This crate provides the leaf types shared by every other component:
//! interned strings, namespaces, multinames and the error taxonomy.
//!
//! # Overview
//!
//! - [`StringTable`] / [`StringId`] - Interned string storage
//! - [`Namespace`] / [`NamespaceKind`] - Qualifiers for same-named members
//! - [`Multiname`] - Property lookup key (name + namespace candidates)
//! - [`ErrorKind`] - Script-visible error classes
//! - [`EngineError`] - Host-level faults returned from the engine
//!
//! # Examples
//!
//! ```
//! use core_types::{Multiname, Namespace, StringTable};
//!
//! let mut strings = StringTable::new();
//! let foo = strings.intern("foo");
//!
//! let name = Multiname::qualified(foo, Namespace::public());
//! assert!(name.is_qualified());
//! assert_eq!(strings.get(foo), "foo");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod multiname;
mod namespace;
mod strings;

pub use error::{EngineError, ErrorKind};
pub use multiname::{Multiname, NameKey};
pub use namespace::{Namespace, NamespaceKind};
pub use strings::{StringId, StringTable};
