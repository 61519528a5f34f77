use std::{collections::HashMap, ffi::OsString};

pub use command::CommandAndArguments;
pub use error::Error;
pub use path::SudoPath;
pub use string::{DisplayOsStr, SudoString};

pub mod command;
pub mod context;
pub mod error;
pub mod path;
pub mod resolve;
pub mod string;

pub type Environment = HashMap<OsString, OsString>;

/// Explicit discriminants for `#[repr(u32)]` enums that carry payloads, so that a
/// memory-corruption bug that overwrites a discriminant with a small guessable value
/// (0, 1, 2, ...) is less likely to flip an enum into a different, still-valid-looking
/// variant.
pub const HARDENED_ENUM_VALUE_0: u32 = 0x8b21_8c70;
pub const HARDENED_ENUM_VALUE_1: u32 = 0x2f5a_19e4;
pub const HARDENED_ENUM_VALUE_2: u32 = 0xd446_7b31;
pub const HARDENED_ENUM_VALUE_3: u32 = 0x64af_0ed9;
pub const HARDENED_ENUM_VALUE_4: u32 = 0x9c13_3f52;
