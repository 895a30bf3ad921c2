//! Exit codes for the CLI.
//!
//! These follow common Unix conventions and give scripts and service
//! managers something more useful than "it failed".

/// Successful execution
pub const SUCCESS: u8 = 0;

/// General/unspecified error
pub const GENERAL_ERROR: u8 = 1;

/// Invalid configuration: config file, recipient file or gpg command
pub const CONFIG_INVALID: u8 = 3;

/// The password store could not be walked or read
pub const STORE_UNREADABLE: u8 = 4;

/// The crypto engine failed while building a snapshot
pub const ENCRYPTION_FAILED: u8 = 5;

/// The HTTP server could not bind or serve
pub const SERVE_FAILED: u8 = 6;

/// Permission denied on the store or listen address
pub const PERMISSION_DENIED: u8 = 7;
