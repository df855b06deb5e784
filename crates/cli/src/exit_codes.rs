//! CLI Exit Code Registry
//!
//! Single source of truth for `orecon` exit codes — scripts rely on them.
//!
//! | Code | Meaning                                        |
//! |------|------------------------------------------------|
//! | 0    | Run completed, nothing needs manual action     |
//! | 1    | Run completed, action-required orders found    |
//! | 2    | CLI usage error (clap)                         |
//! | 3    | Invalid config file                            |
//! | 4    | Runtime/input error (unreadable or bad inputs) |

/// Run completed and no order needs manual action.
pub const EXIT_SUCCESS: u8 = 0;

/// Run completed but at least one order is ACTION_REQUIRED.
/// Like `diff(1)`, exit 1 means "findings present", not "crashed".
pub const EXIT_FINDINGS: u8 = 1;

/// Config file unreadable, unparsable, or failed validation.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Input file unreadable, or the engine rejected the batch contract
/// (empty batch, missing columns, malformed order rows).
pub const EXIT_RUNTIME: u8 = 4;
