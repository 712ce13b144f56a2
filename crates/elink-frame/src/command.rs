//! Reserved command ids.
//!
//! The engine only interprets the ids below. Everything from
//! [`APP_COMMAND_START`] upwards belongs to the higher-level clients and is
//! passed through untouched.

/// Never sent; a zeroed header decodes to this.
pub const NULL: u16 = 0;

/// Synchronize with the companion and clear its callback table.
pub const SYNC: u16 = 1;

/// Response carrying a value for a blocking caller.
pub const VALUE_RESPONSE: u16 = 2;

/// Response addressed to a registered callback.
pub const CALLBACK_RESPONSE: u16 = 3;

/// First command id available to application clients.
pub const APP_COMMAND_START: u16 = 4;

/// Returns a human-readable name for a command id.
pub fn command_name(id: u16) -> &'static str {
    match id {
        NULL => "NULL",
        SYNC => "SYNC",
        VALUE_RESPONSE => "VALUE_RESPONSE",
        CALLBACK_RESPONSE => "CALLBACK_RESPONSE",
        _ => "APP",
    }
}

/// Returns true if the id is interpreted by the engine itself.
pub fn is_reserved(id: u16) -> bool {
    id < APP_COMMAND_START
}
