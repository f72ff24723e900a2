//! Status codes the in-memory database contract is known to return.
//!
//! The client passes every status through untouched; these constants exist
//! for callers (and the stub contract) that want to name them.

pub const OK: i32 = 200;
pub const BAD_REQUEST: i32 = 400;
pub const NOT_FOUND: i32 = 404;
pub const CONFLICT: i32 = 409;
pub const INTERNAL: i32 = 500;

pub fn describe(status: i32) -> Option<&'static str> {
    match status {
        OK => Some("ok"),
        BAD_REQUEST => Some("bad request"),
        NOT_FOUND => Some("not found"),
        CONFLICT => Some("conflict"),
        INTERNAL => Some("internal error"),
        _ => None,
    }
}
