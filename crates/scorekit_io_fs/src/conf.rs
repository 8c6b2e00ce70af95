/// `log` target shared with the rest of the scorekit crates.
pub const C_LOG_TARGET: &str = "scorekit";
