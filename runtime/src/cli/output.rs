//! Output mode flags shared by all subcommands.
//!
//! The binary records global flags in the environment so every command sees
//! them without threading arguments through.

/// Whether `--json` was given.
pub fn is_json() -> bool {
    std::env::var_os("PILLAR_JSON").is_some()
}

/// Whether `--quiet` was given.
pub fn is_quiet() -> bool {
    std::env::var_os("PILLAR_QUIET").is_some()
}

/// Print a JSON value on stdout, compact under `--quiet`.
pub fn print_json(value: &serde_json::Value) {
    let text = if is_quiet() {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    match text {
        Ok(t) => println!("{t}"),
        Err(e) => eprintln!("  Error: failed to encode JSON: {e}"),
    }
}
