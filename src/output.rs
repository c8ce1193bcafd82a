//! User-facing command output in the host PaaS house style:
//! `----->` section headers, indented continuation lines, `=====>` success
//! lines, `!` error lines on stderr. Diagnostics for operators go through
//! `tracing` instead and stay off stdout.

use std::fmt::Display;

pub fn header(msg: impl Display) {
    println!("-----> {msg}");
}

pub fn step(msg: impl Display) {
    println!("       {msg}");
}

pub fn ok(msg: impl Display) {
    println!("=====> {msg}");
}

pub fn error(msg: impl Display) {
    eprintln!("!     {msg}");
}

/// Raw line without any prefix. Used for machine-parseable output such as
/// the `KEY=VALUE` credential export.
pub fn raw(msg: impl Display) {
    println!("{msg}");
}
