// src/view/mod.rs

//! Terminal output: run tables and the live renderer.

use std::io::IsTerminal;

pub mod table;
pub mod terminal;

pub use table::{format_table, Column, TableRow};
pub use terminal::TerminalRenderer;

/// Whether stdout output should carry ANSI colors.
pub fn color_enabled(no_color_flag: bool) -> bool {
    if no_color_flag || std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty()) {
        return false;
    }
    std::io::stdout().is_terminal()
}
