//! `colors`: list the palette.

use crate::schedule::palette::{PALETTE, default_color};

pub fn handle_colors_command() {
    log_version!();
    log_block_start!("Available colors:");
    for entry in PALETTE.iter() {
        let default = if entry.name == default_color().name {
            "  (default)"
        } else {
            ""
        };
        log_indented!("{:<8} {}{default}", entry.name, entry.display_hex);
    }
    log_end!();
}
