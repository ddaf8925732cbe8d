//! Static color palette shared by the schedule and user commands.
//!
//! Each entry pairs the name used in schedule files with a display color and
//! the exact command payload the device expects. Payloads are transmitted
//! verbatim and never derived from the display color.

use serde::Serialize;

/// One selectable color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColorEntry {
    pub name: &'static str,
    pub display_hex: &'static str,
    pub command_hex: &'static str,
}

pub const PALETTE: [ColorEntry; 8] = [
    ColorEntry {
        name: "Piros",
        display_hex: "#FF0000",
        command_hex: "7e000503ff000000ef",
    },
    ColorEntry {
        name: "Zöld",
        display_hex: "#008000",
        command_hex: "7e00050300800000ef",
    },
    ColorEntry {
        name: "Kék",
        display_hex: "#0000FF",
        command_hex: "7e0005030000ff00ef",
    },
    ColorEntry {
        name: "Arany",
        display_hex: "#FFD700",
        command_hex: "7e000503ffd70000ef",
    },
    ColorEntry {
        name: "Türkiz",
        display_hex: "#008080",
        command_hex: "7e00050300808000ef",
    },
    ColorEntry {
        name: "Magenta",
        display_hex: "#FF00FF",
        command_hex: "7e000503ff00ff00ef",
    },
    ColorEntry {
        name: "Narancs",
        display_hex: "#FF8C00",
        command_hex: "7e000503ff8c0000ef",
    },
    ColorEntry {
        name: "Fehér",
        display_hex: "#FFFFFF",
        command_hex: "7e000503ffffff00ef",
    },
];

/// The entry used for new rules and for the initial LED belief.
pub fn default_color() -> &'static ColorEntry {
    &PALETTE[0]
}

/// Look up an entry by its exact name.
pub fn find_by_name(name: &str) -> Option<&'static ColorEntry> {
    PALETTE.iter().find(|entry| entry.name == name)
}

/// Look up an entry by name ignoring case, for names typed on a command line.
pub fn find_by_name_loose(name: &str) -> Option<&'static ColorEntry> {
    find_by_name(name).or_else(|| {
        let wanted = name.to_lowercase();
        PALETTE
            .iter()
            .find(|entry| entry.name.to_lowercase() == wanted)
    })
}

/// Reverse lookup from a command payload, used when reporting LED state.
pub fn find_by_command(command_hex: &str) -> Option<&'static ColorEntry> {
    PALETTE
        .iter()
        .find(|entry| entry.command_hex.eq_ignore_ascii_case(command_hex))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_payloads_are_well_formed() {
        for entry in PALETTE.iter() {
            let bytes = hex::decode(entry.command_hex).unwrap();
            assert_eq!(bytes.len(), 9, "{} payload length", entry.name);
            assert_eq!(bytes[0], 0x7e);
            assert_eq!(bytes[8], 0xef);
        }
    }

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(find_by_name("Kék").unwrap().command_hex, "7e0005030000ff00ef");
        assert!(find_by_name("kék").is_none());
        assert_eq!(find_by_name_loose("kék").unwrap().name, "Kék");
        assert!(find_by_name_loose("Lila").is_none());
    }

    #[test]
    fn test_reverse_lookup() {
        assert_eq!(find_by_command("7E000503FF8C0000EF").unwrap().name, "Narancs");
        assert!(find_by_command(crate::constants::POWER_OFF_COMMAND).is_none());
    }

    #[test]
    fn test_default_is_first_entry() {
        assert_eq!(default_color().name, "Piros");
    }
}
