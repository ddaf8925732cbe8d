//! Help and version output.

/// Run the help command.
pub fn run_help_command(command: Option<&str>) {
    match command {
        None => display_general_help(),
        Some("run") => display_run_help(),
        Some("scan" | "connect" | "disconnect") => display_device_help(),
        Some("color" | "on" | "off" | "colors") => display_light_help(),
        Some("status" | "watch") => display_status_help(),
        Some("schedule") => display_schedule_help(),
        Some("sun") => display_sun_help(),
        Some("settings") => display_settings_help(),
        Some("reload") => display_reload_help(),
        Some(unknown) => {
            log_warning!("Unknown command: {unknown}");
            display_general_help();
        }
    }
}

pub fn display_version_info() {
    log_version!();
    log_pipe!();
    println!("{}", env!("CARGO_PKG_DESCRIPTION"));
    log_end!();
}

/// Full usage, shown for `--help` and after argument errors.
pub fn display_help() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage: luxlink [OPTIONS] [COMMAND]");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>  Use a custom configuration directory");
    log_indented!("-d, --debug         Enable detailed debug output");
    log_indented!("-h, --help          Print help information");
    log_indented!("-V, --version       Print version information");
    list_commands();
    log_end!();
}

fn display_general_help() {
    log_version!();
    list_commands();
    log_pipe!();
    log_info!("Use 'luxlink help <command>' to see detailed help for a specific command.");
    log_end!();
}

fn list_commands() {
    log_block_start!("Commands:");
    log_indented!("run                       Start the daemon (default)");
    log_indented!("scan                      List nearby devices");
    log_indented!("connect <name|address>    Connect to a device and remember it");
    log_indented!("disconnect                Disconnect and forget the device");
    log_indented!("color <name>              Show a palette color");
    log_indented!("on, off                   Switch the LED on or off");
    log_indented!("status                    Show the daemon's state");
    log_indented!("watch                     Follow the daemon's events");
    log_indented!("schedule [show]           Show the weekly schedule");
    log_indented!("schedule set <day|all>    Change the schedule");
    log_indented!("sun                       Show today's sunrise and sunset");
    log_indented!("colors                    List the palette");
    log_indented!("settings set <key> <val>  Change one setting");
    log_indented!("reload                    Make the daemon re-read its files");
    log_indented!("help [command]            Show detailed help");
}

fn display_run_help() {
    log_version!();
    log_block_start!("run - Start the daemon");
    log_block_start!("Usage: luxlink [run] [--debug]");
    log_block_start!("Description:");
    log_indented!("Connects to the remembered device (when auto-connect is on),");
    log_indented!("keeps the link alive, and switches the LED on the weekly schedule.");
    log_indented!("Only one daemon runs per user. SIGHUP or SIGUSR2 reloads the files.");
    log_end!();
}

fn display_device_help() {
    log_version!();
    log_block_start!("scan, connect, disconnect - Manage the device");
    log_block_start!("Usage:");
    log_indented!("luxlink scan");
    log_indented!("luxlink connect <name|address>");
    log_indented!("luxlink disconnect");
    log_block_start!("Description:");
    log_indented!("scan asks the daemon to scan, or scans directly when it is not running.");
    log_indented!("connect looks the device up by name or address and waits for the link.");
    log_indented!("The connected device is remembered for the next start.");
    log_indented!("disconnect drops the link and forgets the device.");
    log_end!();
}

fn display_light_help() {
    log_version!();
    log_block_start!("color, on, off - Control the LED");
    log_block_start!("Usage:");
    log_indented!("luxlink color <name>");
    log_indented!("luxlink on");
    log_indented!("luxlink off");
    log_indented!("luxlink colors");
    log_block_start!("Description:");
    log_indented!("Color names come from the palette (see 'luxlink colors').");
    log_indented!("'on' restores the last color. The schedule corrects manual");
    log_indented!("changes at its next check.");
    log_end!();
}

fn display_status_help() {
    log_version!();
    log_block_start!("status, watch - Observe the daemon");
    log_block_start!("Usage:");
    log_indented!("luxlink status");
    log_indented!("luxlink watch");
    log_block_start!("Description:");
    log_indented!("status prints the connection state, device, and LED state.");
    log_indented!("watch streams connection and command events until Ctrl+C.");
    log_end!();
}

fn display_schedule_help() {
    log_version!();
    log_block_start!("schedule - Show or change the weekly schedule");
    log_block_start!("Usage:");
    log_indented!("luxlink schedule [show]");
    log_indented!("luxlink schedule set <day|all> [OPTIONS]");
    log_block_start!("Options for set:");
    log_indented!("--color <name>     Palette color for the day");
    log_indented!("--on <HH:MM>       Fixed on time");
    log_indented!("--off <HH:MM>      Fixed off time");
    log_indented!("--sunrise [MIN]    Switch on at sunrise, shifted by MIN minutes");
    log_indented!("--sunset [MIN]     Switch off at sunset, shifted by MIN minutes");
    log_block_start!("Examples:");
    log_indented!("luxlink schedule set all --color Kék --on 18:00 --off 06:00");
    log_indented!("luxlink schedule set friday --sunset -30");
    log_pipe!();
    log_info!("Days may be given as schedule keys (Hétfő) or English names (monday).");
    log_end!();
}

fn display_sun_help() {
    log_version!();
    log_block_start!("sun - Show today's sunrise and sunset");
    log_block_start!("Usage: luxlink sun");
    log_block_start!("Description:");
    log_indented!("The location comes from an IP lookup, with a fixed fallback.");
    log_end!();
}

fn display_settings_help() {
    log_version!();
    log_block_start!("settings - Change a setting");
    log_block_start!("Usage: luxlink settings set <key> <value>");
    log_block_start!("Keys:");
    for key in crate::config::Settings::KEYS {
        log_indented!("{key}");
    }
    log_block_start!("Examples:");
    log_indented!("luxlink settings set auto_connect_on_startup false");
    log_indented!("luxlink settings set last_device_address null");
    log_end!();
}

fn display_reload_help() {
    log_version!();
    log_block_start!("reload - Re-read settings and schedule");
    log_block_start!("Usage: luxlink reload");
    log_end!();
}
