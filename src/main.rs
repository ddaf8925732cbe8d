//! CLI dispatch.
//!
//! Parses the command line, resolves the configuration directory once, and
//! hands off to the daemon or to a one-shot command.

use anyhow::Result;

use luxlink::args::{CliAction, Command, ParsedArgs};
use luxlink::commands;
use luxlink::config::ConfigPaths;
use luxlink::constants::{EXIT_FAILURE, EXIT_SUCCESS};
use luxlink::controller::UserCommand;
use luxlink::{Luxlink, log_error_exit};

fn main() {
    let parsed_args = ParsedArgs::from_env();

    let code = match parsed_args.action {
        CliAction::ShowVersion => {
            commands::help::display_version_info();
            EXIT_SUCCESS
        }
        CliAction::ShowHelp => {
            commands::help::display_help();
            EXIT_SUCCESS
        }
        CliAction::ShowHelpDueToError => {
            commands::help::display_help();
            EXIT_FAILURE
        }
        CliAction::Execute {
            command,
            debug_enabled,
            config_dir,
        } => match run(command, debug_enabled, config_dir.as_deref()) {
            Ok(()) => EXIT_SUCCESS,
            Err(e) => {
                log_error_exit!("{e:#}");
                EXIT_FAILURE
            }
        },
    };

    std::process::exit(code);
}

fn run(command: Command, debug_enabled: bool, config_dir: Option<&str>) -> Result<()> {
    let paths = ConfigPaths::resolve(config_dir)?;
    if debug_enabled {
        luxlink::log_debug!("Configuration directory: {}", paths.dir().display());
    }

    // Help and palette output need no runtime.
    match &command {
        Command::Help { topic } => {
            commands::help::run_help_command(topic.as_deref());
            return Ok(());
        }
        Command::Colors => {
            commands::colors::handle_colors_command();
            return Ok(());
        }
        Command::SettingsSet { key, value } => {
            return commands::settings::handle_settings_set_command(&paths, key, value);
        }
        Command::ScheduleSet { days, edit } => {
            return commands::schedule::handle_schedule_set_command(&paths, days, edit);
        }
        Command::Reload => return commands::reload::handle_reload_command(),
        _ => {}
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        match command {
            Command::Run => Luxlink::new(paths, debug_enabled).run().await,
            Command::Scan => commands::device::handle_scan_command().await,
            Command::Connect { target } => commands::device::handle_connect_command(&target).await,
            Command::Disconnect => commands::device::handle_disconnect_command(&paths).await,
            Command::Color { name } => {
                commands::device::handle_light_command(UserCommand::SetColor(name)).await
            }
            Command::On => commands::device::handle_light_command(UserCommand::PowerOn).await,
            Command::Off => commands::device::handle_light_command(UserCommand::PowerOff).await,
            Command::Status => commands::status::handle_status_command(&paths).await,
            Command::Watch => commands::status::handle_watch_command().await,
            Command::ScheduleShow => commands::schedule::handle_schedule_show_command(&paths).await,
            Command::Sun => commands::sun::handle_sun_command().await,
            Command::Help { .. }
            | Command::Colors
            | Command::SettingsSet { .. }
            | Command::ScheduleSet { .. }
            | Command::Reload => Ok(()),
        }
    })
}
