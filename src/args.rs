//! Command-line argument parsing and processing.
//!
//! Global flags (`--config`, `--debug`, `--help`, `--version`) may appear
//! anywhere on the command line. The first non-flag argument names the
//! command; everything after it belongs to that command.

use chrono::Weekday;

use crate::schedule::{WEEK, parse_weekday};

/// A change to one trigger of a day rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// A fixed clock time, as typed.
    At(String),
    /// Relative to the sun, with an offset in minutes as typed (empty is 0).
    Sun(String),
}

/// Field changes requested by `schedule set`. Unset fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleEdit {
    pub color: Option<String>,
    pub on: Option<Trigger>,
    pub off: Option<Trigger>,
}

impl ScheduleEdit {
    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.on.is_none() && self.off.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run,
    Scan,
    Connect { target: String },
    Disconnect,
    Color { name: String },
    On,
    Off,
    Status,
    Watch,
    ScheduleShow,
    ScheduleSet { days: Vec<Weekday>, edit: ScheduleEdit },
    Sun,
    Colors,
    SettingsSet { key: String, value: String },
    Reload,
    Help { topic: Option<String> },
}

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    Execute {
        command: Command,
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to unknown arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse command-line arguments, the program name first.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut debug_enabled = false;
        let mut display_help = false;
        let mut display_version = false;
        let mut config_dir: Option<String> = None;
        let mut words: Vec<String> = Vec::new();

        let mut i = 0;
        while i < args_vec.len() {
            let arg = &args_vec[i];
            // Command-specific options are collected with the command words.
            if !words.is_empty() && arg.starts_with("--") && is_schedule_option(arg) {
                words.push(arg.clone());
                i += 1;
                continue;
            }
            match arg.as_str() {
                "--help" | "-h" => display_help = true,
                "--version" | "-V" | "-v" => display_version = true,
                "--debug" | "-d" => debug_enabled = true,
                "--config" | "-c" => {
                    if i + 1 < args_vec.len() && !args_vec[i + 1].starts_with('-') {
                        config_dir = Some(args_vec[i + 1].clone());
                        i += 1;
                    } else {
                        log_warning!("Missing directory for --config. Usage: --config <directory>");
                        return error();
                    }
                }
                flag if flag.starts_with('-') && !is_negative_number(flag) => {
                    log_warning!("Unknown option: {flag}");
                    return error();
                }
                word => words.push(word.to_string()),
            }
            i += 1;
        }

        // Version takes precedence over help.
        if display_version {
            return ParsedArgs {
                action: CliAction::ShowVersion,
            };
        }
        if display_help {
            return ParsedArgs {
                action: CliAction::ShowHelp,
            };
        }

        match parse_command(&words) {
            Some(command) => ParsedArgs {
                action: CliAction::Execute {
                    command,
                    debug_enabled,
                    config_dir,
                },
            },
            None => error(),
        }
    }

    /// Parse arguments from the process environment.
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

fn error() -> ParsedArgs {
    ParsedArgs {
        action: CliAction::ShowHelpDueToError,
    }
}

fn is_schedule_option(arg: &str) -> bool {
    matches!(arg, "--color" | "--on" | "--off" | "--sunrise" | "--sunset")
}

fn is_negative_number(arg: &str) -> bool {
    arg.len() > 1 && arg[1..].chars().all(|c| c.is_ascii_digit())
}

fn parse_command(words: &[String]) -> Option<Command> {
    let Some((name, rest)) = words.split_first() else {
        return Some(Command::Run);
    };
    let rest: Vec<&str> = rest.iter().map(String::as_str).collect();

    let command = match (name.as_str(), rest.as_slice()) {
        ("run", []) => Command::Run,
        ("scan", []) => Command::Scan,
        ("connect", [target]) => Command::Connect {
            target: target.to_string(),
        },
        ("connect", _) => {
            log_warning!("Usage: luxlink connect <name|address>");
            return None;
        }
        ("disconnect", []) => Command::Disconnect,
        ("color", [name]) => Command::Color {
            name: name.to_string(),
        },
        ("color", _) => {
            log_warning!("Usage: luxlink color <name>");
            return None;
        }
        ("on", []) => Command::On,
        ("off", []) => Command::Off,
        ("status", []) => Command::Status,
        ("watch", []) => Command::Watch,
        ("schedule", []) | ("schedule", ["show"]) => Command::ScheduleShow,
        ("schedule", ["set", args @ ..]) => return parse_schedule_set(args),
        ("sun", []) => Command::Sun,
        ("colors", []) => Command::Colors,
        ("settings", ["set", key, value]) => Command::SettingsSet {
            key: key.to_string(),
            value: value.to_string(),
        },
        ("settings", _) => {
            log_warning!("Usage: luxlink settings set <key> <value>");
            return None;
        }
        ("reload", []) => Command::Reload,
        ("help", []) => Command::Help { topic: None },
        ("help", [topic]) => Command::Help {
            topic: Some(topic.to_string()),
        },
        (
            "run" | "scan" | "disconnect" | "on" | "off" | "status" | "watch" | "schedule" | "sun"
            | "colors" | "reload" | "help",
            extra,
        ) => {
            log_warning!("Unexpected arguments for {name}: {}", extra.join(" "));
            return None;
        }
        (unknown, _) => {
            log_warning!("Unknown command: {unknown}");
            return None;
        }
    };
    Some(command)
}

/// `schedule set <day|all> [--color C] [--on HH:MM] [--off HH:MM]
/// [--sunrise [MIN]] [--sunset [MIN]]`
fn parse_schedule_set(args: &[&str]) -> Option<Command> {
    let Some((selector, options)) = args.split_first() else {
        log_warning!("Missing day. Usage: luxlink schedule set <day|all> [options]");
        return None;
    };

    let days = if selector.eq_ignore_ascii_case("all") {
        WEEK.to_vec()
    } else {
        match parse_weekday(selector) {
            Some(day) => vec![day],
            None => {
                log_warning!("Unknown day: {selector}");
                return None;
            }
        }
    };

    let mut edit = ScheduleEdit::default();
    let mut i = 0;
    while i < options.len() {
        let value = options.get(i + 1).filter(|v| !v.starts_with("--"));
        match options[i] {
            "--color" | "--on" | "--off" => {
                let Some(value) = value else {
                    log_warning!("Missing value for {}", options[i]);
                    return None;
                };
                match options[i] {
                    "--color" => edit.color = Some(value.to_string()),
                    "--on" => edit.on = Some(Trigger::At(value.to_string())),
                    _ => edit.off = Some(Trigger::At(value.to_string())),
                }
                i += 2;
            }
            "--sunrise" | "--sunset" => {
                let offset = value.map(|v| v.to_string()).unwrap_or_default();
                let consumed = if value.is_some() { 2 } else { 1 };
                if options[i] == "--sunrise" {
                    edit.on = Some(Trigger::Sun(offset));
                } else {
                    edit.off = Some(Trigger::Sun(offset));
                }
                i += consumed;
            }
            other => {
                log_warning!("Unexpected argument for schedule set: {other}");
                return None;
            }
        }
    }

    if edit.is_empty() {
        log_warning!("Nothing to change. Give at least one of --color, --on, --off, --sunrise, --sunset");
        return None;
    }

    Some(Command::ScheduleSet { days, edit })
}
