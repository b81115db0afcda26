//! Command-line argument parsing and processing.
//!
//! Arguments are parsed by hand: global flags (`--debug`, `--config <dir>`,
//! `--help`, `--version`) may appear anywhere, and the first positional
//! argument names the command.

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the watcher in the foreground
    Run {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Ask the running instance to reload its configuration
    ReloadCommand {
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Ask the running instance to fire a session now, or stop the running one
    TestCommand {
        debug_enabled: bool,
        stop: bool,
        config_dir: Option<String>,
    },
    /// Run against a simulated clock
    Simulate {
        debug_enabled: bool,
        start_time: String,
        end_time: String,
        /// Negative: default pace. Zero: fast-forward.
        multiplier: f64,
        log_to_file: bool,
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

// Rough shape check; full parsing happens when the simulation starts
fn looks_like_datetime(s: &str) -> bool {
    s.len() == 19
        && s.chars().nth(4) == Some('-')
        && s.chars().nth(7) == Some('-')
        && s.chars().nth(10) == Some(' ')
        && s.chars().nth(13) == Some(':')
        && s.chars().nth(16) == Some(':')
}

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// `args` includes the program name, as `std::env::args()` does.
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
        let mut stop = false;
        let mut fast_forward = false;
        let mut log_to_file = false;
        let mut unknown_arg_found = false;
        let mut positional: Vec<String> = Vec::new();

        let mut i = 0;
        while i < args_vec.len() {
            let arg = &args_vec[i];
            match arg.as_str() {
                "--help" | "-h" => display_help = true,
                "--version" | "-V" | "-v" => display_version = true,
                "--debug" | "-d" => debug_enabled = true,
                "--stop" => stop = true,
                "--fast-forward" => fast_forward = true,
                "--log" => log_to_file = true,
                "--config" | "-c" => {
                    if i + 1 < args_vec.len() && !args_vec[i + 1].starts_with('-') {
                        config_dir = Some(args_vec[i + 1].clone());
                        i += 1;
                    } else {
                        log_warning!("Missing directory for --config. Usage: --config <directory>");
                        unknown_arg_found = true;
                    }
                }
                _ if arg.starts_with('-') && arg.parse::<f64>().is_err() => {
                    log_warning!("Unknown option: {arg}");
                    unknown_arg_found = true;
                }
                _ => positional.push(arg.clone()),
            }
            i += 1;
        }

        if display_version {
            return ParsedArgs {
                action: CliAction::ShowVersion,
            };
        }
        if unknown_arg_found {
            return ParsedArgs {
                action: CliAction::ShowHelpDueToError,
            };
        }
        if display_help {
            return ParsedArgs {
                action: CliAction::ShowHelp,
            };
        }

        let command = positional.first().map(String::as_str);
        let rest = positional.get(1..).unwrap_or_default();

        // Flags that only make sense for one command
        let stray_flag = match command {
            Some("test" | "t") => fast_forward || log_to_file,
            Some("simulate" | "S") => stop,
            _ => stop || fast_forward || log_to_file,
        };
        if stray_flag {
            log_warning!("Option not valid for this command");
            return ParsedArgs {
                action: CliAction::ShowHelpDueToError,
            };
        }

        let action = match command {
            None => CliAction::Run {
                debug_enabled,
                config_dir,
            },
            Some("reload" | "r") if rest.is_empty() => CliAction::ReloadCommand {
                debug_enabled,
                config_dir,
            },
            Some("test" | "t") if rest.is_empty() => CliAction::TestCommand {
                debug_enabled,
                stop,
                config_dir,
            },
            Some("help") if rest.is_empty() => CliAction::ShowHelp,
            Some("simulate" | "S") => {
                Self::parse_simulate(rest, fast_forward, log_to_file, debug_enabled, config_dir)
            }
            Some(command @ ("reload" | "r" | "test" | "t" | "help")) => {
                log_warning!("'{command}' takes no arguments");
                CliAction::ShowHelpDueToError
            }
            Some(other) => {
                log_warning!("Unknown command: {other}");
                CliAction::ShowHelpDueToError
            }
        };

        ParsedArgs { action }
    }

    fn parse_simulate(
        rest: &[String],
        fast_forward: bool,
        log_to_file: bool,
        debug_enabled: bool,
        config_dir: Option<String>,
    ) -> CliAction {
        let usage = "Usage: duskbell simulate \"YYYY-MM-DD HH:MM:SS\" \"YYYY-MM-DD HH:MM:SS\" [multiplier | --fast-forward] [--log]";

        let (start, end, multiplier) = match rest {
            [start, end] => (start, end, None),
            [start, end, multiplier] => (start, end, Some(multiplier)),
            _ => {
                log_warning!("Wrong number of arguments for simulate. {usage}");
                return CliAction::ShowHelpDueToError;
            }
        };

        for (what, value) in [("start", start), ("end", end)] {
            if !looks_like_datetime(value) {
                log_error!("Invalid {what} time format: '{value}'. Use YYYY-MM-DD HH:MM:SS");
                return CliAction::ShowHelpDueToError;
            }
        }

        let multiplier = match (multiplier, fast_forward) {
            (Some(_), true) => {
                log_error!("Use either a multiplier or --fast-forward, not both");
                return CliAction::ShowHelpDueToError;
            }
            (None, true) => 0.0,
            (None, false) => -1.0,
            (Some(text), false) => match text.parse::<f64>() {
                Ok(mult) if (0.1..=3600.0).contains(&mult) => mult,
                _ => {
                    log_error!("Invalid multiplier: {text}. Must be between 0.1 and 3600.");
                    return CliAction::ShowHelpDueToError;
                }
            },
        };

        CliAction::Simulate {
            debug_enabled,
            start_time: start.clone(),
            end_time: end.clone(),
            multiplier,
            log_to_file,
            config_dir,
        }
    }

    /// Convenience method to parse from std::env::args()
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    log_version!();
    log_pipe!();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("duskbell [OPTIONS] [COMMAND]");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>     Use custom configuration directory");
    log_indented!("-d, --debug            Enable detailed debug output");
    log_indented!("-h, --help             Print help information");
    log_indented!("-V, --version          Print version information");
    log_block_start!("Commands:");
    log_indented!("help                   Print this help");
    log_indented!("reload, r              Reload the running instance's configuration");
    log_indented!("test, t [--stop]       Fire a session now (or stop the running one)");
    log_indented!("simulate, S <start> <end> [multiplier | --fast-forward] [--log]");
    log_indented!("                       Run against a simulated clock with silent audio");
    log_end!();
}
