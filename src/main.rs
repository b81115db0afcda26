//! Command-line entry point: parse arguments and dispatch.

use anyhow::Result;

use duskbell::Duskbell;
use duskbell::args::{self, CliAction, ParsedArgs};
use duskbell::commands;
use duskbell::common::constants::EXIT_FAILURE;
use duskbell::log_error_exit;

fn main() {
    if let Err(e) = run() {
        log_error_exit!("{e}");
        for cause in e.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
        std::process::exit(EXIT_FAILURE);
    }
}

fn run() -> Result<()> {
    match ParsedArgs::from_env().action {
        CliAction::ShowVersion => {
            args::display_version_info();
            Ok(())
        }
        CliAction::ShowHelp | CliAction::ShowHelpDueToError => {
            args::display_help();
            Ok(())
        }
        CliAction::Run {
            debug_enabled,
            config_dir,
        } => {
            use_config_dir(config_dir)?;
            duskbell::log_version!();
            Duskbell::new(debug_enabled).run()
        }
        CliAction::ReloadCommand {
            debug_enabled,
            config_dir,
        } => {
            use_config_dir(config_dir)?;
            commands::reload::handle_reload_command(debug_enabled)
        }
        CliAction::TestCommand {
            debug_enabled,
            stop,
            config_dir,
        } => {
            use_config_dir(config_dir)?;
            commands::test::handle_test_command(stop, debug_enabled)
        }
        CliAction::Simulate {
            debug_enabled,
            start_time,
            end_time,
            multiplier,
            log_to_file,
            config_dir,
        } => {
            use_config_dir(config_dir)?;
            let mut guards = commands::simulate::handle_simulate_command(
                &start_time,
                &end_time,
                multiplier,
                debug_enabled,
                log_to_file,
            )?;
            let result = Duskbell::new(debug_enabled)
                .without_lock()
                .with_silent_audio()
                .run();
            if result.is_ok() {
                guards.complete_simulation();
            }
            result
        }
    }
}

// Left unset without --config so a follow-up command can adopt the running
// instance's directory from the lock file.
fn use_config_dir(config_dir: Option<String>) -> Result<()> {
    match config_dir {
        Some(dir) => duskbell::config::set_config_dir(Some(dir)),
        None => Ok(()),
    }
}
