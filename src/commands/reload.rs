//! Implementation of the reload command.

use anyhow::Result;

use crate::io::instance;

/// Validate the configuration and ask the running instance to re-read it.
pub fn handle_reload_command(debug_enabled: bool) -> Result<()> {
    log_version!();

    // Adopts the instance's config directory before loading
    let pid = instance::get_running_instance_pid();

    // Fail here with a clear message rather than in the instance's log
    let config = crate::config::Config::load()?;
    if debug_enabled {
        config.log_config();
    }

    match pid {
        Ok(pid) => {
            log_block_start!("Signaling duskbell to reload...");
            instance::send_reload_signal(pid)?;
            log_decorated!("Sent reload signal to duskbell (PID: {pid})");
        }
        Err(_) => {
            log_pipe!();
            log_warning!("duskbell is not running; nothing to reload");
        }
    }

    log_end!();
    Ok(())
}
