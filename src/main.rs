use emfrp_bridge::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;
    use emfrp_bridge::cli::{BridgeCli, Command, log_target};
    use emfrp_bridge::utils::logger::LogTarget;
    use emfrp_bridge::{BridgeConfig, InputMode};

    #[test]
    fn tui_is_the_default_command() {
        let cli = BridgeCli::parse_from(["emfrp-bridge"]);
        assert_eq!(cli.command(), Command::Tui);
    }

    #[test]
    fn flags_override_the_config() {
        let cli = BridgeCli::parse_from([
            "emfrp-bridge",
            "repl",
            "--input-mode",
            "push",
            "--library",
            "build/libemfrp-repl.so",
        ]);
        assert_eq!(cli.command(), Command::Repl);
        let config = cli.resolve_config().expect("no config file");
        assert_eq!(config.input_mode, InputMode::Push);
        assert_eq!(config.library, Some(PathBuf::from("build/libemfrp-repl.so")));
    }

    #[test]
    fn terminal_ui_keeps_logs_off_the_screen() {
        let mut config = BridgeConfig::default();
        assert_eq!(log_target(Command::Tui, &config), LogTarget::Discard);
        assert_eq!(log_target(Command::Repl, &config), LogTarget::Stderr);

        config.log_file = Some(PathBuf::from("bridge.log"));
        let path = PathBuf::from("bridge.log");
        assert_eq!(log_target(Command::Tui, &config), LogTarget::File(&path));
    }
}
