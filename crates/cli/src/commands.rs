//! Clap command tree definition.

use clap::{Arg, ArgAction, Command};

/// Build the `vellum-server` command.
pub fn build_cli() -> Command {
    Command::new("vellum-server")
        .about("Serve a Vellum object database over HTTP")
        .arg(
            Arg::new("db")
                .long("db")
                .help("Database path (default: vellum.db)"),
        )
        .arg(
            Arg::new("cache")
                .long("cache")
                .help("Ephemeral in-memory database, no disk")
                .action(ArgAction::SetTrue)
                .conflicts_with_all(["db", "config"]),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("SQLite settings file (TOML)")
                .conflicts_with("db"),
        )
        .arg(
            Arg::new("bind")
                .long("bind")
                .help("Listen address (default: 127.0.0.1:8000)")
                .default_value("127.0.0.1:8000"),
        )
        .arg(
            Arg::new("check-schema")
                .long("check-schema")
                .help("Reject writes of types without a registered schema")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log")
                .long("log")
                .help("Log filter, e.g. info or vellum=debug")
                .default_value("info"),
        )
}
