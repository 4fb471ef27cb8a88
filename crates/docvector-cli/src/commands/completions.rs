//! `docvector completions`: emit a shell-completion script, matching the
//! teacher's own `clap_complete`-based `completions` subcommand.

use std::io;

use clap::{Arg, Command};
use clap_complete::Shell;

pub fn generate(shell: Shell) {
    let mut cmd = Command::new("docvector")
        .about("Self-hosted documentation search for AI agents")
        .subcommand(
            Command::new("source")
                .subcommand(Command::new("create").arg(Arg::new("name")).arg(Arg::new("start_url")))
                .subcommand(Command::new("list")),
        )
        .subcommand(
            Command::new("ingest")
                .arg(Arg::new("source"))
                .arg(Arg::new("max-pages").long("max-pages"))
                .arg(Arg::new("max-depth").long("max-depth")),
        )
        .subcommand(
            Command::new("search")
                .arg(Arg::new("query"))
                .arg(Arg::new("limit").long("limit"))
                .arg(Arg::new("no-rerank").long("no-rerank")),
        )
        .subcommand(Command::new("reconcile").arg(Arg::new("stale-after-mins").long("stale-after-mins")))
        .subcommand(Command::new("interactive"));

    clap_complete::generate(shell, &mut cmd, "docvector", &mut io::stdout());
}
