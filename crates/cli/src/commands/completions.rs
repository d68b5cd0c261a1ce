//! completions command - Print a shell completion script

use clap::{Args, Command};
use clap_complete::{Shell, generate};

use crate::exit_code::ExitCode;

/// Generate shell completions
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Write the completion script for `cmd` to stdout
pub fn execute(args: CompletionsArgs, mut cmd: Command) -> ExitCode {
    let name = cmd.get_name().to_string();
    generate(args.shell, &mut cmd, name, &mut std::io::stdout());
    ExitCode::Success
}
