use clap::CommandFactory;
use clap_complete::{generate, Shell};

use crate::Cli;

pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "taskdeck", &mut std::io::stdout());
}
