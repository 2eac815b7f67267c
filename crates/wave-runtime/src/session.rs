//! Line-oriented interactive session.

use std::io::{self, BufRead, Write};

use wave_host::CommandEngine;

use crate::output::format_result;

/// Lines that end the session.
pub const EXIT_COMMANDS: [&str; 3] = ["exitcli", "exit", "quit"];

const PROMPT: &str = "wave> ";

/// Reads command lines from `input` until EOF or an exit command,
/// writing formatted results to `output`. Returns the number of commands
/// executed.
pub fn run_session<R: BufRead, W: Write>(
    engine: &CommandEngine,
    input: R,
    mut output: W,
) -> io::Result<usize> {
    writeln!(output, "Wave interactive session. Type 'exitcli' to quit.")?;
    writeln!(output, "Type 'help' to list available commands.")?;

    let mut executed = 0;
    let mut lines = input.lines();
    loop {
        write!(output, "{PROMPT}")?;
        output.flush()?;

        let Some(line) = lines.next() else {
            writeln!(output)?;
            break;
        };
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if EXIT_COMMANDS.contains(&line) {
            break;
        }

        let result = engine.execute(line);
        tracing::debug!(command = line, status = %result.status, "Command executed");
        writeln!(output, "{}", format_result(&result))?;
        executed += 1;
    }

    writeln!(output, "Exiting interactive session.")?;
    Ok(executed)
}
