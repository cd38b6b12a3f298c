//! Operator-facing rendering of commands and captured process output.

use crate::LOG_TARGET;

/// Render a command line the way a shell user would type it.
pub fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(quote)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode process output for logs; invalid UTF-8 is replaced, not rejected.
pub fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Log everything an operator needs to diagnose a failed tool run.
pub fn report_failure(command: &str, code: Option<i32>, stdout: &[u8], stderr: &[u8]) {
    log::error!(target: LOG_TARGET, "Error while executing: {}", command);
    match code {
        Some(c) => log::error!(target: LOG_TARGET, "Exit code: {}", c),
        None => log::error!(target: LOG_TARGET, "Terminated without an exit code"),
    }
    log::error!(target: LOG_TARGET, "Got stderr:\n{}", lossy(stderr));
    log::error!(target: LOG_TARGET, "Got stdout:\n{}", lossy(stdout));
}

fn quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,+".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
