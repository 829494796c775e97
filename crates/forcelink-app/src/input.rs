//! Terminal input for the `emulate` device.
//!
//! One command per line on stdin:
//!
//! ```text
//! p <x> <y>   move the pointer to pixel (x, y)
//! c           centre the pointer
//! w / s       step depth in / out (repeat the letter to step further: "www")
//! b           toggle button 0
//! q           stop the loop
//! ```

use std::io::{self, BufRead};
use std::thread;

use tracing::{debug, warn};

use forcelink_native::bridge::HostInput;
use forcelink_native::control::StopHandle;

/// A parsed input line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputCommand {
    /// Pointer position in pixels
    Pointer(f64, f64),
    /// Pointer to screen centre
    Center,
    /// Depth steps (positive is towards the user)
    Depth(i64),
    /// Toggle button 0
    ToggleButton,
    /// Stop the loop
    Quit,
}

/// Parse one line. Blank or unknown lines yield `None`.
pub fn parse_command(line: &str) -> Option<InputCommand> {
    let mut parts = line.split_whitespace();
    let head = parts.next()?;

    let command = match head {
        "p" => {
            let x: f64 = parts.next()?.parse().ok()?;
            let y: f64 = parts.next()?.parse().ok()?;
            if !(x.is_finite() && y.is_finite()) {
                return None;
            }
            InputCommand::Pointer(x, y)
        }
        "c" => InputCommand::Center,
        "b" => InputCommand::ToggleButton,
        "q" => InputCommand::Quit,
        keys if keys.chars().all(|k| k == 'w') => InputCommand::Depth(step_count(keys)),
        keys if keys.chars().all(|k| k == 's') => InputCommand::Depth(-step_count(keys)),
        _ => return None,
    };

    parts.next().is_none().then_some(command)
}

fn step_count(keys: &str) -> i64 {
    i64::try_from(keys.len()).unwrap_or(i64::MAX)
}

/// Apply a command to the shared host input.
pub fn apply(command: InputCommand, input: &HostInput, stop: &StopHandle) {
    match command {
        InputCommand::Pointer(x, y) => input.set_pointer(x, y),
        InputCommand::Center => input.center_pointer(),
        InputCommand::Depth(steps) => input.step_z(steps),
        InputCommand::ToggleButton => input.toggle_button(0),
        InputCommand::Quit => stop.request_stop(),
    }
}

/// Read commands from stdin on a background thread until EOF or `q`.
///
/// # Errors
///
/// Returns an error if the thread cannot be spawned.
pub fn spawn_stdin_reader(input: HostInput, stop: StopHandle) -> io::Result<()> {
    thread::Builder::new()
        .name("forcelink-input".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match parse_command(&line) {
                    Some(command) => {
                        debug!(?command, "Host input");
                        apply(command, &input, &stop);
                        if command == InputCommand::Quit {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => warn!(line = %line, "Unrecognised input (p x y | c | w | s | b | q)"),
                }
            }
        })
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("p 100 200.5"), Some(InputCommand::Pointer(100.0, 200.5)));
        assert_eq!(parse_command("  c "), Some(InputCommand::Center));
        assert_eq!(parse_command("www"), Some(InputCommand::Depth(3)));
        assert_eq!(parse_command("s"), Some(InputCommand::Depth(-1)));
        assert_eq!(parse_command("b"), Some(InputCommand::ToggleButton));
        assert_eq!(parse_command("q"), Some(InputCommand::Quit));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("p 1"), None);
        assert_eq!(parse_command("p a b"), None);
        assert_eq!(parse_command("p nan 0"), None);
        assert_eq!(parse_command("p 0 inf"), None);
        assert_eq!(parse_command("ws"), None);
        assert_eq!(parse_command("c extra"), None);
        assert_eq!(parse_command("jump"), None);
    }
}
