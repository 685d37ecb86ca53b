use std::io::{BufRead, Write};

use tracing::{info, warn};

use crate::config::RunSettings;
use crate::constants::confirmation::{ACCEPT, PROMPT};
use crate::error::{RunError, RunResult};

/// Only a person at a terminal gets asked; jobs and sandbox runs skip it.
pub fn gate_required(settings: &RunSettings) -> bool {
    !settings.sandbox && !settings.job
}

/// Prompts once and accepts exactly `Y`. Anything else, including a read
/// failure or end of input, declines.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> RunResult<()> {
    if write!(output, "{}", PROMPT).and_then(|_| output.flush()).is_err() {
        warn!("[CONFIRM] Could not write prompt");
    }

    let mut line = String::new();
    if let Err(e) = input.read_line(&mut line) {
        warn!("[CONFIRM] Could not read confirmation: {}", e);
        return Err(RunError::ConfirmationDeclined);
    }

    if line.trim_end_matches(['\r', '\n']) == ACCEPT {
        Ok(())
    } else {
        info!("[CONFIRM] Exiting without submitting order.");
        Err(RunError::ConfirmationDeclined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn answer(text: &str) -> (RunResult<()>, String) {
        let mut input = Cursor::new(text.as_bytes().to_vec());
        let mut output = Vec::new();
        let result = confirm(&mut input, &mut output);
        (result, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_accepts_exact_y() {
        let (result, prompt) = answer("Y\n");
        assert!(result.is_ok());
        assert_eq!(prompt, PROMPT);

        assert!(answer("Y\r\n").0.is_ok());
        assert!(answer("Y").0.is_ok());
    }

    #[test]
    fn test_declines_everything_else() {
        for text in ["y\n", "yes\n", "N\n", "\n", "", " Y\n", "YY\n"] {
            assert!(
                matches!(answer(text).0, Err(RunError::ConfirmationDeclined)),
                "input {:?} should decline",
                text
            );
        }
    }

    #[test]
    fn test_gate_required_only_interactive() {
        let mut settings = RunSettings::default();
        assert!(gate_required(&settings));

        settings.job = true;
        assert!(!gate_required(&settings));

        settings.job = false;
        settings.sandbox = true;
        assert!(!gate_required(&settings));
    }
}
