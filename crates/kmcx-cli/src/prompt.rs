//! Terminal prompts for host trust, passwords and keyboard-interactive
//! challenges. Prompts are written to stderr so stdout stays clean.

use colored::Colorize;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use kmcx_client::{InteractivePrompter, KeyboardPrompt, TrustDecision, TrustPrompt};
use std::io::{self, IsTerminal, Write};

fn interactive() -> bool {
    io::stdin().is_terminal() && io::stderr().is_terminal()
}

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Reads a line without echoing it.
pub fn read_secret(prompt: &str) -> io::Result<String> {
    let mut stderr = io::stderr();
    write!(stderr, "{}", prompt)?;
    stderr.flush()?;

    let mut secret = String::new();
    {
        let _guard = RawModeGuard::enter()?;
        loop {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Enter => break,
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Err(io::Error::new(io::ErrorKind::Interrupted, "prompt canceled"));
                }
                KeyCode::Esc => {
                    return Err(io::Error::new(io::ErrorKind::Interrupted, "prompt canceled"));
                }
                KeyCode::Backspace => {
                    secret.pop();
                }
                KeyCode::Char(c) => secret.push(c),
                _ => {}
            }
        }
    }
    writeln!(stderr)?;
    Ok(secret)
}

pub fn read_line(prompt: &str) -> io::Result<String> {
    let mut stderr = io::stderr();
    write!(stderr, "{}", prompt)?;
    stderr.flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

fn parse_yes_no(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" | "" => Some(false),
        _ => None,
    }
}

fn confirm(prompt: &str) -> io::Result<bool> {
    loop {
        if let Some(answer) = parse_yes_no(&read_line(prompt)?) {
            return Ok(answer);
        }
        eprintln!("Please answer 'yes' or 'no'.");
    }
}

/// Reads the SSH password when the terminal allows it.
pub fn ask_password(user: &str, host: &str) -> Option<String> {
    if !interactive() {
        return None;
    }
    match read_secret(&format!("Password for {}@{}: ", user, host)) {
        Ok(password) => Some(password),
        Err(e) => {
            tracing::warn!("Password prompt failed: {}", e);
            None
        }
    }
}

#[derive(Debug, Default)]
pub struct TerminalTrustPrompt;

impl TrustPrompt for TerminalTrustPrompt {
    fn confirm(&self, host: &str, port: u16, fingerprint: &str, previous: Option<&str>) -> TrustDecision {
        if !interactive() {
            eprintln!(
                "{}",
                format!(
                    "[ERROR] The host key of {}:{} is not trusted and no terminal is available to confirm it. Use --accept-new-host for a first connection.",
                    host, port
                )
                .red()
            );
            return TrustDecision::Reject;
        }

        eprintln!();
        match previous {
            Some(previous) => {
                eprintln!(
                    "{}",
                    format!("WARNING: the host key of {}:{} has changed!", host, port)
                        .red()
                        .bold()
                );
                eprintln!("  pinned:   {}", previous);
                eprintln!("  received: {}", fingerprint.yellow());
            }
            None => {
                eprintln!("The authenticity of host {}:{} can't be established.", host, port);
                eprintln!("  fingerprint: {}", fingerprint.yellow());
            }
        }

        match confirm("Trust this host key and remember it? [y/N] ") {
            Ok(true) => TrustDecision::Accept,
            Ok(false) => TrustDecision::Reject,
            Err(e) => {
                tracing::warn!("Trust prompt failed: {}", e);
                TrustDecision::Reject
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl InteractivePrompter for TerminalPrompter {
    fn respond(&self, name: &str, instructions: &str, prompts: &[KeyboardPrompt]) -> Option<Vec<String>> {
        if !interactive() {
            return None;
        }
        eprintln!();
        if !name.is_empty() {
            eprintln!("{}", name.bold());
        }
        if !instructions.is_empty() {
            eprintln!("{}", instructions);
        }

        let mut answers = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            let answer = if prompt.echo {
                read_line(&prompt.text)
            } else {
                read_secret(&prompt.text)
            };
            match answer {
                Ok(answer) => answers.push(answer),
                Err(e) => {
                    tracing::warn!("Keyboard-interactive prompt failed: {}", e);
                    return None;
                }
            }
        }
        Some(answers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yes_no() {
        assert_eq!(parse_yes_no("Y"), Some(true));
        assert_eq!(parse_yes_no(" yes \n"), Some(true));
        assert_eq!(parse_yes_no(""), Some(false));
        assert_eq!(parse_yes_no("no"), Some(false));
        assert_eq!(parse_yes_no("maybe"), None);
    }
}
