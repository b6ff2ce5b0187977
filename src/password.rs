//! In-memory password handling (C9).
//!
//! Plaintext should exist in memory as briefly as possible. A [`Password`]
//! never stores it directly: bytes are XOR-obfuscated against the
//! per-process key carried in [`ProcessContext`] the moment they're
//! accepted, and only rematerialized inside the scoped [`Password::deploy`]
//! region, which zeroes the plaintext buffer on every exit path (including
//! panics, via `Drop`).

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::context::ProcessContext;
use crate::error::{Classify, ErrorClass};

/// Maximum accepted password length, in bytes.
pub const MAX_PASSWORD_LENGTH: usize = 8192;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password too long ({len} bytes, maximum {MAX_PASSWORD_LENGTH})")]
    TooLong { len: usize },
    #[error("no password available within timeout")]
    NoPassword,
    #[error("ask-pass helper {program:?} failed: {detail}")]
    HelperFailed { program: String, detail: String },
    #[error("failed to read password from terminal: {0}")]
    Tty(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Classify for PasswordError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Lifecycle
    }
}

/// An obfuscated password. Equality is constant-time. Plaintext is only ever
/// visible inside a [`Deployed`] guard obtained from [`Password::deploy`].
pub struct Password {
    obfuscated: Vec<u8>,
    key: [u8; 32],
}

impl Password {
    /// Wrap raw bytes, obfuscating them immediately.
    pub fn from_bytes(ctx: &ProcessContext, bytes: &[u8]) -> Result<Self, PasswordError> {
        if bytes.len() > MAX_PASSWORD_LENGTH {
            return Err(PasswordError::TooLong { len: bytes.len() });
        }
        let key = *ctx.obfuscation_key();
        let obfuscated = xor_with_key(bytes, &key);
        Ok(Self { obfuscated, key })
    }

    pub fn from_string(ctx: &ProcessContext, s: &str) -> Result<Self, PasswordError> {
        Self::from_bytes(ctx, s.as_bytes())
    }

    /// Read a password from the controlling terminal with echo disabled.
    /// TTY settings are restored on every exit path, including errors.
    pub fn from_tty(ctx: &ProcessContext, prompt: &str) -> Result<Self, PasswordError> {
        use std::io::Write;
        use termios_guard::EchoGuard;

        eprint!("{}", prompt);
        std::io::stderr().flush().ok();

        let guard = EchoGuard::disable_echo().map_err(|e| PasswordError::Tty(e))?;
        let mut line = String::new();
        let result = std::io::stdin().read_line(&mut line);
        drop(guard); // restores echo even if read_line failed

        eprintln!();

        result.map_err(PasswordError::Io)?;

        let trimmed = line.trim_end_matches(|c| c == '\n' || c == '\r');
        Self::from_string(ctx, trimmed)
    }

    /// Run a configured ask-password helper program and use its first line
    /// of stdout, with an overall timeout.
    pub fn from_ask_pass_helper(
        ctx: &ProcessContext,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<Self, PasswordError> {
        let start = Instant::now();

        let mut child = Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PasswordError::HelperFailed {
                program: program.to_string(),
                detail: e.to_string(),
            })?;

        // Poll for exit so we can honor the timeout without blocking forever
        // on a misbehaving helper.
        loop {
            match child.try_wait() {
                Ok(Some(_status)) => break,
                Ok(None) => {
                    if start.elapsed() >= timeout {
                        let _ = child.kill();
                        return Err(PasswordError::NoPassword);
                    }
                    std::thread::sleep(Duration::from_millis(20));
                }
                Err(e) => {
                    return Err(PasswordError::HelperFailed {
                        program: program.to_string(),
                        detail: e.to_string(),
                    })
                }
            }
        }

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| PasswordError::HelperFailed {
                program: program.to_string(),
                detail: "no stdout".to_string(),
            })?;
        let mut output = String::new();
        stdout.read_to_string(&mut output)?;

        let first_line = output.lines().next().unwrap_or("");
        Self::from_string(ctx, first_line)
    }

    /// Materialize the plaintext for the duration of the returned guard.
    /// The guard zeroes its buffer when dropped (scope end, early return, or
    /// panic unwind).
    pub fn deploy(&self) -> Deployed<'_> {
        let plaintext = xor_with_key(&self.obfuscated, &self.key);
        Deployed {
            plaintext,
            _owner: self,
        }
    }

    pub fn len(&self) -> usize {
        self.obfuscated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obfuscated.is_empty()
    }
}

impl PartialEq for Password {
    fn eq(&self, other: &Self) -> bool {
        if self.obfuscated.len() != other.obfuscated.len() {
            return false;
        }
        let a = self.deploy();
        let b = other.deploy();
        constant_time_eq(&a.plaintext, &b.plaintext)
    }
}

impl Eq for Password {}

impl Drop for Password {
    fn drop(&mut self) {
        for b in self.obfuscated.iter_mut() {
            *b = 0;
        }
    }
}

/// RAII guard exposing the plaintext password. Zeroed on drop.
pub struct Deployed<'a> {
    plaintext: Vec<u8>,
    _owner: &'a Password,
}

impl<'a> Deployed<'a> {
    pub fn as_bytes(&self) -> &[u8] {
        &self.plaintext
    }
}

impl<'a> Drop for Deployed<'a> {
    fn drop(&mut self) {
        for b in self.plaintext.iter_mut() {
            *b = 0;
        }
    }
}

fn xor_with_key(data: &[u8], key: &[u8; 32]) -> Vec<u8> {
    data.iter()
        .enumerate()
        .map(|(i, b)| b ^ key[i % key.len()])
        .collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Scoped terminal-echo control, isolated so [`Password::from_tty`] reads
/// cleanly. Restores the original `termios` settings on drop regardless of
/// how the guarded region exits.
mod termios_guard {
    use nix::sys::termios::{self, LocalFlags, SetArg, Termios};
    use std::os::unix::io::AsRawFd;

    pub struct EchoGuard {
        original: Termios,
        fd: i32,
    }

    impl EchoGuard {
        pub fn disable_echo() -> Result<Self, String> {
            let stdin = std::io::stdin();
            let fd = stdin.as_raw_fd();
            let original = termios::tcgetattr(fd).map_err(|e| e.to_string())?;
            let mut noecho = original.clone();
            noecho.local_flags.remove(LocalFlags::ECHO);
            termios::tcsetattr(fd, SetArg::TCSANOW, &noecho).map_err(|e| e.to_string())?;
            Ok(Self { original, fd })
        }
    }

    impl Drop for EchoGuard {
        fn drop(&mut self) {
            let _ = termios::tcsetattr(self.fd, SetArg::TCSANOW, &self.original);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ProcessContext {
        ProcessContext::for_test([7u8; 32], "test-host".to_string())
    }

    #[test]
    fn obfuscated_bytes_are_not_plaintext() {
        let ctx = ctx();
        let pw = Password::from_string(&ctx, "hunter2").unwrap();
        assert_ne!(pw.obfuscated, b"hunter2".to_vec());
    }

    #[test]
    fn deploy_recovers_plaintext() {
        let ctx = ctx();
        let pw = Password::from_string(&ctx, "hunter2").unwrap();
        let deployed = pw.deploy();
        assert_eq!(deployed.as_bytes(), b"hunter2");
    }

    #[test]
    fn equality_is_content_based() {
        let ctx = ctx();
        let a = Password::from_string(&ctx, "same").unwrap();
        let b = Password::from_string(&ctx, "same").unwrap();
        let c = Password::from_string(&ctx, "different").unwrap();
        assert!(a == b);
        assert!(a != c);
    }

    #[test]
    fn rejects_too_long() {
        let ctx = ctx();
        let huge = vec![b'x'; MAX_PASSWORD_LENGTH + 1];
        assert!(matches!(
            Password::from_bytes(&ctx, &huge),
            Err(PasswordError::TooLong { .. })
        ));
    }
}
