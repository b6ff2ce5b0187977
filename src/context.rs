//! Process-wide, explicitly-passed context.
//!
//! The original this crate is modeled on reaches for process-global state:
//! a static password obfuscation key, `gethostname()` called wherever a
//! host name is needed. We replace both with fields on a [`ProcessContext`]
//! built once at startup and threaded through explicitly. Nothing in this
//! crate holds a singleton.

use std::sync::Arc;

/// Constructed once per process (typically in `main`), then cloned (it's an
/// `Arc` internally) into every `Job`, `Password`, and `Storage` that needs it.
#[derive(Clone)]
pub struct ProcessContext {
    inner: Arc<Inner>,
}

struct Inner {
    obfuscation_key: [u8; 32],
    host_name: String,
    log_target: &'static str,
}

impl ProcessContext {
    /// Build a fresh context: generates a new random obfuscation key and
    /// queries the host name once.
    pub fn new(log_target: &'static str) -> Self {
        let mut obfuscation_key = [0u8; 32];
        rand_bytes(&mut obfuscation_key);

        let host_name = query_host_name();

        Self {
            inner: Arc::new(Inner {
                obfuscation_key,
                host_name,
                log_target,
            }),
        }
    }

    /// Build a context with an explicit key and host name, for tests.
    #[cfg(test)]
    pub fn for_test(obfuscation_key: [u8; 32], host_name: String) -> Self {
        Self {
            inner: Arc::new(Inner {
                obfuscation_key,
                host_name,
                log_target: "test",
            }),
        }
    }

    pub fn obfuscation_key(&self) -> &[u8; 32] {
        &self.inner.obfuscation_key
    }

    pub fn host_name(&self) -> &str {
        &self.inner.host_name
    }

    pub fn log_target(&self) -> &'static str {
        self.inner.log_target
    }
}

fn rand_bytes(buf: &mut [u8]) {
    use rand::RngCore;
    rand::rngs::OsRng.fill_bytes(buf);
}

fn query_host_name() -> String {
    let mut buf = [0u8; 256];
    match nix::unistd::gethostname(&mut buf) {
        Ok(cstr) => cstr.to_string_lossy().into_owned(),
        Err(_) => String::from("localhost"),
    }
}
