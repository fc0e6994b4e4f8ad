use std::collections::BTreeMap;

/// Source of environment variables consulted while preparing a submission.
pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

/// The current process environment.
pub struct ProcessEnv;

impl Env for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl Env for BTreeMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}
