// src/engine/planner.rs

//! Turns a [`RunRequest`] into a concrete [`Invocation`].
//!
//! Argument vector layout: `<subcommand> [--message-format json] <configured
//! args> <request args>`. The subcommand comes first because the tool
//! rejects `--message-format` ahead of it.
//!
//! Verbs with a probe rule run the probe once per `(executable, probe args)`
//! and cache the answer. The cache lock is held across the probe, so
//! concurrent plans wait for the first answer instead of probing twice.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::exec::{CommandSpec, ProcessBackend};
use crate::host::ArgSource;
use crate::types::{ProbeRule, Verb};

use super::{Invocation, RunRequest};

/// Flag pair injected for verbs with structured output.
pub const MESSAGE_FORMAT_JSON: [&str; 2] = ["--message-format", "json"];

type ProbeKey = (String, Vec<String>);

pub struct InvocationPlanner {
    executable: String,
    args: Arc<dyn ArgSource>,
    probes: Mutex<HashMap<ProbeKey, bool>>,
}

impl std::fmt::Debug for InvocationPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationPlanner")
            .field("executable", &self.executable)
            .finish_non_exhaustive()
    }
}

impl InvocationPlanner {
    pub fn new(executable: impl Into<String>, args: Arc<dyn ArgSource>) -> Self {
        Self {
            executable: executable.into(),
            args,
            probes: Mutex::new(HashMap::new()),
        }
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// Plan `request` in `cwd`, probing the tool when the verb asks for it.
    pub async fn plan<B>(&self, backend: &B, request: &RunRequest, cwd: PathBuf) -> Invocation
    where
        B: ProcessBackend + ?Sized,
    {
        let subcommand = match request.verb.rule().probe {
            Some(probe) => {
                if self.probe(backend, &probe, &cwd).await {
                    request.verb.subcommand().to_string()
                } else {
                    info!(
                        verb = %request.verb,
                        fallback = probe.fallback,
                        "preferred subcommand unavailable; using fallback"
                    );
                    probe.fallback.to_string()
                }
            }
            None => request.verb.subcommand().to_string(),
        };
        self.build(request, &subcommand, cwd)
    }

    /// Plan without probing, always using the preferred subcommand.
    pub fn plan_unprobed(&self, request: &RunRequest, cwd: PathBuf) -> Invocation {
        self.build(request, request.verb.subcommand(), cwd)
    }

    async fn probe<B>(&self, backend: &B, probe: &ProbeRule, cwd: &Path) -> bool
    where
        B: ProcessBackend + ?Sized,
    {
        let args: Vec<String> = probe.args.iter().map(|a| a.to_string()).collect();
        let key = (self.executable.clone(), args.clone());

        let mut probes = self.probes.lock().await;
        if let Some(&supported) = probes.get(&key) {
            return supported;
        }

        let spec = CommandSpec::new(self.executable.clone(), args, cwd);
        let supported = backend.probe(spec).await;
        debug!(probe = ?key.1, supported, "probe result cached");
        probes.insert(key, supported);
        supported
    }

    fn build(&self, request: &RunRequest, subcommand: &str, cwd: PathBuf) -> Invocation {
        let rule = request.verb.rule();
        let configured = rule
            .arg_kind
            .map(|kind| self.args.args(kind))
            .unwrap_or_default();

        Invocation {
            verb: request.verb.clone(),
            spec: CommandSpec::new(
                self.executable.clone(),
                argument_vector(&request.verb, subcommand, &configured, &request.args),
                cwd,
            ),
            structured: rule.structured_output,
        }
    }
}

/// Full argument vector for `verb` run as `subcommand`.
pub fn argument_vector(
    verb: &Verb,
    subcommand: &str,
    configured: &[String],
    extra: &[String],
) -> Vec<String> {
    let mut args = vec![subcommand.to_string()];
    if verb.supports_structured_output() {
        args.extend(MESSAGE_FORMAT_JSON.iter().map(|s| s.to_string()));
    }
    args.extend(configured.iter().cloned());
    args.extend(extra.iter().cloned());
    args
}
