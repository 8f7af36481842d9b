//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! In-memory [`Shell`], [`RemoteHost`] and [`HostFactory`] implementations
//! used by the test suites of the workspace crates.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::Error;
use crate::host::{HostFactory, ModuleArgs, ModuleResult, RemoteHost};
use crate::shell::{CmdOutput, RunOpts, Shell};

type ShellResponder = Box<dyn Fn(&str) -> CmdOutput + Send + Sync>;
type ModuleResponder =
    Box<dyn Fn(&str, &ModuleArgs) -> ModuleResult + Send + Sync>;

/// Shell that records every command and answers from a responder closure.
pub struct FakeShell {
    dry_run: bool,
    commands: Mutex<Vec<String>>,
    responder: ShellResponder,
}

/// Remote host that records every module call.
pub struct FakeHost {
    name: String,
    vars: HashMap<String, String>,
    calls: Mutex<Vec<(String, ModuleArgs)>>,
    responder: ModuleResponder,
}

#[derive(Debug, Default)]
pub struct FakeHostFactory {
    hosts: HashMap<String, Arc<FakeHost>>,
    connects: AtomicUsize,
}

// ===== impl FakeShell =====

impl FakeShell {
    pub fn new() -> FakeShell {
        FakeShell::with_responder(|_| CmdOutput::default())
    }

    pub fn with_responder<F>(responder: F) -> FakeShell
    where
        F: Fn(&str) -> CmdOutput + Send + Sync + 'static,
    {
        FakeShell {
            dry_run: false,
            commands: Default::default(),
            responder: Box::new(responder),
        }
    }

    // Returns a shell that fails every command containing `pattern`.
    pub fn failing(pattern: &'static str) -> FakeShell {
        FakeShell::with_responder(move |cmd| CmdOutput {
            rc: if cmd.contains(pattern) { 1 } else { 0 },
            stdout: String::new(),
        })
    }

    pub fn dry(mut self) -> FakeShell {
        self.dry_run = true;
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    // Number of recorded commands containing `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|cmd| cmd.contains(pattern))
            .count()
    }
}

impl Default for FakeShell {
    fn default() -> FakeShell {
        FakeShell::new()
    }
}

impl std::fmt::Debug for FakeShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeShell")
            .field("dry_run", &self.dry_run)
            .field("commands", &self.commands)
            .finish()
    }
}

#[async_trait]
impl Shell for FakeShell {
    async fn run(&self, cmd: &str, opts: RunOpts) -> Result<CmdOutput, Error> {
        if self.dry_run && !opts.force_running {
            return Ok(CmdOutput::default());
        }
        self.commands.lock().unwrap().push(cmd.to_owned());
        Ok((self.responder)(cmd))
    }

    fn dry_run(&self) -> bool {
        self.dry_run
    }
}

// ===== impl FakeHost =====

impl FakeHost {
    pub fn new(name: &str) -> FakeHost {
        FakeHost {
            name: name.to_owned(),
            vars: Default::default(),
            calls: Default::default(),
            responder: Box::new(|_, _| ModuleResult::default()),
        }
    }

    pub fn with_var(mut self, name: &str, value: &str) -> FakeHost {
        self.vars.insert(name.to_owned(), value.to_owned());
        self
    }

    pub fn with_responder<F>(mut self, responder: F) -> FakeHost
    where
        F: Fn(&str, &ModuleArgs) -> ModuleResult + Send + Sync + 'static,
    {
        self.responder = Box::new(responder);
        self
    }

    pub fn calls(&self) -> Vec<(String, ModuleArgs)> {
        self.calls.lock().unwrap().clone()
    }

    // Commands passed to the `shell` module, in call order.
    pub fn shell_commands(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(module, _)| module == "shell")
            .filter_map(|(_, args)| args.as_free_form().map(str::to_owned))
            .collect()
    }
}

impl std::fmt::Debug for FakeHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeHost")
            .field("name", &self.name)
            .field("vars", &self.vars)
            .finish()
    }
}

#[async_trait]
impl RemoteHost for FakeHost {
    fn name(&self) -> &str {
        &self.name
    }

    async fn module(
        &self,
        module: &str,
        args: ModuleArgs,
    ) -> Result<ModuleResult, Error> {
        let result = (self.responder)(module, &args);
        self.calls.lock().unwrap().push((module.to_owned(), args));
        Ok(result)
    }

    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

// ===== impl FakeHostFactory =====

impl FakeHostFactory {
    pub fn add(&mut self, host: Arc<FakeHost>) {
        self.hosts.insert(host.name.clone(), host);
    }

    pub fn with_host(mut self, host: Arc<FakeHost>) -> FakeHostFactory {
        self.add(host);
        self
    }

    // Number of handles constructed so far.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl HostFactory for FakeHostFactory {
    async fn connect(
        &self,
        pattern: &str,
    ) -> Result<Arc<dyn RemoteHost>, Error> {
        let host = self
            .hosts
            .get(pattern)
            .ok_or_else(|| Error::HostNotFound(pattern.to_owned()))?;
        self.connects.fetch_add(1, Ordering::Relaxed);
        Ok(host.clone())
    }
}
