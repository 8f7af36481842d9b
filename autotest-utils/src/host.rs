//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use derive_new::new;
use serde::Deserialize;
use serde_json::Value;
use tracing::{Instrument, debug, debug_span, error};

use crate::error::Error;
use crate::shell::{RunOpts, Shell, quote};

/// Arguments passed to a remote module.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ModuleArgs {
    None,
    FreeForm(String),
    Map(BTreeMap<String, Value>),
}

/// Outcome of a single remote module invocation.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ModuleResult {
    pub rc: i32,
    pub stdout: String,
    pub stderr: String,
    pub msg: Value,
    pub failed: bool,
    pub unreachable: bool,
    pub stat: Option<ModuleStat>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ModuleStat {
    pub exists: bool,
}

/// Remote-command handle scoped to a single inventory host.
///
/// Implementors only need to provide [`RemoteHost::module`] and
/// [`RemoteHost::var`]; everything else is expressed in terms of those.
#[async_trait]
pub trait RemoteHost: Send + Sync + std::fmt::Debug {
    // Inventory name of the host.
    fn name(&self) -> &str;

    // Runs a module against the host.
    async fn module(
        &self,
        module: &str,
        args: ModuleArgs,
    ) -> Result<ModuleResult, Error>;

    // Returns the value of an inventory variable, if defined.
    fn var(&self, name: &str) -> Option<String>;

    async fn shell(&self, cmd: &str) -> Result<ModuleResult, Error> {
        self.module("shell", ModuleArgs::FreeForm(cmd.to_owned()))
            .await
    }

    // Runs a shell command, turning a module failure into an error.
    async fn shell_checked(&self, cmd: &str) -> Result<ModuleResult, Error> {
        let res = self.shell(cmd).await?;
        if res.is_failed() {
            return Err(Error::ModuleFailed(
                self.name().to_owned(),
                "shell".to_owned(),
                res.message(),
            ));
        }
        Ok(res)
    }

    async fn ping(&self) -> Result<ModuleResult, Error> {
        self.module("ping", ModuleArgs::None).await
    }

    async fn replace(
        &self,
        dest: &str,
        regexp: &str,
        replace: &str,
    ) -> Result<ModuleResult, Error> {
        let args = ModuleArgs::map([
            ("dest", dest),
            ("regexp", regexp),
            ("replace", replace),
        ]);
        self.module("replace", args).await
    }

    async fn lineinfile(
        &self,
        dest: &str,
        regexp: &str,
        line: &str,
    ) -> Result<ModuleResult, Error> {
        let args = ModuleArgs::map([
            ("dest", dest),
            ("regexp", regexp),
            ("line", line),
            ("backrefs", "yes"),
        ]);
        self.module("lineinfile", args).await
    }

    async fn stat_exists(&self, path: &str) -> Result<bool, Error> {
        let res = self
            .module("stat", ModuleArgs::map([("path", path)]))
            .await?;
        Ok(res.stat.is_some_and(|stat| stat.exists))
    }

    async fn copy_content(
        &self,
        content: &str,
        dest: &str,
    ) -> Result<ModuleResult, Error> {
        let args = ModuleArgs::map([("content", content), ("dest", dest)]);
        self.module("copy", args).await
    }
}

/// Constructs remote host handles on behalf of a [`HostRegistry`].
#[async_trait]
pub trait HostFactory: Send + Sync + std::fmt::Debug {
    async fn connect(
        &self,
        pattern: &str,
    ) -> Result<Arc<dyn RemoteHost>, Error>;
}

/// Memoizing registry of remote host handles, keyed by host pattern.
#[derive(Debug)]
pub struct HostRegistry {
    factory: Box<dyn HostFactory>,
    hosts: Mutex<HashMap<String, Arc<dyn RemoteHost>>>,
}

/// Ansible-backed [`RemoteHost`].
///
/// Modules are executed as ad-hoc `ansible` commands with the JSON stdout
/// callback, so that per-host results can be parsed back.
#[derive(Debug)]
pub struct AnsibleHost {
    name: String,
    inventory: String,
    shell: Arc<dyn Shell>,
    vars: serde_json::Map<String, Value>,
}

#[derive(Debug, new)]
pub struct AnsibleHostFactory {
    inventory: String,
    shell: Arc<dyn Shell>,
}

// Output of the ansible JSON stdout callback.
#[derive(Debug, Deserialize)]
struct AdhocOutput {
    plays: Vec<AdhocPlay>,
}

#[derive(Debug, Deserialize)]
struct AdhocPlay {
    tasks: Vec<AdhocTask>,
}

#[derive(Debug, Deserialize)]
struct AdhocTask {
    hosts: BTreeMap<String, ModuleResult>,
}

// ===== impl ModuleArgs =====

impl ModuleArgs {
    pub fn map<'a, I>(args: I) -> ModuleArgs
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        ModuleArgs::Map(
            args.into_iter()
                .map(|(key, value)| (key.to_owned(), Value::from(value)))
                .collect(),
        )
    }

    pub fn as_free_form(&self) -> Option<&str> {
        match self {
            ModuleArgs::FreeForm(args) => Some(args),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        match self {
            ModuleArgs::Map(args) => args.get(key).and_then(Value::as_str),
            _ => None,
        }
    }

    // Renders the arguments as expected by `ansible -a`.
    fn render(&self) -> Option<String> {
        match self {
            ModuleArgs::None => None,
            ModuleArgs::FreeForm(args) => Some(args.clone()),
            ModuleArgs::Map(args) => {
                Some(Value::from_iter(args.clone()).to_string())
            }
        }
    }
}

// ===== impl ModuleResult =====

impl ModuleResult {
    pub fn is_failed(&self) -> bool {
        self.failed || self.unreachable || self.rc != 0
    }

    pub fn message(&self) -> String {
        match &self.msg {
            Value::Null if !self.stderr.is_empty() => self.stderr.clone(),
            Value::Null => format!("rc {}", self.rc),
            Value::String(msg) => msg.clone(),
            msg => msg.to_string(),
        }
    }
}

// ===== impl HostRegistry =====

impl HostRegistry {
    pub fn new(factory: impl HostFactory + 'static) -> HostRegistry {
        HostRegistry {
            factory: Box::new(factory),
            hosts: Default::default(),
        }
    }

    /// Returns the handle for the given host pattern, creating it on first
    /// access.
    pub async fn get(
        &self,
        pattern: &str,
    ) -> Result<Arc<dyn RemoteHost>, Error> {
        let cached = self.hosts.lock().unwrap().get(pattern).cloned();
        if let Some(host) = cached {
            return Ok(host);
        }

        let host = self.factory.connect(pattern).await.inspect_err(|_| {
            error!(host = %pattern, "ansible host not found");
        })?;
        self.hosts
            .lock()
            .unwrap()
            .insert(pattern.to_owned(), host.clone());

        Ok(host)
    }

    /// Looks up an inventory variable of the given host.
    pub async fn var(
        &self,
        pattern: &str,
        var: &str,
    ) -> Result<Option<String>, Error> {
        let host = self.get(pattern).await?;
        Ok(host.var(var))
    }
}

// ===== impl HostFactory =====

#[async_trait]
impl<T: HostFactory> HostFactory for Arc<T> {
    async fn connect(
        &self,
        pattern: &str,
    ) -> Result<Arc<dyn RemoteHost>, Error> {
        self.as_ref().connect(pattern).await
    }
}

// ===== impl AnsibleHost =====

impl AnsibleHost {
    pub async fn connect(
        name: &str,
        inventory: &str,
        shell: Arc<dyn Shell>,
    ) -> Result<AnsibleHost, Error> {
        // Inventory lookups are read-only and always executed.
        let cmd = format!(
            "ansible-inventory -i {} --host {} 2>/dev/null",
            quote(inventory),
            quote(name)
        );
        let output = shell.run(&cmd, RunOpts::FORCE_CAPTURE).await?;
        if !output.success() {
            return Err(Error::HostNotFound(name.to_owned()));
        }
        let vars = serde_json::from_str(&output.stdout)
            .map_err(|error| Error::InventoryOutput(name.to_owned(), error))?;

        Ok(AnsibleHost {
            name: name.to_owned(),
            inventory: inventory.to_owned(),
            shell,
            vars,
        })
    }

    fn parse_result(
        &self,
        module: &str,
        stdout: &str,
    ) -> Result<ModuleResult, Error> {
        let output: AdhocOutput =
            serde_json::from_str(stdout).map_err(|error| {
                Error::ModuleOutput(
                    self.name.clone(),
                    module.to_owned(),
                    Some(error),
                )
            })?;

        // Prefer the entry of this host, fall back to the first one (the
        // pattern may have been an alias).
        let mut results = output
            .plays
            .into_iter()
            .flat_map(|play| play.tasks)
            .flat_map(|task| task.hosts)
            .collect::<Vec<_>>();
        if results.is_empty() {
            return Err(Error::ModuleOutput(
                self.name.clone(),
                module.to_owned(),
                None,
            ));
        }
        let idx = results
            .iter()
            .position(|(host, _)| *host == self.name)
            .unwrap_or(0);
        Ok(results.swap_remove(idx).1)
    }
}

#[async_trait]
impl RemoteHost for AnsibleHost {
    fn name(&self) -> &str {
        &self.name
    }

    async fn module(
        &self,
        module: &str,
        args: ModuleArgs,
    ) -> Result<ModuleResult, Error> {
        let span = debug_span!("module", host = %self.name, %module);
        async move {
            debug!(?args, "running ansible module");
            if self.shell.dry_run() {
                debug!("dry run");
                return Ok(ModuleResult::default());
            }

            let mut cmd = format!(
                "ANSIBLE_LOAD_CALLBACK_PLUGINS=1 ANSIBLE_STDOUT_CALLBACK=json \
                 ansible {} -i {} -m {}",
                quote(&self.name),
                quote(&self.inventory),
                quote(module)
            );
            if let Some(args) = args.render() {
                cmd.push_str(" -a ");
                cmd.push_str(&quote(&args));
            }
            cmd.push_str(" 2>/dev/null");

            let output = self.shell.run(&cmd, RunOpts::CAPTURE).await?;
            let result = self.parse_result(module, &output.stdout)?;
            debug!(rc = %result.rc, failed = %result.is_failed(), "module result");

            Ok::<_, Error>(result)
        }
        .instrument(span)
        .await
    }

    fn var(&self, name: &str) -> Option<String> {
        match self.vars.get(name)? {
            Value::Null => None,
            Value::String(value) => Some(value.clone()),
            value => Some(value.to_string()),
        }
    }
}

// ===== impl AnsibleHostFactory =====

#[async_trait]
impl HostFactory for AnsibleHostFactory {
    async fn connect(
        &self,
        pattern: &str,
    ) -> Result<Arc<dyn RemoteHost>, Error> {
        let host =
            AnsibleHost::connect(pattern, &self.inventory, self.shell.clone())
                .await?;
        Ok(Arc::new(host))
    }
}
