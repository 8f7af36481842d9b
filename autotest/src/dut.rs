//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Operations on the device under test.

use std::collections::BTreeMap;
use std::path::Path;

use autotest_utils::host::RemoteHost;
use autotest_utils::shell::quote;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::debug::Debug;
use crate::error::Error;

const TOPO_MARKER: &str = "/etc/sonic/topo_marker";
const OLD_TOPO_MARKER: &str = "/etc/sonic/old_config/topo_marker";
const LOGROTATE_CRON: &str = "/etc/cron.d/logrotate";
const DEVICE_DIR: &str = "/usr/share/sonic/device";
const REBOOT_TASKS: &str = "./roles/test/tasks/common_tasks/reboot_sonic.yml";

/// Testbed processing file, as far as the DUT setup is concerned.
#[derive(Debug, Deserialize)]
pub struct TestbedConfig {
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceConfig>,
    #[serde(default)]
    pub topology: BTreeMap<String, DeviceTopology>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceConfig {
    pub hwsku: String,
    #[serde(default)]
    pub hwrev: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeviceTopology {
    #[serde(default)]
    pub indices: serde_yaml::Mapping,
    #[serde(default)]
    pub interfaces: serde_yaml::Mapping,
}

// Port attributes of a port index range.
#[derive(Debug, Default, Deserialize)]
struct PortAttrs {
    #[serde(rename = "Breakout")]
    breakout: Option<serde_yaml::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct InterfaceAttrs {
    #[serde(rename = "MediaType")]
    media_type: Option<String>,
    #[serde(rename = "Bandwidth")]
    bandwidth: Option<serde_yaml::Value>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Breakout {
    Split(u64),
    Disable,
    Enable,
}

// ===== impl TestbedConfig =====

impl TestbedConfig {
    pub fn load(path: &Path) -> Result<TestbedConfig, Error> {
        let data = std::fs::read_to_string(path)
            .map_err(|error| Error::TestbedConfigRead(path.to_owned(), error))?;
        serde_yaml::from_str(&data)
            .map_err(|error| Error::TestbedConfigParse(path.to_owned(), error))
    }
}

// ===== impl Breakout =====

impl Breakout {
    fn from_value(value: &serde_yaml::Value) -> Option<Breakout> {
        match value {
            serde_yaml::Value::Number(n) => match n.as_u64() {
                Some(lanes @ (2 | 4)) => Some(Breakout::Split(lanes)),
                _ => None,
            },
            serde_yaml::Value::String(action) => match action.as_str() {
                "disable" => Some(Breakout::Disable),
                "enable" => Some(Breakout::Enable),
                _ => None,
            },
            _ => None,
        }
    }

    fn command(&self, ports: &str) -> String {
        match self {
            Breakout::Split(_) => {
                format!("port-breakout -0 breakout {}", quote(ports))
            }
            Breakout::Disable => {
                format!("port-breakout -0 disable {}", quote(ports))
            }
            Breakout::Enable => {
                format!("port-breakout -0 enable {}", quote(ports))
            }
        }
    }
}

// ===== global functions =====

/// Returns the topology the DUT is currently connected to, if any.
pub async fn connected_topo(
    ctx: &Context,
    dut: &str,
) -> Result<Option<String>, Error> {
    let host = ctx.host(dut).await?;
    let topo = match host.shell(&format!("cat {}", TOPO_MARKER)).await {
        Ok(res) if !res.is_failed() => {
            Some(res.stdout.trim().to_owned()).filter(|topo| !topo.is_empty())
        }
        Ok(res) => {
            debug!(%dut, msg = %res.message(), "no topology marker");
            None
        }
        Err(error) => {
            debug!(%dut, %error, "failed to read topology marker");
            None
        }
    };
    Debug::ConnectedTopology(dut, topo.as_deref()).log();
    Ok(topo)
}

/// Reboots the DUT through the reboot playbook tasks.
///
/// Returns whether the reboot succeeded; a failure is only an error when
/// `ignore_error` is unset.
pub async fn reboot(
    ctx: &Context,
    dut: &str,
    ignore_error: bool,
) -> Result<bool, Error> {
    info!(%dut, "rebooting DUT");
    let cmd = format!(
        "ansible -i {} {} -m include -a {}",
        quote(ctx.lab()),
        quote(dut),
        quote(REBOOT_TASKS)
    );
    let output = ctx.run(&cmd).await?;
    if !output.success() {
        if !ignore_error {
            return Err(Error::RebootFailed(dut.to_owned(), output.rc));
        }
        warn!(%dut, rc = %output.rc, "failed to reboot DUT, ignoring");
    }
    Ok(output.success())
}

/// Writes a message to the DUT syslog.
pub async fn log_to_dut(ctx: &Context, dut: &str, message: &str) {
    let cmd = format!("logger -p INFO {}", quote(message));
    let result = match ctx.host(dut).await {
        Ok(host) => host.shell(&cmd).await,
        Err(error) => {
            warn!(%dut, %error, "failed to log to DUT");
            return;
        }
    };
    if let Err(error) = result {
        warn!(%dut, %error, "failed to log to DUT");
    }
}

/// Comments out the logrotate cron job and waits for a running logrotate to
/// finish.
pub async fn disable_logrotate(ctx: &Context, dut: &str) -> Result<bool, Error> {
    let host = ctx.host(dut).await?;
    match host.replace(LOGROTATE_CRON, "^", "#").await {
        Ok(res) if !res.is_failed() => (),
        Ok(res) => {
            warn!(%dut, msg = %res.message(), "failed to disable logrotate");
            return Ok(false);
        }
        Err(error) => {
            warn!(%dut, %error, "failed to disable logrotate");
            return Ok(false);
        }
    }

    let check = format!(
        "ansible -i {} {} -b -m shell -a {}",
        quote(ctx.lab()),
        quote(dut),
        quote("! ps -aux | grep logrotate | grep -v grep")
    );
    let cmd = format!(
        "for i in $(seq 1 5); do if ({}); then break; fi; sleep 1; done",
        check
    );
    ctx.run(&cmd).await?;

    debug!(%dut, "disabled logrotate");
    Ok(true)
}

/// Restores the logrotate cron job.
pub async fn enable_logrotate(ctx: &Context, dut: &str) -> Result<bool, Error> {
    let host = ctx.host(dut).await?;
    match host.replace(LOGROTATE_CRON, "^#", "").await {
        Ok(res) if !res.is_failed() => {
            debug!(%dut, "enabled logrotate");
            Ok(true)
        }
        Ok(res) => {
            warn!(%dut, msg = %res.message(), "failed to enable logrotate");
            Ok(false)
        }
        Err(error) => {
            warn!(%dut, %error, "failed to enable logrotate");
            Ok(false)
        }
    }
}

/// Forces a log rotation so that the DUT logs start with the next test.
pub async fn force_logrotate(ctx: &Context, dut: &str) -> Result<(), Error> {
    let host = ctx.host(dut).await?;
    if let Err(error) = host.shell("logrotate -f /etc/logrotate.conf").await {
        debug!(%dut, %error, "failed to force logrotate");
    }
    Ok(())
}

/// Installs a new image on the DUT.
pub async fn upgrade(ctx: &Context, dut: &str, image_url: &str) -> Result<(), Error> {
    info!(%dut, %image_url, "upgrading DUT");
    let cmd = format!(
        "ANSIBLE_STDOUT_CALLBACK=yaml ansible-playbook upgrade_sonic.yml -i {} -l {} -vvv -e upgrade_type=sonic -e {}",
        quote(ctx.lab()),
        quote(dut),
        quote(&format!("image_url={}", image_url))
    );
    let output = ctx.run(&cmd).await?;

    // The new image does not carry the topology marker over.
    let host = ctx.host(dut).await?;
    if host.stat_exists(OLD_TOPO_MARKER).await? {
        host.shell(&format!("cp {} /etc/sonic/.", OLD_TOPO_MARKER))
            .await?;
    }

    if !output.success() {
        return Err(Error::UpgradeFailed(dut.to_owned(), output.rc));
    }
    Ok(())
}

/// Prepares a freshly installed image according to the testbed processing
/// file.
pub async fn setup_after_install(
    ctx: &Context,
    dut: &str,
    testbed_config: Option<&Path>,
) -> Result<(), Error> {
    let path = testbed_config.ok_or(Error::TestbedConfigMissing)?;
    let config = TestbedConfig::load(path)?;
    let device = config
        .devices
        .get(dut)
        .ok_or_else(|| Error::TestbedConfigField(dut.to_owned(), "devices"))?;
    let topology = config.topology.get(dut);
    let hwrev = device.hwrev.as_deref().filter(|hwrev| !hwrev.is_empty());

    if ctx.dry_run() {
        debug!(%dut, "dry run");
        return Ok(());
    }

    let host = ctx.host(dut).await?;
    let platform = platform_name(host.as_ref()).await?;
    set_default_hwsku(host.as_ref(), &platform, &device.hwsku).await?;

    if let Some(hwrev) = hwrev {
        let platform_dir = format!("{}/{}", DEVICE_DIR, platform);
        let src = format!("{}/{}-{}", platform_dir, device.hwsku, hwrev);
        let dst = format!("{}/{}", platform_dir, device.hwsku);
        if !host.stat_exists(&src).await? {
            return Err(Error::HwskuDirNotFound(dut.to_owned(), src));
        }
        let _ = host.shell(&format!("rm -rf {}", quote(&dst))).await;
        host.shell_checked(&format!("cp -r {} {}", quote(&src), quote(&dst)))
            .await?;
        info!(%src, %dst, "copied hwsku directory");
    }

    if let Some(topology) = topology {
        set_breakout(host.as_ref(), &topology.indices).await;
    }

    // Remove the first boot flag.
    let version = host
        .shell_checked("sonic-cfggen -y /etc/sonic/sonic_version.yml -v build_version")
        .await?
        .stdout;
    let flag = format!("/host/image-{}/platform/firsttime", version.trim());
    let _ = host.shell(&format!("rm {}", quote(&flag))).await;
    info!(%dut, "removed first boot flag");

    install_preset_config(host.as_ref(), &device.hwsku).await?;

    reboot(ctx, dut, true).await?;

    if let Some(topology) = topology {
        set_media_type(host.as_ref(), &topology.interfaces).await?;
        set_port_config_speed(host.as_ref(), &platform, &topology.interfaces)
            .await?;
    }

    Ok(())
}

// ===== helper functions =====

async fn query_metadata(
    host: &dyn RemoteHost,
    field: &'static str,
) -> Result<String, Error> {
    let cmd = format!("sonic-cfggen -d -v DEVICE_METADATA.localhost.{}", field);
    let value = host.shell_checked(&cmd).await?.stdout.trim().to_owned();
    if value.is_empty() {
        return Err(Error::DeviceQuery(host.name().to_owned(), field));
    }
    debug!(dut = %host.name(), %field, %value, "device metadata");
    Ok(value)
}

async fn platform_name(host: &dyn RemoteHost) -> Result<String, Error> {
    query_metadata(host, "platform").await
}

async fn hwsku(host: &dyn RemoteHost) -> Result<String, Error> {
    query_metadata(host, "hwsku").await
}

async fn set_default_hwsku(
    host: &dyn RemoteHost,
    platform: &str,
    hwsku: &str,
) -> Result<(), Error> {
    let default_sku = format!("{}/{}/default_sku", DEVICE_DIR, platform);
    let backup = format!("{}.origin", default_sku);

    if !host.stat_exists(&backup).await? {
        host.shell_checked(&format!("cp {} {}", quote(&default_sku), quote(&backup)))
            .await?;
    }
    let res = host.replace(&default_sku, "^[^ ]+", hwsku).await?;
    if res.is_failed() {
        return Err(autotest_utils::Error::ModuleFailed(
            host.name().to_owned(),
            "replace".to_owned(),
            res.message(),
        )
        .into());
    }

    info!(dut = %host.name(), %hwsku, "set default hwsku");
    Ok(())
}

async fn set_breakout(host: &dyn RemoteHost, indices: &serde_yaml::Mapping) {
    for (ports, attrs) in indices {
        let ports = yaml_key(ports);
        let attrs: PortAttrs =
            serde_yaml::from_value(attrs.clone()).unwrap_or_default();
        let Some(value) = attrs.breakout else {
            continue;
        };
        let Some(breakout) = Breakout::from_value(&value) else {
            warn!(%ports, ?value, "invalid breakout value");
            continue;
        };

        if let Err(error) = host.shell(&breakout.command(&ports)).await {
            warn!(%ports, %error, "failed to apply breakout");
            continue;
        }
        info!(%ports, ?breakout, "applied breakout");
    }
}

// Builds a preset L2 configuration that keeps the management settings of
// the running configuration.
async fn install_preset_config(
    host: &dyn RemoteHost,
    hwsku: &str,
) -> Result<(), Error> {
    let dut = host.name().to_owned();
    let running = host.shell_checked("sonic-cfggen -d --print-data").await?;
    let running: Value = serde_json::from_str(&running.stdout)
        .map_err(|error| Error::DeviceConfig(dut.clone(), error))?;
    let preset = host
        .shell_checked(&format!("sonic-cfggen -k {} --preset l2", quote(hwsku)))
        .await?;
    let mut preset: Value = serde_json::from_str(&preset.stdout)
        .map_err(|error| Error::DeviceConfig(dut.clone(), error))?;

    merge_preset_config(&mut preset, &running);

    host.copy_content(&preset.to_string(), "/tmp/tmp_cfg").await?;
    host.shell_checked(
        "sonic-cfggen -j /tmp/tmp_cfg --print-data > /etc/sonic/config_db.json",
    )
    .await?;
    Ok(())
}

pub(crate) fn merge_preset_config(preset: &mut Value, running: &Value) {
    if let Some(mgmt) = running.get("MGMT_INTERFACE") {
        preset["MGMT_INTERFACE"] = mgmt.clone();
    }
    if let Some(localhost) = running
        .pointer("/DEVICE_METADATA/localhost")
        .and_then(Value::as_object)
    {
        for (key, value) in localhost {
            if key != "hwsku" {
                preset["DEVICE_METADATA"]["localhost"][key] = value.clone();
            }
        }
    }
}

async fn set_media_type(
    host: &dyn RemoteHost,
    interfaces: &serde_yaml::Mapping,
) -> Result<(), Error> {
    const MEDIA_TYPES: [&str; 2] = ["opt", "dac"];

    for (ifname, attrs) in interfaces {
        let ifname = yaml_key(ifname);
        let attrs: InterfaceAttrs =
            serde_yaml::from_value(attrs.clone()).unwrap_or_default();
        let Some(media_type) = attrs.media_type else {
            continue;
        };
        if !MEDIA_TYPES.contains(&media_type.as_str()) {
            warn!(%ifname, %media_type, "invalid interface media type");
            continue;
        }

        host.shell_checked(&format!(
            "sfpdet config -p {} -m {}",
            quote(&ifname),
            quote(&media_type)
        ))
        .await?;
        info!(%ifname, %media_type, "set interface media type");
    }

    Ok(())
}

async fn set_port_config_speed(
    host: &dyn RemoteHost,
    platform: &str,
    interfaces: &serde_yaml::Mapping,
) -> Result<(), Error> {
    let hwsku = hwsku(host).await?;
    let ini_file = format!("{}/{}/{}/port_config.ini", DEVICE_DIR, platform, hwsku);

    for (ifname, attrs) in interfaces {
        let ifname = yaml_key(ifname);
        let attrs: InterfaceAttrs =
            serde_yaml::from_value(attrs.clone()).unwrap_or_default();
        let Some(speed) = attrs.bandwidth.as_ref().map(yaml_key) else {
            continue;
        };

        let (regexp, line) = port_config_speed_edit(&ifname, &speed);
        host.lineinfile(&ini_file, &regexp, &line).await?;
        info!(%ifname, %speed, "set interface speed");
    }

    Ok(())
}

// Regular expression and replacement line updating the speed column of an
// interface in port_config.ini.
pub(crate) fn port_config_speed_edit(ifname: &str, speed: &str) -> (String, String) {
    let regexp = format!(
        r"^(?P<interface>{}\b)(?P<lanes>[ ]+[^ ]+)(?P<alias>[ ]+[^ ]+)(?P<index>[ ]+[^ ]+)(?P<speed_pre_spaces> +)(?P<speed>\d+)(?P<others>.*)$",
        regex::escape(ifname)
    );
    let line = format!(
        r"\g<interface>\g<lanes>\g<alias>\g<index>\g<speed_pre_spaces>{}\g<others>",
        speed
    );
    (regexp, line)
}

fn yaml_key(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(value) => value.clone(),
        serde_yaml::Value::Number(value) => value.to_string(),
        value => serde_yaml::to_string(value)
            .map(|value| value.trim_end().to_owned())
            .unwrap_or_default(),
    }
}

// ===== unit tests =====
