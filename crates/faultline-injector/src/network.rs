//! ---
//! fl_section: "02-fault-injection"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Fault injection engine and capability adapters."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
//! Network degradation through a queueing discipline on one interface.

use std::collections::HashMap;
use std::process::Command;

use faultline_common::{FaultlineError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// Root queueing discipline of an interface, captured before impairment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkState {
    pub interface: String,
    /// Root qdisc kind (`noqueue`, `fq_codel`, `netem`, ...); `None` when nothing is attached.
    pub root_qdisc: Option<String>,
    /// Parameters of a pre-existing netem qdisc, reapplied on restore.
    #[serde(default)]
    pub netem_args: Vec<String>,
}

impl NetworkState {
    pub fn pristine(interface: &str) -> Self {
        Self {
            interface: interface.to_owned(),
            root_qdisc: None,
            netem_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Impairment {
    Delay { delay_ms: u64, jitter_ms: u64 },
    Loss { percent: f64 },
}

impl Impairment {
    fn netem_args(&self) -> Vec<String> {
        match self {
            Impairment::Delay {
                delay_ms,
                jitter_ms,
            } => {
                let mut args = vec!["delay".to_owned(), format!("{}ms", delay_ms)];
                if *jitter_ms > 0 {
                    args.push(format!("{}ms", jitter_ms));
                }
                args
            }
            Impairment::Loss { percent } => vec!["loss".to_owned(), format!("{}%", percent)],
        }
    }
}

/// Applies and rolls back interface impairments.
pub trait NetworkImpairer: Send + Sync {
    fn name(&self) -> &'static str;

    fn snapshot(&self, interface: &str) -> Result<NetworkState>;

    fn apply(&self, interface: &str, impairment: &Impairment) -> Result<()>;

    /// Return the interface to `state`.
    fn restore(&self, state: &NetworkState) -> Result<()>;
}

/// Linux traffic control (`tc qdisc ... netem`).
#[derive(Debug, Clone)]
pub struct TcNetemImpairer {
    program: String,
}

impl TcNetemImpairer {
    pub fn new() -> Self {
        Self {
            program: "tc".to_owned(),
        }
    }

    pub fn is_available() -> bool {
        crate::load::find_on_path("tc").is_some()
    }

    fn run(&self, args: &[String]) -> Result<String> {
        debug!(program = %self.program, args = ?args, "running traffic control");
        let output = Command::new(&self.program).args(args).output().map_err(|err| {
            FaultlineError::injection(format!("failed to run {}: {}", self.program, err))
        })?;
        if !output.status.success() {
            return Err(FaultlineError::injection(format!(
                "{} {} failed with {}: {}",
                self.program,
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for TcNetemImpairer {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkImpairer for TcNetemImpairer {
    fn name(&self) -> &'static str {
        "tc-netem"
    }

    fn snapshot(&self, interface: &str) -> Result<NetworkState> {
        let output = self.run(&strings(&["qdisc", "show", "dev", interface, "root"]))?;
        Ok(parse_root_qdisc(interface, &output))
    }

    fn apply(&self, interface: &str, impairment: &Impairment) -> Result<()> {
        let mut args = strings(&["qdisc", "replace", "dev", interface, "root", "netem"]);
        args.extend(impairment.netem_args());
        self.run(&args)?;
        Ok(())
    }

    fn restore(&self, state: &NetworkState) -> Result<()> {
        if state.root_qdisc.as_deref() == Some("netem") && !state.netem_args.is_empty() {
            let mut args = strings(&["qdisc", "replace", "dev", &state.interface, "root", "netem"]);
            args.extend(state.netem_args.iter().cloned());
            self.run(&args)?;
        } else {
            match self.run(&strings(&["qdisc", "del", "dev", &state.interface, "root"])) {
                Ok(_) => {}
                // Nothing left to delete means the interface is already back to default.
                Err(FaultlineError::Injection(msg))
                    if msg.contains("No such file") || msg.contains("Cannot delete") => {}
                Err(err) => return Err(err),
            }
        }
        let current = self.snapshot(&state.interface)?;
        if !same_discipline(&current, state) {
            return Err(FaultlineError::injection(format!(
                "interface {} did not return to its prior qdisc (expected {:?}, found {:?})",
                state.interface, state.root_qdisc, current.root_qdisc
            )));
        }
        Ok(())
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

fn same_discipline(current: &NetworkState, expected: &NetworkState) -> bool {
    match expected.root_qdisc.as_deref() {
        Some("netem") => current == expected,
        // The kernel reattaches its default qdisc after a delete; anything but netem is fine.
        _ => current.root_qdisc.as_deref() != Some("netem"),
    }
}

/// Parse `tc qdisc show dev <if> root` output, e.g.
/// `qdisc netem 8001: root refcnt 2 limit 1000 delay 200ms  20ms`.
pub(crate) fn parse_root_qdisc(interface: &str, output: &str) -> NetworkState {
    let Some(line) = output.lines().find(|l| l.starts_with("qdisc ")) else {
        return NetworkState::pristine(interface);
    };
    let mut tokens = line.split_whitespace().skip(1);
    let kind = tokens.next().map(str::to_owned);
    let netem_args = if kind.as_deref() == Some("netem") {
        let rest: Vec<&str> = line.split_whitespace().collect();
        let start = rest
            .iter()
            .position(|t| matches!(*t, "delay" | "loss" | "duplicate" | "corrupt" | "reorder" | "rate"))
            .unwrap_or(rest.len());
        rest[start..].iter().map(|s| (*s).to_owned()).collect()
    } else {
        Vec::new()
    };
    NetworkState {
        interface: interface.to_owned(),
        root_qdisc: kind,
        netem_args,
    }
}

/// In-memory interface table for hosts without `tc` and for tests.
#[derive(Debug, Default)]
pub struct SimulatedNetwork {
    interfaces: Mutex<HashMap<String, NetworkState>>,
    fail_apply: bool,
}

impl SimulatedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated network whose `apply` always fails.
    pub fn failing() -> Self {
        Self {
            interfaces: Mutex::new(HashMap::new()),
            fail_apply: true,
        }
    }

    pub fn current(&self, interface: &str) -> NetworkState {
        self.interfaces
            .lock()
            .get(interface)
            .cloned()
            .unwrap_or_else(|| NetworkState::pristine(interface))
    }
}

impl NetworkImpairer for SimulatedNetwork {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn snapshot(&self, interface: &str) -> Result<NetworkState> {
        Ok(self.current(interface))
    }

    fn apply(&self, interface: &str, impairment: &Impairment) -> Result<()> {
        if self.fail_apply {
            return Err(FaultlineError::injection(format!(
                "simulated impairment rejected on {}",
                interface
            )));
        }
        self.interfaces.lock().insert(
            interface.to_owned(),
            NetworkState {
                interface: interface.to_owned(),
                root_qdisc: Some("netem".to_owned()),
                netem_args: impairment.netem_args(),
            },
        );
        Ok(())
    }

    fn restore(&self, state: &NetworkState) -> Result<()> {
        let mut interfaces = self.interfaces.lock();
        if state.root_qdisc.is_none() {
            interfaces.remove(&state.interface);
        } else {
            interfaces.insert(state.interface.clone(), state.clone());
        }
        Ok(())
    }
}

/// Holds an applied impairment and rolls it back on release or drop.
pub struct ImpairmentGuard<'a> {
    impairer: &'a dyn NetworkImpairer,
    prior: NetworkState,
    released: bool,
}

impl<'a> ImpairmentGuard<'a> {
    /// Snapshot the interface, then apply `impairment`.
    ///
    /// If `apply` fails the interface is restored before the error is returned.
    pub fn engage(
        impairer: &'a dyn NetworkImpairer,
        interface: &str,
        impairment: &Impairment,
    ) -> Result<Self> {
        let prior = impairer.snapshot(interface)?;
        let mut guard = Self {
            impairer,
            prior,
            released: false,
        };
        if let Err(err) = impairer.apply(interface, impairment) {
            guard.release()?;
            return Err(err);
        }
        info!(interface, impairer = impairer.name(), ?impairment, "network impairment applied");
        Ok(guard)
    }

    pub fn prior(&self) -> &NetworkState {
        &self.prior
    }

    /// Restore the prior state. Idempotent.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.impairer.restore(&self.prior)?;
        info!(interface = %self.prior.interface, "network impairment rolled back");
        Ok(())
    }
}

impl Drop for ImpairmentGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            error!(interface = %self.prior.interface, error = %err, "network rollback failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_and_netem_qdiscs() {
        let default = parse_root_qdisc("eth0", "qdisc noqueue 0: root refcnt 2\n");
        assert_eq!(default.root_qdisc.as_deref(), Some("noqueue"));
        assert!(default.netem_args.is_empty());

        let netem = parse_root_qdisc(
            "eth0",
            "qdisc netem 8001: root refcnt 2 limit 1000 delay 200ms  20ms\n",
        );
        assert_eq!(netem.root_qdisc.as_deref(), Some("netem"));
        assert_eq!(netem.netem_args, vec!["delay", "200ms", "20ms"]);

        assert_eq!(parse_root_qdisc("lo", ""), NetworkState::pristine("lo"));
    }

    #[test]
    fn guard_restores_prior_state_on_drop() {
        let network = SimulatedNetwork::new();
        let before = network.snapshot("eth0").unwrap();
        {
            let _guard = ImpairmentGuard::engage(
                &network,
                "eth0",
                &Impairment::Delay {
                    delay_ms: 200,
                    jitter_ms: 20,
                },
            )
            .unwrap();
            assert_eq!(network.current("eth0").root_qdisc.as_deref(), Some("netem"));
        }
        assert_eq!(network.snapshot("eth0").unwrap(), before);
    }

    #[test]
    fn failed_apply_leaves_interface_untouched() {
        let network = SimulatedNetwork::failing();
        let before = network.snapshot("eth1").unwrap();
        let err = ImpairmentGuard::engage(&network, "eth1", &Impairment::Loss { percent: 10.0 })
            .err()
            .unwrap();
        assert!(matches!(err, FaultlineError::Injection(_)));
        assert_eq!(network.snapshot("eth1").unwrap(), before);
    }

    #[test]
    fn loss_renders_percentage() {
        assert_eq!(
            Impairment::Loss { percent: 12.5 }.netem_args(),
            vec!["loss", "12.5%"]
        );
    }
}
