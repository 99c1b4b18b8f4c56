//! `charms` CLI adapter.
//!
//! Every call first checks that the binary answers `--version`, then builds
//! the contract with `charms app build` (run inside the contract directory)
//! and hands the spell to `charms spell check` / `charms spell prove` on
//! stdin.

use legacy_guard_core::{Error, SignedTransaction, SpellProver};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use crate::config::ProverSection;

pub struct CharmsCli {
    binary: PathBuf,
    contract_path: PathBuf,
    mock: bool,
}

impl CharmsCli {
    pub fn new(binary: PathBuf, contract_path: PathBuf, mock: bool) -> Self {
        Self {
            binary,
            contract_path,
            mock,
        }
    }

    pub fn from_config(prover: &ProverSection) -> Self {
        Self::new(
            prover.charms_path.clone(),
            prover.contract_path.clone(),
            prover.mock,
        )
    }

    /// `charms --version`, trimmed.
    pub fn version(&self) -> Result<String, Error> {
        let output = self.command().arg("--version").output().map_err(|e| {
            Error::UpstreamUnavailable(format!(
                "charms CLI not available at {}: {}",
                self.binary.display(),
                e
            ))
        })?;
        if !output.status.success() {
            return Err(Error::UpstreamUnavailable(format!(
                "charms --version failed: {}",
                stderr_text(&output)
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Build the contract and return the path of the app binaries.
    fn app_bins(&self) -> Result<String, Error> {
        let output = self
            .command()
            .args(["app", "build"])
            .current_dir(&self.contract_path)
            .output()
            .map_err(|e| {
                Error::UpstreamUnavailable(format!(
                    "cannot build contract in {}: {}",
                    self.contract_path.display(),
                    e
                ))
            })?;
        if !output.status.success() {
            return Err(Error::UpstreamUnavailable(format!(
                "charms app build failed: {}",
                stderr_text(&output)
            )));
        }

        let bins = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if bins.is_empty() {
            return Err(Error::UpstreamUnavailable(
                "charms app build produced no binary path".into(),
            ));
        }
        log::debug!("Contract built: {}", bins);
        Ok(bins)
    }

    /// Run `charms spell <subcommand>` with the spell on stdin.
    fn spell_command(&self, subcommand: &str, spell: &str) -> Result<Output, Error> {
        if spell.trim().is_empty() {
            return Err(Error::InvalidInput("Spell is empty".into()));
        }

        let version = self.version()?;
        log::debug!("Using {}", version);
        let bins = self.app_bins()?;

        let mut cmd = self.command();
        cmd.args(["spell", subcommand])
            .arg(format!("--app-bins={}", bins))
            .current_dir(&self.contract_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if self.mock {
            cmd.arg("--mock");
        }

        let upstream = |e: std::io::Error| {
            Error::UpstreamUnavailable(format!("charms spell {}: {}", subcommand, e))
        };
        let mut child = cmd.spawn().map_err(upstream)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(spell.as_bytes()).map_err(upstream)?;
        }
        child.wait_with_output().map_err(upstream)
    }

    fn command(&self) -> Command {
        Command::new(&self.binary)
    }
}

impl SpellProver for CharmsCli {
    fn validate(&self, spell: &str) -> Result<String, Error> {
        let output = self.spell_command("check", spell)?;
        if !output.status.success() {
            let reason = stderr_text(&output);
            log::warn!("Spell check rejected: {}", reason);
            return Err(Error::InvalidInput(format!("Spell check failed: {}", reason)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn prove(&self, spell: &str) -> Result<SignedTransaction, Error> {
        let output = self.spell_command("prove", spell)?;
        if !output.status.success() {
            return Err(Error::UpstreamUnavailable(format!(
                "charms spell prove failed: {}",
                stderr_text(&output)
            )));
        }
        parse_prove_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Proven transactions come back either as a JSON array of hex strings or
/// one hex transaction per line.
pub fn parse_prove_output(stdout: &str) -> Result<SignedTransaction, Error> {
    let trimmed = stdout.trim();
    if let Ok(transactions) = serde_json::from_str::<Vec<String>>(trimmed) {
        return Ok(SignedTransaction { transactions });
    }

    let lines: Vec<&str> = trimmed.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if !lines.is_empty() && lines.iter().all(|l| l.chars().all(|c| c.is_ascii_hexdigit())) {
        return Ok(SignedTransaction {
            transactions: lines.into_iter().map(str::to_string).collect(),
        });
    }

    Err(Error::UpstreamUnavailable(format!(
        "unrecognized prover output: {}",
        trimmed.chars().take(80).collect::<String>()
    )))
}

fn stderr_text(output: &Output) -> String {
    let text = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if text.is_empty() {
        format!("exit status {}", output.status)
    } else {
        text
    }
}
