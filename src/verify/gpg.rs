use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::keys::{KeyServer, KeyStore};
use super::session::Verifier;
use crate::error::{Error, Result};

/// Handle on the `gpg` executable and the keyring it operates on.
#[derive(Debug, Clone)]
pub struct Gpg {
    program: PathBuf,
    homedir: Option<PathBuf>,
}

impl Default for Gpg {
    fn default() -> Self {
        Self {
            program: PathBuf::from("gpg"),
            homedir: None,
        }
    }
}

impl Gpg {
    pub fn new(program: impl Into<PathBuf>, homedir: Option<PathBuf>) -> Self {
        Self {
            program: program.into(),
            homedir,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["--batch", "--no-tty"]);
        if let Some(homedir) = &self.homedir {
            cmd.arg("--homedir").arg(homedir);
        }
        cmd
    }

    /// Runs gpg and returns stdout followed by stderr. The exit status is not
    /// inspected; callers classify the text.
    fn transcript(&self, args: &[&OsStr], input: Option<&[u8]>) -> Result<String> {
        Ok(self.run(args, input)?.0)
    }

    fn run(&self, args: &[&OsStr], input: Option<&[u8]>) -> Result<(String, bool)> {
        let mut cmd = self.command();
        cmd.args(args);
        cmd.stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Tool(format!("{}: {e}", self.program.display())))?;

        if let Some(data) = input {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(data)?;
            }
        }

        let output = child.wait_with_output()?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok((text, output.status.success()))
    }
}

impl Verifier for Gpg {
    fn list_packets(&self, signature: &Path) -> Result<String> {
        self.transcript(&[OsStr::new("--list-packets"), signature.as_os_str()], None)
    }

    fn verify(&self, signature: &Path, artifact: &Path) -> Result<String> {
        self.transcript(
            &[
                OsStr::new("--status-fd"),
                OsStr::new("1"),
                OsStr::new("--verify"),
                signature.as_os_str(),
                artifact.as_os_str(),
            ],
            None,
        )
    }
}

/// The gpg keyring as a [`KeyStore`].
#[derive(Debug, Clone, Default)]
pub struct GpgKeyring {
    gpg: Gpg,
}

impl GpgKeyring {
    pub fn new(gpg: Gpg) -> Self {
        Self { gpg }
    }
}

impl KeyStore for GpgKeyring {
    fn has(&self, key_id: &str) -> Result<bool> {
        let (_, found) = self
            .gpg
            .run(&[OsStr::new("--list-keys"), OsStr::new(key_id)], None)?;
        Ok(found)
    }

    fn get(&self, key_id: &str) -> Result<Option<String>> {
        let (listing, found) = self
            .gpg
            .run(&[OsStr::new("--list-keys"), OsStr::new(key_id)], None)?;
        Ok(found.then_some(listing))
    }

    fn import(&self, material: &str) -> Result<String> {
        self.gpg
            .transcript(&[OsStr::new("--import")], Some(material.as_bytes()))
    }
}

/// Key server reached through gpg's own `--recv-keys`.
#[derive(Debug, Clone)]
pub struct GpgKeyServer {
    gpg: Gpg,
    url: String,
}

impl GpgKeyServer {
    pub fn new(gpg: Gpg, url: impl Into<String>) -> Self {
        Self {
            gpg,
            url: url.into(),
        }
    }
}

impl KeyServer for GpgKeyServer {
    fn name(&self) -> &str {
        &self.url
    }

    // gpg imports straight into its keyring; the injected store is the same one.
    fn retrieve(&self, key_id: &str, _keystore: &dyn KeyStore) -> Result<String> {
        self.gpg.transcript(
            &[
                OsStr::new("--keyserver"),
                OsStr::new(&self.url),
                OsStr::new("--recv-keys"),
                OsStr::new(key_id),
            ],
            None,
        )
    }
}
