use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;

use super::keys::{KeyServer, KeyStore};
use crate::error::Result;

const HKP_PORT: u16 = 11371;

/// Key server spoken to over HKP(S) directly; fetched keys are imported
/// through the injected [`KeyStore`].
#[derive(Debug, Clone)]
pub struct HkpKeyServer {
    client: Client,
    name: String,
    base_url: String,
}

impl HkpKeyServer {
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            name: url.to_string(),
            base_url: lookup_base(url),
        })
    }

    pub fn lookup_url(&self, key_id: &str) -> String {
        format!(
            "{}/pks/lookup?op=get&options=mr&search={}",
            self.base_url,
            urlencoding::encode(&format!("0x{key_id}"))
        )
    }
}

/// Maps `hkps://host` to `https://host` and `hkp://host` to `http://host:11371`.
fn lookup_base(url: &str) -> String {
    let url = url.trim_end_matches('/');
    if let Some(host) = url.strip_prefix("hkps://") {
        format!("https://{host}")
    } else if let Some(host) = url.strip_prefix("hkp://") {
        if host.contains(':') {
            format!("http://{host}")
        } else {
            format!("http://{host}:{HKP_PORT}")
        }
    } else {
        url.to_string()
    }
}

impl KeyServer for HkpKeyServer {
    fn name(&self) -> &str {
        &self.name
    }

    fn retrieve(&self, key_id: &str, keystore: &dyn KeyStore) -> Result<String> {
        let url = self.lookup_url(key_id);
        let resp = self.client.get(&url).send()?;
        let status = resp.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(keyserver = %self.name, "Key server is rate limiting lookups");
            return Ok(format!("{}: rate limited ({status})\n", self.name));
        }
        if !status.is_success() {
            return Ok(format!("{}: {status} for key {key_id}\n", self.name));
        }

        let material = resp.text()?;
        let imported = keystore.import(&material)?;
        Ok(format!("{}: fetched key {key_id}\n{imported}", self.name))
    }
}
