//! wpa_supplicant configuration and the systemd sequence that activates it

use crate::models::service::WifiCredential;

/// Render the client-mode wpa_supplicant configuration for `credential`
pub fn render_wpa_config(credential: &WifiCredential) -> String {
    format!(
        "ctrl_interface=/var/run/wpa_supplicant\n\
         ctrl_interface_group=0\n\
         update_config=1\n\
         \n\
         network={{\n\
         \x20 ssid=\"{}\"\n\
         \x20 psk=\"{}\"\n\
         \x20 key_mgmt=WPA-PSK\n\
         \x20 proto=WPA2\n\
         \x20 pairwise=CCMP TKIP\n\
         \x20 group=CCMP TKIP\n\
         \x20 scan_ssid=1\n\
         }}\n",
        credential.ssid, credential.passphrase
    )
}

/// One `systemctl` invocation of the activation sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkStep {
    pub args: Vec<String>,
}

impl NetworkStep {
    fn systemctl(args: &[&str]) -> Self {
        Self {
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn arg_refs(&self) -> Vec<&str> {
        self.args.iter().map(String::as_str).collect()
    }

    /// Step name as recorded in reports
    pub fn name(&self) -> String {
        format!("systemctl {}", self.args.join(" "))
    }
}

/// Steps run before the settle interval: leave access-point mode and bring
/// up the client daemon
pub fn pre_settle_steps() -> Vec<NetworkStep> {
    vec![
        NetworkStep::systemctl(&["daemon-reload"]),
        NetworkStep::systemctl(&["stop", "wpa_supplicant-ap.service"]),
        NetworkStep::systemctl(&["enable", "--now", "wpa_supplicant.service"]),
    ]
}

/// Steps run after the settle interval: (re)start the interface service
pub fn post_settle_steps(interface: &str) -> Vec<NetworkStep> {
    let unit = format!("wpa_supplicant@{}.service", interface);
    vec![
        NetworkStep::systemctl(&["enable", &unit]),
        NetworkStep::systemctl(&["restart", &unit]),
    ]
}
