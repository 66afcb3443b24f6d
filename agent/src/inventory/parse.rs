//! Parsers turning raw tool output into inventory models

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::errors::AgentError;
use crate::models::service::{DesiredService, LogLine, RuntimeEntry, UpdateCandidate, DEFAULT_TAG};

/// Image reported for manifest entries without an `image:` key
const MISSING_IMAGE: &str = "None";

/// os-release key carrying the human readable OS version
const OS_VERSION_KEY: &str = "MAPIO_OS_VERSION_PRETTY";

#[derive(Debug, Deserialize)]
struct ComposeManifest {
    #[serde(default)]
    services: IndexMap<String, Option<ComposeServiceEntry>>,
}

#[derive(Debug, Deserialize)]
struct ComposeServiceEntry {
    #[serde(default)]
    image: Option<String>,
}

/// Parse the services of a docker compose manifest, in file order
pub fn parse_compose_manifest(yaml: &str) -> Result<Vec<DesiredService>, AgentError> {
    if yaml.trim().is_empty() {
        return Ok(Vec::new());
    }
    let manifest: ComposeManifest = serde_yaml::from_str(yaml)?;

    let services = manifest
        .services
        .into_iter()
        .map(|(name, entry)| {
            let image = entry
                .and_then(|e| e.image)
                .unwrap_or_else(|| MISSING_IMAGE.to_string());
            let (image, version) = split_image(&image);
            DesiredService {
                name,
                image,
                version,
            }
        })
        .collect();
    Ok(services)
}

/// Split an image reference into repository and tag.
///
/// The tag follows the last `:`; a `:` followed by a `/` belongs to a
/// registry host port (`registry:5000/app`) and is not a tag separator.
pub fn split_image(image: &str) -> (String, String) {
    match image.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') && !repo.is_empty() && !tag.is_empty() => {
            (repo.to_string(), tag.to_string())
        }
        _ => (image.to_string(), DEFAULT_TAG.to_string()),
    }
}

/// Parse `docker ps -a --format "{{.Names}} {{.Status}}"` output
pub fn parse_runtime_status(output: &str) -> Vec<RuntimeEntry> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once(char::is_whitespace) {
            Some((name, status)) => RuntimeEntry {
                name: name.to_string(),
                status: status.trim().to_string(),
            },
            None => RuntimeEntry {
                name: line.to_string(),
                status: String::new(),
            },
        })
        .collect()
}

/// Parse `<container> <port>` lines, grouping ports per container in the
/// order they were printed
pub fn parse_port_scan(
    output: &str,
    command: &str,
) -> Result<IndexMap<String, Vec<String>>, AgentError> {
    let mut ports: IndexMap<String, Vec<String>> = IndexMap::new();
    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next(), fields.next()) {
            (Some(name), Some(port), None) => {
                ports.entry(name.to_string()).or_default().push(port.to_string());
            }
            _ => {
                return Err(AgentError::malformed_output(
                    command,
                    format!("expected `<container> <port>`, got {:?}", line),
                ))
            }
        }
    }
    Ok(ports)
}

/// Parse `<container> <update>` lines of the version-check helper
pub fn parse_update_candidates(
    output: &str,
    command: &str,
) -> Result<Vec<UpdateCandidate>, AgentError> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|line| match line.split_once(char::is_whitespace) {
            Some((name, update)) if !update.trim().is_empty() => Ok(UpdateCandidate {
                name: name.to_string(),
                update: update.trim().to_string(),
            }),
            _ => Err(AgentError::malformed_output(
                command,
                format!("expected `<container> <update>`, got {:?}", line),
            )),
        })
        .collect()
}

/// Pick the `SSID:` values out of `iw <iface> scan` output
pub fn extract_ssid_lines(scan_output: &str) -> Vec<&str> {
    scan_output
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix("SSID:"))
        .map(str::trim)
        .collect()
}

/// Sorted, de-duplicated, non-empty network names
pub fn normalize_ssids<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    names
        .into_iter()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// One log line per non-empty output line, keeping at most the last
/// `max_lines` in their original order
pub fn parse_log_lines(output: &str, max_lines: usize) -> Vec<LogLine> {
    let lines: Vec<&str> = output
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
        .collect();
    let skip = lines.len().saturating_sub(max_lines);
    lines
        .into_iter()
        .skip(skip)
        .map(|l| LogLine {
            data: l.to_string(),
        })
        .collect()
}

/// Value of the OS version key in os-release, empty when absent
pub fn parse_os_version(os_release: &str) -> String {
    os_release
        .lines()
        .find_map(|line| {
            let (key, value) = line.split_once('=')?;
            (key.trim() == OS_VERSION_KEY).then(|| value.trim().trim_matches('"').to_string())
        })
        .unwrap_or_default()
}
