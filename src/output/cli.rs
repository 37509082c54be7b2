use crate::analyzer::CredentialsAnalysis;
use crate::model::{Credentials, HostFingerprint};
use crate::plugin::{AgentPluginMetadata, AgentPluginRepositoryIndex};
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct ServiceRow {
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "OS")]
    os: String,
    #[tabled(rename = "Protocol")]
    protocol: String,
    #[tabled(rename = "Port")]
    port: String,
    #[tabled(rename = "Service")]
    service: String,
}

#[derive(Tabled)]
struct CredentialRow {
    #[tabled(rename = "Identity")]
    identity: String,
    #[tabled(rename = "Secret Type")]
    kind: String,
    #[tabled(rename = "Secret")]
    secret: String,
}

#[derive(Tabled)]
struct ReleaseRow {
    #[tabled(rename = "Type")]
    plugin_type: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Safe")]
    safe: String,
    #[tabled(rename = "Description")]
    description: String,
}

pub fn fingerprint_table(fingerprints: &[HostFingerprint]) -> String {
    let mut rows = Vec::new();
    for entry in fingerprints {
        let os = format_os(entry);
        if entry.fingerprint.services().is_empty() {
            rows.push(ServiceRow {
                host: entry.host.to_string(),
                os,
                protocol: "-".to_string(),
                port: "-".to_string(),
                service: "-".to_string(),
            });
            continue;
        }

        for service in entry.fingerprint.services() {
            rows.push(ServiceRow {
                host: entry.host.to_string(),
                os: os.clone(),
                protocol: service.protocol.to_string(),
                port: service.port.to_string(),
                service: service.service.to_string(),
            });
        }
    }

    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn credentials_table(credentials: &[Credentials]) -> String {
    let rows: Vec<CredentialRow> = credentials
        .iter()
        .map(|c| CredentialRow {
            identity: c
                .identity()
                .map(|i| i.as_str().to_string())
                .unwrap_or_else(|| "-".to_string()),
            kind: c.secret().map(|s| s.kind()).unwrap_or("-").to_string(),
            secret: c
                .secret()
                .map(|s| truncate(s.value(), 40))
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn releases_table<'a>(releases: impl IntoIterator<Item = &'a AgentPluginMetadata>) -> String {
    let rows: Vec<ReleaseRow> = releases
        .into_iter()
        .map(|r| ReleaseRow {
            plugin_type: r.plugin_type.to_string(),
            name: r.name.clone(),
            version: r.version.to_string(),
            safe: if r.safe { "yes" } else { "no" }.to_string(),
            description: truncate(&r.description, 50),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn print_fingerprints_table(fingerprints: &[HostFingerprint]) {
    println!();
    if fingerprints.is_empty() {
        println!("No hosts fingerprinted.");
        return;
    }

    let services: usize = fingerprints
        .iter()
        .map(|f| f.fingerprint.services().len())
        .sum();
    println!(
        "Fingerprinted {} hosts, {} services:",
        fingerprints.len(),
        services
    );
    println!();
    println!("{}", fingerprint_table(fingerprints));
}

pub fn print_credentials_table(credentials: &[Credentials]) {
    println!();
    if credentials.is_empty() {
        println!("No credentials collected.");
        return;
    }

    println!("Collected {} credentials:", credentials.len());
    println!();
    println!("{}", credentials_table(credentials));
}

pub fn print_index_table(index: &AgentPluginRepositoryIndex) {
    println!();
    println!(
        "Plugin index (timestamp {}, compatible with {}):",
        index.timestamp(),
        index.compatible_version()
    );
    println!();

    let releases: Vec<&AgentPluginMetadata> = index
        .plugins()
        .values()
        .flat_map(|by_name| by_name.values().flatten())
        .collect();

    if releases.is_empty() {
        println!("No plugins listed.");
    } else {
        println!("{}", releases_table(releases));
    }
}

pub fn print_release_table(release: &AgentPluginMetadata) {
    println!("{}", releases_table([release]));
    println!();
    println!("  Resource: {}", release.resource_path.display());
    println!("  SHA-256:  {}", release.sha256);
}

pub fn print_analysis_text(analysis: &CredentialsAnalysis) {
    match analysis {
        CredentialsAnalysis::AllStolen => println!("\x1b[32mMATCH\x1b[0m {}", analysis),
        _ => println!("\x1b[31mMISMATCH\x1b[0m {}", analysis),
    }

    if let CredentialsAnalysis::ContentMismatch {
        missing,
        unexpected,
    } = analysis
    {
        if !missing.is_empty() {
            println!();
            println!("Missing:");
            println!("{}", credentials_table(missing));
        }
        if !unexpected.is_empty() {
            println!();
            println!("Unexpected:");
            println!("{}", credentials_table(unexpected));
        }
    }
}

fn format_os(entry: &HostFingerprint) -> String {
    match (&entry.fingerprint.os_type, &entry.fingerprint.os_version) {
        (Some(os), Some(version)) => format!("{} ({})", os, version),
        (Some(os), None) => os.to_string(),
        (None, Some(version)) => version.clone(),
        (None, None) => "-".to_string(),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}
