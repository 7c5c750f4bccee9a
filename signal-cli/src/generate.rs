//! Sample signal generator
//!
//! Writes a simple and a high-quality signal for each of the common
//! security types (CA, VA, EDR, UBA) so submitters have a starting point
//! and can see how much each piece of information adds to the quality of
//! a signal.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use signal_core::{
    quality_of_signal, AttackPattern, ComplianceStatus, ControlType, Cvss, Description, Entity,
    EntityAttributes, EntityType, Evidence, IpAddress, Remediation, SecurityContext, SecurityType,
    Severity, SeverityLevel, Signal, SignalSource, StandardMapping, Status, Tags, TextValue,
    WorkflowStatus,
};

const SUBMITTER: &str = "A-unique-signal-submitter-name";
const DAILY: i64 = 1440;

const FIREWALL_CHECK: &str =
    "Ensure 'Windows Firewall: Domain: Firewall state' is set to 'On (recommended)'";
const FIREWALL_DESCRIPTION: &str = "Select On (recommended) to have Windows Firewall with Advanced Security use the settings for this profile to filter network traffic. If you select Off, Windows Firewall with Advanced Security will not use any of the firewall rules or connection security rules for this profile.";

const RPC_VULNERABILITY: &str = "rpc.py through 0.6.0 allows Remote Code Execution";
const RPC_DESCRIPTION: &str = "rpc.py through 0.6.0 allows Remote Code Execution because an unpickle occurs when the \"serializer: pickle\" HTTP header is sent. In other words, although JSON (not Pickle) is the default data format, an unauthenticated client can cause the data to be processed with unpickle";

const PII_CHECK: &str = "Employee Personally Identifiable Information in the dark web";
const PII_DESCRIPTION: &str = "This control checks whether the Personally Identifiable Information of employees of an organization is available in the dark web. PII information includes the first name, last name, city, county, state, phone number and gender.";

const SYSTEM_DISCOVERY: &str = "SystemInfoDiscovery";
const SYSTEM_DISCOVERY_DESCRIPTION: &str = "A process gathered information about the operating system or hardware. Adversaries can use this to identify system vulnerabilities. Review the process tree.";

/// A sample written to disk
#[derive(Debug, Clone)]
pub struct GeneratedSample {
    pub path: PathBuf,
    pub quality: f64,
}

fn source() -> SignalSource {
    SignalSource::new(SUBMITTER).with_interval(DAILY)
}

fn machine() -> Entity {
    Entity::new(EntityType::Machine, "MyVirtualMachine.acme.com")
}

fn tags(entries: &[(&str, &[&str])]) -> Tags {
    entries
        .iter()
        .map(|(key, values)| (key.to_string(), json!(values)))
        .collect()
}

fn at(timestamp: &str) -> Result<DateTime<Utc>> {
    timestamp
        .parse()
        .with_context(|| format!("Invalid sample timestamp {}", timestamp))
}

fn rated_asset(kind: Option<&str>) -> EntityAttributes {
    EntityAttributes {
        kind: kind.map(str::to_string),
        criticality: Some(SeverityLevel::Medium),
        confidentiality_requirement: Some(SeverityLevel::Medium),
        integrity_requirement: Some(SeverityLevel::Critical),
        availability_requirement: Some(SeverityLevel::High),
        tags: Some(tags(&[
            ("location", &["Mumbai"]),
            ("dept", &["Finance"]),
            ("os", &["CentOS 7"]),
        ])),
        ..Default::default()
    }
}

fn technical_description() -> Description {
    Description {
        technical: Some(TextValue::literal("A suitable technical description")),
        business_impact: Some(TextValue::literal(
            "The potential business impact of this vulnerability",
        )),
        ..Default::default()
    }
}

fn remediation(description: &str, reference: &str, impact: &str) -> Remediation {
    Remediation::default()
        .with_description(TextValue::literal(description))
        .with_reference(TextValue::literal(reference))
        .with_impact(TextValue::literal(impact))
}

pub fn simple_ca_signal() -> Signal {
    Signal::builder(FIREWALL_CHECK, source())
        .description(FIREWALL_DESCRIPTION)
        .entity(machine())
        .security_context(SecurityContext::new(
            SecurityType::Ca,
            Status::compliance(ComplianceStatus::Fail),
            Severity::new("ccss").with_value(7.2),
        ))
        .build()
}

pub fn high_quality_ca_signal() -> Result<Signal> {
    let mut cvss = Cvss::new("2.0", 7.2);
    cvss.temporal_score = Some(7.2);
    cvss.environmental_score = Some(7.2);
    let mut severity = Severity::new("ccss").with_value(7.2);
    severity.cvss = Some(cvss);

    let mut context = SecurityContext::new(
        SecurityType::Ca,
        Status::compliance(ComplianceStatus::Fail),
        severity,
    )
    .with_standard(StandardMapping::new("stig", "V-63399"))
    .with_standard(StandardMapping::new("cisBenchMark", "9.1.1"))
    .with_attack_pattern(AttackPattern::new("Account Manipulation", "ATT&CK").with_technique("T1098"))
    .with_control_type(ControlType::Detection)
    .with_description(technical_description())
    .with_remediation(remediation(
        "Describe how to remediate",
        "https://technet.microsoft.com/en-us/library/bb490626.aspx",
        "Describe the impact of remediation",
    ));
    context.tags = Some(tags(&[("resource", &["exploit"])]));

    Ok(Signal::builder(FIREWALL_CHECK, source())
        .id("09d34300-4c54-4e5e-9050-fff5d912cb19")
        .description(FIREWALL_DESCRIPTION)
        .first_seen(at("2022-08-07T00:00:00Z")?)
        .entity(machine().with_attributes(rated_asset(None)))
        .security_context(context)
        .tag("stage", json!(["production"]))
        .build())
}

pub fn simple_va_signal() -> Signal {
    Signal::builder(RPC_VULNERABILITY, source())
        .description(RPC_DESCRIPTION)
        .entity(machine())
        .security_context(
            SecurityContext::new(
                SecurityType::Va,
                Status::compliance(ComplianceStatus::Fail),
                Severity::new("cvss").with_value(9.8),
            )
            .with_standard(StandardMapping::new("cve", "CVE-2022-35411")),
        )
        .build()
}

pub fn high_quality_va_signal() -> Result<Signal> {
    let cvss = Cvss::new("3.1", 9.8).with_vector("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H");

    let mut context = SecurityContext::new(
        SecurityType::Va,
        Status::compliance(ComplianceStatus::Fail),
        Severity::cvss(cvss),
    )
    .with_standard(StandardMapping::new("cve", "CVE-2022-35411"))
    .with_attack_pattern(AttackPattern::new("Compromise Accounts", "ATT&CK").with_technique("T1586"))
    .with_attack_pattern(
        AttackPattern::new("Endpoint Denial of Service", "ATT&CK").with_technique("T1499"),
    )
    .with_attack_pattern(
        AttackPattern::new("Exploitation of Remote Services", "ATT&CK").with_technique("T1210"),
    )
    .with_control_type(ControlType::Detection)
    .with_description(technical_description())
    .with_remediation(remediation(
        "Describe how to remediate",
        "http://packetstormsecurity.com/files/167872/rpc.py-0.6.0-Remote-Code-Execution.html",
        "Describe the impact of remediation",
    ));
    context.tags = Some(tags(&[
        ("resource", &["exploit", "Patch"]),
        (
            "configuration",
            &["cpe:2.3:a:rpc.py_project:rpc.py:*:*:*:*:*:*:*:*"],
        ),
    ]));

    Ok(Signal::builder(RPC_VULNERABILITY, source())
        .id("0b6f4e2c-3f57-4d6a-9a43-8d1f3c2b7e10")
        .description(RPC_DESCRIPTION)
        .first_seen(at("2022-08-07T00:00:00Z")?)
        .entity(machine().with_attributes(rated_asset(None)))
        .security_context(context)
        .tag("application", json!(["rpc.py"]))
        .tag("port", json!(["443", "80"]))
        .build())
}

fn detection(observation: &str, detection_id: &str, files: &[&str]) -> SecurityContext {
    let status = Status {
        compliance_status: Some(ComplianceStatus::Fail),
        workflow_status: Some(WorkflowStatus::New),
    };

    let mut context = SecurityContext::new(
        SecurityType::Edr,
        status,
        Severity::new("custom").with_level(SeverityLevel::High),
    )
    .with_attack_pattern(
        AttackPattern::new("Data from Local system", "ATT&CK").with_technique("T1005"),
    );
    context.evidence = Some(Evidence {
        observation_text: Some(observation.to_string()),
        ..Default::default()
    });
    context.tags = Some(tags(&[
        ("detectionId", &[detection_id]),
        ("detectionTime", &["2023-03-09T11:42:28Z"]),
        ("files", files),
    ]));
    context
}

pub fn simple_edr_signal() -> Signal {
    Signal::builder(SYSTEM_DISCOVERY, SignalSource::new(SUBMITTER))
        .description(SYSTEM_DISCOVERY_DESCRIPTION)
        .entity(machine())
        .security_context(SecurityContext::new(
            SecurityType::Edr,
            Status::workflow(WorkflowStatus::New),
            Severity::new("custom").with_level(SeverityLevel::High),
        ))
        .build()
}

pub fn high_quality_edr_signal() -> Result<Signal> {
    let attributes = EntityAttributes {
        ip_addresses: vec![IpAddress {
            name: "Ip".to_string(),
            ipv4: Some("10.0.6.173".to_string()),
            ipv6: None,
        }],
        kind: Some(
            "Windows Server 2019 Datacenter 64 bit Edition Version 1809 Build 17763".to_string(),
        ),
        tags: Some(tags(&[("hostname", &["MyVirtualMachine"])])),
        ..Default::default()
    };

    let malware = r#"{"name":"malware.exe","checksumSha256":"550a68076cd1bade01da6e7a359d5642d1222934a1a862f5045e17374ef89539","checksumMd5":"78979bd9288153580175da12d95f05b5","filePath":"/usr/bin/malware.exe","commandLine":"/usr/bin/malware.exe --systemd-watchdog","parentchecksumSha256":"","parentchecksumMd5":""}"#;
    let subprocess = r#"{"name":"malwareSubProcess.exe","checksumSha256":"9900a68076cd1bade01da6e7a359d5642d1222934a1a862f5045e17374ef89539","checksumMd5":"87179bd9288153580175da12d95f05b5","filePath":"/usr/bin/malwareSubProcess.exe","commandLine":"/usr/bin/malwareSubProcess.exe --systemd-watchdog","parentchecksumSha256":"","parentchecksumMd5":""}"#;
    let other = r#"{"name":"someothermalware.exe","checksumSha256":"550a68076cd1bade01da6e7a359d5642d1222934a1a862f5045e17374ef89539","checksumMd5":"78979bd9288153580175da12d95f05b5","filePath":"/usr/bin/someothermalware.exe","commandLine":"/usr/bin/someothermalware.exe --systemd-watchdog","parentchecksumSha256":"","parentchecksumMd5":""}"#;

    Ok(Signal::builder(SYSTEM_DISCOVERY, SignalSource::new(SUBMITTER))
        .id("aa332918-3319-470f-a18b-e75e326c9d7d")
        .description(SYSTEM_DISCOVERY_DESCRIPTION)
        .created_at(at("2023-03-09T11:42:28Z")?)
        .first_seen(at("2023-03-08T11:42:28Z")?)
        .last_seen(at("2023-03-09T11:42:28Z")?)
        .confidence(100)
        .entity(machine().with_attributes(attributes))
        .add_security_context(detection(
            "malware.exe tries to access system info",
            "999e1e2a-effc-4317-b7b3-31e184d15481",
            &[malware, subprocess],
        ))
        .add_security_context(detection(
            "someothermalware.exe",
            "111e1e2a-effc-4317-b7b3-31e184d15481",
            &[other],
        ))
        .build())
}

fn employee() -> Entity {
    Entity::new(EntityType::Identity, "john.doe@acme.com")
}

pub fn simple_uba_signal() -> Signal {
    Signal::builder(PII_CHECK, source())
        .description(PII_DESCRIPTION)
        .entity(employee())
        .security_context(SecurityContext::new(
            SecurityType::Uba,
            Status::compliance(ComplianceStatus::Pass),
            Severity::new("ccss").with_value(8.0),
        ))
        .build()
}

pub fn high_quality_uba_signal() -> Result<Signal> {
    let attributes = EntityAttributes {
        kind: Some("User".to_string()),
        tags: Some(tags(&[
            ("location", &["Mumbai"]),
            ("dept", &["Finance"]),
            ("os", &["CentOS 7"]),
        ])),
        ..Default::default()
    };

    let mut context = SecurityContext::new(
        SecurityType::Uba,
        Status::compliance(ComplianceStatus::Pass),
        Severity::new("ccss").with_value(8.0),
    )
    .with_attack_pattern(
        AttackPattern::new("Gather Victim Identity Information: Email Addresses", "ATT&CK")
            .with_technique("T1589.002"),
    )
    .with_attack_pattern(
        AttackPattern::new("Compromise Accounts: Email Accounts", "ATT&CK")
            .with_technique("T1586.002"),
    )
    .with_control_type(ControlType::Detection)
    .with_description(technical_description())
    .with_remediation(remediation(
        "Closely monitor employee accounts with leaked PII data for identity theft",
        "NA",
        "NA",
    ));
    context.evidence = Some(Evidence {
        observation_text: Some("No personal information breach detected".to_string()),
        ..Default::default()
    });
    context.tags = Some(tags(&[("resource", &["PII"])]));

    Ok(Signal::builder(PII_CHECK, source())
        .id("ff210e99-cd28-4a4a-a510-e0b865f6ce36")
        .description(PII_DESCRIPTION)
        .first_seen(at("2022-08-07T00:00:00Z")?)
        .confidence(100)
        .entity(employee().with_attributes(attributes))
        .security_context(context)
        .tag("stage", json!(["production"]))
        .build())
}

/// Every sample with the file name it is saved under
pub fn sample_signals() -> Result<Vec<(&'static str, Signal)>> {
    Ok(vec![
        ("simple-ca-signal.json", simple_ca_signal()),
        ("high-quality-ca-signal.json", high_quality_ca_signal()?),
        ("simple-va-signal.json", simple_va_signal()),
        ("high-quality-va-signal.json", high_quality_va_signal()?),
        ("simple-edr-signal.json", simple_edr_signal()),
        ("high-quality-edr-signal.json", high_quality_edr_signal()?),
        ("simple-uba-signal.json", simple_uba_signal()),
        ("high-quality-uba-signal.json", high_quality_uba_signal()?),
    ])
}

/// Write every sample to `dir` as pretty JSON, creating it if needed
pub fn write_samples(dir: &Path) -> Result<Vec<GeneratedSample>> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut written = Vec::new();
    for (file_name, signal) in sample_signals()? {
        let path = dir.join(file_name);
        fs::write(&path, signal.to_json_pretty()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Wrote {} ({})", path.display(), signal.id);

        written.push(GeneratedSample {
            path,
            quality: quality_of_signal(&signal),
        });
    }
    Ok(written)
}
