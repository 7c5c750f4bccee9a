//! Enumerations and value types shared across the signal model
//!
//! Every enumeration is string-valued on the wire (camelCase). Numeric
//! discriminants are never exposed: data-lake queries and reports stay
//! readable when the stored value is the name itself.

use serde::{Deserialize, Serialize};

/// Which parts of a signal are mandatory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SignalType {
    /// Self-contained submission: entity plus at least one security context
    #[default]
    Default,
    /// Asset description only, later referenced by findings
    EntityOnly,
    /// Finding only; the entity may live in a separately submitted signal
    SecurityContextOnly,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::EntityOnly => "entityOnly",
            Self::SecurityContextOnly => "securityContextOnly",
        }
    }
}

/// Kind of asset a signal concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityType {
    /// Hostname, IP address, CIDR or cloud resource (ARN)
    Machine,
    /// Typically the object of a malware report
    File,
    /// Human or system user, usually an email or user id
    Identity,
    Organization,
}

/// Coarse severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SeverityLevel {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

/// Category of security information carried by a security context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecurityType {
    Finding,
    OutsideIn,
    /// Configuration assessment
    Ca,
    /// Vulnerability assessment
    Va,
    Edr,
    Log,
    Backup,
    Network,
    Dlp,
    Email,
    /// User behavior analytics
    Uba,
    Waf,
    /// Extensible member; the concrete category goes in `subType`
    Others,
}

impl SecurityType {
    /// Whether a compliance status is meaningful for this category
    pub fn is_compliance_capable(&self) -> bool {
        matches!(
            self,
            Self::Ca | Self::Va | Self::Finding | Self::OutsideIn | Self::Others
        )
    }

    /// Open members accept an arbitrary, submitter-defined sub type
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Others)
    }
}

/// Status applicable to compliance signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComplianceStatus {
    Pass,
    Fail,
    Unknown,
}

/// Workflow state reported by the source of the signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkflowStatus {
    New,
    RiskAccepted,
    Resolved,
}

/// Possible effect of a finding (after the AWS ASFF vocabulary)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Effect {
    DataExposure,
    DataExfiltration,
    DataDestruction,
    DenialOfService,
    ResourceConsumption,
}

/// Kind of control a signal represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlType {
    Detection,
    Mitigation,
    Resilience,
    Recovery,
}

/// Well-known signal sources whose degree of impact the store can derive itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PreDefinedSignalSource {
    #[serde(rename = "com.qualys.ca")]
    QualysCa,
    #[serde(rename = "com.tanium.comply")]
    TaniumComply,
}

impl PreDefinedSignalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QualysCa => "com.qualys.ca",
            Self::TaniumComply => "com.tanium.comply",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [Self::QualysCa, Self::TaniumComply]
            .into_iter()
            .find(|s| s.as_str() == name)
    }
}

/// Country a signal relates to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// ISO-3166 alpha-2 code
    pub country_code: String,
}

impl Location {
    pub fn new(country_code: &str) -> Self {
        Self {
            country_code: country_code.to_string(),
        }
    }
}

/// Severity type value that makes the CVSS score ranges binding
pub const CVSS_SEVERITY_TYPE: &str = "cvss";

/// Common Vulnerability Scoring System rating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cvss {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<String>,
    pub base_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environmental_score: Option<f64>,
}

impl Cvss {
    pub fn new(version: &str, base_score: f64) -> Self {
        Self {
            version: version.to_string(),
            vector: None,
            base_score,
            temporal_score: None,
            environmental_score: None,
        }
    }

    pub fn with_vector(mut self, vector: &str) -> Self {
        self.vector = Some(vector.to_string());
        self
    }

    /// Split the vector into its metrics.
    ///
    /// Returns `None` when there is no vector, when the `CVSS:<version>`
    /// prefix is missing, or when a component is not a known metric with a
    /// non-empty value.
    pub fn parse_vector(&self) -> Option<Vec<(Cvss31Metric, String)>> {
        let vector = self.vector.as_deref()?;
        let mut parts = vector.split('/');
        let prefix = parts.next()?;
        let version = prefix.strip_prefix("CVSS:")?;
        if version.is_empty() {
            return None;
        }

        let mut metrics = Vec::new();
        for part in parts {
            let (name, value) = part.split_once(':')?;
            let metric = Cvss31Metric::from_abbreviation(name)?;
            if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphabetic()) {
                return None;
            }
            metrics.push((metric, value.to_string()));
        }

        if metrics.is_empty() {
            None
        } else {
            Some(metrics)
        }
    }
}

/// CVSS 3.1 metric names and their vector abbreviations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cvss31Metric {
    AttackVector,
    AttackComplexity,
    PrivilegesRequired,
    UserInteraction,
    Scope,
    Confidentiality,
    Integrity,
    Availability,
    ExploitCodeMaturity,
    RemediationLevel,
    ReportConfidence,
    ConfidentialityRequirement,
    IntegrityRequirement,
    AvailabilityRequirement,
    ModifiedAttackVector,
    ModifiedAttackComplexity,
    ModifiedPrivilegesRequired,
    ModifiedUserInteraction,
    ModifiedScope,
    ModifiedConfidentiality,
    ModifiedIntegrity,
    ModifiedAvailability,
}

impl Cvss31Metric {
    const ALL: [Cvss31Metric; 22] = [
        Self::AttackVector,
        Self::AttackComplexity,
        Self::PrivilegesRequired,
        Self::UserInteraction,
        Self::Scope,
        Self::Confidentiality,
        Self::Integrity,
        Self::Availability,
        Self::ExploitCodeMaturity,
        Self::RemediationLevel,
        Self::ReportConfidence,
        Self::ConfidentialityRequirement,
        Self::IntegrityRequirement,
        Self::AvailabilityRequirement,
        Self::ModifiedAttackVector,
        Self::ModifiedAttackComplexity,
        Self::ModifiedPrivilegesRequired,
        Self::ModifiedUserInteraction,
        Self::ModifiedScope,
        Self::ModifiedConfidentiality,
        Self::ModifiedIntegrity,
        Self::ModifiedAvailability,
    ];

    pub fn abbreviation(&self) -> &'static str {
        match self {
            Self::AttackVector => "AV",
            Self::AttackComplexity => "AC",
            Self::PrivilegesRequired => "PR",
            Self::UserInteraction => "UI",
            Self::Scope => "S",
            Self::Confidentiality => "C",
            Self::Integrity => "I",
            Self::Availability => "A",
            Self::ExploitCodeMaturity => "E",
            Self::RemediationLevel => "RL",
            Self::ReportConfidence => "RC",
            Self::ConfidentialityRequirement => "CR",
            Self::IntegrityRequirement => "IR",
            Self::AvailabilityRequirement => "AR",
            Self::ModifiedAttackVector => "MAV",
            Self::ModifiedAttackComplexity => "MAC",
            Self::ModifiedPrivilegesRequired => "MPR",
            Self::ModifiedUserInteraction => "MUI",
            Self::ModifiedScope => "MS",
            Self::ModifiedConfidentiality => "MC",
            Self::ModifiedIntegrity => "MI",
            Self::ModifiedAvailability => "MA",
        }
    }

    pub fn from_abbreviation(abbreviation: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.abbreviation() == abbreviation)
    }
}

/// Interpretation of a submitter-asserted `degreeOfImpact`.
///
/// Absent and an explicit `0` are kept apart: `Unset` leaves the impact to
/// be derived from severity, `Neutral` asserts that the signal moves the
/// score neither way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpactAssertion {
    Unset,
    Neutral,
    /// Positive value, lowers the score
    Penalty(i64),
    /// Negative value, raises the score
    Improvement(i64),
}

impl ImpactAssertion {
    pub fn from_degree(degree: Option<i64>) -> Self {
        match degree {
            None => Self::Unset,
            Some(0) => Self::Neutral,
            Some(n) if n > 0 => Self::Penalty(n),
            Some(n) => Self::Improvement(n),
        }
    }

    pub fn is_asserted(&self) -> bool {
        !matches!(self, Self::Unset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&SignalType::SecurityContextOnly).unwrap(),
            "\"securityContextOnly\""
        );
        assert_eq!(
            serde_json::to_string(&WorkflowStatus::RiskAccepted).unwrap(),
            "\"riskAccepted\""
        );
        assert_eq!(
            serde_json::from_str::<SecurityType>("\"outsideIn\"").unwrap(),
            SecurityType::OutsideIn
        );
        assert!(serde_json::from_str::<EntityType>("\"printer\"").is_err());
    }

    #[test]
    fn test_predefined_sources() {
        assert_eq!(
            PreDefinedSignalSource::from_name("com.qualys.ca"),
            Some(PreDefinedSignalSource::QualysCa)
        );
        assert_eq!(PreDefinedSignalSource::from_name("acme"), None);
        assert_eq!(
            serde_json::to_string(&PreDefinedSignalSource::TaniumComply).unwrap(),
            "\"com.tanium.comply\""
        );
    }

    #[test]
    fn test_severity_ordering() {
        assert!(SeverityLevel::Critical > SeverityLevel::High);
        assert!(SeverityLevel::Info < SeverityLevel::Low);
    }

    #[test]
    fn test_parse_cvss_vector() {
        let cvss = Cvss::new("3.1", 9.8).with_vector("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H");
        let metrics = cvss.parse_vector().unwrap();
        assert_eq!(metrics.len(), 8);
        assert_eq!(metrics[0], (Cvss31Metric::AttackVector, "N".to_string()));
        assert_eq!(metrics[7], (Cvss31Metric::Availability, "H".to_string()));
    }

    #[test]
    fn test_parse_malformed_cvss_vector() {
        assert!(Cvss::new("3.1", 5.0).parse_vector().is_none());
        assert!(Cvss::new("3.1", 5.0).with_vector("AV:N/AC:L").parse_vector().is_none());
        assert!(Cvss::new("3.1", 5.0).with_vector("CVSS:3.1/XX:N").parse_vector().is_none());
        assert!(Cvss::new("3.1", 5.0).with_vector("CVSS:3.1/AV:").parse_vector().is_none());
        assert!(Cvss::new("3.1", 5.0).with_vector("CVSS:3.1").parse_vector().is_none());
    }

    #[test]
    fn test_impact_assertion() {
        assert_eq!(ImpactAssertion::from_degree(None), ImpactAssertion::Unset);
        assert_eq!(ImpactAssertion::from_degree(Some(0)), ImpactAssertion::Neutral);
        assert_eq!(ImpactAssertion::from_degree(Some(4)), ImpactAssertion::Penalty(4));
        assert_eq!(ImpactAssertion::from_degree(Some(-3)), ImpactAssertion::Improvement(-3));
        assert!(ImpactAssertion::Neutral.is_asserted());
        assert!(!ImpactAssertion::Unset.is_asserted());
    }
}
