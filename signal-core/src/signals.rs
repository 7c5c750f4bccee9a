//! Signal document model
//!
//! A signal is any piece of information about an asset that matters for
//! security scoring. Field names follow the STIX 2.1 vocabulary where one
//! exists; the wire form is camelCase JSON.
//!
//! Signals are submitted whole and never edited in place: a correction is a
//! new signal sharing the same `name` with a new `id` and `modifiedAt`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::{
    ComplianceStatus, ContextSlot, ControlType, Cvss, Effect, EntityType, FieldPath,
    ImpactAssertion, Location, PreDefinedSignalSource, SecurityType, SeverityLevel, SignalType,
    TextField, TextValue, WorkflowStatus, SIGNAL_SCHEMA_VERSION,
};

/// Free-form tags (key -> arbitrary JSON value)
pub type Tags = BTreeMap<String, serde_json::Value>;

/// Identity of the submitter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalSource {
    pub name: String,
    /// Expected re-submission interval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_submission_interval_in_mins: Option<i64>,
}

impl SignalSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            next_submission_interval_in_mins: None,
        }
    }

    pub fn with_interval(mut self, minutes: i64) -> Self {
        self.next_submission_interval_in_mins = Some(minutes);
        self
    }

    /// Well-known source this submitter corresponds to, if any
    pub fn predefined(&self) -> Option<PreDefinedSignalSource> {
        PreDefinedSignalSource::from_name(&self.name)
    }
}

/// Pointer to the asset in an external asset-management system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityManagement {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub lookup_attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpAddress {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<String>,
}

/// Business ratings of the asset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityAttributes {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_addresses: Vec<IpAddress>,
    /// Free-form asset type, e.g. an OS build string
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criticality: Option<SeverityLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidentiality_requirement: Option<SeverityLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity_requirement: Option<SeverityLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_requirement: Option<SeverityLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
}

/// Credentials for remote assessment of the asset
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionAttributes {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privileged_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_passphrase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, String>>,
}

impl ConnectionAttributes {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            connection_string: None,
            username: None,
            password: None,
            privileged_password: None,
            port: None,
            ssh_key: None,
            ssh_passphrase: None,
            attributes: None,
        }
    }
}

// Secrets never reach logs
impl fmt::Debug for ConnectionAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(value: &Option<String>) -> Option<&'static str> {
            value.as_ref().map(|_| "<redacted>")
        }

        f.debug_struct("ConnectionAttributes")
            .field("kind", &self.kind)
            .field("connection_string", &redact(&self.connection_string))
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("privileged_password", &redact(&self.privileged_password))
            .field("port", &self.port)
            .field("ssh_key", &redact(&self.ssh_key))
            .field("ssh_passphrase", &redact(&self.ssh_passphrase))
            .field("attributes", &self.attributes)
            .finish()
    }
}

/// The asset a signal concerns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(rename = "type")]
    pub kind: EntityType,
    /// Stable qualified identifier: FQDN, IP, ARN, email...
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_management: Option<EntityManagement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_attributes: Option<EntityAttributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_attributes: Option<ConnectionAttributes>,
}

impl Entity {
    pub fn new(kind: EntityType, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            entity_management: None,
            entity_attributes: None,
            connection_attributes: None,
        }
    }

    pub fn with_attributes(mut self, attributes: EntityAttributes) -> Self {
        self.entity_attributes = Some(attributes);
        self
    }

    pub fn with_management(mut self, management: EntityManagement) -> Self {
        self.entity_management = Some(management);
        self
    }

    pub fn with_connection(mut self, connection: ConnectionAttributes) -> Self {
        self.connection_attributes = Some(connection);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Severity {
    /// Scoring system, e.g. `cvss`, `ccss` or `custom`
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<SeverityLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cvss: Option<Cvss>,
}

impl Severity {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            value: None,
            level: None,
            cvss: None,
        }
    }

    pub fn cvss(cvss: Cvss) -> Self {
        Self {
            cvss: Some(cvss),
            ..Self::new(crate::CVSS_SEVERITY_TYPE)
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_level(mut self, level: SeverityLevel) -> Self {
        self.level = Some(level);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_status: Option<ComplianceStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_status: Option<WorkflowStatus>,
}

impl Status {
    pub fn compliance(status: ComplianceStatus) -> Self {
        Self {
            compliance_status: Some(status),
            workflow_status: None,
        }
    }

    pub fn workflow(status: WorkflowStatus) -> Self {
        Self {
            compliance_status: None,
            workflow_status: Some(status),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Mapping onto an external standard (CVE, CIS, PCI...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardMapping {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, String>>,
}

impl StandardMapping {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            properties: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KillChainPhase {
    pub name: String,
    pub phase: String,
}

/// ATT&CK technique an attack pattern maps to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackPatternMapping {
    pub technique_name: String,
    pub technique_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackPattern {
    pub name: String,
    pub source_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<TextValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<AttackPatternMapping>,
}

impl AttackPattern {
    pub fn new(name: &str, source_name: &str) -> Self {
        Self {
            name: name.to_string(),
            source_name: source_name.to_string(),
            description: None,
            source_id: None,
            mapping: None,
        }
    }

    pub fn with_technique(mut self, technique_id: &str) -> Self {
        self.mapping = Some(AttackPatternMapping {
            technique_name: self.name.clone(),
            technique_id: technique_id.to_string(),
        });
        self
    }

    pub fn with_description(mut self, description: TextValue) -> Self {
        self.description = Some(description);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub objective: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<TextValue>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Business and technical prose about a finding
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Description {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business: Option<TextValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical: Option<TextValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_impact: Option<TextValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Remediation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<TextValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<TextValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<TextValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<TextValue>,
}

impl Remediation {
    pub fn with_description(mut self, description: TextValue) -> Self {
        self.description = Some(description);
        self
    }

    pub fn with_reference(mut self, reference: TextValue) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_impact(mut self, impact: TextValue) -> Self {
        self.impact = Some(impact);
        self
    }
}

/// The finding itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityContext {
    #[serde(rename = "type")]
    pub kind: SecurityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    pub status: Status,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub standards_mapping: Vec<StandardMapping>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kill_chain_phases: Vec<KillChainPhase>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attack_pattern: Vec<AttackPattern>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cam_controls: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub campaign: Vec<Campaign>,
    /// -10 (score improvement) ..= 10 (penalty); see [`ImpactAssertion`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree_of_impact: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effect: Vec<Effect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_type: Option<ControlType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Description>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<Remediation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
}

impl SecurityContext {
    pub fn new(kind: SecurityType, status: Status, severity: Severity) -> Self {
        Self {
            kind,
            sub_type: None,
            status,
            severity,
            evidence: None,
            standards_mapping: Vec::new(),
            kill_chain_phases: Vec::new(),
            attack_pattern: Vec::new(),
            cam_controls: Vec::new(),
            campaign: Vec::new(),
            degree_of_impact: None,
            effect: Vec::new(),
            control_type: None,
            description: None,
            remediation: None,
            tags: None,
        }
    }

    pub fn with_sub_type(mut self, sub_type: &str) -> Self {
        self.sub_type = Some(sub_type.to_string());
        self
    }

    pub fn with_degree_of_impact(mut self, degree: i64) -> Self {
        self.degree_of_impact = Some(degree);
        self
    }

    pub fn with_description(mut self, description: Description) -> Self {
        self.description = Some(description);
        self
    }

    pub fn with_remediation(mut self, remediation: Remediation) -> Self {
        self.remediation = Some(remediation);
        self
    }

    pub fn with_attack_pattern(mut self, pattern: AttackPattern) -> Self {
        self.attack_pattern.push(pattern);
        self
    }

    pub fn with_standard(mut self, mapping: StandardMapping) -> Self {
        self.standards_mapping.push(mapping);
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effect.push(effect);
        self
    }

    pub fn with_control_type(mut self, control_type: ControlType) -> Self {
        self.control_type = Some(control_type);
        self
    }

    pub fn impact(&self) -> ImpactAssertion {
        ImpactAssertion::from_degree(self.degree_of_impact)
    }

    /// Read one string-or-reference field
    pub fn text_field(&self, field: TextField) -> Option<&TextValue> {
        match field {
            TextField::DescriptionBusiness => self.description.as_ref()?.business.as_ref(),
            TextField::DescriptionTechnical => self.description.as_ref()?.technical.as_ref(),
            TextField::DescriptionBusinessImpact => {
                self.description.as_ref()?.business_impact.as_ref()
            }
            TextField::RemediationDescription => self.remediation.as_ref()?.description.as_ref(),
            TextField::RemediationReference => self.remediation.as_ref()?.reference.as_ref(),
            TextField::RemediationReferences(i) => self.remediation.as_ref()?.references.get(i),
            TextField::RemediationImpact => self.remediation.as_ref()?.impact.as_ref(),
            TextField::AttackPatternDescription(i) => {
                self.attack_pattern.get(i)?.description.as_ref()
            }
            TextField::CampaignDescription(i) => self.campaign.get(i)?.description.as_ref(),
        }
    }

    pub fn text_field_mut(&mut self, field: TextField) -> Option<&mut TextValue> {
        match field {
            TextField::DescriptionBusiness => self.description.as_mut()?.business.as_mut(),
            TextField::DescriptionTechnical => self.description.as_mut()?.technical.as_mut(),
            TextField::DescriptionBusinessImpact => {
                self.description.as_mut()?.business_impact.as_mut()
            }
            TextField::RemediationDescription => self.remediation.as_mut()?.description.as_mut(),
            TextField::RemediationReference => self.remediation.as_mut()?.reference.as_mut(),
            TextField::RemediationReferences(i) => {
                self.remediation.as_mut()?.references.get_mut(i)
            }
            TextField::RemediationImpact => self.remediation.as_mut()?.impact.as_mut(),
            TextField::AttackPatternDescription(i) => {
                self.attack_pattern.get_mut(i)?.description.as_mut()
            }
            TextField::CampaignDescription(i) => self.campaign.get_mut(i)?.description.as_mut(),
        }
    }

    /// Every string-or-reference field present in this context, in document order
    pub fn text_fields(&self) -> Vec<(TextField, &TextValue)> {
        let mut fields = vec![
            TextField::DescriptionBusiness,
            TextField::DescriptionTechnical,
            TextField::DescriptionBusinessImpact,
            TextField::RemediationDescription,
            TextField::RemediationReference,
        ];
        if let Some(remediation) = &self.remediation {
            fields.extend((0..remediation.references.len()).map(TextField::RemediationReferences));
        }
        fields.push(TextField::RemediationImpact);
        fields.extend((0..self.attack_pattern.len()).map(TextField::AttackPatternDescription));
        fields.extend((0..self.campaign.len()).map(TextField::CampaignDescription));

        fields
            .into_iter()
            .filter_map(|field| self.text_field(field).map(|value| (field, value)))
            .collect()
    }
}

/// A signal document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub version: String,

    /// Globally unique; re-using an id overwrites the stored version
    pub id: String,

    /// Logical identity shared by every temporal instance of a finding
    pub name: String,

    pub source: SignalSource,

    #[serde(rename = "type", default)]
    pub signal_type: SignalType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Retained but excluded from active scoring by consumers
    #[serde(default)]
    pub revoked: bool,

    /// 0..=100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub location: Vec<Location>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Entity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<SecurityContext>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_contexts: Vec<SecurityContext>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub business_context: BTreeMap<String, Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
}

impl Signal {
    /// Create a new signal builder
    pub fn builder(name: &str, source: SignalSource) -> SignalBuilder {
        SignalBuilder::new(name, source)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Whether any security context is carried, singular or plural
    pub fn has_security_context(&self) -> bool {
        self.security_context.is_some() || !self.security_contexts.is_empty()
    }

    /// All security contexts with their slot
    pub fn contexts(&self) -> impl Iterator<Item = (ContextSlot, &SecurityContext)> {
        self.security_context
            .iter()
            .map(|ctx| (ContextSlot::Single, ctx))
            .chain(
                self.security_contexts
                    .iter()
                    .enumerate()
                    .map(|(i, ctx)| (ContextSlot::Indexed(i), ctx)),
            )
    }

    pub fn context(&self, slot: ContextSlot) -> Option<&SecurityContext> {
        match slot {
            ContextSlot::Single => self.security_context.as_ref(),
            ContextSlot::Indexed(i) => self.security_contexts.get(i),
        }
    }

    pub fn context_mut(&mut self, slot: ContextSlot) -> Option<&mut SecurityContext> {
        match slot {
            ContextSlot::Single => self.security_context.as_mut(),
            ContextSlot::Indexed(i) => self.security_contexts.get_mut(i),
        }
    }

    pub fn text_field(&self, path: FieldPath) -> Option<&TextValue> {
        self.context(path.context)?.text_field(path.field)
    }

    pub fn text_field_mut(&mut self, path: FieldPath) -> Option<&mut TextValue> {
        self.context_mut(path.context)?.text_field_mut(path.field)
    }

    /// Every string-or-reference field present in the document
    pub fn text_fields(&self) -> Vec<(FieldPath, &TextValue)> {
        self.contexts()
            .flat_map(|(slot, ctx)| {
                ctx.text_fields()
                    .into_iter()
                    .map(move |(field, value)| (FieldPath::new(slot, field), value))
            })
            .collect()
    }

    /// Fields holding a `signalurl://` reference, with the referenced id
    pub fn references(&self) -> Vec<(FieldPath, &str)> {
        self.text_fields()
            .into_iter()
            .filter_map(|(path, value)| value.reference_id().map(|id| (path, id)))
            .collect()
    }

    /// Content digest of the canonical JSON form
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        let json = serde_json::to_string(self).unwrap_or_default();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Timestamp ordering temporal instances of the same `name`
    pub fn effective_time(&self) -> DateTime<Utc> {
        self.modified_at.unwrap_or(self.created_at)
    }
}

/// Builder for signals
pub struct SignalBuilder {
    id: String,
    name: String,
    source: SignalSource,
    signal_type: SignalType,
    created_at: DateTime<Utc>,
    first_seen: Option<DateTime<Utc>>,
    last_seen: Option<DateTime<Utc>>,
    modified_at: Option<DateTime<Utc>>,
    confidence: Option<i64>,
    revoked: bool,
    description: Option<String>,
    location: Vec<Location>,
    entity: Option<Entity>,
    security_context: Option<SecurityContext>,
    security_contexts: Vec<SecurityContext>,
    business_context: BTreeMap<String, Vec<String>>,
    tags: Option<Tags>,
}

impl SignalBuilder {
    pub fn new(name: &str, source: SignalSource) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            source,
            signal_type: SignalType::default(),
            created_at: Utc::now(),
            first_seen: None,
            last_seen: None,
            modified_at: None,
            confidence: None,
            revoked: false,
            description: None,
            location: Vec::new(),
            entity: None,
            security_context: None,
            security_contexts: Vec::new(),
            business_context: BTreeMap::new(),
            tags: None,
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn signal_type(mut self, signal_type: SignalType) -> Self {
        self.signal_type = signal_type;
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn first_seen(mut self, first_seen: DateTime<Utc>) -> Self {
        self.first_seen = Some(first_seen);
        self
    }

    pub fn last_seen(mut self, last_seen: DateTime<Utc>) -> Self {
        self.last_seen = Some(last_seen);
        self
    }

    pub fn modified_at(mut self, modified_at: DateTime<Utc>) -> Self {
        self.modified_at = Some(modified_at);
        self
    }

    pub fn confidence(mut self, confidence: i64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn revoked(mut self, revoked: bool) -> Self {
        self.revoked = revoked;
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn location(mut self, country_code: &str) -> Self {
        self.location.push(Location::new(country_code));
        self
    }

    pub fn entity(mut self, entity: Entity) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn security_context(mut self, context: SecurityContext) -> Self {
        self.security_context = Some(context);
        self
    }

    /// Append to the plural `securityContexts` list
    pub fn add_security_context(mut self, context: SecurityContext) -> Self {
        self.security_contexts.push(context);
        self
    }

    pub fn business_context(mut self, key: &str, values: &[&str]) -> Self {
        self.business_context
            .insert(key.to_string(), values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn tag(mut self, key: &str, value: serde_json::Value) -> Self {
        self.tags
            .get_or_insert_with(Tags::new)
            .insert(key.to_string(), value);
        self
    }

    pub fn build(self) -> Signal {
        Signal {
            version: SIGNAL_SCHEMA_VERSION.to_string(),
            id: self.id,
            name: self.name,
            source: self.source,
            signal_type: self.signal_type,
            description: self.description,
            comment: None,
            created_at: self.created_at,
            first_seen: self.first_seen,
            last_seen: self.last_seen,
            modified_at: self.modified_at,
            expires_at: None,
            revoked: self.revoked,
            confidence: self.confidence,
            location: self.location,
            entity: self.entity,
            security_context: self.security_context,
            security_contexts: self.security_contexts,
            business_context: self.business_context,
            tags: self.tags,
        }
    }
}
