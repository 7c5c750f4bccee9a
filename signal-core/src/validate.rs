//! Structural validation of signal documents
//!
//! Validation never stops at the first problem: every violation is
//! collected so a submitter can fix a document in one pass. Checks run in
//! a fixed order:
//! 1. presence of `entity` / security contexts for the signal type
//! 2. numeric ranges
//! 3. open-valued fields that must not be empty
//! 4. cross-field consistency (warnings only)
//! 5. location country codes
//! 6. reference syntax, IP addresses, CVSS vectors and timelines
//!
//! Warnings never block. A document with at least one error is rejected
//! as a whole.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::ops::Deref;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

use crate::{
    ContextSlot, Entity, SecurityContext, Signal, SignalType, TextValue, CVSS_SEVERITY_TYPE,
    MAX_CONFIDENCE, MAX_DEGREE_OF_IMPACT, MIN_CONFIDENCE, MIN_DEGREE_OF_IMPACT,
    SIGNAL_URL_SCHEME,
};

static COUNTRY_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2}$").unwrap());

/// Whether a violation blocks the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationLevel {
    Error,
    Warning,
}

/// Validation rules, each with a stable id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Rule {
    EntityRequired,
    ContextRequired,
    ContextForbidden,
    ConfidenceRange,
    DegreeOfImpactRange,
    CvssScoreRange,
    PortRange,
    SubmissionIntervalRange,
    EmptyValue,
    SubTypeRequired,
    ComplianceTypeMismatch,
    CountryCode,
    MalformedReference,
    IpAddress,
    CvssVector,
    Timeline,
}

impl Rule {
    pub fn id(&self) -> &'static str {
        match self {
            Self::EntityRequired => "presence.entity",
            Self::ContextRequired => "presence.securityContext",
            Self::ContextForbidden => "presence.entityOnly",
            Self::ConfidenceRange => "range.confidence",
            Self::DegreeOfImpactRange => "range.degreeOfImpact",
            Self::CvssScoreRange => "range.cvss",
            Self::PortRange => "range.port",
            Self::SubmissionIntervalRange => "range.submissionInterval",
            Self::EmptyValue => "enum.nonEmpty",
            Self::SubTypeRequired => "enum.subType",
            Self::ComplianceTypeMismatch => "crossField.complianceType",
            Self::CountryCode => "location.countryCode",
            Self::MalformedReference => "reference.malformed",
            Self::IpAddress => "entity.ipAddress",
            Self::CvssVector => "cvss.vector",
            Self::Timeline => "time.order",
        }
    }

    pub fn level(&self) -> ViolationLevel {
        match self {
            Self::ComplianceTypeMismatch | Self::CvssVector | Self::Timeline => {
                ViolationLevel::Warning
            }
            _ => ViolationLevel::Error,
        }
    }
}

/// One broken rule at one location in the document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    /// Dotted field path, e.g. `securityContexts[1].degreeOfImpact`
    pub path: String,
    pub rule: Rule,
    pub message: String,
}

impl Violation {
    pub fn level(&self) -> ViolationLevel {
        self.rule.level()
    }

    pub fn is_error(&self) -> bool {
        self.level() == ViolationLevel::Error
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level() {
            ViolationLevel::Error => "error",
            ViolationLevel::Warning => "warning",
        };
        write!(f, "[{}] {} ({}): {}", level, self.path, self.rule.id(), self.message)
    }
}

/// A rejected document: every violation found, in check order
#[derive(Debug, Clone, Error)]
#[error("signal rejected with {} error(s)", .violations.iter().filter(|v| v.is_error()).count())]
pub struct ValidationErrors {
    pub violations: Vec<Violation>,
}

impl ValidationErrors {
    pub fn errors(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| !v.is_error())
    }

    /// Whether any violation concerns `path`
    pub fn mentions(&self, path: &str) -> bool {
        self.violations.iter().any(|v| v.path == path)
    }
}

/// A document that passed validation.
///
/// Only [`validate`] constructs one, so the resolver and the store can
/// never be handed an unchecked document.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSignal {
    signal: Signal,
    warnings: Vec<Violation>,
}

impl ValidSignal {
    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    pub fn into_inner(self) -> Signal {
        self.signal
    }

    /// Non-blocking violations found while validating
    pub fn warnings(&self) -> &[Violation] {
        &self.warnings
    }

    /// The payload as an exhaustive variant of the signal type
    pub fn payload(&self) -> SignalPayload<'_> {
        let contexts: Vec<&SecurityContext> =
            self.signal.contexts().map(|(_, ctx)| ctx).collect();

        match (self.signal.signal_type, self.signal.entity.as_ref()) {
            (SignalType::Default, Some(entity)) => SignalPayload::Full { entity, contexts },
            (SignalType::EntityOnly, Some(entity)) => SignalPayload::EntityOnly { entity },
            // validation guarantees an entity for the other two types
            (_, entity) => SignalPayload::SecurityContextOnly { entity, contexts },
        }
    }

    /// Text substitution by the resolver keeps a document valid
    pub(crate) fn signal_mut(&mut self) -> &mut Signal {
        &mut self.signal
    }
}

impl Deref for ValidSignal {
    type Target = Signal;

    fn deref(&self) -> &Signal {
        &self.signal
    }
}

/// What a validated signal carries, by signal type
#[derive(Debug, Clone, PartialEq)]
pub enum SignalPayload<'a> {
    Full {
        entity: &'a Entity,
        contexts: Vec<&'a SecurityContext>,
    },
    EntityOnly {
        entity: &'a Entity,
    },
    SecurityContextOnly {
        entity: Option<&'a Entity>,
        contexts: Vec<&'a SecurityContext>,
    },
}

/// Validate a parsed signal document
pub fn validate(signal: Signal) -> Result<ValidSignal, ValidationErrors> {
    let mut checker = Checker::default();

    checker.presence(&signal);
    checker.ranges(&signal);
    checker.open_values(&signal);
    checker.cross_field(&signal);
    checker.locations(&signal);
    checker.references(&signal);
    checker.ip_addresses(&signal);
    checker.cvss_vectors(&signal);
    checker.timeline(&signal);

    let violations = checker.violations;
    let errors = violations.iter().filter(|v| v.is_error()).count();
    debug!(
        "Validated signal {}: {} error(s), {} warning(s)",
        signal.id,
        errors,
        violations.len() - errors
    );

    if errors > 0 {
        Err(ValidationErrors { violations })
    } else {
        Ok(ValidSignal {
            signal,
            warnings: violations,
        })
    }
}

#[derive(Default)]
struct Checker {
    violations: Vec<Violation>,
}

impl Checker {
    fn push(&mut self, path: impl Into<String>, rule: Rule, message: String) {
        self.violations.push(Violation {
            path: path.into(),
            rule,
            message,
        });
    }

    fn non_empty(&mut self, path: impl Into<String>, value: &str) {
        if value.trim().is_empty() {
            let path = path.into();
            let message = format!("{} must not be empty", path);
            self.push(path, Rule::EmptyValue, message);
        }
    }

    fn score(&mut self, path: String, score: f64) {
        if !(0.0..=10.0).contains(&score) {
            let message = format!("CVSS score {} is outside 0..=10", score);
            self.push(path, Rule::CvssScoreRange, message);
        }
    }

    fn presence(&mut self, signal: &Signal) {
        let signal_type = signal.signal_type.as_str();

        match signal.signal_type {
            SignalType::EntityOnly => {
                if signal.entity.is_none() {
                    self.push(
                        "entity",
                        Rule::EntityRequired,
                        format!("entity is required for type {}", signal_type),
                    );
                }
                if signal.security_context.is_some() {
                    self.push(
                        "securityContext",
                        Rule::ContextForbidden,
                        format!("securityContext is not allowed for type {}", signal_type),
                    );
                }
                if !signal.security_contexts.is_empty() {
                    self.push(
                        "securityContexts",
                        Rule::ContextForbidden,
                        format!("securityContexts is not allowed for type {}", signal_type),
                    );
                }
            }
            SignalType::SecurityContextOnly => {
                if !signal.has_security_context() {
                    self.push(
                        "securityContext",
                        Rule::ContextRequired,
                        format!(
                            "securityContext or securityContexts is required for type {}",
                            signal_type
                        ),
                    );
                }
            }
            SignalType::Default => {
                if signal.entity.is_none() {
                    self.push(
                        "entity",
                        Rule::EntityRequired,
                        format!("entity is required for type {}", signal_type),
                    );
                }
                if !signal.has_security_context() {
                    self.push(
                        "securityContext",
                        Rule::ContextRequired,
                        format!(
                            "securityContext or securityContexts is required for type {}",
                            signal_type
                        ),
                    );
                }
            }
        }
    }

    fn ranges(&mut self, signal: &Signal) {
        if let Some(confidence) = signal.confidence {
            if !(MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&confidence) {
                self.push(
                    "confidence",
                    Rule::ConfidenceRange,
                    format!(
                        "confidence {} is outside {}..={}",
                        confidence, MIN_CONFIDENCE, MAX_CONFIDENCE
                    ),
                );
            }
        }

        if let Some(interval) = signal.source.next_submission_interval_in_mins {
            if interval <= 0 {
                self.push(
                    "source.nextSubmissionIntervalInMins",
                    Rule::SubmissionIntervalRange,
                    format!("submission interval {} must be positive", interval),
                );
            }
        }

        for (slot, ctx) in signal.contexts() {
            if let Some(degree) = ctx.degree_of_impact {
                if !(MIN_DEGREE_OF_IMPACT..=MAX_DEGREE_OF_IMPACT).contains(&degree) {
                    self.push(
                        format!("{}.degreeOfImpact", slot),
                        Rule::DegreeOfImpactRange,
                        format!(
                            "degreeOfImpact {} is outside {}..={}",
                            degree, MIN_DEGREE_OF_IMPACT, MAX_DEGREE_OF_IMPACT
                        ),
                    );
                }
            }

            if ctx.severity.kind.eq_ignore_ascii_case(CVSS_SEVERITY_TYPE) {
                if let Some(cvss) = &ctx.severity.cvss {
                    self.score(format!("{}.severity.cvss.baseScore", slot), cvss.base_score);
                    if let Some(score) = cvss.temporal_score {
                        self.score(format!("{}.severity.cvss.temporalScore", slot), score);
                    }
                    if let Some(score) = cvss.environmental_score {
                        self.score(format!("{}.severity.cvss.environmentalScore", slot), score);
                    }
                }
            }
        }

        let port = signal
            .entity
            .as_ref()
            .and_then(|e| e.connection_attributes.as_ref())
            .and_then(|c| c.port);
        if let Some(port) = port {
            if !(1..=i64::from(u16::MAX)).contains(&port) {
                self.push(
                    "entity.connectionAttributes.port",
                    Rule::PortRange,
                    format!("port {} is outside 1..=65535", port),
                );
            }
        }
    }

    fn open_values(&mut self, signal: &Signal) {
        self.non_empty("version", &signal.version);
        self.non_empty("id", &signal.id);
        self.non_empty("name", &signal.name);
        self.non_empty("source.name", &signal.source.name);

        if let Some(entity) = &signal.entity {
            self.non_empty("entity.name", &entity.name);
            if let Some(management) = &entity.entity_management {
                self.non_empty("entity.entityManagement.type", &management.kind);
            }
            if let Some(connection) = &entity.connection_attributes {
                self.non_empty("entity.connectionAttributes.type", &connection.kind);
            }
        }

        for (slot, ctx) in signal.contexts() {
            self.context_values(slot, ctx);
        }
    }

    fn context_values(&mut self, slot: ContextSlot, ctx: &SecurityContext) {
        self.non_empty(format!("{}.severity.type", slot), &ctx.severity.kind);

        if ctx.kind.is_open() && ctx.sub_type.as_deref().map_or(true, |s| s.trim().is_empty()) {
            self.push(
                format!("{}.subType", slot),
                Rule::SubTypeRequired,
                "subType is required when type is others".to_string(),
            );
        }

        for (i, mapping) in ctx.standards_mapping.iter().enumerate() {
            self.non_empty(format!("{}.standardsMapping[{}].name", slot, i), &mapping.name);
            self.non_empty(format!("{}.standardsMapping[{}].value", slot, i), &mapping.value);
        }
        for (i, phase) in ctx.kill_chain_phases.iter().enumerate() {
            self.non_empty(format!("{}.killChainPhases[{}].name", slot, i), &phase.name);
            self.non_empty(format!("{}.killChainPhases[{}].phase", slot, i), &phase.phase);
        }
        for (i, pattern) in ctx.attack_pattern.iter().enumerate() {
            self.non_empty(format!("{}.attackPattern[{}].name", slot, i), &pattern.name);
            self.non_empty(
                format!("{}.attackPattern[{}].sourceName", slot, i),
                &pattern.source_name,
            );
        }
        for (i, campaign) in ctx.campaign.iter().enumerate() {
            self.non_empty(format!("{}.campaign[{}].name", slot, i), &campaign.name);
        }
    }

    fn cross_field(&mut self, signal: &Signal) {
        for (slot, ctx) in signal.contexts() {
            if ctx.status.compliance_status.is_some() && !ctx.kind.is_compliance_capable() {
                self.push(
                    format!("{}.status.complianceStatus", slot),
                    Rule::ComplianceTypeMismatch,
                    format!("complianceStatus is unusual for security type {:?}", ctx.kind),
                );
            }
        }
    }

    fn locations(&mut self, signal: &Signal) {
        for (i, location) in signal.location.iter().enumerate() {
            if !COUNTRY_CODE_REGEX.is_match(&location.country_code) {
                self.push(
                    format!("location[{}].countryCode", i),
                    Rule::CountryCode,
                    format!(
                        "'{}' is not an ISO-3166 alpha-2 country code",
                        location.country_code
                    ),
                );
            }
        }
    }

    fn references(&mut self, signal: &Signal) {
        for (path, value) in signal.text_fields() {
            match value {
                TextValue::Reference(id) if id.is_empty() || id.chars().any(char::is_whitespace) => {
                    self.push(
                        path.to_string(),
                        Rule::MalformedReference,
                        format!("'{}' does not name a signal id", value),
                    );
                }
                // would be read back as a reference
                TextValue::Literal(text) if text.starts_with(SIGNAL_URL_SCHEME) => {
                    self.push(
                        path.to_string(),
                        Rule::MalformedReference,
                        format!("literal text must not start with '{}'", SIGNAL_URL_SCHEME),
                    );
                }
                _ => {}
            }
        }
    }

    fn ip_addresses(&mut self, signal: &Signal) {
        let addresses = signal
            .entity
            .as_ref()
            .and_then(|e| e.entity_attributes.as_ref())
            .map(|a| a.ip_addresses.as_slice())
            .unwrap_or_default();

        for (i, address) in addresses.iter().enumerate() {
            if let Some(ipv4) = &address.ipv4 {
                if ipv4.parse::<Ipv4Addr>().is_err() {
                    self.push(
                        format!("entity.entityAttributes.ipAddresses[{}].ipv4", i),
                        Rule::IpAddress,
                        format!("'{}' is not an IPv4 address", ipv4),
                    );
                }
            }
            if let Some(ipv6) = &address.ipv6 {
                if ipv6.parse::<Ipv6Addr>().is_err() {
                    self.push(
                        format!("entity.entityAttributes.ipAddresses[{}].ipv6", i),
                        Rule::IpAddress,
                        format!("'{}' is not an IPv6 address", ipv6),
                    );
                }
            }
        }
    }

    fn cvss_vectors(&mut self, signal: &Signal) {
        for (slot, ctx) in signal.contexts() {
            if let Some(cvss) = &ctx.severity.cvss {
                if cvss.vector.is_some() && cvss.parse_vector().is_none() {
                    self.push(
                        format!("{}.severity.cvss.vector", slot),
                        Rule::CvssVector,
                        "CVSS vector is malformed".to_string(),
                    );
                }
            }
        }
    }

    fn timeline(&mut self, signal: &Signal) {
        if let (Some(first), Some(last)) = (signal.first_seen, signal.last_seen) {
            if first > last {
                self.push(
                    "firstSeen",
                    Rule::Timeline,
                    "firstSeen is after lastSeen".to_string(),
                );
            }
        }
        if let Some(expires) = signal.expires_at {
            if expires < signal.created_at {
                self.push(
                    "expiresAt",
                    Rule::Timeline,
                    "expiresAt is before createdAt".to_string(),
                );
            }
        }
        for (slot, ctx) in signal.contexts() {
            for (i, campaign) in ctx.campaign.iter().enumerate() {
                if campaign.first_seen > campaign.last_seen {
                    self.push(
                        format!("{}.campaign[{}].firstSeen", slot, i),
                        Rule::Timeline,
                        "campaign firstSeen is after lastSeen".to_string(),
                    );
                }
            }
        }
    }
}
