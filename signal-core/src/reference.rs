//! `signalurl://` indirection values
//!
//! Long text fields may be replaced by a pointer to the same field of a
//! previously submitted signal:
//!
//! ```text
//! "remediation": { "description": "signalurl://09d34300-4c54-4e5e-9050-fff5d912cb19" }
//! ```
//!
//! The prefix is recognised once, while deserializing, and the value is
//! carried as [`TextValue::Reference`] from then on.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Scheme prefix of a signal reference
pub const SIGNAL_URL_SCHEME: &str = "signalurl://";

/// A text field that holds either literal text or a reference to another signal
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TextValue {
    Literal(String),
    /// Id of the signal whose corresponding field supplies the text
    Reference(String),
}

impl TextValue {
    /// Classify a raw wire string
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(SIGNAL_URL_SCHEME) {
            Some(id) => Self::Reference(id.to_string()),
            None => Self::Literal(raw.to_string()),
        }
    }

    /// Literal text taken as is.
    ///
    /// Text starting with [`SIGNAL_URL_SCHEME`] is read back as a reference
    /// once serialized, so validation rejects such literals.
    pub fn literal(text: &str) -> Self {
        Self::Literal(text.to_string())
    }

    pub fn reference(id: &str) -> Self {
        Self::Reference(id.to_string())
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Reference(_))
    }

    /// Referenced signal id, if this is a reference
    pub fn reference_id(&self) -> Option<&str> {
        match self {
            Self::Reference(id) => Some(id),
            Self::Literal(_) => None,
        }
    }

    /// Literal text, if this is not a reference
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(text) => Some(text),
            Self::Reference(_) => None,
        }
    }
}

impl From<&str> for TextValue {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl fmt::Display for TextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => f.write_str(text),
            Self::Reference(id) => write!(f, "{}{}", SIGNAL_URL_SCHEME, id),
        }
    }
}

impl Serialize for TextValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TextValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Security context a text field lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContextSlot {
    /// `securityContext`
    Single,
    /// `securityContexts[i]`
    Indexed(usize),
}

/// A string-or-reference field within one security context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextField {
    DescriptionBusiness,
    DescriptionTechnical,
    DescriptionBusinessImpact,
    RemediationDescription,
    RemediationReference,
    RemediationReferences(usize),
    RemediationImpact,
    AttackPatternDescription(usize),
    CampaignDescription(usize),
}

/// Structural location of a string-or-reference field.
///
/// A reference always resolves against the same path in the target signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    pub context: ContextSlot,
    pub field: TextField,
}

impl FieldPath {
    pub fn new(context: ContextSlot, field: TextField) -> Self {
        Self { context, field }
    }
}

impl fmt::Display for ContextSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => f.write_str("securityContext"),
            Self::Indexed(i) => write!(f, "securityContexts[{}]", i),
        }
    }
}

impl fmt::Display for TextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DescriptionBusiness => f.write_str("description.business"),
            Self::DescriptionTechnical => f.write_str("description.technical"),
            Self::DescriptionBusinessImpact => f.write_str("description.businessImpact"),
            Self::RemediationDescription => f.write_str("remediation.description"),
            Self::RemediationReference => f.write_str("remediation.reference"),
            Self::RemediationReferences(i) => write!(f, "remediation.references[{}]", i),
            Self::RemediationImpact => f.write_str("remediation.impact"),
            Self::AttackPatternDescription(i) => write!(f, "attackPattern[{}].description", i),
            Self::CampaignDescription(i) => write!(f, "campaign[{}].description", i),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.context, self.field)
    }
}
