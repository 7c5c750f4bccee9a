//! Reference resolution
//!
//! Replaces every `signalurl://<id>` value in a validated document with the
//! literal text of the same field path in the referenced signal, following
//! chains of references transitively.
//!
//! Within one `resolve` call:
//! - each referenced signal is fetched from the store at most once, so all
//!   lookups observe one consistent view and shared targets cost one lookup
//! - a chain revisiting a pair fails with [`ResolutionError::Cycle`]
//! - a chain longer than the configured limit fails with
//!   [`ResolutionError::ChainTooLong`]
//!
//! No partial result is ever returned.

use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

use crate::{FieldPath, Signal, TextValue, ValidSignal, DEFAULT_MAX_CHAIN_LENGTH};

/// Read-only access to previously stored signals
pub trait SignalLookup {
    fn lookup(&self, id: &str) -> Option<Arc<ValidSignal>>;
}

impl<L: SignalLookup + ?Sized> SignalLookup for &L {
    fn lookup(&self, id: &str) -> Option<Arc<ValidSignal>> {
        (**self).lookup(id)
    }
}

impl SignalLookup for HashMap<String, Arc<ValidSignal>> {
    fn lookup(&self, id: &str) -> Option<Arc<ValidSignal>> {
        self.get(id).cloned()
    }
}

/// Adapter letting a closure serve as a [`SignalLookup`]
pub struct FnLookup<F>(F);

/// Wrap a closure as a lookup
pub fn lookup_fn<F>(f: F) -> FnLookup<F>
where
    F: Fn(&str) -> Option<Arc<ValidSignal>>,
{
    FnLookup(f)
}

impl<F> SignalLookup for FnLookup<F>
where
    F: Fn(&str) -> Option<Arc<ValidSignal>>,
{
    fn lookup(&self, id: &str) -> Option<Arc<ValidSignal>> {
        (self.0)(id)
    }
}

/// One step of a resolution chain
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainLink {
    pub signal_id: String,
    pub field: FieldPath,
}

impl ChainLink {
    fn new(signal_id: &str, field: FieldPath) -> Self {
        Self {
            signal_id: signal_id.to_string(),
            field,
        }
    }
}

impl fmt::Display for ChainLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.signal_id, self.field)
    }
}

fn display_chain(chain: &[ChainLink]) -> String {
    chain
        .iter()
        .map(ChainLink::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors from reference resolution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("{field} references signal '{id}' which does not exist")]
    DanglingReference { field: FieldPath, id: String },

    /// The target exists but lacks the corresponding field
    #[error("{field} references signal '{id}' which has no {field}")]
    MissingTargetField { field: FieldPath, id: String },

    #[error("reference cycle: {}", display_chain(.chain))]
    Cycle { field: FieldPath, chain: Vec<ChainLink> },

    #[error("reference chain for {field} exceeds {limit} hops: {}", display_chain(.chain))]
    ChainTooLong {
        field: FieldPath,
        limit: usize,
        chain: Vec<ChainLink>,
    },
}

impl ResolutionError {
    /// Field of the document being resolved where the failure started
    pub fn field(&self) -> FieldPath {
        match self {
            Self::DanglingReference { field, .. }
            | Self::MissingTargetField { field, .. }
            | Self::Cycle { field, .. }
            | Self::ChainTooLong { field, .. } => *field,
        }
    }

    /// Cycles and overlong chains are both treated as cyclic
    pub fn is_cyclic(&self) -> bool {
        matches!(self, Self::Cycle { .. } | Self::ChainTooLong { .. })
    }
}

/// Counters from one resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    /// Fields whose reference was replaced by literal text
    pub substituted: usize,
    /// Store lookups performed
    pub lookups: usize,
}

/// A validated document without any remaining references
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSignal {
    inner: ValidSignal,
    stats: ResolutionStats,
}

impl ResolvedSignal {
    pub fn signal(&self) -> &Signal {
        self.inner.signal()
    }

    pub fn resolution_stats(&self) -> ResolutionStats {
        self.stats
    }

    /// Resolution preserves validity
    pub fn into_valid(self) -> ValidSignal {
        self.inner
    }

    pub fn into_inner(self) -> Signal {
        self.inner.into_inner()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Deref for ResolvedSignal {
    type Target = Signal;

    fn deref(&self) -> &Signal {
        self.inner.signal()
    }
}

impl Serialize for ResolvedSignal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.inner.signal().serialize(serializer)
    }
}

/// Reference resolver
#[derive(Debug, Clone)]
pub struct Resolver {
    max_chain_length: usize,
}

impl Default for Resolver {
    fn default() -> Self {
        Self {
            max_chain_length: DEFAULT_MAX_CHAIN_LENGTH,
        }
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum hops followed for one field
    pub fn with_max_chain_length(mut self, max_chain_length: usize) -> Self {
        self.max_chain_length = max_chain_length.max(1);
        self
    }

    pub fn max_chain_length(&self) -> usize {
        self.max_chain_length
    }

    /// Resolve every reference in `signal` against `lookup`
    pub fn resolve<L: SignalLookup + ?Sized>(
        &self,
        mut signal: ValidSignal,
        lookup: &L,
    ) -> Result<ResolvedSignal, ResolutionError> {
        let references: Vec<(FieldPath, String)> = signal
            .references()
            .into_iter()
            .map(|(path, id)| (path, id.to_string()))
            .collect();

        if references.is_empty() {
            return Ok(ResolvedSignal {
                inner: signal,
                stats: ResolutionStats::default(),
            });
        }

        let origin = signal.id.clone();
        let mut session = Session {
            lookup,
            max_chain_length: self.max_chain_length,
            fetched: HashMap::new(),
            lookups: 0,
        };

        let mut substitutions = Vec::with_capacity(references.len());
        for (path, target) in references {
            let text = session.resolve_field(&origin, path, &target)?;
            substitutions.push((path, text));
        }

        let document = signal.signal_mut();
        for (path, text) in &substitutions {
            if let Some(slot) = document.text_field_mut(*path) {
                *slot = TextValue::Literal(text.clone());
            }
        }

        debug!(
            "Resolved {} reference(s) in signal {} with {} lookup(s)",
            substitutions.len(),
            origin,
            session.lookups
        );

        Ok(ResolvedSignal {
            inner: signal,
            stats: ResolutionStats {
                substituted: substitutions.len(),
                lookups: session.lookups,
            },
        })
    }
}

/// Resolve with the default chain limit
pub fn resolve<L: SignalLookup + ?Sized>(
    signal: ValidSignal,
    lookup: &L,
) -> Result<ResolvedSignal, ResolutionError> {
    Resolver::default().resolve(signal, lookup)
}

struct Session<'a, L: ?Sized> {
    lookup: &'a L,
    max_chain_length: usize,
    fetched: HashMap<String, Option<Arc<ValidSignal>>>,
    lookups: usize,
}

impl<L: SignalLookup + ?Sized> Session<'_, L> {
    fn fetch(&mut self, id: &str) -> Option<Arc<ValidSignal>> {
        if let Some(cached) = self.fetched.get(id) {
            return cached.clone();
        }

        self.lookups += 1;
        let found = self.lookup.lookup(id);
        trace!("Lookup {}: {}", id, if found.is_some() { "found" } else { "missing" });
        self.fetched.insert(id.to_string(), found.clone());
        found
    }

    fn resolve_field(
        &mut self,
        origin: &str,
        field: FieldPath,
        target: &str,
    ) -> Result<String, ResolutionError> {
        let mut chain = vec![ChainLink::new(origin, field)];
        let mut current = target.to_string();

        loop {
            let link = ChainLink::new(&current, field);
            if chain.contains(&link) {
                chain.push(link);
                return Err(ResolutionError::Cycle { field, chain });
            }
            if chain.len() > self.max_chain_length {
                return Err(ResolutionError::ChainTooLong {
                    field,
                    limit: self.max_chain_length,
                    chain,
                });
            }
            chain.push(link);

            let signal = self
                .fetch(&current)
                .ok_or_else(|| ResolutionError::DanglingReference {
                    field,
                    id: current.clone(),
                })?;

            match signal.text_field(field) {
                None => {
                    return Err(ResolutionError::MissingTargetField {
                        field,
                        id: current,
                    })
                }
                Some(TextValue::Literal(text)) => return Ok(text.clone()),
                Some(TextValue::Reference(next)) => {
                    trace!("{} at {} -> {}", current, field, next);
                    current = next.clone();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        validate, ContextSlot, Entity, EntityType, Remediation, SecurityContext, SecurityType,
        Severity, SeverityLevel, SignalSource, Status, TextField,
    };
    use std::cell::RefCell;

    const REMEDIATION: FieldPath = FieldPath {
        context: ContextSlot::Single,
        field: TextField::RemediationDescription,
    };

    fn signal_with(id: &str, remediation: Remediation) -> ValidSignal {
        let context = SecurityContext::new(
            SecurityType::Va,
            Status::default(),
            Severity::new("custom").with_level(SeverityLevel::Medium),
        )
        .with_remediation(remediation);

        let signal = Signal::builder("outdated openssl", SignalSource::new("scanner"))
            .id(id)
            .entity(Entity::new(EntityType::Machine, "web01.acme.com"))
            .security_context(context)
            .build();
        validate(signal).unwrap()
    }

    fn remediation(description: &str) -> Remediation {
        Remediation::default().with_description(TextValue::parse(description))
    }

    fn store(entries: Vec<ValidSignal>) -> HashMap<String, Arc<ValidSignal>> {
        entries
            .into_iter()
            .map(|s| (s.id.clone(), Arc::new(s)))
            .collect()
    }

    /// Counts lookups per id
    struct CountingLookup {
        inner: HashMap<String, Arc<ValidSignal>>,
        calls: RefCell<HashMap<String, usize>>,
    }

    impl SignalLookup for CountingLookup {
        fn lookup(&self, id: &str) -> Option<Arc<ValidSignal>> {
            *self.calls.borrow_mut().entry(id.to_string()).or_insert(0) += 1;
            self.inner.lookup(id)
        }
    }

    #[test]
    fn test_no_references_is_unchanged() {
        let signal = signal_with("doc", remediation("apply the vendor patch"));
        let expected = signal.signal().clone();

        let resolved = resolve(signal, &store(vec![])).unwrap();
        assert_eq!(resolved.signal(), &expected);
        assert_eq!(resolved.resolution_stats(), ResolutionStats::default());
    }

    #[test]
    fn test_resolves_corresponding_field() {
        let lookup = store(vec![signal_with("A", remediation("text"))]);
        let signal = signal_with("doc", remediation("signalurl://A"));

        let resolved = resolve(signal, &lookup).unwrap();
        assert_eq!(
            resolved.text_field(REMEDIATION),
            Some(&TextValue::literal("text"))
        );
        assert_eq!(resolved.resolution_stats().substituted, 1);

        let json = serde_json::to_value(&resolved).unwrap();
        assert_eq!(json["securityContext"]["remediation"]["description"], "text");
    }

    #[test]
    fn test_resolves_transitively() {
        let lookup = store(vec![
            signal_with("A", remediation("original text")),
            signal_with("B", remediation("signalurl://A")),
        ]);
        let signal = signal_with("doc", remediation("signalurl://B"));

        let resolved = resolve(signal, &lookup).unwrap();
        assert_eq!(
            resolved.text_field(REMEDIATION).and_then(|v| v.as_literal()),
            Some("original text")
        );
        assert_eq!(resolved.resolution_stats().lookups, 2);
    }

    #[test]
    fn test_detects_cycle() {
        let lookup = store(vec![
            signal_with("A", remediation("signalurl://B")),
            signal_with("B", remediation("signalurl://A")),
        ]);
        let signal = signal_with("A", remediation("signalurl://B"));

        let err = resolve(signal, &lookup).unwrap_err();
        match &err {
            ResolutionError::Cycle { field, chain } => {
                assert_eq!(*field, REMEDIATION);
                let ids: Vec<_> = chain.iter().map(|l| l.signal_id.as_str()).collect();
                assert_eq!(ids, vec!["A", "B", "A"]);
            }
            other => panic!("expected cycle, got {:?}", other),
        }
        assert!(err.is_cyclic());
        assert!(err.to_string().starts_with("reference cycle: A#securityContext"));
    }

    #[test]
    fn test_detects_self_loop_in_store() {
        let lookup = store(vec![signal_with("B", remediation("signalurl://B"))]);
        let signal = signal_with("doc", remediation("signalurl://B"));

        let err = resolve(signal, &lookup).unwrap_err();
        assert!(matches!(err, ResolutionError::Cycle { .. }));
    }

    #[test]
    fn test_closure_lookup() {
        let target = Arc::new(signal_with("A", remediation("from closure")));
        let lookup = lookup_fn(|id| (id == "A").then(|| target.clone()));

        let resolved = resolve(signal_with("doc", remediation("signalurl://A")), &lookup).unwrap();
        assert_eq!(
            resolved.text_field(REMEDIATION).and_then(|v| v.as_literal()),
            Some("from closure")
        );
    }

    #[test]
    fn test_dangling_reference() {
        let signal = signal_with("doc", remediation("signalurl://ghost"));

        let err = resolve(signal, &store(vec![])).unwrap_err();
        assert_eq!(
            err,
            ResolutionError::DanglingReference {
                field: REMEDIATION,
                id: "ghost".to_string(),
            }
        );
        let message = err.to_string();
        assert!(message.contains("ghost"));
        assert!(message.contains("securityContext.remediation.description"));
    }

    #[test]
    fn test_missing_target_field() {
        let target = Remediation::default().with_impact(TextValue::literal("downtime"));
        let lookup = store(vec![signal_with("A", target)]);
        let signal = signal_with("doc", remediation("signalurl://A"));

        let err = resolve(signal, &lookup).unwrap_err();
        assert!(matches!(err, ResolutionError::MissingTargetField { ref id, .. } if id == "A"));
    }

    #[test]
    fn test_chain_too_long() {
        let mut entries = vec![signal_with("s39", remediation("end of chain"))];
        for i in 0..39 {
            entries.push(signal_with(
                &format!("s{}", i),
                remediation(&format!("signalurl://s{}", i + 1)),
            ));
        }
        let lookup = store(entries);

        let signal = signal_with("doc", remediation("signalurl://s0"));
        let err = resolve(signal, &lookup).unwrap_err();
        match err {
            ResolutionError::ChainTooLong { limit, ref chain, .. } => {
                assert_eq!(limit, DEFAULT_MAX_CHAIN_LENGTH);
                assert_eq!(chain.len(), DEFAULT_MAX_CHAIN_LENGTH + 1);
            }
            ref other => panic!("expected chain too long, got {:?}", other),
        }

        let signal = signal_with("doc", remediation("signalurl://s0"));
        let resolved = Resolver::new()
            .with_max_chain_length(64)
            .resolve(signal, &lookup)
            .unwrap();
        assert_eq!(resolved.resolution_stats().lookups, 40);
    }

    #[test]
    fn test_idempotent() {
        let lookup = store(vec![signal_with("A", remediation("text"))]);
        let once = resolve(signal_with("doc", remediation("signalurl://A")), &lookup).unwrap();
        let expected = once.signal().clone();

        let twice = resolve(once.into_valid(), &lookup).unwrap();
        assert_eq!(twice.signal(), &expected);
        assert_eq!(twice.resolution_stats().lookups, 0);
    }

    #[test]
    fn test_diamond_looks_up_once() {
        let shared = Remediation::default()
            .with_description(TextValue::literal("rotate keys"))
            .with_reference(TextValue::literal("https://kb.acme.com/rotate"))
            .with_impact(TextValue::literal("brief outage"));
        let lookup = CountingLookup {
            inner: store(vec![
                signal_with("B", shared),
                signal_with("C", remediation("signalurl://B")),
                signal_with(
                    "D",
                    Remediation::default().with_impact(TextValue::parse("signalurl://B")),
                ),
            ]),
            calls: RefCell::new(HashMap::new()),
        };

        let doc = Remediation::default()
            .with_description(TextValue::parse("signalurl://C"))
            .with_reference(TextValue::parse("signalurl://B"))
            .with_impact(TextValue::parse("signalurl://D"));

        let resolved = resolve(signal_with("doc", doc), &lookup).unwrap();
        let remediation = resolved
            .security_context
            .as_ref()
            .and_then(|ctx| ctx.remediation.as_ref())
            .unwrap();
        assert_eq!(remediation.description, Some(TextValue::literal("rotate keys")));
        assert_eq!(
            remediation.reference,
            Some(TextValue::literal("https://kb.acme.com/rotate"))
        );
        assert_eq!(remediation.impact, Some(TextValue::literal("brief outage")));

        let calls = lookup.calls.borrow();
        assert_eq!(calls.get("B"), Some(&1));
        assert_eq!(calls.get("C"), Some(&1));
        assert_eq!(calls.get("D"), Some(&1));
        assert_eq!(resolved.resolution_stats().lookups, 3);
        assert_eq!(resolved.resolution_stats().substituted, 3);
    }

    #[test]
    fn test_resolves_indexed_contexts_and_attack_patterns() {
        use crate::AttackPattern;

        let pattern = |description: &str| {
            AttackPattern::new("Exploit Public-Facing Application", "ATT&CK")
                .with_technique("T1190")
                .with_description(TextValue::parse(description))
        };
        let context = |description: &str| {
            SecurityContext::new(SecurityType::Edr, Status::default(), Severity::new("custom"))
                .with_attack_pattern(pattern(description))
        };

        let base = Signal::builder("edr base", SignalSource::new("edr"))
            .id("base")
            .entity(Entity::new(EntityType::Machine, "ws01"))
            .add_security_context(context("initial access via web shell"))
            .build();
        let lookup = store(vec![validate(base).unwrap()]);

        let doc = Signal::builder("edr daily", SignalSource::new("edr"))
            .entity(Entity::new(EntityType::Machine, "ws01"))
            .add_security_context(context("signalurl://base"))
            .build();

        let resolved = resolve(validate(doc).unwrap(), &lookup).unwrap();
        let path = FieldPath::new(ContextSlot::Indexed(0), TextField::AttackPatternDescription(0));
        assert_eq!(
            resolved.text_field(path).and_then(|v| v.as_literal()),
            Some("initial access via web shell")
        );
    }
}
