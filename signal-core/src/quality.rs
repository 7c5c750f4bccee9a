//! Quality of signal
//!
//! A heuristic score: the more a signal asserts, the higher it rates.
//! Each optional piece of information contributes a factor whose value is
//! higher when present, and the score is the weighted average of all
//! factors. A missing entity contributes a strongly negative factor.

use crate::{SecurityContext, Signal};

#[derive(Debug, Clone, Copy)]
struct Factor {
    value: f64,
    weight: f64,
}

impl Factor {
    fn presence(present: bool, when_present: f64, when_absent: f64) -> Self {
        Self {
            value: if present { when_present } else { when_absent },
            weight: 1.0,
        }
    }
}

/// Score a signal; typical values fall between 0 and 100
pub fn quality_of_signal(signal: &Signal) -> f64 {
    let attributes = signal
        .entity
        .as_ref()
        .and_then(|e| e.entity_attributes.as_ref());

    let mut factors = vec![
        Factor::presence(!signal.name.is_empty(), 60.0, 20.0),
        Factor::presence(!signal.source.name.is_empty(), 50.0, 30.0),
        // the signal type always has a value once parsed
        Factor::presence(true, 60.0, 10.0),
        // a confidence of 0 asserts nothing and rates like an absent one
        match signal.confidence.filter(|&c| c != 0) {
            Some(confidence) => Factor {
                value: confidence as f64,
                weight: 0.5,
            },
            None => Factor::presence(false, 0.0, 30.0),
        },
        Factor::presence(signal.entity.is_some(), 60.0, -300.0),
        Factor::presence(signal.entity.is_some(), 60.0, 10.0),
        Factor::presence(attributes.and_then(|a| a.kind.as_ref()).is_some(), 60.0, 30.0),
        Factor::presence(
            attributes.and_then(|a| a.confidentiality_requirement).is_some(),
            70.0,
            30.0,
        ),
        Factor::presence(
            attributes.and_then(|a| a.integrity_requirement).is_some(),
            70.0,
            30.0,
        ),
        Factor::presence(
            attributes.and_then(|a| a.availability_requirement).is_some(),
            70.0,
            30.0,
        ),
    ];

    for (_, ctx) in signal.contexts() {
        factors.extend(context_factors(ctx));
    }

    weighted_average(&factors)
}

fn context_factors(ctx: &SecurityContext) -> [Factor; 8] {
    let technique = ctx
        .attack_pattern
        .first()
        .and_then(|p| p.mapping.as_ref())
        .map_or(false, |m| !m.technique_id.is_empty());

    [
        Factor::presence(true, 70.0, 10.0),
        Factor::presence(ctx.status.compliance_status.is_some(), 70.0, 30.0),
        Factor::presence(true, 50.0, 30.0),
        Factor::presence(!ctx.standards_mapping.is_empty(), 200.0, 50.0),
        Factor::presence(technique, 200.0, 50.0),
        Factor::presence(ctx.impact().is_asserted(), 200.0, 50.0),
        Factor::presence(ctx.control_type.is_some(), 60.0, 50.0),
        Factor::presence(!ctx.effect.is_empty(), 200.0, 50.0),
    ]
}

fn weighted_average(factors: &[Factor]) -> f64 {
    let (sum, weights) = factors
        .iter()
        .fold((0.0, 0.0), |(sum, weights), f| (sum + f.value * f.weight, weights + f.weight));

    if weights == 0.0 {
        0.0
    } else {
        sum / weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AttackPattern, ComplianceStatus, ControlType, Effect, Entity, EntityAttributes,
        EntityType, SecurityType, Severity, SeverityLevel, SignalSource, StandardMapping, Status,
    };

    fn ca_context() -> SecurityContext {
        SecurityContext::new(
            SecurityType::Ca,
            Status::compliance(ComplianceStatus::Fail),
            Severity::new("ccss").with_value(9.2),
        )
    }

    #[test]
    fn test_entity_less_signal_scores_poorly() {
        let signal = Signal::builder("bare", SignalSource::new("scanner")).build();
        // 60 + 50 + 60 + 30 - 300 + 10 + 30 * 4 over ten factors
        assert!((quality_of_signal(&signal) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_average_signal() {
        let signal = Signal::builder("external owner accounts", SignalSource::new("uat.safescore.io"))
            .confidence(100)
            .entity(Entity::new(EntityType::Machine, "Pay-As-You-Go"))
            .security_context(ca_context())
            .build();

        let expected = 900.0 / 17.5;
        assert!((quality_of_signal(&signal) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_richer_signal_scores_higher() {
        let base = Signal::builder("external owner accounts", SignalSource::new("uat.safescore.io"))
            .confidence(100)
            .entity(Entity::new(EntityType::Machine, "Pay-As-You-Go"))
            .security_context(ca_context())
            .build();

        let attributes = EntityAttributes {
            kind: Some("Azure - Subscriptions".to_string()),
            confidentiality_requirement: Some(SeverityLevel::Medium),
            integrity_requirement: Some(SeverityLevel::Medium),
            availability_requirement: Some(SeverityLevel::Medium),
            ..Default::default()
        };
        let rich = Signal::builder("external owner accounts", SignalSource::new("uat.safescore.io"))
            .confidence(100)
            .entity(Entity::new(EntityType::Machine, "Pay-As-You-Go").with_attributes(attributes))
            .security_context(
                ca_context()
                    .with_standard(StandardMapping::new("CIS", "1.23"))
                    .with_attack_pattern(
                        AttackPattern::new("Valid Accounts", "ATT&CK").with_technique("T1078"),
                    )
                    .with_degree_of_impact(-4)
                    .with_control_type(ControlType::Mitigation)
                    .with_effect(Effect::DataExposure),
            )
            .build();

        assert!(quality_of_signal(&rich) > quality_of_signal(&base));
    }

    #[test]
    fn test_explicit_neutral_impact_counts_as_asserted() {
        let signal = |ctx: SecurityContext| {
            Signal::builder("scan", SignalSource::new("scanner"))
                .entity(Entity::new(EntityType::Machine, "web01"))
                .security_context(ctx)
                .build()
        };

        let neutral = quality_of_signal(&signal(ca_context().with_degree_of_impact(0)));
        let unset = quality_of_signal(&signal(ca_context()));
        assert!(neutral > unset);
    }

    #[test]
    fn test_zero_confidence_rates_as_absent() {
        let signal = |confidence: Option<i64>| {
            let builder = Signal::builder("scan", SignalSource::new("scanner"))
                .entity(Entity::new(EntityType::Machine, "web01"))
                .security_context(ca_context());
            match confidence {
                Some(c) => builder.confidence(c).build(),
                None => builder.build(),
            }
        };

        let zero = quality_of_signal(&signal(Some(0)));
        assert!((zero - quality_of_signal(&signal(None))).abs() < 1e-9);
        assert!(zero > quality_of_signal(&signal(Some(10))));
    }

    #[test]
    fn test_every_context_contributes() {
        let one = Signal::builder("scan", SignalSource::new("scanner"))
            .entity(Entity::new(EntityType::Machine, "web01"))
            .add_security_context(ca_context())
            .build();
        let two = Signal::builder("scan", SignalSource::new("scanner"))
            .entity(Entity::new(EntityType::Machine, "web01"))
            .add_security_context(ca_context())
            .add_security_context(ca_context().with_effect(Effect::DataExposure))
            .build();

        assert_ne!(quality_of_signal(&one), quality_of_signal(&two));
    }
}
