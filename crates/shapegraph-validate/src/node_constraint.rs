//! Leaf evaluation of node constraints.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use dashmap::DashMap;
use regex::Regex;
use shapegraph_model::{
    vocab, Exclusion, Iri, Literal, Node, NodeConstraint, NodeKind, NumericFacets, Pattern,
    SchemaError, Stem, StringFacets, ValueSetValue,
};

/// Decides whether a single node satisfies a node constraint.
pub trait NodeConstraintEvaluator: Send + Sync {
    /// Called once per node constraint when the validator is built, so
    /// malformed constraints surface as schema errors before any typing.
    fn prepare(&self, constraint: &NodeConstraint) -> Result<(), SchemaError> {
        let _ = constraint;
        Ok(())
    }

    fn evaluate(&self, node: &Node, constraint: &NodeConstraint) -> bool;
}

/// Built-in evaluator: node kinds, XSD datatypes and their lexical spaces,
/// string and numeric facets, and value sets.
#[derive(Debug, Default)]
pub struct XsdNodeConstraints {
    patterns: DashMap<Pattern, Arc<Regex>>,
}

impl XsdNodeConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    fn regex(&self, pattern: &Pattern) -> Result<Arc<Regex>, SchemaError> {
        if let Some(regex) = self.patterns.get(pattern) {
            return Ok(Arc::clone(regex.value()));
        }
        let regex = Arc::new(compile_pattern(pattern)?);
        self.patterns.insert(pattern.clone(), Arc::clone(&regex));
        Ok(regex)
    }

    fn string_facets_hold(&self, node: &Node, facets: &StringFacets) -> bool {
        if facets.is_empty() {
            return true;
        }
        let text = match node {
            Node::Iri { iri } => iri.as_str(),
            Node::Literal { literal } => literal.lexical.as_str(),
            Node::BlankNode { .. } => return false,
        };
        let len = text.chars().count();
        let within = |bound: Option<u32>, ok: fn(usize, usize) -> bool| {
            bound.map_or(true, |b| ok(len, b as usize))
        };
        if !within(facets.length, |l, b| l == b)
            || !within(facets.min_length, |l, b| l >= b)
            || !within(facets.max_length, |l, b| l <= b)
        {
            return false;
        }
        match &facets.pattern {
            Some(pattern) => self
                .regex(pattern)
                .map(|re| re.is_match(text))
                .unwrap_or(false),
            None => true,
        }
    }
}

impl NodeConstraintEvaluator for XsdNodeConstraints {
    fn prepare(&self, constraint: &NodeConstraint) -> Result<(), SchemaError> {
        if let Some(pattern) = &constraint.string_facets.pattern {
            self.regex(pattern)?;
        }
        Ok(())
    }

    fn evaluate(&self, node: &Node, constraint: &NodeConstraint) -> bool {
        constraint.node_kind.map_or(true, |kind| kind_holds(node, kind))
            && constraint
                .datatype
                .as_ref()
                .map_or(true, |dt| datatype_holds(node, dt))
            && self.string_facets_hold(node, &constraint.string_facets)
            && numeric_facets_hold(node, &constraint.numeric_facets)
            && constraint
                .values
                .as_ref()
                .map_or(true, |values| values.iter().any(|v| value_holds(node, v)))
    }
}

/// Compile a pattern facet. Flags are those of XPath `fn:matches`.
pub fn compile_pattern(pattern: &Pattern) -> Result<Regex, SchemaError> {
    let invalid = |message: String| SchemaError::InvalidPattern {
        pattern: pattern.pattern.clone(),
        message,
    };
    let source = match pattern.flags.as_deref() {
        None | Some("") => pattern.pattern.clone(),
        Some(flags) => {
            if let Some(bad) = flags.chars().find(|c| !matches!(c, 'i' | 'm' | 's' | 'x')) {
                return Err(invalid(format!("unsupported flag {bad:?}")));
            }
            format!("(?{flags}){}", pattern.pattern)
        }
    };
    Regex::new(&source).map_err(|e| invalid(e.to_string()))
}

fn kind_holds(node: &Node, kind: NodeKind) -> bool {
    match kind {
        NodeKind::Iri => matches!(node, Node::Iri { .. }),
        NodeKind::BNode => matches!(node, Node::BlankNode { .. }),
        NodeKind::Literal => node.is_literal(),
        NodeKind::NonLiteral => !node.is_literal(),
    }
}

fn datatype_holds(node: &Node, datatype: &Iri) -> bool {
    let Some(literal) = node.as_literal() else {
        return false;
    };
    if literal.datatype != *datatype {
        return false;
    }
    if datatype.as_str() == vocab::RDF_LANG_STRING {
        return literal.language.is_some();
    }
    literal.language.is_none() && lexical_form_is_valid(literal)
}

const INTEGER_TYPES: &[&str] = &[
    "integer",
    "long",
    "int",
    "short",
    "byte",
    "nonNegativeInteger",
    "nonPositiveInteger",
    "positiveInteger",
    "negativeInteger",
    "unsignedLong",
    "unsignedInt",
    "unsignedShort",
    "unsignedByte",
];

fn xsd_local(datatype: &Iri) -> Option<&str> {
    datatype.as_str().strip_prefix(vocab::XSD)
}

/// Whether the lexical form is in the lexical space of its XSD datatype.
/// Datatypes outside the supported set are accepted as is.
pub fn lexical_form_is_valid(literal: &Literal) -> bool {
    let lexical = literal.lexical.as_str();
    let Some(local) = xsd_local(&literal.datatype) else {
        return true;
    };
    match local {
        "string" => true,
        "boolean" => matches!(lexical, "true" | "false" | "1" | "0"),
        "decimal" => is_decimal(lexical),
        "float" | "double" => is_floating(lexical),
        "date" => NaiveDate::parse_from_str(lexical, "%Y-%m-%d").is_ok(),
        "dateTime" => {
            DateTime::parse_from_rfc3339(lexical).is_ok()
                || NaiveDateTime::parse_from_str(lexical, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        }
        t if INTEGER_TYPES.contains(&t) => integer_in_range(t, lexical),
        _ => true,
    }
}

fn strip_sign(lexical: &str) -> &str {
    lexical
        .strip_prefix('-')
        .or_else(|| lexical.strip_prefix('+'))
        .unwrap_or(lexical)
}

fn is_integer(lexical: &str) -> bool {
    let digits = strip_sign(lexical);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn is_decimal(lexical: &str) -> bool {
    let body = strip_sign(lexical);
    let (int, frac) = body.split_once('.').unwrap_or((body, ""));
    (!int.is_empty() || !frac.is_empty())
        && int.bytes().all(|b| b.is_ascii_digit())
        && frac.bytes().all(|b| b.is_ascii_digit())
        && !(body.ends_with('.') && int.is_empty())
}

fn is_floating(lexical: &str) -> bool {
    if matches!(lexical, "INF" | "+INF" | "-INF" | "NaN") {
        return true;
    }
    let (mantissa, exponent) = match lexical.find(['e', 'E']) {
        Some(at) => (&lexical[..at], Some(&lexical[at + 1..])),
        None => (lexical, None),
    };
    is_decimal(mantissa) && exponent.map_or(true, is_integer)
}

fn integer_in_range(local: &str, lexical: &str) -> bool {
    if !is_integer(lexical) {
        return false;
    }
    let Ok(value) = lexical.parse::<i128>() else {
        // Only unbounded types admit values this large.
        return matches!(local, "integer" | "nonNegativeInteger" | "nonPositiveInteger")
            || (local == "positiveInteger" && !lexical.starts_with('-'))
            || (local == "negativeInteger" && lexical.starts_with('-'));
    };
    let (min, max): (i128, i128) = match local {
        "long" => (i64::MIN.into(), i64::MAX.into()),
        "int" => (i32::MIN.into(), i32::MAX.into()),
        "short" => (i16::MIN.into(), i16::MAX.into()),
        "byte" => (i8::MIN.into(), i8::MAX.into()),
        "nonNegativeInteger" => (0, i128::MAX),
        "nonPositiveInteger" => (i128::MIN, 0),
        "positiveInteger" => (1, i128::MAX),
        "negativeInteger" => (i128::MIN, -1),
        "unsignedLong" => (0, u64::MAX.into()),
        "unsignedInt" => (0, u32::MAX.into()),
        "unsignedShort" => (0, u16::MAX.into()),
        "unsignedByte" => (0, u8::MAX.into()),
        _ => (i128::MIN, i128::MAX),
    };
    (min..=max).contains(&value)
}

fn is_numeric_datatype(datatype: &Iri) -> bool {
    matches!(
        xsd_local(datatype),
        Some(t) if t == "decimal" || t == "float" || t == "double" || INTEGER_TYPES.contains(&t)
    )
}

fn numeric_facets_hold(node: &Node, facets: &NumericFacets) -> bool {
    if facets.is_empty() {
        return true;
    }
    let Some(literal) = node.as_literal() else {
        return false;
    };
    if !is_numeric_datatype(&literal.datatype) || !lexical_form_is_valid(literal) {
        return false;
    }
    let lexical = literal.lexical.trim_start_matches('+');
    let value = match lexical {
        "INF" => f64::INFINITY,
        "-INF" => f64::NEG_INFINITY,
        other => match other.parse::<f64>() {
            Ok(v) => v,
            Err(_) => return false,
        },
    };
    if value.is_nan() {
        return false;
    }

    let bounds_hold = facets.min_inclusive.map_or(true, |b| value >= b)
        && facets.min_exclusive.map_or(true, |b| value > b)
        && facets.max_inclusive.map_or(true, |b| value <= b)
        && facets.max_exclusive.map_or(true, |b| value < b);
    if !bounds_hold {
        return false;
    }

    if facets.total_digits.is_none() && facets.fraction_digits.is_none() {
        return true;
    }
    let local = xsd_local(&literal.datatype).unwrap_or_default();
    if local == "float" || local == "double" {
        return false;
    }
    let (total, fraction) = digit_counts(lexical);
    facets.total_digits.map_or(true, |t| total <= t)
        && facets.fraction_digits.map_or(true, |f| fraction <= f)
}

/// Significant digits of a decimal lexical form: total and after the point.
fn digit_counts(lexical: &str) -> (u32, u32) {
    let body = strip_sign(lexical);
    let (int, frac) = body.split_once('.').unwrap_or((body, ""));
    let int = int.trim_start_matches('0');
    let frac = frac.trim_end_matches('0');
    let fraction = frac.len() as u32;
    let total = (int.len() as u32 + fraction).max(1);
    (total, fraction)
}

fn value_holds(node: &Node, value: &ValueSetValue) -> bool {
    match value {
        ValueSetValue::Node { node: expected } => node == expected,
        ValueSetValue::IriStem { stem } => iri_of(node).is_some_and(|iri| iri.starts_with(stem)),
        ValueSetValue::IriStemRange { stem, exclusions } => {
            iri_of(node).is_some_and(|iri| in_stem_range(iri, stem, exclusions))
        }
        ValueSetValue::LiteralStem { stem } => {
            node.as_literal().is_some_and(|l| l.lexical.starts_with(stem))
        }
        ValueSetValue::LiteralStemRange { stem, exclusions } => node
            .as_literal()
            .is_some_and(|l| in_stem_range(&l.lexical, stem, exclusions)),
        ValueSetValue::Language { tag } => {
            language_of(node).is_some_and(|lang| lang.eq_ignore_ascii_case(tag))
        }
        ValueSetValue::LanguageStem { stem } => {
            language_of(node).is_some_and(|lang| language_matches_stem(lang, stem))
        }
        ValueSetValue::LanguageStemRange { stem, exclusions } => {
            language_of(node).is_some_and(|lang| {
                let in_stem = match stem {
                    Stem::Wildcard => true,
                    Stem::Prefix(prefix) => language_matches_stem(lang, prefix),
                };
                in_stem
                    && !exclusions.iter().any(|e| match e {
                        Exclusion::Value(v) => lang.eq_ignore_ascii_case(v),
                        Exclusion::Stem(s) => language_matches_stem(lang, s),
                    })
            })
        }
    }
}

fn iri_of(node: &Node) -> Option<&str> {
    node.as_iri().map(Iri::as_str)
}

fn language_of(node: &Node) -> Option<&str> {
    node.as_literal().and_then(|l| l.language.as_deref())
}

fn in_stem_range(text: &str, stem: &Stem, exclusions: &[Exclusion]) -> bool {
    let in_stem = match stem {
        Stem::Wildcard => true,
        Stem::Prefix(prefix) => text.starts_with(prefix.as_str()),
    };
    in_stem
        && !exclusions.iter().any(|e| match e {
            Exclusion::Value(v) => text == v.as_str(),
            Exclusion::Stem(s) => text.starts_with(s.as_str()),
        })
}

/// `en` matches `en` and `en-GB`, but not `eng`. The empty stem matches
/// every tag.
fn language_matches_stem(lang: &str, stem: &str) -> bool {
    if stem.is_empty() {
        return true;
    }
    let lang = lang.to_ascii_lowercase();
    let stem = stem.to_ascii_lowercase();
    lang == stem || lang.strip_prefix(&stem).is_some_and(|rest| rest.starts_with('-'))
}
