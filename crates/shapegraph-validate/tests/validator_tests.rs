use std::collections::BTreeSet;

use anyhow::anyhow;
use shapegraph_model::{
    vocab, Interval, MemoryGraph, Node, NodeConstraint, NodeKind, Property, Schema, SchemaError,
    ShapeDef, ShapeExpr, ShapeLabel, TripleExpr,
};
use shapegraph_validate::{
    Cancellation, ExternalShapes, Result, ValidationError, Validator, ValidatorConfig,
};

const EX: &str = "http://ex.org/";

fn iri(name: &str) -> Node {
    Node::iri(format!("{EX}{name}"))
}

fn p(name: &str) -> Property {
    Property::forward(format!("{EX}{name}"))
}

fn pred(name: &str) -> String {
    format!("{EX}{name}")
}

fn label(name: &str) -> ShapeLabel {
    ShapeLabel::new(name)
}

fn string_value() -> ShapeExpr {
    ShapeExpr::node_constraint(NodeConstraint::of_datatype(vocab::XSD_STRING))
}

fn sequential() -> ValidatorConfig {
    ValidatorConfig {
        parallel: false,
        ..ValidatorConfig::default()
    }
}

#[test]
fn value_shapes_are_checked_through_the_typing() -> Result<()> {
    // Employee needs an employer that is a Company; Company needs a name.
    let schema = Schema::build([
        (
            "Employee",
            ShapeExpr::shape(TripleExpr::constraint(p("employer"), ShapeExpr::reference("Company"))),
        ),
        (
            "Company",
            ShapeExpr::shape(TripleExpr::constraint(p("name"), string_value())),
        ),
    ])?;
    let mut g = MemoryGraph::new();
    g.add(iri("alice"), pred("employer"), iri("acme"));
    g.add(iri("acme"), pred("name"), Node::string("ACME"));
    g.add(iri("bob"), pred("employer"), iri("shell"));

    let validator = Validator::new(schema, g)?;
    let typing = validator.validate(&iri("alice"), &label("Employee"))?;
    assert!(typing.contains(&iri("alice"), &label("Employee")));
    assert!(typing.contains(&iri("acme"), &label("Company")));

    assert!(!validator.check(&iri("bob"), &label("Employee"))?);
    Ok(())
}

#[test]
fn mentioned_property_with_bad_value_fails_unless_extra() -> Result<()> {
    let typed_name = TripleExpr::constraint(p("name"), string_value());
    let schema = Schema::build([
        ("Open", ShapeExpr::shape(typed_name.clone())),
        (
            "Extra",
            ShapeExpr::from_def(ShapeDef {
                expression: Some(typed_name),
                extra: BTreeSet::from([format!("{EX}name").into()]),
                closed: false,
            }),
        ),
    ])?;
    let mut g = MemoryGraph::new();
    g.add(iri("x"), pred("name"), Node::string("ok"));
    g.add(iri("x"), pred("name"), Node::typed("7", vocab::XSD_INTEGER));

    let validator = Validator::new(schema, g)?.with_config(sequential());
    assert!(!validator.check(&iri("x"), &label("Open"))?);
    assert!(validator.check(&iri("x"), &label("Extra"))?);
    Ok(())
}

#[test]
fn extra_edges_that_match_may_stay_unassigned() -> Result<()> {
    let schema = Schema::build([(
        "OneTag",
        ShapeExpr::from_def(ShapeDef {
            expression: Some(TripleExpr::any(p("tag"))),
            extra: BTreeSet::from([format!("{EX}tag").into()]),
            closed: false,
        }),
    )])?;
    let mut g = MemoryGraph::new();
    g.add(iri("x"), pred("tag"), Node::string("a"));
    g.add(iri("x"), pred("tag"), Node::string("b"));

    assert!(Validator::new(schema, g)?.check(&iri("x"), &label("OneTag"))?);
    Ok(())
}

#[test]
fn closed_shapes_reject_unknown_properties() -> Result<()> {
    let schema = Schema::build([
        ("Closed", ShapeExpr::closed_shape(TripleExpr::any(p("name")))),
        ("Open", ShapeExpr::shape(TripleExpr::any(p("name")))),
        (
            "ClosedExtra",
            ShapeExpr::from_def(ShapeDef {
                expression: Some(TripleExpr::any(p("name"))),
                extra: BTreeSet::from([format!("{EX}nick").into()]),
                closed: true,
            }),
        ),
    ])?;
    let mut g = MemoryGraph::new();
    g.add(iri("x"), pred("name"), Node::string("X"));
    g.add(iri("x"), pred("nick"), Node::string("x"));
    g.add(iri("y"), pred("name"), Node::string("Y"));

    let validator = Validator::new(schema, g)?;
    assert!(!validator.check(&iri("x"), &label("Closed"))?);
    assert!(validator.check(&iri("x"), &label("Open"))?);
    assert!(validator.check(&iri("x"), &label("ClosedExtra"))?);
    assert!(validator.check(&iri("y"), &label("Closed"))?);
    Ok(())
}

#[test]
fn inverse_properties_look_at_incoming_edges() -> Result<()> {
    let schema = Schema::build([(
        "Parented",
        ShapeExpr::shape(
            TripleExpr::constraint(
                Property::inverse(format!("{EX}parentOf")),
                ShapeExpr::node_constraint(NodeConstraint::of_kind(NodeKind::Iri)),
            )
            .repeat(Interval::new(1, Some(2))),
        ),
    )])?;
    let mut g = MemoryGraph::new();
    g.add(iri("mum"), pred("parentOf"), iri("kid"));
    g.add(iri("dad"), pred("parentOf"), iri("kid"));
    g.add(iri("kid"), pred("parentOf"), iri("grandkid"));

    let validator = Validator::new(schema, g)?;
    assert!(validator.check(&iri("kid"), &label("Parented"))?);
    assert!(validator.check(&iri("grandkid"), &label("Parented"))?);
    assert!(!validator.check(&iri("mum"), &label("Parented"))?);
    Ok(())
}

#[test]
fn closed_shapes_ignore_unmentioned_incoming_edges() -> Result<()> {
    let schema = Schema::build([(
        "Child",
        ShapeExpr::closed_shape(TripleExpr::any(Property::inverse(format!("{EX}parentOf")))),
    )])?;
    let mut g = MemoryGraph::new();
    g.add(iri("mum"), pred("parentOf"), iri("kid"));
    g.add(iri("fan"), pred("likes"), iri("kid"));
    g.add(iri("mum"), pred("parentOf"), iri("teen"));
    g.add(iri("teen"), pred("likes"), iri("fan"));

    let validator = Validator::new(schema, g)?;
    // Incoming `likes` is not mentioned, and closedness only covers outgoing edges.
    assert!(validator.check(&iri("kid"), &label("Child"))?);
    // Outgoing `likes` is not allowed.
    assert!(!validator.check(&iri("teen"), &label("Child"))?);
    Ok(())
}

#[test]
fn literal_values_are_evaluated_directly() -> Result<()> {
    let schema = Schema::build([
        ("Label", ShapeExpr::node_constraint(NodeConstraint::of_kind(NodeKind::Literal))),
        (
            "Thing",
            ShapeExpr::shape(TripleExpr::constraint(p("label"), ShapeExpr::reference("Label")).plus()),
        ),
    ])?;
    let mut g = MemoryGraph::new();
    g.add(iri("t"), pred("label"), Node::string("one"));
    g.add(iri("t"), pred("label"), Node::string("two"));

    let validator = Validator::new(schema, g)?;
    let typing = validator.validate(&iri("t"), &label("Thing"))?;
    assert!(typing.contains(&iri("t"), &label("Thing")));
    // Literals are not seeded, so the typing has no verdict for them.
    assert_eq!(typing.verdict(&Node::string("one"), &label("Label")), None);
    Ok(())
}

#[test]
fn negation_uses_the_final_lower_stratum() -> Result<()> {
    let schema = Schema::build([
        (
            "Named",
            ShapeExpr::shape(TripleExpr::constraint(p("name"), string_value())),
        ),
        ("Anonymous", ShapeExpr::not(ShapeExpr::reference("Named"))),
        (
            "KnowsAnonymous",
            ShapeExpr::shape(
                TripleExpr::constraint(p("knows"), ShapeExpr::reference("Anonymous")).plus(),
            ),
        ),
    ])?;
    let mut g = MemoryGraph::new();
    g.add(iri("a"), pred("knows"), iri("b"));
    g.add(iri("b"), pred("knows"), iri("c"));
    g.add(iri("b"), pred("name"), Node::string("B"));

    let validator = Validator::new(schema, g)?;
    assert_eq!(validator.strata().count(), 2);
    assert!(!validator.check(&iri("a"), &label("KnowsAnonymous"))?);
    assert!(validator.check(&iri("b"), &label("KnowsAnonymous"))?);
    Ok(())
}

#[test]
fn non_stratifiable_schema_is_rejected_up_front() {
    let schema = Schema::build([
        (
            "A",
            ShapeExpr::shape(TripleExpr::constraint(p("knows"), ShapeExpr::reference("B"))),
        ),
        ("B", ShapeExpr::not(ShapeExpr::reference("A"))),
    ])
    .unwrap();
    let err = Validator::new(schema, MemoryGraph::new()).err().unwrap();
    assert!(matches!(
        err,
        ValidationError::Schema(SchemaError::NegationCycle { .. })
    ));
}

#[test]
fn invalid_pattern_is_a_schema_error() {
    let schema = Schema::build([(
        "S",
        ShapeExpr::node_constraint(NodeConstraint::any().with_pattern("[a-", None)),
    )])
    .unwrap();
    let err = Validator::new(schema, MemoryGraph::new()).err().unwrap();
    assert!(matches!(
        err,
        ValidationError::Schema(SchemaError::InvalidPattern { .. })
    ));
}

#[test]
fn unknown_focus_label_is_reported() {
    let schema = Schema::build([("S", ShapeExpr::node_constraint(NodeConstraint::any()))]).unwrap();
    let validator = Validator::new(schema, MemoryGraph::new()).unwrap();
    let err = validator.validate(&iri("x"), &label("Nope")).unwrap_err();
    assert!(matches!(err, ValidationError::UnknownShape { .. }));
}

struct StartsWithA;

impl ExternalShapes for StartsWithA {
    fn satisfies(&self, node: &Node, label: &ShapeLabel) -> anyhow::Result<bool> {
        match label.as_str() {
            "Ext" => Ok(node.as_iri().is_some_and(|i| i.as_str().starts_with(&format!("{EX}a")))),
            other => Err(anyhow!("no definition for {other}")),
        }
    }
}

#[test]
fn external_shapes_need_a_provider() -> Result<()> {
    let build = || Schema::build([("Ext", ShapeExpr::external())]);

    let err = Validator::new(build()?, MemoryGraph::new())?
        .validate(&iri("alice"), &label("Ext"))
        .unwrap_err();
    assert!(matches!(err, ValidationError::UnsupportedFeature { .. }));

    let validator = Validator::new(build()?, MemoryGraph::new())?.with_external_shapes(StartsWithA);
    assert!(validator.check(&iri("alice"), &label("Ext"))?);
    assert!(!validator.check(&iri("bob"), &label("Ext"))?);
    Ok(())
}

#[test]
fn external_failures_are_wrapped() -> Result<()> {
    let schema = Schema::build([(
        "Other",
        ShapeExpr::external(),
    )])?;
    let err = Validator::new(schema, MemoryGraph::new())?
        .with_external_shapes(StartsWithA)
        .validate(&iri("alice"), &label("Other"))
        .unwrap_err();
    match err {
        ValidationError::External { label, source } => {
            assert_eq!(label, "Other");
            assert!(source.to_string().contains("no definition"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}

#[test]
fn cancelled_runs_stop() -> Result<()> {
    let schema = Schema::build([("S", ShapeExpr::shape(TripleExpr::any(p("a")).star()))])?;
    let cancellation = Cancellation::new();
    let validator = Validator::new(schema, MemoryGraph::new())?.with_cancellation(cancellation.clone());
    cancellation.cancel();
    assert!(matches!(
        validator.validate(&iri("x"), &label("S")),
        Err(ValidationError::Cancelled)
    ));
    Ok(())
}

#[test]
fn bag_limit_guards_enumeration() -> Result<()> {
    // Four interchangeable edges over two instances, none of which can
    // satisfy `a a` with an extra `b` required.
    let schema = Schema::build([(
        "S",
        ShapeExpr::shape(TripleExpr::each_of(vec![
            TripleExpr::any(p("a")).repeat(Interval::exactly(2)),
            TripleExpr::any(p("b")),
        ])),
    )])?;
    let mut g = MemoryGraph::new();
    for i in 0..4 {
        g.add(iri("x"), pred("a"), Node::string(format!("v{i}")));
    }

    let limited = ValidatorConfig {
        parallel: false,
        max_bags_per_check: Some(2),
    };
    let validator = Validator::new(schema, g)?.with_config(limited);
    assert!(matches!(
        validator.validate(&iri("x"), &label("S")),
        Err(ValidationError::BagLimitExceeded { limit: 2, .. })
    ));
    Ok(())
}

#[test]
fn parallel_and_sequential_scans_agree() -> Result<()> {
    let build = || {
        Schema::build([
            (
                "Chain",
                ShapeExpr::shape(TripleExpr::each_of(vec![
                    TripleExpr::constraint(p("name"), string_value()),
                    TripleExpr::constraint(p("next"), ShapeExpr::reference("Chain")).optional(),
                ])),
            ),
        ])
    };
    let mut g = MemoryGraph::new();
    for i in 0..20 {
        if i != 13 {
            g.add(iri(&format!("n{i}")), pred("name"), Node::string(format!("n{i}")));
        }
        g.add(iri(&format!("n{i}")), pred("next"), iri(&format!("n{}", i + 1)));
    }
    g.add(iri("n20"), pred("name"), Node::string("end"));

    let parallel = Validator::new(build()?, g.clone())?.validate(&iri("n0"), &label("Chain"))?;
    let sequential = Validator::new(build()?, g)?
        .with_config(sequential())
        .validate(&iri("n0"), &label("Chain"))?;

    assert_eq!(parallel.conforming(), sequential.conforming());
    // Nodes after the broken link conform, nodes before it do not.
    assert!(parallel.contains(&iri("n14"), &label("Chain")));
    assert!(!parallel.contains(&iri("n12"), &label("Chain")));
    assert!(!parallel.contains(&iri("n0"), &label("Chain")));
    Ok(())
}

#[test]
fn config_round_trips_through_json() {
    let config: ValidatorConfig = serde_json::from_str(r#"{"max_bags_per_check": 100}"#).unwrap();
    assert!(config.parallel);
    assert_eq!(config.max_bags_per_check, Some(100));
}
