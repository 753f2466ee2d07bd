//! Shared fixtures for unit tests

use crate::factory::{ModelFactory, SchemaSetFactory};
use hl7_schema::{
    ChildSpec, ComponentSpec, DatatypeDef, PrimitiveKind, SchemaSet, SchemaSetBuilder,
    StructureSchema,
};
use std::sync::Arc;

/// Header / Body / Footer message with a nested detail group
pub(crate) fn sample_set() -> Arc<SchemaSet> {
    let set = SchemaSetBuilder::new("TEST", "1.0")
        .datatype(DatatypeDef::primitive("ST", PrimitiveKind::String))
        .datatype(DatatypeDef::primitive("ID", PrimitiveKind::Coded))
        .datatype(DatatypeDef::primitive("NM", PrimitiveKind::Numeric))
        .datatype(DatatypeDef::primitive("DT", PrimitiveKind::Date))
        .datatype(DatatypeDef::primitive("DTM", PrimitiveKind::DateTime))
        .datatype(DatatypeDef::composite(
            "TS",
            vec![
                ComponentSpec::new("Time", "DTM"),
                ComponentSpec::new("Degree of Precision", "ID"),
            ],
        ))
        .datatype(DatatypeDef::composite(
            "CE",
            vec![
                ComponentSpec::new("Identifier", "ST"),
                ComponentSpec::new("Text", "ST"),
                ComponentSpec::new("Name of Coding System", "ST"),
            ],
        ))
        .datatype(DatatypeDef::composite(
            "CM_DIN",
            vec![
                ComponentSpec::new("Date", "TS"),
                ComponentSpec::new("Institution Name", "CE"),
            ],
        ))
        .structure(
            StructureSchema::segment(
                "HDR",
                vec![
                    ChildSpec::field("Sender", "ST").required(true),
                    ChildSpec::field("Sent At", "TS"),
                ],
            )
            .unwrap(),
        )
        .structure(
            StructureSchema::segment(
                "BDY",
                vec![
                    ChildSpec::field("Set ID", "NM"),
                    ChildSpec::field("Code", "CE").required(true),
                    ChildSpec::field("Notes", "ST").repeating(true),
                    ChildSpec::field("Activated", "CM_DIN"),
                    ChildSpec::field("Effective Date", "DT"),
                ],
            )
            .unwrap(),
        )
        .structure(
            StructureSchema::segment("FTR", vec![ChildSpec::field("Count", "NM")]).unwrap(),
        )
        .structure(
            StructureSchema::group(
                "HBF_DETAIL",
                vec![
                    ChildSpec::segment("BDY").required(true),
                    ChildSpec::segment_as("SUMMARY", "FTR"),
                ],
            )
            .unwrap(),
        )
        .structure(
            StructureSchema::message(
                "HBF",
                vec![
                    ChildSpec::segment("HDR").required(true),
                    ChildSpec::segment("BDY").required(true).repeating(true),
                    ChildSpec::group("DETAIL", "HBF_DETAIL").repeating(true),
                    ChildSpec::segment("FTR"),
                ],
            )
            .unwrap(),
        )
        .build()
        .unwrap();
    Arc::new(set)
}

pub(crate) fn sample_factory() -> Arc<dyn ModelFactory> {
    SchemaSetFactory::shared(sample_set())
}
