//! Parse and serialize messages against the bundled schema sets

use hl7_codec::{Er7Parser, Er7Serializer, Error, ParserOptions};
use hl7_model::{
    ErrorKind, FactoryRegistry, Message, ModelFactory, SchemaSetFactory, missing_required,
    navigate,
};
use hl7_schema::{
    ChildSpec, DatatypeDef, PrimitiveKind, SchemaLoader, SchemaSetBuilder, StructureSchema,
};
use std::path::PathBuf;
use std::sync::Arc;

fn manifest_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

fn fixture(name: &str) -> String {
    let path = manifest_dir().join("tests").join("data").join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read {:?}: {}", path, e))
}

fn factories() -> FactoryRegistry {
    let loader = SchemaLoader::new(vec![manifest_dir().join("..").join("..").join("schemas")]);
    loader.load_all().unwrap();
    FactoryRegistry::from_registry(loader.registry())
}

fn parser(strict: bool) -> Er7Parser {
    Er7Parser::with_options(factories(), ParserOptions { strict })
}

#[test]
fn test_dft_p03_round_trip() -> anyhow::Result<()> {
    let text = fixture("dft_p03.hl7");
    let message = parser(true).parse(&text)?;

    assert_eq!(message.name(), "DFT_P03");
    assert_eq!(message.schema_id().version, "2.5.1");
    assert_eq!(message.count_repetitions("PD1")?, 1);
    assert_eq!(message.count_repetitions("PV2")?, 0);
    assert_eq!(message.count_repetitions("ROL")?, 0);
    assert_eq!(message.count_repetitions("ROL2")?, 1);
    assert_eq!(message.count_repetitions("FINANCIAL")?, 2);
    assert_eq!(message.count_repetitions("DG1")?, 3);

    let surgeon = navigate(&message, "FINANCIAL[0]/FINANCIAL_PROCEDURE/ROL/Role-ROL")?.unwrap();
    let role = surgeon.as_field().unwrap().as_composite().unwrap();
    assert_eq!(role.peek(1)?.unwrap().value(), Some("Surgeon"));

    let description = navigate(&message, "FINANCIAL[0]/FT1/8")?.unwrap();
    assert_eq!(description.as_field().unwrap().value(), Some("Visit & exam"));
    assert!(navigate(&message, "FINANCIAL[1]/FINANCIAL_PROCEDURE")?.is_none());

    assert!(missing_required(&message).is_empty());

    let written = Er7Serializer::new().serialize(&message)?;
    assert_eq!(written, text.replace('\n', "\r"));

    let reparsed = parser(true).parse(&written)?;
    assert_eq!(reparsed, message);
    Ok(())
}

#[test]
fn test_version_selected_from_msh12() -> anyhow::Result<()> {
    let message = parser(false).parse(&fixture("orf_r04_v231.hl7"))?;
    assert_eq!(message.schema_id().version, "2.3.1");
    assert_eq!(message.name(), "ORF_R04");

    let note = navigate(
        &message,
        "QUERY_RESPONSE/ORDER/OBSERVATION/NTE/Comment",
    )?
    .unwrap();
    assert_eq!(note.as_field().unwrap().value(), Some("Fasting sample"));

    let unknown = fixture("orf_r04_v231.hl7").replace("|2.3.1", "|2.9");
    let err = parser(false).parse(&unknown).unwrap_err();
    assert!(matches!(err, Error::UnknownVersion { ref version, .. } if version == "2.9"));
    Ok(())
}

#[test]
fn test_duplicate_header_is_cardinality_error() {
    let text = fixture("dft_p03.hl7");
    let header = text.lines().next().unwrap();
    let doubled = format!("{}\n{}", header, text);

    let err = parser(false).parse(&doubled).unwrap_err();
    assert_eq!(err.model_kind(), Some(ErrorKind::Cardinality));
    assert_eq!(err.line(), Some(2));
}

#[test]
fn test_unknown_z_segment_strict_and_lenient() -> anyhow::Result<()> {
    let text = fixture("dft_p03.hl7");
    let with_z = text.replace("PD1|", "ZPI|custom\nPD1|");

    let err = parser(true).parse(&with_z).unwrap_err();
    assert!(matches!(err, Error::Parse { line: 4, .. }));

    let lenient = parser(false).parse(&with_z)?;
    assert_eq!(lenient, parser(false).parse(&text)?);
    Ok(())
}

/// Header (required), Body (required, repeating), Footer (optional); Header
/// and Footer share the NTE segment type
fn aliased_factory() -> Arc<dyn ModelFactory> {
    let set = SchemaSetBuilder::new("HL7", "0.1")
        .datatype(DatatypeDef::primitive("ST", PrimitiveKind::String))
        .structure(
            StructureSchema::segment(
                "MSH",
                vec![
                    ChildSpec::field("Field Separator", "ST").required(true),
                    ChildSpec::field("Encoding Characters", "ST").required(true),
                ],
            )
            .unwrap(),
        )
        .structure(StructureSchema::segment("NTE", vec![ChildSpec::field("Text", "ST")]).unwrap())
        .structure(StructureSchema::segment("OBX", vec![ChildSpec::field("Value", "ST")]).unwrap())
        .structure(
            StructureSchema::message(
                "HBF",
                vec![
                    ChildSpec::segment("MSH").required(true),
                    ChildSpec::segment_as("HEADER", "NTE").required(true),
                    ChildSpec::segment_as("BODY", "OBX").required(true).repeating(true),
                    ChildSpec::segment_as("FOOTER", "NTE"),
                ],
            )
            .unwrap(),
        )
        .build()
        .unwrap();
    SchemaSetFactory::shared(Arc::new(set))
}

#[test]
fn test_aliased_slots_serialize_in_schema_order() -> anyhow::Result<()> {
    let factory = aliased_factory();
    let mut message = Message::new(Arc::clone(&factory), "HBF")?;

    for _ in 0..3 {
        message.add("BODY")?;
    }
    message.get("FOOTER", 0)?;

    // MSH and HEADER are required and still absent
    match Er7Serializer::new().serialize(&message) {
        Err(Error::MissingRequired(paths)) => assert_eq!(paths, vec!["HBF/MSH", "HBF/HEADER"]),
        other => panic!("Expected MissingRequired error, got {:?}", other),
    }

    message.structure("HEADER", 0)?.field_number(1, 0)?.set_value("header")?;
    let msh = message.structure("MSH", 0)?;
    msh.field_number(1, 0)?.set_value("|")?;
    msh.field_number(2, 0)?.set_value("^~\\&")?;

    let written = Er7Serializer::new().serialize(&message)?;
    assert_eq!(written, "MSH|^~\\&\rNTE|header\rOBX\rOBX\rOBX\rNTE\r");

    let parsed = Er7Parser::new(FactoryRegistry::new()).parse_with(&written, factory, "HBF")?;
    assert_eq!(parsed.count_repetitions("BODY")?, 3);
    assert_eq!(parsed.count_repetitions("FOOTER")?, 1);
    assert_eq!(
        parsed.peek_structure("HEADER", 0)?.unwrap().peek_field("Text", 0)?.unwrap().value(),
        Some("header")
    );
    assert_eq!(parsed, message);
    Ok(())
}
