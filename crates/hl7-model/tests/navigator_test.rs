//! Navigator behaviour over the bundled HL7 v2.5.1 schemas

use hl7_model::{
    ActivationDate, Child, ErrorKind, Message, ModelFactory, SchemaSetFactory, TimeStamp,
    missing_required, navigate, navigate_mut,
};
use hl7_schema::{SchemaLoader, StructureKind};
use std::path::PathBuf;
use std::sync::Arc;

fn factory(version: &str) -> Arc<dyn ModelFactory> {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("schemas");
    let loader = SchemaLoader::new(vec![dir]);
    SchemaSetFactory::shared(loader.load("HL7", version).unwrap())
}

#[test]
fn test_dft_p03_lazy_navigation() -> anyhow::Result<()> {
    let mut message = Message::new(factory("2.5.1"), "DFT_P03")?;

    let pid = message.structure("PID", 0)?;
    pid.field("Patient Name", 0)?
        .as_composite_mut()
        .unwrap()
        .get(0)?
        .set_value("DOE")?;
    pid.field("Patient Name", 1)?.set_value("SMITH")?;
    assert_eq!(pid.count_repetitions("Patient Name")?, 2);

    let financial = message.add_structure("FINANCIAL")?;
    financial.structure("FT1", 0)?.field_number(1, 0)?.set_value("1")?;
    let procedure = financial.add_structure("FINANCIAL_PROCEDURE")?;
    procedure.add("ROL")?;
    procedure.add("ROL")?;

    assert_eq!(message.count_repetitions("FINANCIAL")?, 1);
    let procedure = message
        .peek_structure("FINANCIAL", 0)?
        .unwrap()
        .peek_structure("FINANCIAL_PROCEDURE", 0)?
        .unwrap();
    assert_eq!(procedure.kind(), StructureKind::Group);
    assert_eq!(procedure.count_repetitions("ROL")?, 2);
    assert_eq!(procedure.count_repetitions("PR1")?, 0);
    Ok(())
}

#[test]
fn test_aliased_role_slots_are_independent() -> anyhow::Result<()> {
    let mut message = Message::new(factory("2.5.1"), "DFT_P03")?;
    message.add("ROL")?;
    message.add("ROL2")?;
    message.add("ROL2")?;

    assert_eq!(message.count_repetitions("ROL")?, 1);
    assert_eq!(message.count_repetitions("ROL2")?, 2);
    let rol2 = message.peek_structure("ROL2", 1)?.unwrap();
    assert_eq!(rol2.name(), "ROL");
    Ok(())
}

#[test]
fn test_repetition_rules_on_real_schema() -> anyhow::Result<()> {
    let mut message = Message::new(factory("2.5.1"), "DFT_P03")?;

    message.add("EVN")?;
    assert_eq!(message.add("EVN").unwrap_err().kind(), ErrorKind::Cardinality);

    for _ in 0..3 {
        message.add("DG1")?;
    }
    assert!(message.get("DG1", 3).is_ok());
    assert_eq!(message.get("DG1", 5).unwrap_err().kind(), ErrorKind::RepetitionGap);
    assert_eq!(message.count_repetitions("DG1")?, 4);

    assert_eq!(message.get("ZZZ", 0).unwrap_err().kind(), ErrorKind::NotFound);
    Ok(())
}

#[test]
fn test_remove_at_reindexes() -> anyhow::Result<()> {
    let mut message = Message::new(factory("2.5.1"), "DFT_P03")?;
    for set_id in ["1", "2", "3"] {
        message
            .add_structure("DG1")?
            .field_number(1, 0)?
            .set_value(set_id)?;
    }

    let removed = message.remove_at("DG1", 1)?;
    let removed = removed.into_structure().unwrap();
    assert_eq!(removed.peek_field("Set ID - DG1", 0)?.unwrap().value(), Some("2"));

    let remaining: Vec<Option<&str>> = message
        .iter("DG1")?
        .filter_map(Child::as_structure)
        .map(|dg1| dg1.peek_field("Set ID - DG1", 0).ok().flatten().and_then(|v| v.value()))
        .collect();
    assert_eq!(remaining, vec![Some("1"), Some("3")]);
    Ok(())
}

#[test]
fn test_path_navigation_into_groups() -> anyhow::Result<()> {
    let mut message = Message::new(factory("2.5.1"), "DFT_P03")?;
    navigate_mut(&mut message, "FINANCIAL[0]/FT1/1")?
        .as_field_mut()
        .unwrap()
        .set_value("1")?;
    navigate_mut(&mut message, "FINANCIAL[1]/FT1/1")?
        .as_field_mut()
        .unwrap()
        .set_value("2")?;

    let second = navigate(&message, "FINANCIAL[1]/FT1/Set ID - FT1")?.unwrap();
    assert_eq!(second.as_field().unwrap().value(), Some("2"));
    assert!(navigate(&message, "FINANCIAL[2]/FT1")?.is_none());
    Ok(())
}

#[test]
fn test_missing_required_on_partial_message() -> anyhow::Result<()> {
    let mut message = Message::new(factory("2.5.1"), "DFT_P03")?;
    message.add("MSH")?;
    message.add("EVN")?;

    let missing: Vec<String> = missing_required(&message)
        .into_iter()
        .filter(|m| m.parent == "DFT_P03")
        .map(|m| m.name)
        .collect();
    assert_eq!(missing, vec!["PID", "FINANCIAL"]);
    Ok(())
}

#[test]
fn test_activation_date_on_v231() -> anyhow::Result<()> {
    let factory = factory("2.3.1");
    let datatype = factory.datatype("CM_DIN")?;
    let mut value = hl7_model::Value::new(datatype, Arc::clone(&factory));
    let din = value.as_composite_mut().unwrap();

    {
        let mut view = ActivationDate::wrap(&mut *din)?;
        view.date_mut()?.set_degree_of_precision("D")?;
        view.institution_name_mut()?.set_code("GH", "General", "L")?;
    }
    din.get(0)?.as_composite_mut().unwrap().set(0, "20240105")?;

    let view = ActivationDate::wrap(&*din)?;
    let date: TimeStamp<_> = view.date()?.unwrap();
    let time = date.time()?.unwrap();
    assert_eq!(time.format("%Y-%m-%d").to_string(), "2024-01-05");
    assert_eq!(view.institution_name()?.unwrap().identifier()?, Some("GH"));
    Ok(())
}
