//! Typed views over well-known composite datatypes.
//!
//! A view wraps a [`Composite`] after checking its datatype name. Reads work
//! through any `Deref<Target = Composite>` (so `&Composite` is enough);
//! writes need `DerefMut`. Component positions are fixed by the datatype, so
//! a failed projection is reported as [`Error::Internal`].

use crate::composite::{Component, Composite};
use crate::value::Value;
use crate::{Error, Result};
use chrono::{DateTime, FixedOffset};
use std::ops::{Deref, DerefMut};

fn check_datatype(composite: &Composite, expected: &str) -> Result<()> {
    if composite.datatype().name() == expected {
        Ok(())
    } else {
        Err(Error::DatatypeMismatch {
            expected: expected.to_string(),
            found: composite.datatype().name().to_string(),
        })
    }
}

fn text(composite: &Composite, component: Component) -> Result<Option<&str>> {
    Ok(composite.project(component)?.and_then(Value::value))
}

fn nested(composite: &Composite, component: Component) -> Result<Option<&Composite>> {
    match composite.project(component)? {
        None => Ok(None),
        Some(Value::Composite(inner)) => Ok(Some(inner)),
        Some(Value::Primitive(p)) => Err(Error::internal(
            format!("{}.{}", composite.datatype().name(), component.name),
            format!("expected a composite, found {}", p.datatype().name()),
        )),
    }
}

fn nested_mut(composite: &mut Composite, component: Component) -> Result<&mut Composite> {
    let context = format!("{}.{}", composite.datatype().name(), component.name);
    match composite.project_mut(component)? {
        Value::Composite(inner) => Ok(inner),
        Value::Primitive(p) => Err(Error::internal(
            context,
            format!("expected a composite, found {}", p.datatype().name()),
        )),
    }
}

/// `TS`: time stamp with an optional degree of precision
#[derive(Debug)]
pub struct TimeStamp<C> {
    composite: C,
}

impl<C: Deref<Target = Composite>> TimeStamp<C> {
    pub const TIME: Component = Component::new(0, "Time");
    pub const DEGREE_OF_PRECISION: Component = Component::new(1, "Degree of Precision");

    pub fn wrap(composite: C) -> Result<Self> {
        check_datatype(&composite, "TS")?;
        Ok(Self { composite })
    }

    pub fn time_text(&self) -> Result<Option<&str>> {
        text(&self.composite, Self::TIME)
    }

    /// Parsed time; [`Error::Conversion`] if the text is malformed
    pub fn time(&self) -> Result<Option<DateTime<FixedOffset>>> {
        match self.composite.project(Self::TIME)? {
            Some(Value::Primitive(p)) => p.as_datetime(),
            Some(Value::Composite(c)) => Err(Error::internal(
                "TS.Time",
                format!("expected a primitive, found {}", c.datatype().name()),
            )),
            None => Ok(None),
        }
    }

    pub fn degree_of_precision(&self) -> Result<Option<&str>> {
        text(&self.composite, Self::DEGREE_OF_PRECISION)
    }

    pub fn into_inner(self) -> C {
        self.composite
    }
}

impl<C: DerefMut<Target = Composite>> TimeStamp<C> {
    pub fn set_time(&mut self, time: &DateTime<FixedOffset>) -> Result<()> {
        match self.composite.project_mut(Self::TIME)? {
            Value::Primitive(p) => {
                p.set_datetime(time);
                Ok(())
            }
            Value::Composite(c) => Err(Error::internal(
                "TS.Time",
                format!("expected a primitive, found {}", c.datatype().name()),
            )),
        }
    }

    pub fn set_degree_of_precision(&mut self, precision: &str) -> Result<()> {
        self.composite
            .project_mut(Self::DEGREE_OF_PRECISION)?
            .set_value(precision)
    }
}

/// `CE`: coded element with an optional alternate coding
#[derive(Debug)]
pub struct CodedElement<C> {
    composite: C,
}

impl<C: Deref<Target = Composite>> CodedElement<C> {
    pub const IDENTIFIER: Component = Component::new(0, "Identifier");
    pub const TEXT: Component = Component::new(1, "Text");
    pub const CODING_SYSTEM: Component = Component::new(2, "Name of Coding System");
    pub const ALTERNATE_IDENTIFIER: Component = Component::new(3, "Alternate Identifier");
    pub const ALTERNATE_TEXT: Component = Component::new(4, "Alternate Text");
    pub const ALTERNATE_CODING_SYSTEM: Component =
        Component::new(5, "Name of Alternate Coding System");

    pub fn wrap(composite: C) -> Result<Self> {
        check_datatype(&composite, "CE")?;
        Ok(Self { composite })
    }

    pub fn identifier(&self) -> Result<Option<&str>> {
        text(&self.composite, Self::IDENTIFIER)
    }

    pub fn text(&self) -> Result<Option<&str>> {
        text(&self.composite, Self::TEXT)
    }

    pub fn coding_system(&self) -> Result<Option<&str>> {
        text(&self.composite, Self::CODING_SYSTEM)
    }

    pub fn alternate_identifier(&self) -> Result<Option<&str>> {
        text(&self.composite, Self::ALTERNATE_IDENTIFIER)
    }

    pub fn alternate_text(&self) -> Result<Option<&str>> {
        text(&self.composite, Self::ALTERNATE_TEXT)
    }

    pub fn alternate_coding_system(&self) -> Result<Option<&str>> {
        text(&self.composite, Self::ALTERNATE_CODING_SYSTEM)
    }

    pub fn into_inner(self) -> C {
        self.composite
    }
}

impl<C: DerefMut<Target = Composite>> CodedElement<C> {
    /// Set identifier, text, and coding system in one call
    pub fn set_code(&mut self, identifier: &str, text: &str, coding_system: &str) -> Result<()> {
        self.composite.project_mut(Self::IDENTIFIER)?.set_value(identifier)?;
        self.composite.project_mut(Self::TEXT)?.set_value(text)?;
        self.composite
            .project_mut(Self::CODING_SYSTEM)?
            .set_value(coding_system)
    }

    pub fn set_alternate(
        &mut self,
        identifier: &str,
        text: &str,
        coding_system: &str,
    ) -> Result<()> {
        self.composite
            .project_mut(Self::ALTERNATE_IDENTIFIER)?
            .set_value(identifier)?;
        self.composite.project_mut(Self::ALTERNATE_TEXT)?.set_value(text)?;
        self.composite
            .project_mut(Self::ALTERNATE_CODING_SYSTEM)?
            .set_value(coding_system)
    }
}

/// `CM_DIN`: activation date with the issuing institution
#[derive(Debug)]
pub struct ActivationDate<C> {
    composite: C,
}

impl<C: Deref<Target = Composite>> ActivationDate<C> {
    pub const DATE: Component = Component::new(0, "Date");
    pub const INSTITUTION_NAME: Component = Component::new(1, "Institution Name");

    pub fn wrap(composite: C) -> Result<Self> {
        check_datatype(&composite, "CM_DIN")?;
        Ok(Self { composite })
    }

    pub fn date(&self) -> Result<Option<TimeStamp<&Composite>>> {
        nested(&self.composite, Self::DATE)?
            .map(TimeStamp::wrap)
            .transpose()
    }

    pub fn institution_name(&self) -> Result<Option<CodedElement<&Composite>>> {
        nested(&self.composite, Self::INSTITUTION_NAME)?
            .map(CodedElement::wrap)
            .transpose()
    }

    pub fn into_inner(self) -> C {
        self.composite
    }
}

impl<C: DerefMut<Target = Composite>> ActivationDate<C> {
    pub fn date_mut(&mut self) -> Result<TimeStamp<&mut Composite>> {
        TimeStamp::wrap(nested_mut(&mut self.composite, Self::DATE)?)
    }

    pub fn institution_name_mut(&mut self) -> Result<CodedElement<&mut Composite>> {
        CodedElement::wrap(nested_mut(&mut self.composite, Self::INSTITUTION_NAME)?)
    }
}
