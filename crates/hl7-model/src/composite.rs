//! Fixed-arity composite values

use crate::factory::ModelFactory;
use crate::node::InstanceId;
use crate::value::Value;
use crate::{Error, Result};
use hl7_schema::{ComponentSpec, DatatypeDef};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// A schema-known slot of a composite, used by typed accessors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component {
    pub index: usize,
    pub name: &'static str,
}

impl Component {
    pub const fn new(index: usize, name: &'static str) -> Self {
        Self { index, name }
    }
}

/// Field value made of a fixed number of typed sub-values.
///
/// The number of slots is the arity of the datatype and never changes. Slot
/// values are created on first access through [`Composite::get`].
pub struct Composite {
    id: InstanceId,
    datatype: Arc<DatatypeDef>,
    factory: Arc<dyn ModelFactory>,
    slots: Vec<Option<Value>>,
}

impl Composite {
    /// Create an empty composite; fails if the datatype is a primitive
    pub fn new(datatype: Arc<DatatypeDef>, factory: Arc<dyn ModelFactory>) -> Result<Self> {
        if !datatype.is_composite() {
            return Err(Error::DatatypeMismatch {
                expected: "a composite datatype".to_string(),
                found: datatype.name().to_string(),
            });
        }
        Ok(Self::with_factory(datatype, factory))
    }

    pub(crate) fn with_factory(datatype: Arc<DatatypeDef>, factory: Arc<dyn ModelFactory>) -> Self {
        let slots = (0..datatype.arity()).map(|_| None).collect();
        Self {
            id: InstanceId::next(),
            datatype,
            factory,
            slots,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn datatype(&self) -> &Arc<DatatypeDef> {
        &self.datatype
    }

    /// Number of slots
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn component_name(&self, index: usize) -> Result<&str> {
        self.spec(index).map(|spec| spec.name.as_str())
    }

    /// Get the slot value, creating it on first access
    pub fn get(&mut self, index: usize) -> Result<&mut Value> {
        self.check_index(index)?;
        if self.slots[index].is_none() {
            let type_ref = &self.spec(index)?.type_ref;
            let datatype = self.factory.datatype(type_ref)?;
            trace!(
                composite = %self.datatype.name(),
                index,
                datatype = %datatype.name(),
                "Created component value"
            );
            self.slots[index] = Some(Value::with_factory(datatype, &self.factory));
        }
        self.slots[index]
            .as_mut()
            .ok_or_else(|| Error::internal(self.datatype.name(), "slot vanished after creation"))
    }

    /// Read a slot without creating it
    pub fn peek(&self, index: usize) -> Result<Option<&Value>> {
        self.check_index(index)?;
        Ok(self.slots[index].as_ref())
    }

    /// Set the leading primitive of a slot
    pub fn set(&mut self, index: usize, text: &str) -> Result<()> {
        self.get(index)?.set_value(text)
    }

    /// Put a prebuilt value into a slot, returning the previous one
    pub fn replace(&mut self, index: usize, value: Value) -> Result<Option<Value>> {
        let spec = self.spec(index)?;
        if value.datatype().name() != spec.type_ref {
            return Err(Error::DatatypeMismatch {
                expected: spec.type_ref.clone(),
                found: value.datatype().name().to_string(),
            });
        }
        Ok(self.slots[index].replace(value))
    }

    /// Empty one slot
    pub fn clear_slot(&mut self, index: usize) -> Result<Option<Value>> {
        self.check_index(index)?;
        Ok(self.slots[index].take())
    }

    /// Slots paired with their component declarations, in order
    pub fn components(&self) -> impl Iterator<Item = (&ComponentSpec, Option<&Value>)> {
        self.datatype
            .components()
            .iter()
            .zip(self.slots.iter().map(Option::as_ref))
    }

    /// Read a schema-known slot; a bad index is a wiring error, not a data error
    pub fn project(&self, component: Component) -> Result<Option<&Value>> {
        self.peek(component.index)
            .map_err(|e| self.projection_error(component, e))
    }

    /// Mutable counterpart of [`Composite::project`]
    pub fn project_mut(&mut self, component: Component) -> Result<&mut Value> {
        // Checked up front so the error can borrow `self` for its message
        if let Err(e) = self.check_index(component.index) {
            return Err(self.projection_error(component, e));
        }
        self.get(component.index)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().flatten().all(Value::is_empty)
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    pub(crate) fn slots(&self) -> &[Option<Value>] {
        &self.slots
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.slots.len() {
            Ok(())
        } else {
            Err(Error::Index {
                datatype: self.datatype.name().to_string(),
                index,
                size: self.slots.len(),
            })
        }
    }

    fn spec(&self, index: usize) -> Result<&ComponentSpec> {
        self.check_index(index)?;
        self.datatype.components().get(index).ok_or_else(|| {
            Error::internal(self.datatype.name(), "arity disagrees with component list")
        })
    }

    fn projection_error(&self, component: Component, source: Error) -> Error {
        Error::internal(
            format!("{}.{}", self.datatype.name(), component.name),
            source.to_string(),
        )
    }
}

impl PartialEq for Composite {
    /// Compares content only; unset slots equal empty ones
    fn eq(&self, other: &Self) -> bool {
        self.datatype.name() == other.datatype.name()
            && self.slots.len() == other.slots.len()
            && self
                .slots
                .iter()
                .zip(other.slots.iter())
                .all(|pair| match pair {
                    (Some(a), Some(b)) => a == b,
                    (Some(v), None) | (None, Some(v)) => v.is_empty(),
                    (None, None) => true,
                })
    }
}

impl fmt::Debug for Composite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composite")
            .field("id", &self.id)
            .field("datatype", &self.datatype.name())
            .field("slots", &self.slots)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::testing::sample_factory;

    fn composite(name: &str) -> Composite {
        let factory = sample_factory();
        let datatype = factory.datatype(name).unwrap();
        Composite::new(datatype, factory).unwrap()
    }

    #[test]
    fn test_size_is_fixed_by_datatype() {
        let ce = composite("CE");
        assert_eq!(ce.size(), 3);
        assert!(ce.is_empty());
        assert_eq!(ce.component_name(2).unwrap(), "Name of Coding System");
    }

    #[test]
    fn test_in_range_set_then_get() {
        let mut ce = composite("CE");
        for index in 0..ce.size() {
            ce.set(index, &format!("v{}", index)).unwrap();
        }
        for index in 0..ce.size() {
            let expected = format!("v{}", index);
            assert_eq!(ce.get(index).unwrap().value(), Some(expected.as_str()));
        }
        assert!(!ce.is_empty());
    }

    #[test]
    fn test_index_at_size_is_an_index_error() {
        let mut ce = composite("CE");
        let size = ce.size();

        assert_eq!(ce.get(size).unwrap_err().kind(), ErrorKind::Index);
        assert_eq!(ce.set(size, "x").unwrap_err().kind(), ErrorKind::Index);
        assert_eq!(ce.peek(size).unwrap_err().kind(), ErrorKind::Index);
        assert_eq!(ce.size(), size);
    }

    #[test]
    fn test_clear_slot_returns_previous_value() {
        let mut ce = composite("CE");
        ce.set(1, "Glucose").unwrap();

        let previous = ce.clear_slot(1).unwrap().unwrap();
        assert_eq!(previous.value(), Some("Glucose"));
        assert!(ce.peek(1).unwrap().is_none());
        assert!(ce.clear_slot(1).unwrap().is_none());
        assert_eq!(ce.clear_slot(ce.size()).unwrap_err().kind(), ErrorKind::Index);
    }

    #[test]
    fn test_slots_are_created_lazily_and_kept() {
        let mut ts = composite("TS");
        assert!(ts.peek(0).unwrap().is_none());

        let id = ts.get(0).unwrap().id();
        assert!(ts.peek(0).unwrap().is_some());
        assert_eq!(ts.get(0).unwrap().id(), id);
    }

    #[test]
    fn test_nested_composite_slot() {
        let mut din = composite("CM_DIN");
        din.get(0)
            .unwrap()
            .as_composite_mut()
            .unwrap()
            .set(0, "20240101")
            .unwrap();
        din.set(1, "GENERAL").unwrap();

        let date = din.peek(0).unwrap().unwrap();
        assert_eq!(date.datatype().name(), "TS");
        assert_eq!(date.value(), Some("20240101"));

        let institution = din.peek(1).unwrap().unwrap().as_composite().unwrap();
        assert_eq!(institution.peek(0).unwrap().unwrap().value(), Some("GENERAL"));
    }

    #[test]
    fn test_replace_checks_component_type() {
        let factory = sample_factory();
        let mut din = composite("CM_DIN");

        let ce = Value::new(factory.datatype("CE").unwrap(), Arc::clone(&factory));
        let err = din.replace(0, ce).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KindMismatch);

        let ts = Value::new(factory.datatype("TS").unwrap(), factory);
        assert!(din.replace(0, ts).unwrap().is_none());
    }

    #[test]
    fn test_bad_projection_is_internal() {
        const MISPLACED: Component = Component::new(7, "Misplaced");
        let mut ts = composite("TS");

        let err = ts.project(MISPLACED).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        let err = ts.project_mut(MISPLACED).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().contains("TS.Misplaced"));
    }

    #[test]
    fn test_unset_slot_equals_empty_slot() {
        let mut a = composite("CE");
        let b = composite("CE");
        a.get(1).unwrap();
        assert_eq!(a, b);

        a.set(1, "text").unwrap();
        assert_ne!(a, b);
    }
}
