//! Module factory: builds units requested by top-down mutators.

use mutagraph_core::{fill_missing, Properties, PropertyBag, PropertyError, PropertyValue};

use crate::module::{ModuleFactory, ModuleRef};

/// A unit waiting to be added at pass end.
#[derive(Debug, Clone)]
pub struct NewUnit {
    pub name: String,
    pub payload: ModuleRef,
    pub properties: Properties,
}

/// Instantiate `factory` on behalf of a unit with `requester` properties.
///
/// The requester's common properties replace the new unit's, then each bag
/// of `extra` is applied field by field (its `name` entry names the unit).
/// When both sides carry variable properties, the requester's fill the
/// fields the new unit leaves unset.
pub(crate) fn instantiate(
    factory: &dyn ModuleFactory,
    requester: &Properties,
    extra: &[PropertyBag],
) -> Result<NewUnit, Vec<PropertyError>> {
    let (payload, mut properties) = factory.create();
    let mut errors = Vec::new();

    for (key, value) in requester.common.iter() {
        properties.common.set(key, value.clone());
    }

    let mut name = None;
    for bag in extra {
        let mut bag = bag.clone();
        match bag.remove("name") {
            Some(PropertyValue::Str(value)) => name = Some(value),
            Some(other) => errors.push(PropertyError::TypeMismatch {
                property: "name".to_string(),
                dst: "string",
                src: other.kind(),
            }),
            None => {}
        }
        if let Err(mut errs) = properties.apply(&bag) {
            errors.append(&mut errs);
        }
    }

    if let (Some(dst), Some(src)) = (properties.variable.as_mut(), requester.variable.as_ref()) {
        if let Err(mut errs) = fill_missing(dst, src) {
            errors.append(&mut errs);
        }
    }

    let Some(name) = name else {
        errors.push(PropertyError::MissingProperty {
            property: "name".to_string(),
        });
        return Err(errors);
    };
    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(NewUnit {
        name,
        payload,
        properties,
    })
}
