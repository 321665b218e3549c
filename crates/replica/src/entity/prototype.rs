use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::component::{Fields, PropertyValue};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub component: String,
    #[serde(default)]
    pub fields: Fields,
}

/// Named template: the default component set of an entity and the field
/// values each component loads. Both peers must resolve the same prototype
/// identically, since components still equal to it are never sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prototype {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
}

impl Prototype {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_component<K, I>(mut self, component: &str, fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, PropertyValue)>,
    {
        self.components.push(ComponentSpec {
            component: component.to_string(),
            fields: fields
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        });
        self
    }
}

/// Read-only access to prototypes during entity creation.
pub trait PrototypeResolver {
    fn resolve(&self, id: &str) -> Option<&Prototype>;
}

#[derive(Debug, Clone, Default)]
pub struct PrototypeSet {
    prototypes: HashMap<String, Prototype>,
}

impl PrototypeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON array of prototypes. Later entries replace earlier ones
    /// with the same id.
    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        let prototypes: Vec<Prototype> = serde_json::from_str(source)?;
        let mut set = Self::new();
        for prototype in prototypes {
            set.insert(prototype);
        }
        Ok(set)
    }

    pub fn insert(&mut self, prototype: Prototype) -> Option<Prototype> {
        self.prototypes.insert(prototype.id.clone(), prototype)
    }

    pub fn with(mut self, prototype: Prototype) -> Self {
        self.insert(prototype);
        self
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.prototypes.keys().map(String::as_str)
    }
}

impl PrototypeResolver for PrototypeSet {
    fn resolve(&self, id: &str) -> Option<&Prototype> {
        self.prototypes.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prototypes_parse_from_json() {
        let set = PrototypeSet::from_json(
            r#"[
                {
                    "id": "crate",
                    "name": "Wooden crate",
                    "components": [
                        { "component": "collidable", "fields": { "half_extents": [0.5, 0.5], "hard": true } },
                        { "component": "loot" }
                    ]
                },
                { "id": "marker" }
            ]"#,
        )
        .unwrap();

        assert_eq!(set.len(), 2);
        let crate_proto = set.resolve("crate").unwrap();
        assert_eq!(crate_proto.name.as_deref(), Some("Wooden crate"));
        assert_eq!(crate_proto.components.len(), 2);
        assert!(crate_proto.components[1].fields.is_empty());
        assert!(set.resolve("marker").unwrap().components.is_empty());
        assert!(set.resolve("barrel").is_none());
    }

    #[test]
    fn builder_collects_fields() {
        let proto = Prototype::new("rock")
            .with_component("transform", [("rotation", PropertyValue::Float(0.5))]);
        assert_eq!(
            proto.components[0].fields["rotation"],
            PropertyValue::Float(0.5)
        );
    }
}
