use std::collections::BTreeMap;

use glam::Vec2;

use crate::types::{EntityId, MapId, NetId, Tick};

/// Field values as they appear in prototypes and property bags.
#[derive(
    Debug,
    Clone,
    PartialEq,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
    serde::Serialize,
    serde::Deserialize,
)]
#[rkyv(derive(Debug))]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f32),
    Text(String),
    Vec2([f32; 2]),
}

impl PropertyValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "a bool",
            Self::Int(_) => "an integer",
            Self::Float(_) => "a number",
            Self::Text(_) => "a string",
            Self::Vec2(_) => "a 2d vector",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Integers widen to floats, so `1` and `1.0` load the same.
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Int(value) => Some(*value as f32),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_vec2(&self) -> Option<Vec2> {
        match self {
            Self::Vec2(value) => Some(Vec2::from_array(*value)),
            _ => None,
        }
    }
}

/// Field name to value, as declared by a prototype component entry.
pub type Fields = BTreeMap<String, PropertyValue>;

#[derive(
    Debug,
    Clone,
    PartialEq,
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
    serde::Serialize,
    serde::Deserialize,
)]
#[rkyv(derive(Debug))]
pub struct Property {
    pub key: String,
    pub value: PropertyValue,
}

/// Key-sorted bag of loosely typed fields, used by content components that
/// do not need a dedicated state type.
#[derive(Debug, Clone, Default, PartialEq, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
#[rkyv(derive(Debug))]
pub struct PropertyBag {
    pub properties: Vec<Property>,
}

impl PropertyBag {
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.properties
            .binary_search_by(|p| p.key.as_str().cmp(key))
            .ok()
            .map(|index| &self.properties[index].value)
    }

    /// Inserts or replaces a value. Returns true when the bag changed.
    pub fn set(&mut self, key: &str, value: PropertyValue) -> bool {
        match self.properties.binary_search_by(|p| p.key.as_str().cmp(key)) {
            Ok(index) => {
                let slot = &mut self.properties[index].value;
                if *slot == value {
                    return false;
                }
                *slot = value;
            }
            Err(index) => self.properties.insert(
                index,
                Property {
                    key: key.to_string(),
                    value,
                },
            ),
        }
        true
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
#[rkyv(derive(Debug))]
pub struct TransformState {
    pub map: MapId,
    pub parent: Option<EntityId>,
    /// Position relative to the parent, or to the map origin without one.
    pub local_position: [f32; 2],
    pub rotation: f32,
}

impl TransformState {
    pub fn local_position(&self) -> Vec2 {
        Vec2::from_array(self.local_position)
    }

    pub fn set_local_position(&mut self, position: Vec2) {
        self.local_position = position.to_array();
    }
}

#[derive(Debug, Clone, Default, PartialEq, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
#[rkyv(derive(Debug))]
pub struct MetaDataState {
    pub name: String,
    pub prototype: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
#[rkyv(derive(Debug))]
pub struct CollidableState {
    pub half_extents: [f32; 2],
    pub hard: bool,
    pub layer: u32,
}

impl CollidableState {
    pub fn half_extents(&self) -> Vec2 {
        Vec2::from_array(self.half_extents)
    }
}

/// Serializable state of one component, tagged by kind.
#[derive(Debug, Clone, PartialEq, rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)]
#[rkyv(derive(Debug))]
pub enum ComponentData {
    Transform(TransformState),
    MetaData(MetaDataState),
    Collidable(CollidableState),
    Properties(PropertyBag),
}

impl ComponentData {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transform(_) => "transform",
            Self::MetaData(_) => "metadata",
            Self::Collidable(_) => "collidable",
            Self::Properties(_) => "properties",
        }
    }

    pub fn as_transform(&self) -> Option<&TransformState> {
        match self {
            Self::Transform(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_transform_mut(&mut self) -> Option<&mut TransformState> {
        match self {
            Self::Transform(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_metadata(&self) -> Option<&MetaDataState> {
        match self {
            Self::MetaData(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_metadata_mut(&mut self) -> Option<&mut MetaDataState> {
        match self {
            Self::MetaData(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_collidable(&self) -> Option<&CollidableState> {
        match self {
            Self::Collidable(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_collidable_mut(&mut self) -> Option<&mut CollidableState> {
        match self {
            Self::Collidable(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_properties(&self) -> Option<&PropertyBag> {
        match self {
            Self::Properties(bag) => Some(bag),
            _ => None,
        }
    }

    pub fn as_properties_mut(&mut self) -> Option<&mut PropertyBag> {
        match self {
            Self::Properties(bag) => Some(bag),
            _ => None,
        }
    }
}

/// A component attached to an entity, with the ticks the differ reads.
#[derive(Debug, Clone)]
pub struct Component {
    pub net_id: NetId,
    pub creation_tick: Tick,
    pub last_modified_tick: Tick,
    pub net_synced: bool,
    pub deleted: bool,
    pub data: ComponentData,
}

impl Component {
    pub fn new(net_id: NetId, net_synced: bool, data: ComponentData, tick: Tick) -> Self {
        Self {
            net_id,
            creation_tick: tick,
            last_modified_tick: tick,
            net_synced,
            deleted: false,
            data,
        }
    }

    /// Never moves the tick backwards.
    pub fn mark_modified(&mut self, tick: Tick) {
        if tick > self.last_modified_tick {
            self.last_modified_tick = tick;
        }
    }

    pub fn mark_deleted(&mut self, tick: Tick) {
        self.deleted = true;
        self.mark_modified(tick);
    }

    /// Marks the state as equal to what the prototype produces.
    pub fn clear_ticks(&mut self) {
        self.last_modified_tick = Tick::ZERO;
    }

    pub fn is_live(&self) -> bool {
        !self.deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_bag_stays_sorted() {
        let mut bag = PropertyBag::default();
        assert!(bag.set("speed", PropertyValue::Float(2.0)));
        assert!(bag.set("armor", PropertyValue::Int(3)));
        assert!(!bag.set("armor", PropertyValue::Int(3)));
        assert!(bag.set("armor", PropertyValue::Int(4)));

        let keys: Vec<_> = bag.properties.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, ["armor", "speed"]);
        assert_eq!(bag.get("armor"), Some(&PropertyValue::Int(4)));
        assert_eq!(bag.get("missing"), None);
    }

    #[test]
    fn modified_tick_is_monotonic() {
        let data = ComponentData::Properties(PropertyBag::default());
        let mut component = Component::new(NetId::FIRST_CUSTOM, true, data, Tick(5));
        component.mark_modified(Tick(9));
        component.mark_modified(Tick(7));
        assert_eq!(component.last_modified_tick, Tick(9));

        component.clear_ticks();
        assert_eq!(component.last_modified_tick, Tick::ZERO);
        assert_eq!(component.creation_tick, Tick(5));
    }

    #[test]
    fn untagged_values_parse_from_json() {
        let fields: Fields =
            serde_json::from_str(r#"{ "hard": true, "layer": 2, "speed": 1.5, "size": [1, 2] }"#)
                .unwrap();
        assert_eq!(fields["hard"].as_bool(), Some(true));
        assert_eq!(fields["layer"].as_int(), Some(2));
        assert_eq!(fields["layer"].as_float(), Some(2.0));
        assert_eq!(fields["speed"].as_float(), Some(1.5));
        assert_eq!(fields["size"].as_vec2(), Some(Vec2::new(1.0, 2.0)));
    }
}
