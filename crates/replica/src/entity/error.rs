use crate::types::{EntityId, NetId};

#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    #[error("unknown component `{0}`")]
    UnknownName(String),
    #[error("unknown component net id {0}")]
    UnknownNetId(NetId),
    #[error("component {net_id} registered twice (`{name}`)")]
    DuplicateRegistration { name: String, net_id: NetId },
    #[error("component `{component}` has no field `{field}`")]
    UnknownField { component: String, field: String },
    #[error("field `{field}` of `{component}` expects {expected}")]
    FieldType {
        component: String,
        field: String,
        expected: &'static str,
    },
    #[error("component {0} is mandatory and cannot be removed")]
    Mandatory(NetId),
    #[error("component {net_id} is already attached to {entity}")]
    AlreadyAttached { entity: EntityId, net_id: NetId },
    #[error("`{component}` hook failed: {reason}")]
    Hook { component: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    #[error("entity id {0} is already in use")]
    DuplicateId(EntityId),
    #[error("unknown prototype `{0}`")]
    UnknownPrototype(String),
    #[error("failed to create entity {id} from {prototype:?}")]
    Creation {
        id: EntityId,
        prototype: Option<String>,
        #[source]
        source: ComponentError,
    },
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
    #[error(transparent)]
    Component(#[from] ComponentError),
}
