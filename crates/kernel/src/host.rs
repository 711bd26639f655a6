//! Collaborator interfaces the kernel consumes from its host.

use serde_json::Value;

use crate::budget::CpuBudget;

/// Outcome of invoking a method on an actor through the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Ok,
    /// The identifier no longer resolves to a live object.
    Ceased,
    Failed(String),
}

/// Resolves an identifier to a live actor and calls a method on it.
pub trait ActorBridge {
    fn invoke(&mut self, id: &str, collection: Option<&str>, method: &str) -> Invocation;
}

/// Enumerates externally owned work items by collection name.
pub trait CollectionSource {
    /// `None` when the collection itself no longer exists.
    fn collection(&self, name: &str) -> Option<Vec<Value>>;
}

/// Everything the kernel needs from its host in one object.
pub trait Host: CpuBudget + ActorBridge + CollectionSource {}

impl<T: CpuBudget + ActorBridge + CollectionSource + ?Sized> Host for T {}

/// Read the identifier field of a work item. Numbers are stringified;
/// anything else means the item cannot be tracked.
pub fn item_id(item: &Value, id_key: &str) -> Option<String> {
    match item.get(id_key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
