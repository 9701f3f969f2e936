//! Serialized models: the JSON a client receives for each rendered element.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::VdomError;
use crate::events::EventHandler;
use crate::ids::ElementId;
use crate::model::{Container, Node};

/// Shorthand for [`Container::new`].
pub fn vdom(tag: impl Into<String>) -> Container {
    Container::new(tag)
}

/// The wire form of one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VdomJson {
    pub tag_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChildItem>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
    /// Event name to handler descriptor.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub event_handlers: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ChildItem {
    Obj(VdomJson),
    Ref(ElementId),
    Str(String),
}

/// Converts a prepared container into its wire form. Every event handler found
/// is passed to `register`, which returns the descriptor to publish.
pub(crate) fn load(
    container: &Container,
    register: &mut dyn FnMut(&EventHandler) -> String,
) -> VdomJson {
    let event_handlers = container
        .collect_handlers()
        .iter()
        .map(|(event, handler)| (event.clone(), register(handler)))
        .collect();
    let children = container
        .children()
        .iter()
        .map(|child| match child {
            Node::Container(nested) => ChildItem::Obj(load(nested, register)),
            Node::Element(element) => ChildItem::Ref(element.id()),
            Node::Text(text) => ChildItem::Str(text.clone()),
            Node::Raw(Value::String(text)) => ChildItem::Str(text.clone()),
            Node::Raw(value) => ChildItem::Str(value.to_string()),
        })
        .collect();
    VdomJson {
        tag_name: container.tag().to_owned(),
        key: container.key().map(str::to_owned),
        children,
        attributes: container.value_attributes(),
        event_handlers,
    }
}

/// Checks that `value` is a well-formed serialized model, recursing into `obj`
/// children.
pub fn validate_vdom(value: &Value) -> Result<(), VdomError> {
    validate_at(value, "$")
}

fn invalid(path: &str, reason: impl Into<String>) -> VdomError {
    VdomError::Invalid {
        path: path.to_owned(),
        reason: reason.into(),
    }
}

fn validate_at(value: &Value, path: &str) -> Result<(), VdomError> {
    let object = value
        .as_object()
        .ok_or_else(|| invalid(path, "expected an object"))?;
    if !object.get("tagName").is_some_and(Value::is_string) {
        return Err(invalid(path, "`tagName` must be a string"));
    }
    if let Some(key) = object.get("key") {
        if !key.is_string() {
            return Err(invalid(path, "`key` must be a string"));
        }
    }
    if let Some(attributes) = object.get("attributes") {
        if !attributes.is_object() {
            return Err(invalid(path, "`attributes` must be an object"));
        }
    }
    if let Some(handlers) = object.get("eventHandlers") {
        let handlers = handlers
            .as_object()
            .ok_or_else(|| invalid(path, "`eventHandlers` must be an object"))?;
        if let Some((event, _)) = handlers.iter().find(|(_, target)| !target.is_string()) {
            return Err(invalid(path, format!("handler for `{event}` must be a string")));
        }
    }
    if let Some(children) = object.get("children") {
        let children = children
            .as_array()
            .ok_or_else(|| invalid(path, "`children` must be an array"))?;
        for (index, child) in children.iter().enumerate() {
            let child_path = format!("{path}.children[{index}]");
            let kind = child.get("type").and_then(Value::as_str);
            let data = child.get("data");
            match (kind, data) {
                (Some("obj"), Some(data)) => validate_at(data, &format!("{child_path}.data"))?,
                (Some("ref"), Some(Value::String(id))) => {
                    if id.parse::<ElementId>().is_err() {
                        return Err(invalid(&child_path, "`ref` data must be an element id"));
                    }
                }
                (Some("str"), Some(Value::String(_))) => {}
                _ => {
                    return Err(invalid(
                        &child_path,
                        "expected {\"type\": \"obj\" | \"ref\" | \"str\", \"data\": ...}",
                    ))
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::element::FnElement;

    #[test]
    fn loads_children_in_wire_form() {
        let child = FnElement::new("Child", || async { Ok::<_, anyhow::Error>("child") });
        let child_id = crate::Element::id(&*child);
        let container = vdom("div")
            .with_key("root")
            .attr("id", "main")
            .child(child)
            .child("text")
            .child(vdom("span").on("onClick", |_| ()));

        let mut registered = Vec::new();
        let model = load(&container, &mut |handler| {
            registered.push(handler.clone());
            handler.descriptor()
        });
        assert_eq!(registered.len(), 1);

        let wire = serde_json::to_value(&model).unwrap();
        assert_eq!(
            wire,
            json!({
                "tagName": "div",
                "key": "root",
                "children": [
                    {"type": "ref", "data": child_id.to_string()},
                    {"type": "str", "data": "text"},
                    {"type": "obj", "data": {
                        "tagName": "span",
                        "eventHandlers": {"onClick": registered[0].descriptor()},
                    }},
                ],
                "attributes": {"id": "main"},
            })
        );
        validate_vdom(&wire).unwrap();
        let back: VdomJson = serde_json::from_value(wire).unwrap();
        assert_eq!(back, model);
    }

    #[test]
    fn validation_reports_the_offending_path() {
        let err = validate_vdom(&json!({
            "tagName": "div",
            "children": [{"type": "str", "data": "ok"}, {"type": "obj", "data": {"tagName": 1}}],
        }))
        .unwrap_err();
        assert_eq!(
            err,
            VdomError::Invalid {
                path: "$.children[1].data".into(),
                reason: "`tagName` must be a string".into(),
            }
        );
        assert!(validate_vdom(&json!({"tagName": "a", "children": [{"type": "ref", "data": "zz"}]})).is_err());
    }
}
