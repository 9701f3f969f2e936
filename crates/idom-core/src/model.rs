//! The in-memory shape of what an element renders.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::element::{Element, ElementRef};
use crate::error::VdomError;
use crate::events::{EventHandler, HandlerOutput};

/// One node of rendered output.
#[derive(Clone)]
pub enum Node {
    /// A nested element, rendered separately and referenced by id.
    Element(ElementRef),
    Container(Container),
    Text(String),
    /// Loose JSON in VDOM shape; normalized before the layout loads it.
    Raw(Value),
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Element(element) => fmt::Debug::fmt(&**element, f),
            Node::Container(container) => fmt::Debug::fmt(container, f),
            Node::Text(text) => fmt::Debug::fmt(text, f),
            Node::Raw(value) => write!(f, "Raw({value})"),
        }
    }
}

impl From<ElementRef> for Node {
    fn from(element: ElementRef) -> Self {
        Node::Element(element)
    }
}

impl<E: Element> From<Rc<E>> for Node {
    fn from(element: Rc<E>) -> Self {
        Node::Element(element)
    }
}

impl From<Container> for Node {
    fn from(container: Container) -> Self {
        Node::Container(container)
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Node::Text(text)
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::Text(text.to_owned())
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::Raw(value)
    }
}

macro_rules! text_node_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Node {
                fn from(value: $ty) -> Self {
                    Node::Text(value.to_string())
                }
            }
        )*
    };
}

text_node_from!(bool, char, i32, i64, u32, u64, usize, f32, f64);

#[derive(Clone, Debug)]
pub enum Attribute {
    Value(Value),
    /// A callable attribute; loaded as an event handler under the attribute's name.
    Handler(EventHandler),
}

/// A tagged node with attributes, children and event handlers.
#[derive(Clone, Debug, Default)]
pub struct Container {
    tag: String,
    key: Option<String>,
    attributes: IndexMap<String, Attribute>,
    children: Vec<Node>,
    event_handlers: IndexMap<String, EventHandler>,
}

impl Container {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes
            .insert(name.into(), Attribute::Value(value.into()));
        self
    }

    pub fn attrs<K, V>(mut self, attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.attributes.extend(
            attributes
                .into_iter()
                .map(|(name, value)| (name.into(), Attribute::Value(value.into()))),
        );
        self
    }

    pub fn attr_handler(mut self, name: impl Into<String>, handler: EventHandler) -> Self {
        self.attributes
            .insert(name.into(), Attribute::Handler(handler));
        self
    }

    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children_from<N: Into<Node>>(mut self, children: impl IntoIterator<Item = N>) -> Self {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    /// Registers `handler` for `event`, merging with any handler already there.
    pub fn handler(mut self, event: impl Into<String>, handler: EventHandler) -> Self {
        let event = event.into();
        let handler = match self.event_handlers.get(&event) {
            Some(existing) if *existing != handler => EventHandler::merged([existing, &handler]),
            _ => handler,
        };
        self.event_handlers.insert(event, handler);
        self
    }

    pub fn on<F, R>(self, event: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&[Value]) -> R + 'static,
        R: HandlerOutput + 'static,
    {
        self.handler(event, EventHandler::from_fn(callback))
    }

    pub fn on_async<F, Fut, R>(self, event: impl Into<String>, callback: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + 'static,
        Fut: Future<Output = R> + 'static,
        R: HandlerOutput + 'static,
    {
        self.handler(event, EventHandler::from_async(callback))
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn attributes(&self) -> &IndexMap<String, Attribute> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Node> {
        &mut self.children
    }

    pub fn event_handlers(&self) -> &IndexMap<String, EventHandler> {
        &self.event_handlers
    }

    /// Event handlers to load for this node: the explicit ones plus any callable
    /// attributes. A name present in both gets a handler invoking both.
    pub(crate) fn collect_handlers(&self) -> IndexMap<String, EventHandler> {
        let mut handlers = self.event_handlers.clone();
        for (name, attribute) in &self.attributes {
            let Attribute::Handler(handler) = attribute else {
                continue;
            };
            match handlers.get(name) {
                Some(existing) if existing == handler => {}
                Some(existing) => {
                    let merged = EventHandler::merged([existing, handler]);
                    handlers.insert(name.clone(), merged);
                }
                None => {
                    handlers.insert(name.clone(), handler.clone());
                }
            }
        }
        handlers
    }

    pub(crate) fn value_attributes(&self) -> Map<String, Value> {
        self.attributes
            .iter()
            .filter_map(|(name, attribute)| match attribute {
                Attribute::Value(value) => Some((name.clone(), value.clone())),
                Attribute::Handler(_) => None,
            })
            .collect()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Reads a VDOM-shaped JSON object (`tagName`, `key`, `attributes`, `children`,
/// plus a legacy top-level `style`) into a container with unnormalized children.
impl TryFrom<Value> for Container {
    type Error = VdomError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let mut object = match value {
            Value::Object(object) => object,
            other => {
                return Err(VdomError::NotAnObject {
                    found: json_kind(&other),
                })
            }
        };

        let tag = match object.remove("tagName") {
            Some(Value::String(tag)) => tag,
            _ => return Err(VdomError::MissingTagName),
        };
        let mut container = Container::new(tag);

        match object.remove("key") {
            None | Some(Value::Null) => {}
            Some(Value::String(key)) => container.key = Some(key),
            Some(_) => {
                return Err(VdomError::InvalidField {
                    field: "key",
                    expected: "a string",
                })
            }
        }

        match object.remove("attributes") {
            None | Some(Value::Null) => {}
            Some(Value::Object(attributes)) => {
                container.attributes = attributes
                    .into_iter()
                    .map(|(name, value)| (name, Attribute::Value(value)))
                    .collect();
            }
            Some(_) => {
                return Err(VdomError::InvalidField {
                    field: "attributes",
                    expected: "an object",
                })
            }
        }

        if let Some(style) = object.remove("style") {
            container
                .attributes
                .insert("style".to_owned(), Attribute::Value(style));
        }

        match object.remove("children") {
            None | Some(Value::Null) => {}
            Some(Value::Array(children)) => {
                container.children = children.into_iter().map(Node::Raw).collect();
            }
            Some(child) => container.children.push(Node::Raw(child)),
        }

        if object.contains_key("eventHandlers") {
            return Err(VdomError::InvalidField {
                field: "eventHandlers",
                expected: "attached with `EventHandler`s; raw JSON cannot carry callbacks",
            });
        }
        for ignored in object.keys() {
            log::debug!("ignoring unknown VDOM field `{ignored}` on <{}>", container.tag);
        }

        Ok(container)
    }
}

fn push_raw(value: Value, out: &mut Vec<Node>) -> Result<(), VdomError> {
    match value {
        Value::Null => {}
        Value::String(text) => out.push(Node::Text(text)),
        Value::Array(items) => {
            for item in items {
                push_raw(item, out)?;
            }
        }
        value @ Value::Object(_) => out.push(Node::Container(Container::try_from(value)?)),
        other => out.push(Node::Text(other.to_string())),
    }
    Ok(())
}

fn normalize_children(children: &mut Vec<Node>) -> Result<(), VdomError> {
    if !children.iter().any(|child| matches!(child, Node::Raw(_))) {
        return Ok(());
    }
    let mut normalized = Vec::with_capacity(children.len());
    for child in children.drain(..) {
        match child {
            Node::Raw(value) => push_raw(value, &mut normalized)?,
            other => normalized.push(other),
        }
    }
    *children = normalized;
    Ok(())
}

/// Turns any rendered node into the container that becomes an element's model.
/// A bare element or primitive is wrapped in a `div`.
pub(crate) fn into_root_container(node: Node) -> Result<Container, VdomError> {
    match node {
        Node::Container(container) => Ok(container),
        Node::Raw(value @ Value::Object(_)) => Container::try_from(value),
        other => Ok(Container::new("div").child(other)),
    }
}

/// Breadth-first pass over `root`: normalizes raw children in place and returns
/// the nested elements in the order they were reached.
pub(crate) fn prepare_tree(root: &mut Container) -> Result<Vec<ElementRef>, VdomError> {
    let mut elements = Vec::new();
    let mut to_visit: VecDeque<&mut Container> = VecDeque::from([root]);
    while let Some(container) = to_visit.pop_front() {
        normalize_children(&mut container.children)?;
        for child in container.children.iter_mut() {
            match child {
                Node::Container(nested) => to_visit.push_back(nested),
                Node::Element(element) => elements.push(element.clone()),
                Node::Text(_) | Node::Raw(_) => {}
            }
        }
    }
    Ok(elements)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn raw_json_becomes_a_container() {
        let container = Container::try_from(json!({
            "tagName": "div",
            "key": "k",
            "attributes": {"id": "main"},
            "style": {"color": "red"},
            "children": ["hello", {"tagName": "span"}],
        }))
        .unwrap();
        assert_eq!(container.tag(), "div");
        assert_eq!(container.key(), Some("k"));
        assert!(matches!(container.attribute("style"), Some(Attribute::Value(v)) if v == &json!({"color": "red"})));
        assert_eq!(container.children().len(), 2);
    }

    #[test]
    fn raw_json_errors() {
        assert_eq!(
            Container::try_from(json!("div")).unwrap_err(),
            VdomError::NotAnObject { found: "a string" }
        );
        assert_eq!(
            Container::try_from(json!({"children": []})).unwrap_err(),
            VdomError::MissingTagName
        );
        assert!(matches!(
            Container::try_from(json!({"tagName": "a", "key": 3})),
            Err(VdomError::InvalidField { field: "key", .. })
        ));
    }

    #[test]
    fn prepare_flattens_and_normalizes_nested_raw_nodes() {
        let mut root = Container::new("div")
            .child(json!([["a", 1], null, {"tagName": "p", "children": "inner"}]))
            .child(Container::new("section").child(true));
        let elements = prepare_tree(&mut root).unwrap();
        assert!(elements.is_empty());
        let kinds: Vec<_> = root
            .children()
            .iter()
            .map(|child| match child {
                Node::Text(text) => text.clone(),
                Node::Container(c) => format!("<{}>", c.tag()),
                other => panic!("unexpected child {other:?}"),
            })
            .collect();
        assert_eq!(kinds, ["a", "1", "<p>", "<section>"]);
        let Node::Container(p) = &root.children()[2] else {
            unreachable!()
        };
        assert!(matches!(&p.children()[0], Node::Text(text) if text == "inner"));
    }

    #[test]
    fn callable_attributes_merge_with_event_handlers() {
        let explicit = EventHandler::from_fn(|_| ());
        let container = Container::new("button")
            .handler("onClick", explicit.clone())
            .attr_handler("onClick", EventHandler::from_fn(|_| ()))
            .attr_handler("onHover", explicit.clone())
            .attr("title", "x");
        let handlers = container.collect_handlers();
        assert_eq!(handlers.len(), 2);
        assert_ne!(handlers["onClick"], explicit);
        assert_eq!(handlers["onClick"].len(), 2);
        assert_eq!(handlers["onHover"], explicit);
        assert_eq!(container.value_attributes(), json!({"title": "x"}).as_object().cloned().unwrap());
    }
}
