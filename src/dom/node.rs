//! Element-tree abstraction walked by the range scanner.
//!
//! `DomElement` is the one "traverse children" operation the scanner needs:
//! light children, the attached shadow root's children, and for frame
//! elements the embedded document, or a `BlockedFrame` when that document
//! cannot be reached from this context.
//!
//! `VirtualElement` is an in-memory tree with interior mutability so a test
//! (or a non-browser driver) can hydrate it between scan passes.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// A sub-document that is present in the tree but not inspectable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedFrame {
    pub src: Option<String>,
    pub reason: String,
    #[serde(rename = "sandboxAttr")]
    pub sandbox: Option<String>,
    #[serde(rename = "referrerPolicyAttr")]
    pub referrer_policy: Option<String>,
}

impl BlockedFrame {
    /// Fill in the informational attributes from the frame element itself.
    pub fn from_element<E: DomElement>(frame: &E, reason: impl Into<String>) -> Self {
        Self {
            src: frame.attribute("src").filter(|s| !s.is_empty()),
            reason: reason.into(),
            sandbox: frame.attribute("sandbox").filter(|s| !s.is_empty()),
            referrer_policy: frame.attribute("referrerpolicy").filter(|s| !s.is_empty()),
        }
    }
}

pub enum FrameAccess<E> {
    Accessible { url: String, root: E },
    Blocked(BlockedFrame),
}

pub trait DomElement: Clone {
    /// Lowercase tag name.
    fn tag_name(&self) -> String;

    fn attribute(&self, name: &str) -> Option<String>;

    fn attribute_names(&self) -> Vec<String>;

    fn children(&self) -> Vec<Self>;

    /// Children of an attached shadow root, empty when there is none.
    fn shadow_children(&self) -> Vec<Self>;

    /// `None` for elements that do not embed a document.
    fn frame(&self) -> Option<FrameAccess<Self>>;

    fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    fn element_id(&self) -> Option<String> {
        self.attribute("id").filter(|s| !s.is_empty())
    }

    fn accessible_name(&self) -> Option<String> {
        self.attribute("aria-label").filter(|s| !s.trim().is_empty())
    }
}

// =============================================================================
// VirtualElement
// =============================================================================

enum VirtualFrame {
    Document { url: String, root: VirtualElement },
    Blocked { reason: String },
}

struct VirtualNode {
    tag: String,
    attributes: RefCell<Vec<(String, String)>>,
    children: RefCell<Vec<VirtualElement>>,
    shadow: RefCell<Option<Vec<VirtualElement>>>,
    frame: RefCell<Option<VirtualFrame>>,
}

/// Shared handle to an in-memory element. Clones alias the same node.
#[derive(Clone)]
pub struct VirtualElement(Rc<VirtualNode>);

impl VirtualElement {
    pub fn new(tag: &str) -> Self {
        Self(Rc::new(VirtualNode {
            tag: tag.to_ascii_lowercase(),
            attributes: RefCell::new(Vec::new()),
            children: RefCell::new(Vec::new()),
            shadow: RefCell::new(None),
            frame: RefCell::new(None),
        }))
    }

    pub fn attr(self, name: &str, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn child(self, child: VirtualElement) -> Self {
        self.append_child(child);
        self
    }

    /// Attach (or extend) a shadow root.
    pub fn shadow_child(self, child: VirtualElement) -> Self {
        self.0.shadow.borrow_mut().get_or_insert_with(Vec::new).push(child);
        self
    }

    pub fn frame_document(self, url: &str, root: VirtualElement) -> Self {
        *self.0.frame.borrow_mut() = Some(VirtualFrame::Document {
            url: url.to_string(),
            root,
        });
        self
    }

    pub fn blocked_frame(self, reason: &str) -> Self {
        *self.0.frame.borrow_mut() = Some(VirtualFrame::Blocked {
            reason: reason.to_string(),
        });
        self
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        let mut attrs = self.0.attributes.borrow_mut();
        match attrs.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => attrs.push((name.to_string(), value.to_string())),
        }
    }

    pub fn append_child(&self, child: VirtualElement) {
        self.0.children.borrow_mut().push(child);
    }

    pub fn clear_children(&self) {
        self.0.children.borrow_mut().clear();
    }
}

impl DomElement for VirtualElement {
    fn tag_name(&self) -> String {
        self.0.tag.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0
            .attributes
            .borrow()
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    fn attribute_names(&self) -> Vec<String> {
        self.0.attributes.borrow().iter().map(|(n, _)| n.clone()).collect()
    }

    fn children(&self) -> Vec<Self> {
        self.0.children.borrow().clone()
    }

    fn shadow_children(&self) -> Vec<Self> {
        self.0.shadow.borrow().clone().unwrap_or_default()
    }

    fn frame(&self) -> Option<FrameAccess<Self>> {
        match &*self.0.frame.borrow() {
            None => None,
            Some(VirtualFrame::Document { url, root }) => Some(FrameAccess::Accessible {
                url: url.clone(),
                root: root.clone(),
            }),
            Some(VirtualFrame::Blocked { reason }) => {
                Some(FrameAccess::Blocked(BlockedFrame::from_element(self, reason.as_str())))
            }
        }
    }
}
