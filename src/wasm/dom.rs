use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlCollection, HtmlIFrameElement};

use crate::dom::{BlockedFrame, DomElement, FrameAccess};

fn collect(collection: HtmlCollection) -> Vec<Element> {
    (0..collection.length()).filter_map(|i| collection.item(i)).collect()
}

impl DomElement for Element {
    fn tag_name(&self) -> String {
        Element::tag_name(self).to_ascii_lowercase()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.get_attribute(name)
    }

    fn attribute_names(&self) -> Vec<String> {
        self.get_attribute_names().iter().filter_map(|n| n.as_string()).collect()
    }

    fn children(&self) -> Vec<Self> {
        collect(Element::children(self))
    }

    /// Open shadow roots only; closed roots are invisible from script.
    fn shadow_children(&self) -> Vec<Self> {
        match self.shadow_root() {
            Some(root) => collect(root.children()),
            None => Vec::new(),
        }
    }

    fn frame(&self) -> Option<FrameAccess<Self>> {
        let iframe = self.dyn_ref::<HtmlIFrameElement>()?;
        // cross-origin documents come back as null rather than throwing
        let Some(doc) = iframe.content_document() else {
            return Some(FrameAccess::Blocked(BlockedFrame::from_element(
                self,
                "contentDocument not accessible (cross-origin or not loaded)",
            )));
        };
        match doc.document_element() {
            Some(root) => {
                let url = doc.url().ok().unwrap_or_else(|| iframe.src());
                Some(FrameAccess::Accessible { url, root })
            }
            None => Some(FrameAccess::Blocked(BlockedFrame::from_element(
                self,
                "frame document has no root element",
            ))),
        }
    }
}
