//! Mutable parse tree for a post body.
//!
//! Nodes live in an arena (`ego_tree`, via `scraper`); removal detaches a
//! node from its parent by id and serialization only walks attached nodes.

use std::sync::LazyLock;

use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static IMAGE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());

pub struct Document {
    html: Html,
}

/// An element found in the tree along with the attribute we care about.
#[derive(Debug, Clone)]
pub struct Found {
    pub id: NodeId,
    pub attr: Option<String>,
}

impl Document {
    /// Best-effort parse; malformed markup never fails.
    pub fn parse(body: &str) -> Self {
        Document {
            html: Html::parse_fragment(body),
        }
    }

    /// Every attached `<a>` in document order with its `href`.
    pub fn anchors(&self) -> Vec<Found> {
        self.collect(&ANCHOR, "href")
    }

    /// Every attached `<img>` in document order with its `src`.
    pub fn images(&self) -> Vec<Found> {
        self.collect(&IMAGE, "src")
    }

    fn collect(&self, selector: &Selector, attr: &str) -> Vec<Found> {
        // `Html::select` walks the whole arena, detached nodes included.
        self.html
            .root_element()
            .select(selector)
            .map(|el| Found {
                id: el.id(),
                attr: el.value().attr(attr).map(str::to_string),
            })
            .collect()
    }

    /// Current parent of `id` if it is a `<div>`. A detached node has none.
    pub fn parent_div(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.html.tree.get(id)?.parent()?;
        let el = ElementRef::wrap(parent)?;
        (el.value().name() == "div").then(|| parent.id())
    }

    /// Like [`parent_div`](Self::parent_div) but only for `align="center"`.
    pub fn centered_parent(&self, id: NodeId) -> Option<NodeId> {
        let div = self.parent_div(id)?;
        let el = ElementRef::wrap(self.html.tree.get(div)?)?;
        (el.value().attr("align") == Some("center")).then_some(div)
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        self.html
            .tree
            .get(id)
            .and_then(ElementRef::wrap)
            .map(|el| el.html())
            .unwrap_or_default()
    }

    /// Detach `id` and its subtree. Removing an already detached node is a
    /// no-op.
    pub fn remove(&mut self, id: NodeId) {
        if let Some(mut node) = self.html.tree.get_mut(id) {
            node.detach();
        }
    }

    /// Serialize what is still attached, without the fragment wrapper.
    pub fn to_html(&self) -> String {
        self.html.root_element().inner_html()
    }
}
