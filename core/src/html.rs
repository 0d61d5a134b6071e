use scraper::{Html, Node, Selector};

/// Subtrees whose text never reaches the index.
const HIDDEN: &[&str] = &["script", "style"];

/// Elements that start a new run of text; everything else is inline.
const BLOCKS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "br", "dd", "div", "dl", "dt",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "head",
    "header", "hr", "html", "li", "main", "nav", "ol", "option", "p", "pre", "section",
    "table", "td", "th", "title", "tr", "ul",
];

/// Parsed HTML document exposing its visible text and per-tag excerpts.
pub struct HtmlView {
    doc: Html,
}

impl HtmlView {
    pub fn parse(markup: &str) -> Self {
        Self { doc: Html::parse_document(markup) }
    }

    /// All visible text.
    ///
    /// Inline markup is transparent, so `Inter<em>national</em>` stays one word. Text in
    /// different block elements, or on either side of a `<br>`, is separated by a space.
    /// Runs of whitespace collapse to one space.
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut last_block = None;
        let mut boundary = false;
        for node in self.doc.tree.root().descendants() {
            match node.value() {
                Node::Element(e) if BLOCKS.contains(&e.name()) => boundary = true,
                Node::Text(text) => {
                    let hidden = node
                        .ancestors()
                        .any(|a| matches!(a.value(), Node::Element(e) if HIDDEN.contains(&e.name())));
                    if hidden {
                        continue;
                    }
                    let block = node
                        .ancestors()
                        .find(|a| matches!(a.value(), Node::Element(e) if BLOCKS.contains(&e.name())))
                        .map(|a| a.id());
                    if boundary || block != last_block {
                        out.push(' ');
                    }
                    out.push_str(text);
                    last_block = block;
                    boundary = false;
                }
                _ => {}
            }
        }
        collapse_whitespace(&out)
    }

    /// Text of the first element named `tag`, if the document has one.
    pub fn tag_text(&self, tag: &str) -> Option<String> {
        let selector = Selector::parse(tag).ok()?;
        let element = self.doc.select(&selector).next()?;
        Some(collapse_whitespace(&element.text().collect::<String>()))
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
