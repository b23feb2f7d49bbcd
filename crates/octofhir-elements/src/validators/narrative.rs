//! Narrative XHTML: the HTML 4.0 subset permitted by chapters 7-11 (except
//! section 4 of chapter 9) and 15.

use crate::context::ValidationContext;
use crate::record::CompositeRecord;

pub const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "b", "big", "blockquote", "br", "caption", "cite", "code", "col",
    "colgroup", "dd", "dfn", "div", "dl", "dt", "em", "h1", "h2", "h3", "h4", "h5", "h6", "hr",
    "i", "img", "li", "ol", "p", "pre", "q", "samp", "small", "span", "strong", "table", "tbody",
    "td", "tfoot", "th", "thead", "tr", "tt", "ul", "var",
];

pub const ALLOWED_ATTRIBUTES: &[&str] = &[
    "abbr", "accesskey", "align", "alt", "axis", "bgcolor", "border", "cellhalign",
    "cellpadding", "cellspacing", "cellvalign", "char", "charoff", "charset", "cite", "class",
    "colspan", "compact", "coords", "dir", "frame", "headers", "height", "href", "hreflang",
    "hspace", "id", "lang", "longdesc", "name", "nowrap", "rel", "rev", "rowspan", "rules",
    "scope", "shape", "span", "src", "start", "style", "summary", "tabindex", "title", "type",
    "valign", "value", "vspace", "width",
];

/// Checks a narrative `div`. Returns every problem found.
pub(crate) fn check_xhtml(div: &str) -> Vec<String> {
    let doc = match roxmltree::Document::parse(div) {
        Ok(doc) => doc,
        Err(e) => return vec![format!("div is not well-formed XHTML: {e}")],
    };

    let mut problems = Vec::new();
    for node in doc.descendants().filter(roxmltree::Node::is_element) {
        let tag = node.tag_name().name();
        if !ALLOWED_TAGS.contains(&tag) {
            problems.push(format!("The tag {tag} is not allowed in narrative"));
        }
        for attr in node.attributes() {
            if !ALLOWED_ATTRIBUTES.contains(&attr.name()) {
                problems.push(format!(
                    "The attribute {} is not allowed in narrative",
                    attr.name()
                ));
            }
        }
    }

    let has_text = doc
        .descendants()
        .filter(roxmltree::Node::is_text)
        .filter_map(|n| n.text())
        .any(|t| !t.trim().is_empty());
    if !has_text {
        problems.push("narrative content must not be an empty string".to_string());
    }
    problems
}

pub(super) fn validate_narrative(record: &CompositeRecord, ctx: &mut ValidationContext<'_>) {
    if let Some(div) = record.str("div") {
        for problem in check_xhtml(div) {
            ctx.field_error("div", problem);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::coerce_as;
    use serde_json::json;

    const XHTML: &str = "http://www.w3.org/1999/xhtml";

    #[test]
    fn accepts_allow_listed_markup() {
        let div = format!(r#"<div xmlns="{XHTML}"><p class="x">Peter <b>James</b></p></div>"#);
        assert!(check_xhtml(&div).is_empty());
    }

    #[test]
    fn rejects_foreign_tags_and_attributes() {
        let problems = check_xhtml(r#"<div><script onclick="x()">alert(1)</script></div>"#);
        assert!(problems.iter().any(|p| p.contains("tag script")));
        assert!(problems.iter().any(|p| p.contains("attribute onclick")));
    }

    #[test]
    fn rejects_blank_and_malformed_content() {
        assert_eq!(
            check_xhtml("<div>   </div>"),
            ["narrative content must not be an empty string"]
        );
        assert!(check_xhtml("<div><p>open</div>")[0].starts_with("div is not well-formed"));
    }

    #[test]
    fn narrative_binds_status_and_checks_div() {
        let ok = coerce_as(
            "Narrative",
            json!({"status": "generated", "div": "<div>Peter</div>"}),
        )
        .unwrap();
        assert_eq!(ok.checks[0].valueset, "narrative_status");

        let errs = coerce_as("Narrative", json!({"status": "generated", "div": "<div><blink>x</blink></div>"}))
            .unwrap_err();
        assert_eq!(errs.issues[0].path, "Narrative.div");
    }
}
