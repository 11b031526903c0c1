//! Minimal XML reader for AWS Query and REST-XML responses.
//!
//! Builds an element tree, ignoring attributes, namespaces declarations,
//! processing instructions and comments. Only what the control-plane
//! responses use is supported: nested elements, text, CDATA and the
//! predefined and numeric entities.

/// Deepest element nesting accepted.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed XML at byte {position}: {message}")]
pub struct XmlError {
    pub position: usize,
    pub message: String,
}

impl Element {
    /// First direct child with this local name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Follow a chain of child names.
    pub fn path(&self, names: &[&str]) -> Option<&Element> {
        names.iter().try_fold(self, |el, name| el.child(name))
    }

    /// Trimmed text of a direct child, if present and non-empty.
    pub fn text_of(&self, name: &str) -> Option<&str> {
        self.child(name)
            .map(|c| c.text.trim())
            .filter(|t| !t.is_empty())
    }

    /// First descendant (depth-first) with this name, including self.
    pub fn find(&self, name: &str) -> Option<&Element> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }
}

/// Parse a document and return its root element.
pub fn parse(input: &str) -> Result<Element, XmlError> {
    let mut parser = Parser { input, pos: 0 };
    parser.skip_prolog()?;
    let root = parser.element(0)?;
    Ok(root)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn err(&self, message: impl Into<String>) -> XmlError {
        XmlError {
            position: self.pos,
            message: message.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn skip_past(&mut self, terminator: &str) -> Result<(), XmlError> {
        match self.rest().find(terminator) {
            Some(idx) => {
                self.pos += idx + terminator.len();
                Ok(())
            }
            None => Err(self.err(format!("unterminated construct, expected {terminator:?}"))),
        }
    }

    /// Skip declarations, processing instructions, comments and doctype.
    fn skip_prolog(&mut self) -> Result<(), XmlError> {
        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.starts_with("<?") {
                self.skip_past("?>")?;
            } else if rest.starts_with("<!--") {
                self.skip_past("-->")?;
            } else if rest.starts_with("<!") {
                self.skip_past(">")?;
            } else {
                return Ok(());
            }
        }
    }

    fn element(&mut self, depth: usize) -> Result<Element, XmlError> {
        if depth >= MAX_DEPTH {
            return Err(self.err(format!("elements nested deeper than {MAX_DEPTH}")));
        }
        if !self.rest().starts_with('<') {
            return Err(self.err("expected '<'"));
        }
        let tag_end = start_tag_end(self.rest()).ok_or_else(|| self.err("unterminated start tag"))?;
        let tag = &self.rest()[1..tag_end];
        let self_closing = tag.ends_with('/');
        let tag = tag.trim_end_matches('/');
        let raw_name = tag
            .split(|c: char| c.is_whitespace())
            .next()
            .unwrap_or_default();
        if raw_name.is_empty() {
            return Err(self.err("empty tag name"));
        }
        let name = local_name(raw_name).to_string();
        self.pos += tag_end + 1;

        let mut element = Element {
            name,
            ..Element::default()
        };
        if self_closing {
            return Ok(element);
        }

        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return Err(self.err(format!("unclosed element <{}>", element.name)));
            }
            if rest.starts_with("</") {
                let end = rest.find('>').ok_or_else(|| self.err("unterminated end tag"))?;
                let closing = local_name(rest[2..end].trim());
                if closing != element.name {
                    return Err(self.err(format!(
                        "mismatched end tag </{closing}> for <{}>",
                        element.name
                    )));
                }
                self.pos += end + 1;
                return Ok(element);
            } else if rest.starts_with("<!--") {
                self.skip_past("-->")?;
            } else if let Some(cdata) = rest.strip_prefix("<![CDATA[") {
                let end = cdata
                    .find("]]>")
                    .ok_or_else(|| self.err("unterminated CDATA"))?;
                element.text.push_str(&cdata[..end]);
                self.pos += "<![CDATA[".len() + end + 3;
            } else if rest.starts_with("<?") {
                self.skip_past("?>")?;
            } else if rest.starts_with('<') {
                let child = self.element(depth + 1)?;
                element.children.push(child);
            } else {
                let end = rest.find('<').unwrap_or(rest.len());
                let decoded = decode_entities(&rest[..end]).map_err(|m| self.err(m))?;
                element.text.push_str(&decoded);
                self.pos += end;
            }
        }
    }
}

/// Byte offset of the `>` closing a start tag, skipping quoted attribute
/// values.
fn start_tag_end(tag: &str) -> Option<usize> {
    let mut quote = None;
    for (i, c) in tag.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '>') => return Some(i),
            _ => {}
        }
    }
    None
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn decode_entities(raw: &str) -> Result<String, String> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after
            .find(';')
            .ok_or_else(|| "unterminated entity".to_string())?;
        let entity = &after[..semi];
        let decoded = match entity {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32)
                    .ok_or_else(|| format!("unknown entity &{entity};"))?
            }
        };
        out.push(decoded);
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_document() {
        let doc = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListAllMyBucketsResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Owner><ID>abc</ID></Owner>
  <Buckets>
    <Bucket><Name>logs</Name><CreationDate>2024-01-01T00:00:00.000Z</CreationDate></Bucket>
    <Bucket><Name>assets</Name></Bucket>
  </Buckets>
</ListAllMyBucketsResult>"#;
        let root = parse(doc).unwrap();
        assert_eq!(root.name, "ListAllMyBucketsResult");
        let names: Vec<_> = root
            .child("Buckets")
            .unwrap()
            .children_named("Bucket")
            .filter_map(|b| b.text_of("Name"))
            .collect();
        assert_eq!(names, vec!["logs", "assets"]);
        assert_eq!(root.path(&["Owner", "ID"]).unwrap().text, "abc");
    }

    #[test]
    fn decodes_entities_and_cdata() {
        let root = parse("<a><b>x &amp; y &lt;z&gt; &#65;&#x42;</b><c><![CDATA[<raw>]]></c></a>").unwrap();
        assert_eq!(root.text_of("b"), Some("x & y <z> AB"));
        assert_eq!(root.text_of("c"), Some("<raw>"));
    }

    #[test]
    fn self_closing_and_comments() {
        let root = parse("<a><!-- note --><b/><c attr=\"1\">t</c></a>").unwrap();
        assert!(root.child("b").is_some());
        assert_eq!(root.text_of("c"), Some("t"));
        assert_eq!(root.text_of("b"), None);
    }

    #[test]
    fn find_descends() {
        let root = parse("<r><x><Code>Throttling</Code></x></r>").unwrap();
        assert_eq!(root.find("Code").unwrap().text, "Throttling");
    }

    #[test]
    fn quoted_attribute_may_contain_gt() {
        let root = parse(r#"<a><b note="x > y" other='>'>t</b></a>"#).unwrap();
        assert_eq!(root.text_of("b"), Some("t"));
    }

    #[test]
    fn rejects_runaway_nesting() {
        let doc = format!("{}{}", "<a>".repeat(MAX_DEPTH + 1), "</a>".repeat(MAX_DEPTH + 1));
        assert!(parse(&doc).unwrap_err().message.contains("nested deeper"));

        let ok = format!("{}{}", "<a>".repeat(MAX_DEPTH), "</a>".repeat(MAX_DEPTH));
        assert!(parse(&ok).is_ok());
    }

    #[test]
    fn rejects_mismatched_tags() {
        assert!(parse("<a><b></a></b>").is_err());
        assert!(parse("<a>").is_err());
    }
}
