//! Simple selector subset
//!
//! Supports what widgets need to locate their structure:
//!
//! - type selectors: `div`
//! - id selectors: `#main`
//! - class selectors: `.item`
//! - attribute selectors: `[s-id]`, `[data-role=item]`, `[data-role="item"]`
//! - compounds of the above: `div.item[data-role=item]`
//! - the descendant combinator (whitespace): `[data-role=wrapper] img`

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{all_consuming, cut, map, opt, value, verify},
    error::{context, VerboseError},
    multi::{many0, separated_list1},
    sequence::{delimited, preceded, terminated, tuple},
    Finish, IResult,
};
use tracing::debug;

use crate::error::{DomError, Result};
use crate::node::{Dom, NodeId};

type ParseResult<'a, O> = IResult<&'a str, O, VerboseError<&'a str>>;

#[derive(Clone, Debug, PartialEq, Eq)]
enum AttrTest {
    Present(String),
    Equals(String, String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

/// A parsed selector
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    /// Left to right; the last compound must match the subject element
    parts: Vec<Compound>,
}

impl Selector {
    /// Parse a selector string
    pub fn parse(input: &str) -> Result<Self> {
        let parsed = all_consuming(delimited(
            multispace0,
            separated_list1(multispace1, compound),
            multispace0,
        ))(input)
        .finish();

        match parsed {
            Ok((_, parts)) => Ok(Self { parts }),
            Err(err) => {
                debug!("invalid selector {input:?}: {err:?}");
                Err(DomError::InvalidSelector(input.into()))
            }
        }
    }

    /// Check whether `node` matches this selector
    pub fn matches(&self, dom: &Dom, node: NodeId) -> bool {
        let Some((subject, ancestors)) = self.parts.split_last() else {
            return false;
        };

        if !compound_matches(subject, dom, node) {
            return false;
        }

        // Right to left, each remaining compound must match some ancestor
        // above the one matched previously.
        let mut cursor = dom.parent(node);
        for compound in ancestors.iter().rev() {
            loop {
                match cursor {
                    Some(candidate) => {
                        cursor = dom.parent(candidate);
                        if compound_matches(compound, dom, candidate) {
                            break;
                        }
                    }
                    None => return false,
                }
            }
        }

        true
    }
}

fn compound_matches(compound: &Compound, dom: &Dom, node: NodeId) -> bool {
    if let Some(tag) = &compound.tag {
        if !dom.tag(node).is_some_and(|t| t.eq_ignore_ascii_case(tag)) {
            return false;
        }
    }

    if let Some(id) = &compound.id {
        if dom.get_attribute(node, "id").as_deref() != Some(id.as_str()) {
            return false;
        }
    }

    if !compound.classes.iter().all(|class| dom.has_class(node, class)) {
        return false;
    }

    compound.attrs.iter().all(|test| match test {
        AttrTest::Present(name) => dom.has_attribute(node, name),
        AttrTest::Equals(name, value) => {
            dom.get_attribute(node, name).as_deref() == Some(value.as_str())
        }
    })
}

enum Simple {
    Id(String),
    Class(String),
    Attr(AttrTest),
}

fn identifier(input: &str) -> ParseResult<&str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_')(input)
}

/// `div` or `*`; the universal selector carries no tag test
fn type_selector(input: &str) -> ParseResult<Option<String>> {
    alt((
        value(None, char('*')),
        map(identifier, |tag: &str| Some(tag.to_ascii_lowercase())),
    ))(input)
}

fn quoted<'a>(quote: char) -> impl FnMut(&'a str) -> ParseResult<'a, &'a str> {
    delimited(char(quote), take_while(move |c: char| c != quote), char(quote))
}

fn attr_value(input: &str) -> ParseResult<&str> {
    alt((
        quoted('"'),
        quoted('\''),
        take_while1(|c: char| !c.is_whitespace() && !matches!(c, ']' | '"' | '\'')),
    ))(input)
}

/// `[name]` or `[name=value]`, value optionally quoted
fn attribute(input: &str) -> ParseResult<AttrTest> {
    context("attribute selector", |input| {
        let (input, _) = char('[')(input)?;
        let (input, (name, value)) = cut(terminated(
            tuple((
                delimited(multispace0, identifier, multispace0),
                opt(preceded(
                    terminated(char('='), multispace0),
                    terminated(attr_value, multispace0),
                )),
            )),
            char(']'),
        ))(input)?;

        let test = match value {
            Some(value) => AttrTest::Equals(name.to_string(), value.to_string()),
            None => AttrTest::Present(name.to_string()),
        };
        Ok((input, test))
    })(input)
}

fn simple(input: &str) -> ParseResult<Simple> {
    alt((
        map(preceded(char('#'), cut(identifier)), |id: &str| Simple::Id(id.to_string())),
        map(preceded(char('.'), cut(identifier)), |class: &str| {
            Simple::Class(class.to_string())
        }),
        map(attribute, Simple::Attr),
    ))(input)
}

fn compound(input: &str) -> ParseResult<Compound> {
    let (input, (tag, simples)) = context(
        "compound selector",
        verify(
            tuple((opt(type_selector), many0(simple))),
            |(tag, simples): &(Option<Option<String>>, Vec<Simple>)| {
                tag.is_some() || !simples.is_empty()
            },
        ),
    )(input)?;

    let mut compound = Compound {
        tag: tag.flatten(),
        ..Compound::default()
    };
    for part in simples {
        match part {
            Simple::Id(id) => compound.id = Some(id),
            Simple::Class(class) => compound.classes.push(class),
            Simple::Attr(test) => compound.attrs.push(test),
        }
    }

    Ok((input, compound))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compound_forms() {
        assert!(Selector::parse("div").is_ok());
        assert!(Selector::parse("#main").is_ok());
        assert!(Selector::parse(".a.b").is_ok());
        assert!(Selector::parse("[data-role=item]").is_ok());
        assert!(Selector::parse("div.item[data-role=\"item\"]").is_ok());
        assert!(Selector::parse("[data-role=wrapper] img").is_ok());
        assert!(Selector::parse("  * [ s-id ]  ").is_ok());
    }

    #[test]
    fn test_quoted_attribute_value_keeps_whitespace() {
        let selector = Selector::parse(r#"[title="a b"]"#).unwrap();
        assert_eq!(selector.parts.len(), 1);
        assert_eq!(
            selector.parts[0].attrs,
            vec![AttrTest::Equals("title".into(), "a b".into())]
        );

        let dom = Dom::new();
        let node = dom.create_element("span");
        dom.append_child(dom.body(), node);
        dom.set_attribute(node, "title", "a b");
        assert!(selector.matches(&dom, node));
        assert_eq!(Selector::parse("div [title='a b'] span").unwrap().parts.len(), 3);

        dom.set_attribute(node, "title", "a");
        assert!(!selector.matches(&dom, node));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse("div > p").is_err());
        assert!(Selector::parse("[unterminated").is_err());
        assert!(Selector::parse(".").is_err());
        assert!(Selector::parse("[title=\"open]").is_err());
        assert!(Selector::parse("div#").is_err());
    }

    #[test]
    fn test_matches_descendant() {
        let dom = Dom::new();
        let wrapper = dom.create_element("div");
        dom.set_data(wrapper, "role", "wrapper");
        let item = dom.create_element("div");
        let img = dom.create_element("img");
        dom.append_child(dom.body(), wrapper);
        dom.append_child(wrapper, item);
        dom.append_child(item, img);

        let selector = Selector::parse("[data-role=wrapper] img").unwrap();
        assert!(selector.matches(&dom, img));
        assert!(!selector.matches(&dom, item));

        let selector = Selector::parse("body [data-role=wrapper]").unwrap();
        assert!(selector.matches(&dom, wrapper));
    }
}
