// Copyright 2026 the Deferral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A small CSS selector matcher.
//!
//! Supports what deferred-loading markup uses: selector lists (`a, b`),
//! the descendant combinator (`picture img`), type selectors and `*`, and
//! `#id`, `.class`, `[attr]`, `[attr=value]` (value optionally quoted).
//! Anything else is rejected as an invalid selector.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use deferral_core::error::HostError;

use crate::tree::{NodeId, Tree};

#[derive(Debug, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
}

#[derive(Debug, PartialEq)]
pub(crate) struct Selector {
    /// Each group is a descendant chain, outermost first.
    groups: Vec<Vec<Compound>>,
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn invalid(src: &str) -> HostError {
    HostError::InvalidSelector(src.to_string())
}

fn ident(rest: &str) -> (&str, &str) {
    let end = rest.find(|c| !is_ident(c)).unwrap_or(rest.len());
    rest.split_at(end)
}

fn parse_compound(text: &str, src: &str) -> Result<Compound, HostError> {
    let mut compound = Compound::default();
    let mut rest = text;
    if let Some(after) = rest.strip_prefix('*') {
        rest = after;
    } else {
        let (tag, after) = ident(rest);
        if !tag.is_empty() {
            compound.tag = Some(tag.to_ascii_lowercase());
        }
        rest = after;
    }
    while let Some(c) = rest.chars().next() {
        match c {
            '#' | '.' => {
                let (name, after) = ident(&rest[1..]);
                if name.is_empty() {
                    return Err(invalid(src));
                }
                if c == '#' {
                    compound.ids.push(name.to_string());
                } else {
                    compound.classes.push(name.to_string());
                }
                rest = after;
            }
            '[' => {
                let close = rest.find(']').ok_or_else(|| invalid(src))?;
                let inner = &rest[1..close];
                let (name, value) = match inner.split_once('=') {
                    Some((name, value)) => {
                        let value = value.trim();
                        let value = value
                            .strip_prefix('"')
                            .and_then(|v| v.strip_suffix('"'))
                            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                            .unwrap_or(value);
                        (name.trim(), Some(value.to_string()))
                    }
                    None => (inner.trim(), None),
                };
                if name.is_empty() || !name.chars().all(is_ident) {
                    return Err(invalid(src));
                }
                compound.attributes.push((name.to_ascii_lowercase(), value));
                rest = &rest[close + 1..];
            }
            _ => return Err(invalid(src)),
        }
    }
    Ok(compound)
}

impl Selector {
    pub(crate) fn parse(src: &str) -> Result<Self, HostError> {
        let mut groups = Vec::new();
        for group in src.split(',') {
            let chain = group
                .split_ascii_whitespace()
                .map(|text| parse_compound(text, src))
                .collect::<Result<Vec<_>, _>>()?;
            if chain.is_empty() {
                return Err(invalid(src));
            }
            groups.push(chain);
        }
        Ok(Self { groups })
    }

    pub(crate) fn matches(&self, tree: &Tree, node: NodeId) -> bool {
        self.groups.iter().any(|chain| matches_chain(chain, tree, node))
    }
}

fn matches_chain(chain: &[Compound], tree: &Tree, node: NodeId) -> bool {
    let Some((last, outer)) = chain.split_last() else {
        return false;
    };
    if !matches_compound(last, tree, node) {
        return false;
    }
    let mut ancestors = tree.ancestors(node);
    outer
        .iter()
        .rev()
        .all(|compound| ancestors.any(|a| matches_compound(compound, tree, a)))
}

fn matches_compound(compound: &Compound, tree: &Tree, node: NodeId) -> bool {
    let element = tree.get(node);
    compound.tag.as_ref().is_none_or(|t| *t == element.tag)
        && compound
            .ids
            .iter()
            .all(|id| element.attribute("id") == Some(id.as_str()))
        && compound.classes.iter().all(|c| element.has_class(c))
        && compound
            .attributes
            .iter()
            .all(|(name, value)| match (element.attribute(name), value) {
                (Some(_), None) => true,
                (Some(actual), Some(expected)) => actual == expected,
                (None, _) => false,
            })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> (Tree, NodeId, NodeId, NodeId) {
        let mut tree = Tree::new();
        let body = tree.body();
        let picture = tree.create("picture");
        let img = tree.create("img");
        tree.get_mut(img).set_attribute("data-src", "cat.jpg");
        tree.get_mut(img).set_attribute("class", "hero wide");
        let script = tree.create("script");
        tree.get_mut(script).set_attribute("type", "deferjs");
        tree.get_mut(script).set_attribute("id", "s1");
        tree.append(body, picture);
        tree.append(picture, img);
        tree.append(body, script);
        (tree, picture, img, script)
    }

    #[test]
    fn compound_selectors() {
        let (tree, _, img, script) = page();
        let check = |s: &str, n| Selector::parse(s).unwrap().matches(&tree, n);
        assert!(check("[data-src]", img));
        assert!(check("img[data-src]", img));
        assert!(check("*.hero.wide", img));
        assert!(!check("img.narrow", img));
        assert!(check("script[type=deferjs]", script));
        assert!(check("script[type=\"deferjs\"]", script));
        assert!(!check("script[type=module]", script));
        assert!(check("#s1", script));
        assert!(check("video, script", script));
    }

    #[test]
    fn descendant_combinator() {
        let (tree, picture, img, _) = page();
        let s = Selector::parse("body picture img").unwrap();
        assert!(s.matches(&tree, img));
        assert!(!s.matches(&tree, picture));
        assert!(!Selector::parse("head img").unwrap().matches(&tree, img));
    }

    #[test]
    fn rejects_unsupported_syntax() {
        for bad in ["", "img,", "a > b", "img:not(.x)", "[=x]", "#", "[data-src"] {
            assert_eq!(
                Selector::parse(bad),
                Err(HostError::InvalidSelector(bad.to_string())),
                "{bad:?} should be rejected"
            );
        }
    }
}
