use scraper::{ElementRef, Html, Node};

/// Elements whose text never renders.
const HIDDEN_ELEMENTS: &[&str] = &["head", "script", "style", "noscript", "template"];

/// Extracts the human-visible text of an HTML document or fragment.
///
/// Text inside `<script>`, `<style>`, `<noscript>`, `<template>` and `<head>`
/// is dropped. Element boundaries become spaces so words in adjacent blocks
/// do not run together. Plain text without markup comes back unchanged apart
/// from entity decoding.
pub fn visible_text(markup: &str) -> String {
    let document = Html::parse_document(markup);
    let mut out = String::with_capacity(markup.len() / 2);
    collect_text(document.root_element(), &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if HIDDEN_ELEMENTS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    out.push(' ');
                    collect_text(child_element, out);
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}
