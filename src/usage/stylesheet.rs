// src/usage/stylesheet.rs
// =============================================================================
// Pulls the selectors out of a stylesheet with `cssparser`.
//
// - style rules give their selector list, split on top-level commas
// - nested style rules are resolved against their parent (".a { .b {} }"
//   yields ".a .b", "&" is replaced by the parent)
// - grouping at-rules (@media, @supports, @layer, @container, @document,
//   @scope) are entered, every other at-rule is skipped
// - rules that fail to parse are skipped, the rest of the sheet still counts
//
// Every selector comes in two forms: its text as written (for the report) and
// a normalised form used for matching. Selectors that depend on runtime state
// (:hover, :focus, ::before, ...) can never match a static document, so those
// pseudo tokens are left out of the normalised form: ".menu a:hover" is
// matched as ".menu a". A compound made only of such tokens becomes "*".
//
// Selectors come back in first-appearance order with duplicates removed.
// =============================================================================

use cssparser::{
    AtRuleParser, CowRcStr, DeclarationParser, ParseError, Parser, ParserInput, ParserState,
    QualifiedRuleParser, RuleBodyItemParser, RuleBodyParser, StyleSheetParser, ToCss, Token,
};
use std::collections::HashSet;

/// At-rules whose block contains further style rules
const GROUPING_AT_RULES: &[&str] = &["media", "supports", "layer", "container", "document", "scope"];

/// Pseudo-classes that describe interaction or form state
const STATEFUL_PSEUDO_CLASSES: &[&str] = &[
    "active",
    "any-link",
    "autofill",
    "checked",
    "default",
    "disabled",
    "enabled",
    "focus",
    "focus-visible",
    "focus-within",
    "fullscreen",
    "hover",
    "in-range",
    "indeterminate",
    "invalid",
    "link",
    "out-of-range",
    "paused",
    "placeholder-shown",
    "playing",
    "read-only",
    "read-write",
    "required",
    "optional",
    "target",
    "valid",
    "visited",
    // CSS2 pseudo-elements written with a single colon
    "after",
    "before",
    "first-letter",
    "first-line",
];

/// One selector of a style rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleSelector {
    /// As written, whitespace collapsed
    pub text: String,
    /// Stateful pseudo tokens removed, ready for DOM matching
    pub normalized: String,
}

/// Returns the distinct selectors of `css` in order of first appearance
pub fn extract_selectors(css: &str) -> Vec<StyleSelector> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut collector = RuleCollector::default();

    let found: Vec<StyleSelector> = StyleSheetParser::new(&mut parser, &mut collector)
        .filter_map(keep_parsed)
        .flatten()
        .collect();

    let mut seen = HashSet::new();
    found
        .into_iter()
        .filter(|selector| seen.insert(selector.text.clone()))
        .collect()
}

fn keep_parsed<'i>(
    item: Result<Vec<StyleSelector>, (ParseError<'i, ()>, &'i str)>,
) -> Option<Vec<StyleSelector>> {
    match item {
        Ok(found) => Some(found),
        Err((_, rule)) => {
            tracing::debug!(rule = rule.trim(), "skipped unparsable css");
            None
        }
    }
}

/// The enclosing style rule of a nested rule, as one selector
#[derive(Debug, Clone)]
struct NestingParent {
    text: String,
    normalized: String,
}

impl NestingParent {
    fn from_selectors(selectors: &[StyleSelector]) -> Option<Self> {
        match selectors {
            [] => None,
            [one] => Some(Self {
                text: one.text.clone(),
                normalized: one.normalized.clone(),
            }),
            many => {
                let texts: Vec<&str> = many.iter().map(|s| s.text.as_str()).collect();
                let normalized: Vec<&str> = many.iter().map(|s| s.normalized.as_str()).collect();
                Some(Self {
                    text: format!(":is({})", texts.join(", ")),
                    normalized: format!(":is({})", normalized.join(", ")),
                })
            }
        }
    }
}

/// Collects selectors of every style rule it is handed, nested ones included
#[derive(Debug, Clone, Default)]
struct RuleCollector {
    parent: Option<NestingParent>,
}

impl RuleCollector {
    fn body<'i, 't>(&self, input: &mut Parser<'i, 't>) -> Vec<StyleSelector> {
        let mut nested = self.clone();
        RuleBodyParser::new(input, &mut nested)
            .filter_map(keep_parsed)
            .flatten()
            .collect()
    }
}

enum AtRuleKind {
    Grouping,
    Other,
}

impl<'i> QualifiedRuleParser<'i> for RuleCollector {
    type Prelude = Vec<StyleSelector>;
    type QualifiedRule = Vec<StyleSelector>;
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, ()>> {
        let parent = self.parent.clone();
        let selectors = input.parse_comma_separated(|input| {
            let mut writer = SelectorWriter::new(parent.clone());
            writer.write(input)?;
            Ok(writer.finish())
        })?;
        Ok(selectors.into_iter().flatten().collect())
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::QualifiedRule, ParseError<'i, ()>> {
        let nested = RuleCollector {
            parent: NestingParent::from_selectors(&prelude),
        };
        let mut found = prelude;
        found.extend(nested.body(input));
        Ok(found)
    }
}

impl<'i> AtRuleParser<'i> for RuleCollector {
    type Prelude = AtRuleKind;
    type AtRule = Vec<StyleSelector>;
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, ()>> {
        while input.next().is_ok() {}

        let grouping = GROUPING_AT_RULES
            .iter()
            .any(|known| name.eq_ignore_ascii_case(known));
        Ok(if grouping {
            AtRuleKind::Grouping
        } else {
            AtRuleKind::Other
        })
    }

    fn rule_without_block(
        &mut self,
        _prelude: Self::Prelude,
        _start: &ParserState,
    ) -> Result<Self::AtRule, ()> {
        Ok(Vec::new())
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::AtRule, ParseError<'i, ()>> {
        match prelude {
            AtRuleKind::Grouping => Ok(self.body(input)),
            AtRuleKind::Other => {
                while input.next().is_ok() {}
                Ok(Vec::new())
            }
        }
    }
}

impl<'i> DeclarationParser<'i> for RuleCollector {
    type Declaration = Vec<StyleSelector>;
    type Error = ();

    // A "declaration" holding a {} block is a nested rule such as
    // "a:hover { }"; failing here lets the body parser retry it as a rule.
    fn parse_value<'t>(
        &mut self,
        _name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Declaration, ParseError<'i, ()>> {
        while let Ok(token) = input.next() {
            if matches!(token, Token::CurlyBracketBlock) {
                return Err(input.new_custom_error(()));
            }
        }
        Ok(Vec::new())
    }
}

impl<'i> RuleBodyItemParser<'i, Vec<StyleSelector>, ()> for RuleCollector {
    fn parse_declarations(&self) -> bool {
        true
    }

    fn parse_qualified(&self) -> bool {
        true
    }
}

/// Builds both forms of one selector from its tokens
struct SelectorWriter {
    text: String,
    normalized: String,
    parent: Option<NestingParent>,
    uses_nesting: bool,
    // State of the compound being written
    kept: bool,
    dropped: bool,
}

impl SelectorWriter {
    fn new(parent: Option<NestingParent>) -> Self {
        Self {
            text: String::new(),
            normalized: String::new(),
            parent,
            uses_nesting: false,
            kept: false,
            dropped: false,
        }
    }

    fn write<'i, 't>(&mut self, input: &mut Parser<'i, 't>) -> Result<(), ParseError<'i, ()>> {
        loop {
            let token = match input.next_including_whitespace() {
                Ok(token) => token.clone(),
                Err(_) => break,
            };

            match token {
                Token::WhiteSpace(_) => self.space(),
                Token::Comma => self.combinator(","),
                Token::Delim(c @ ('>' | '+' | '~')) => self.combinator(&c.to_string()),
                Token::Delim('&') => self.nesting(),
                Token::Colon => self.pseudo(input)?,
                Token::Function(_) | Token::ParenthesisBlock | Token::SquareBracketBlock => {
                    let close = if matches!(token, Token::SquareBracketBlock) { "]" } else { ")" };
                    self.keep(&token.to_css_string());
                    self.nested(input)?;
                    self.keep(close);
                }
                other => self.keep(&other.to_css_string()),
            }
        }
        Ok(())
    }

    // Called right after a ':' token
    fn pseudo<'i, 't>(&mut self, input: &mut Parser<'i, 't>) -> Result<(), ParseError<'i, ()>> {
        let element = input.try_parse(|input| input.expect_colon()).is_ok();
        let colons = if element { "::" } else { ":" };
        let name_token = input.next_including_whitespace()?.clone();

        let name = match &name_token {
            Token::Ident(name) | Token::Function(name) => name.to_ascii_lowercase(),
            other => {
                self.keep(&format!("{}{}", colons, other.to_css_string()));
                return Ok(());
            }
        };
        let stateful = element || STATEFUL_PSEUDO_CLASSES.contains(&strip_vendor_prefix(&name));
        let written = format!("{}{}", colons, name_token.to_css_string());
        let is_function = matches!(name_token, Token::Function(_));

        match (stateful, is_function) {
            (false, false) => self.keep(&written),
            (false, true) => {
                self.keep(&written);
                self.nested(input)?;
                self.keep(")");
            }
            (true, false) => self.drop_pseudo(&written),
            (true, true) => {
                let start = input.position();
                input.parse_nested_block(|input| {
                    while input.next().is_ok() {}
                    Ok::<(), ParseError<'i, ()>>(())
                })?;
                let rest = input.slice_from(start);
                self.drop_pseudo(&format!("{}{}", written, rest));
            }
        }
        Ok(())
    }

    // Contents of a (), [] or function block, as their own run of compounds
    fn nested<'i, 't>(&mut self, input: &mut Parser<'i, 't>) -> Result<(), ParseError<'i, ()>> {
        let outer = (self.kept, self.dropped);
        self.kept = false;
        self.dropped = false;

        input.parse_nested_block(|input| self.write(input))?;

        self.end_compound();
        (self.kept, self.dropped) = outer;
        Ok(())
    }

    fn keep(&mut self, css: &str) {
        self.text.push_str(css);
        self.normalized.push_str(css);
        self.kept = true;
    }

    fn drop_pseudo(&mut self, css: &str) {
        self.text.push_str(css);
        self.dropped = true;
    }

    fn nesting(&mut self) {
        self.uses_nesting = true;
        match self.parent.clone() {
            Some(parent) => {
                self.text.push_str(&parent.text);
                self.normalized.push_str(&parent.normalized);
                self.kept = true;
            }
            None => self.keep("&"),
        }
    }

    fn end_compound(&mut self) {
        if self.dropped && !self.kept {
            self.normalized.push('*');
        }
        self.kept = false;
        self.dropped = false;
    }

    fn space(&mut self) {
        self.end_compound();
        for out in [&mut self.text, &mut self.normalized] {
            if !out.is_empty() && !out.ends_with(' ') {
                out.push(' ');
            }
        }
    }

    fn combinator(&mut self, css: &str) {
        self.end_compound();
        self.text.push_str(css);
        self.normalized.push_str(css);
    }

    fn finish(mut self) -> Option<StyleSelector> {
        self.end_compound();

        let text = self.text.trim();
        if text.is_empty() {
            return None;
        }
        let normalized = match self.normalized.trim() {
            "" => "*",
            normalized => normalized,
        };

        let selector = match (&self.parent, self.uses_nesting) {
            (Some(parent), false) => StyleSelector {
                text: format!("{} {}", parent.text, text),
                normalized: format!("{} {}", parent.normalized, normalized),
            },
            _ => StyleSelector {
                text: text.to_string(),
                normalized: normalized.to_string(),
            },
        };
        Some(selector)
    }
}

// "-webkit-scrollbar" -> "scrollbar", "-moz-focusring" -> "focusring"
fn strip_vendor_prefix(name: &str) -> &str {
    match name.strip_prefix('-') {
        Some(rest) => rest.split_once('-').map_or(rest, |(_, tail)| tail),
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(css: &str) -> Vec<String> {
        extract_selectors(css).into_iter().map(|s| s.text).collect()
    }

    fn normalized(selector: &str) -> String {
        let css = format!("{} {{}}", selector);
        let mut found = extract_selectors(&css);
        assert_eq!(found.len(), 1, "{}", selector);
        found.remove(0).normalized
    }

    #[test]
    fn test_plain_rules() {
        let css = ".a { color: red } #b, .c > p { margin: 0 }";
        assert_eq!(texts(css), vec![".a", "#b", ".c > p"]);
    }

    #[test]
    fn test_comments_and_duplicates() {
        let css = "/* .hidden { } */ .a{} .a{} /* unterminated";
        assert_eq!(texts(css), vec![".a"]);
    }

    #[test]
    fn test_grouping_at_rules_are_entered() {
        let css = r#"
            @charset "utf-8";
            @import url("other.css");
            @media (max-width: 600px) {
                .mobile { display: block }
                @supports (display: grid) { .grid { display: grid } }
            }
            .after { color: blue }
        "#;
        assert_eq!(texts(css), vec![".mobile", ".grid", ".after"]);
    }

    #[test]
    fn test_other_at_rules_are_skipped() {
        let css = r#"
            @font-face { font-family: "X"; src: url(x.woff) }
            @keyframes spin { from { transform: rotate(0) } to { transform: rotate(360deg) } }
            .spinner { animation: spin 1s }
        "#;
        assert_eq!(texts(css), vec![".spinner"]);
    }

    #[test]
    fn test_braces_inside_strings() {
        let css = r#".icon::before { content: "}" } .next { color: red }"#;
        assert_eq!(texts(css), vec![".icon::before", ".next"]);
    }

    #[test]
    fn test_list_split_respects_nesting() {
        let css = "a, .b:is(.c, .d),\n [data-x=\",\"] span { }";
        assert_eq!(texts(css), vec!["a", ".b:is(.c, .d)", "[data-x=\",\"] span"]);
    }

    #[test]
    fn test_nested_rules_are_resolved() {
        let css = ".card { color: red; .title { margin: 0 } &.wide { } a:hover { } }";
        assert_eq!(
            texts(css),
            vec![".card", ".card .title", ".card.wide", ".card a:hover"]
        );
    }

    #[test]
    fn test_nested_under_selector_list() {
        let css = ".a, .b { > .c { } }";
        assert_eq!(texts(css), vec![".a", ".b", ":is(.a, .b) > .c"]);
    }

    #[test]
    fn test_stray_tokens_do_not_hide_the_rest() {
        let css = ".ok { } @media { .inner { } } ) .x { } .last { }";
        let found = texts(css);
        assert!(found.contains(&".ok".to_string()));
        assert!(found.contains(&".last".to_string()));
    }

    #[test]
    fn test_normalize_strips_state() {
        assert_eq!(normalized(".menu a:hover"), ".menu a");
        assert_eq!(normalized("a:focus-within"), "a");
        assert_eq!(normalized(".icon::before"), ".icon");
        assert_eq!(normalized(".icon:after"), ".icon");
        assert_eq!(normalized("input::-webkit-input-placeholder"), "input");
    }

    #[test]
    fn test_normalize_keeps_structural() {
        assert_eq!(normalized("li:first-child"), "li:first-child");
        assert_eq!(normalized("p:not(.intro)"), "p:not(.intro)");
        assert_eq!(normalized("a[href^=\"mailto:x\"]"), "a[href^=\"mailto:x\"]");
    }

    #[test]
    fn test_normalize_fills_empty_compound() {
        assert_eq!(normalized(".nav > :hover"), ".nav > *");
        assert_eq!(normalized("::selection"), "*");
    }

    #[test]
    fn test_escaped_colons_are_not_pseudo_classes() {
        let found = extract_selectors(r".md\:hover\:x { }");
        assert_eq!(found[0].text, r".md\:hover\:x");
        assert_eq!(found[0].normalized, r".md\:hover\:x");
    }

    #[test]
    fn test_colons_inside_attribute_values_are_kept() {
        assert_eq!(normalized("a[title=\"x:hover\"]"), "a[title=\"x:hover\"]");
    }
}
