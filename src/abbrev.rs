//! Abbreviation expansion.
//!
//! Rewrites `TOKEN (full form)` into `<abbr title='full form'>TOKEN</abbr>`
//! so browsers show the full form as a tooltip.  Which runs of text count as
//! a token is decided by a [`TokenPolicy`]; everything else about matching is
//! shared:
//!
//! - at most one whitespace character may sit between the token and `(`;
//! - the full form is one or more non-`)` characters up to the next `)`;
//! - matches are replaced left to right, globally, without overlap.
//!
//! Text that does not match passes through byte-for-byte.  Expansion never
//! fails.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Error;
use crate::html::html_escape;

/// Token is a whole word of two or more ASCII uppercase letters.  Word
/// boundaries are ASCII-only, so `日本のCPU` and `éCPU` still yield `CPU`.
const ACRONYM_PATTERN: &str = r"(?-u:\b)([A-Z]{2,})(?-u:\b)\s?\(([^)]+)\)";

/// Token is any run of non-whitespace characters.
const ANY_TOKEN_PATTERN: &str = r"(\S+)\s?\(([^)]+)\)";

/// Matches `<abbr ...>...</abbr>` elements already present in the input.
static ABBR_ELEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<abbr\b[^>]*>.*?</abbr>").expect("abbr fence regex is valid"));

static ACRONYM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ACRONYM_PATTERN).expect("acronym regex is valid"));

static ANY_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ANY_TOKEN_PATTERN).expect("any-token regex is valid"));

/// Which runs of text may act as the abbreviated token.
///
/// The two policies disagree on ordinary words: `cat (feline)` is expanded
/// under [`TokenPolicy::AnyToken`] and left alone under
/// [`TokenPolicy::Acronym`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenPolicy {
    /// Two or more uppercase ASCII letters forming a whole word (`CPU`, `HTTP`).
    Acronym,
    /// Any non-whitespace run (`cat`, `B.Tech`, `CPU`).
    #[default]
    AnyToken,
}

impl TokenPolicy {
    fn regex(self) -> &'static Regex {
        match self {
            TokenPolicy::Acronym => &ACRONYM,
            TokenPolicy::AnyToken => &ANY_TOKEN,
        }
    }
}

impl fmt::Display for TokenPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenPolicy::Acronym => f.write_str("acronym"),
            TokenPolicy::AnyToken => f.write_str("any"),
        }
    }
}

impl FromStr for TokenPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "acronym" => Ok(TokenPolicy::Acronym),
            "any" => Ok(TokenPolicy::AnyToken),
            _ => Err(Error::InvalidPolicy(s.to_owned())),
        }
    }
}

/// How captured text is embedded into the generated markup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Escaping {
    /// HTML-escape the token and the title (`&`, `<`, `>`, `"`, `'`).
    #[default]
    Html,
    /// Embed captured text verbatim.  A `'` in the full form produces
    /// malformed markup.
    None,
}

/// A piece of input text as seen by the expander.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Text outside any match.
    Text(&'a str),
    /// A matched `token (title)` pair.
    Abbr { token: &'a str, title: &'a str },
}

/// Abbreviation expander configured with a token policy and escaping mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Expander {
    policy: TokenPolicy,
    escaping: Escaping,
}

impl Expander {
    pub fn new(policy: TokenPolicy) -> Self {
        Self {
            policy,
            escaping: Escaping::default(),
        }
    }

    pub fn with_escaping(mut self, escaping: Escaping) -> Self {
        self.escaping = escaping;
        self
    }

    pub fn policy(&self) -> TokenPolicy {
        self.policy
    }

    pub fn escaping(&self) -> Escaping {
        self.escaping
    }

    /// Split `input` into plain text and abbreviation matches, in order.
    ///
    /// Concatenating the `Text` segments with the original source of every
    /// `Abbr` segment reproduces `input`.  Empty text segments are omitted.
    pub fn segments<'a>(&self, input: &'a str) -> Vec<Segment<'a>> {
        let mut segments = Vec::new();
        let mut last = 0;
        for caps in self.policy.regex().captures_iter(input) {
            // Groups 1 and 2 are not optional in either pattern.
            let (Some(whole), Some(token), Some(title)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            if whole.start() > last {
                segments.push(Segment::Text(&input[last..whole.start()]));
            }
            segments.push(Segment::Abbr {
                token: token.as_str(),
                title: title.as_str(),
            });
            last = whole.end();
        }
        if last < input.len() {
            segments.push(Segment::Text(&input[last..]));
        }
        segments
    }

    /// Expand every abbreviation in `input`.
    ///
    /// `<abbr>` elements already present in the input are copied through
    /// untouched, so running the expander over its own output changes
    /// nothing.
    pub fn expand(&self, input: &str) -> String {
        let mut out = String::with_capacity(input.len());
        let mut last = 0;
        for fenced in ABBR_ELEMENT.find_iter(input) {
            self.expand_into(&input[last..fenced.start()], &mut out);
            out.push_str(fenced.as_str());
            last = fenced.end();
        }
        self.expand_into(&input[last..], &mut out);
        out
    }

    /// Markup for a single abbreviation.
    pub fn render_abbr(&self, token: &str, title: &str) -> String {
        match self.escaping {
            Escaping::Html => format!(
                "<abbr title='{}'>{}</abbr>",
                html_escape(title),
                html_escape(token)
            ),
            Escaping::None => format!("<abbr title='{title}'>{token}</abbr>"),
        }
    }

    fn expand_into(&self, text: &str, out: &mut String) {
        for segment in self.segments(text) {
            match segment {
                Segment::Text(t) => out.push_str(t),
                Segment::Abbr { token, title } => out.push_str(&self.render_abbr(token, title)),
            }
        }
    }
}

/// Expand abbreviations with the default expander (any token, HTML-escaped).
pub fn expand(input: &str) -> String {
    Expander::default().expand(input)
}
