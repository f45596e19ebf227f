use glob::MatchOptions;
use std::fmt;

/// One concrete segment of a path: a mapping key / archive path component,
/// or a sequence index inside a JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Name(String),
    Index(usize),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

/// Splits an archive entry name on `/`. Every component is a `Key::Name`.
pub fn split_path(path: &str) -> Vec<Key> {
    path.split('/').map(Key::from).collect()
}

// Segments are lower-cased on both sides before globbing, so the options only
// need to stop `glob` from treating dots and separators specially.
const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Rewrites segment text so `glob` reads it the way fnmatch does. A run of
/// `*` inside a segment is one wildcard, and a `[` with no closing `]`
/// stands for itself.
fn shell_glob(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                out.push('*');
                while chars.get(i + 1) == Some(&'*') {
                    i += 1;
                }
            }
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.extend(&chars[i..=end]);
                    i = end;
                }
                None => out.push_str(&glob::Pattern::escape("[")),
            },
            c => out.push(c),
        }
        i += 1;
    }
    out
}

/// Index of the `]` closing the class opened at `start`. A `]` directly after
/// `[` or `[!` is a member of the class, not its end.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if chars.get(j) == Some(&'!') {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    chars
        .get(j..)?
        .iter()
        .position(|&c| c == ']')
        .map(|offset| j + offset)
}

#[derive(Debug, Clone)]
pub enum Segment {
    /// `*`: exactly one segment, string or index.
    Any,
    /// `**`: zero or more segments.
    AnyDepth,
    /// Shell-glob text, stored lower-cased. `glob` is `None` only if the
    /// normalised text still fails to compile, and then it is compared
    /// literally.
    Literal {
        text: String,
        glob: Option<glob::Pattern>,
    },
}

impl Segment {
    pub fn parse(raw: &str) -> Segment {
        match raw {
            "*" => Segment::Any,
            "**" => Segment::AnyDepth,
            _ => {
                let text = raw.to_lowercase();
                let glob = glob::Pattern::new(&shell_glob(&text)).ok();
                Segment::Literal { text, glob }
            }
        }
    }

    /// Single-segment test. `AnyDepth` is resolved by the caller, which
    /// decides how many segments it spans.
    fn accepts(&self, key: &Key) -> bool {
        match (self, key) {
            (Segment::Any, _) | (Segment::AnyDepth, _) => true,
            (Segment::Literal { text, .. }, Key::Index(index)) => *text == index.to_string(),
            (Segment::Literal { text, glob }, Key::Name(name)) => {
                let name = name.to_lowercase();
                match glob {
                    Some(pattern) => pattern.matches_with(&name, GLOB_OPTIONS),
                    None => *text == name,
                }
            }
        }
    }

    fn as_str(&self) -> &str {
        match self {
            Segment::Any => "*",
            Segment::AnyDepth => "**",
            Segment::Literal { text, .. } => text,
        }
    }
}

/// A compiled slash-delimited glob over hierarchical keys. Used both for
/// archive entry names and for extraction points inside JSON documents.
#[derive(Debug, Clone)]
pub struct Pattern {
    segments: Vec<Segment>,
}

impl Pattern {
    pub fn parse(pattern: &str) -> Pattern {
        Pattern::from_segments(pattern.split('/'))
    }

    pub fn from_segments<'a, I>(segments: I) -> Pattern
    where
        I: IntoIterator<Item = &'a str>,
    {
        Pattern {
            segments: segments.into_iter().map(Segment::parse).collect(),
        }
    }

    pub fn matches(&self, subject: &[Key]) -> bool {
        match_segments(&self.segments, subject)
    }

    pub fn matches_path(&self, path: &str) -> bool {
        self.matches(&split_path(path))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            f.write_str(segment.as_str())?;
        }
        Ok(())
    }
}

fn match_segments(pattern: &[Segment], subject: &[Key]) -> bool {
    let Some((head, rest)) = pattern.split_first() else {
        return subject.is_empty();
    };

    match head {
        Segment::AnyDepth => (0..=subject.len()).any(|skip| match_segments(rest, &subject[skip..])),
        _ => match subject.split_first() {
            Some((key, tail)) => head.accepts(key) && match_segments(rest, tail),
            None => false,
        },
    }
}

/// Matches a `/`-joined pattern against a `/`-joined subject.
pub fn matches(pattern: &str, subject: &str) -> bool {
    Pattern::parse(pattern).matches_path(subject)
}
