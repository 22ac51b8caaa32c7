/*!
The public matching interface: [`Pattern`], [`Match`] and [`Scanner`].
*/

use std::collections::HashMap;
use std::str::FromStr;

use memchr::memchr;

use crate::backtrack::Matcher;
use crate::compile;
use crate::error::Error;
use crate::expand;
use crate::parser;
use crate::program::{AtomKind, Program};

/// A compiled regular expression.
///
/// A pattern is read-only once built: matching allocates its transient
/// state (stacks, capture slots) per call, so a pattern can be shared
/// freely between threads.
#[derive(Debug)]
pub struct Pattern {
    program: Program,
    names: HashMap<String, u32>,
    source: String,
    /// When every match must begin with a fixed byte, the byte to scan
    /// for before attempting a match.
    first_byte: Option<u8>,
}

impl Pattern {
    /// Compile a pattern from its source.
    pub fn new(pattern: &str) -> Result<Pattern, Error> {
        let parsed = parser::parse(pattern)?;
        let program = compile::compile(parsed.tokens, parsed.groups);
        let first_byte = required_first_byte(&program);
        Ok(Pattern {
            program,
            names: parsed.names,
            source: pattern.to_string(),
            first_byte,
        })
    }

    /// The source string this pattern was compiled from.
    pub fn expression(&self) -> &str {
        &self.source
    }

    /// The number of capture groups, counting group 0 for the overall
    /// match.
    pub fn num_groups(&self) -> usize {
        self.program.slots()
    }

    /// The capture-group number of a named group.
    pub fn group_index(&self, name: &str) -> Option<usize> {
        self.names.get(name).map(|&n| n as usize)
    }

    /// Leftmost-first search: attempt a match at successive positions
    /// from the start of the haystack and return the first one found.
    pub fn search<'r, 'h>(&'r self, haystack: &'h str) -> Option<Match<'r, 'h>> {
        self.search_at(haystack, 0)
    }

    /// Whether the pattern matches anywhere in the haystack.
    pub fn is_match(&self, haystack: &str) -> bool {
        self.search(haystack).is_some()
    }

    /// Match only if the leftmost-first match at the start of the
    /// haystack covers all of it.
    pub fn entire<'r, 'h>(&'r self, haystack: &'h str) -> Option<Match<'r, 'h>> {
        let mut matcher = Matcher::new(&self.program, haystack.as_bytes());
        let end = matcher.try_at(0)?;
        if end != haystack.len() {
            return None;
        }
        Some(Match { pattern: self, haystack, slots: matcher.slots().to_vec() })
    }

    /// An iterator over successive non-overlapping matches.
    pub fn scanner<'r, 'h>(&'r self, haystack: &'h str) -> Scanner<'r, 'h> {
        Scanner { pattern: self, haystack, at: 0, done: false }
    }

    /// Replace every non-overlapping leftmost match with the expansion
    /// of `template`. Templates reference captures with the pattern
    /// language's own syntax: `\g<1>`, `\k'name'`, `\g<0>` for the whole
    /// match.
    pub fn replace(&self, haystack: &str, template: &str) -> String {
        let mut out = String::with_capacity(haystack.len());
        let mut last = 0;
        for m in self.scanner(haystack) {
            out.push_str(&haystack[last..m.start()]);
            expand::expand(&m, template, &mut out);
            last = m.end();
        }
        out.push_str(&haystack[last..]);
        out
    }

    /// Search from `start`, attempting each codepoint boundary in turn.
    fn search_at<'h>(&self, haystack: &'h str, start: usize) -> Option<Match<'_, 'h>> {
        let bytes = haystack.as_bytes();
        let mut matcher = Matcher::new(&self.program, bytes);
        let mut at = start;
        while at <= bytes.len() {
            if let Some(first) = self.first_byte {
                // Skip ahead to the next place a match could begin.
                match memchr(first, &bytes[at..]) {
                    None => return None,
                    Some(i) => at += i,
                }
            }
            if haystack.is_char_boundary(at) && matcher.try_at(at).is_some() {
                return Some(Match {
                    pattern: self,
                    haystack,
                    slots: matcher.slots().to_vec(),
                });
            }
            at += 1;
        }
        None
    }
}

impl FromStr for Pattern {
    type Err = Error;

    fn from_str(pattern: &str) -> Result<Pattern, Error> {
        Pattern::new(pattern)
    }
}

/// The first byte every match must start with, when the pattern fixes
/// one: a single root branch opening with a literal string.
fn required_first_byte(program: &Program) -> Option<u8> {
    let root = program.core(program.root());
    if root.branches.len() != 1 {
        return None;
    }
    match root.branches[0].atoms.first()?.kind {
        AtomKind::Str(ref bytes) => bytes.first().copied(),
        _ => None,
    }
}

/// A single successful match, borrowing the haystack it was found in.
#[derive(Clone, Debug)]
pub struct Match<'r, 'h> {
    pattern: &'r Pattern,
    haystack: &'h str,
    slots: Vec<Option<(usize, usize)>>,
}

impl<'r, 'h> Match<'r, 'h> {
    /// The matched substring.
    pub fn get(&self) -> &'h str {
        self.group(0).expect("slot 0 is set on every match")
    }

    /// Byte offset from the start of the haystack to the start of the
    /// match.
    pub fn offset(&self) -> usize {
        self.start()
    }

    /// Byte offset of the start of the match.
    pub fn start(&self) -> usize {
        self.span().0
    }

    /// Byte offset of one past the end of the match.
    pub fn end(&self) -> usize {
        self.span().1
    }

    /// The byte range of the match in the haystack.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start()..self.end()
    }

    /// The number of capture groups, counting group 0, whether or not
    /// they participated in the match.
    pub fn num_groups(&self) -> usize {
        self.slots.len()
    }

    /// The text captured by a group, or `None` if the group doesn't
    /// exist or didn't participate in the match.
    pub fn group(&self, index: usize) -> Option<&'h str> {
        let (begin, end) = (*self.slots.get(index)?)?;
        Some(&self.haystack[begin..end])
    }

    /// Like [`Match::group`], addressing the group by name.
    pub fn named_group(&self, name: &str) -> Option<&'h str> {
        self.group(self.pattern.group_index(name)?)
    }

    fn span(&self) -> (usize, usize) {
        self.slots[0].expect("slot 0 is set on every match")
    }
}

/// An iterator over the successive non-overlapping matches in a
/// haystack, created by [`Pattern::scanner`].
#[derive(Debug)]
pub struct Scanner<'r, 'h> {
    pattern: &'r Pattern,
    haystack: &'h str,
    at: usize,
    done: bool,
}

impl<'r, 'h> Scanner<'r, 'h> {
    /// Find the next match at or after the read head. After a
    /// zero-length match the head advances one step so that scanning
    /// terminates.
    pub fn next_match(&mut self) -> Option<Match<'r, 'h>> {
        if self.done {
            return None;
        }
        let m = self.pattern.search_at(self.haystack, self.at)?;
        self.at = m.end();
        if m.start() == m.end() {
            if self.at >= self.haystack.len() {
                self.done = true;
            } else {
                self.increment();
            }
        }
        Some(m)
    }

    /// Try to match at the read head without moving it.
    pub fn try_match(&self) -> Option<Match<'r, 'h>> {
        let mut matcher = Matcher::new(&self.pattern.program, self.haystack.as_bytes());
        matcher.try_at(self.at)?;
        Some(Match {
            pattern: self.pattern,
            haystack: self.haystack,
            slots: matcher.slots().to_vec(),
        })
    }

    /// Move the read head, clamped to the end of the haystack and
    /// rounded up to a codepoint boundary.
    pub fn seek(&mut self, offset: usize) {
        self.at = offset.min(self.haystack.len());
        while !self.haystack.is_char_boundary(self.at) {
            self.at += 1;
        }
        self.done = false;
    }

    /// The read head's offset from the start of the haystack.
    pub fn tell(&self) -> usize {
        self.at
    }

    /// Advance the read head one codepoint, saturating at the end.
    pub fn increment(&mut self) {
        if self.at < self.haystack.len() {
            self.at += 1;
            while !self.haystack.is_char_boundary(self.at) {
                self.at += 1;
            }
        }
    }
}

impl<'r, 'h> Iterator for Scanner<'r, 'h> {
    type Item = Match<'r, 'h>;

    fn next(&mut self) -> Option<Match<'r, 'h>> {
        self.next_match()
    }
}
