/*!
The pattern parser.

Turns a pattern source string into a [`TokenStream`] plus a table of named
groups, checking for every possible syntax error along the way. Parsing is
recursive over group bodies: a group-like token owns the stream for the
text between its parentheses. After a stream is built it goes through the
`weedeat` rewrite pass, and the finished top-level stream has its
backreferences validated and its named references resolved to group
numbers.
*/

use std::collections::HashMap;

use memchr::memchr;

use crate::class::CharClass;
use crate::error::Error;
use crate::tokens::{Token, TokenStream};
use crate::utf8;

/// The output of a successful parse.
#[derive(Debug)]
pub(crate) struct Parsed {
    pub(crate) tokens: TokenStream,
    /// Group name to capture-group number.
    pub(crate) names: HashMap<String, u32>,
    /// Total number of capture slots, counting slot 0 for the overall
    /// match.
    pub(crate) groups: u32,
}

/// Parse a whole pattern.
pub(crate) fn parse(pattern: &str) -> Result<Parsed, Error> {
    let mut parser = Parser { pattern, names: HashMap::new(), next_group: 1 };
    let mut stream = parser.parse_expr(0, pattern.len())?;
    check_references(&mut stream, parser.next_group, &parser.names)?;
    log::trace!(
        "parsed pattern {:?}: {} capture group(s), {} top-level token(s)",
        pattern,
        parser.next_group - 1,
        stream.len(),
    );
    Ok(Parsed { tokens: stream, names: parser.names, groups: parser.next_group })
}

/// What the previous token was, as far as quantifiers care.
#[derive(Clone, Copy, Eq, PartialEq)]
enum Prev {
    /// Nothing yet.
    Start,
    /// A token a quantifier may repeat.
    Repeatable,
    /// A quantifier, which `?` and `+` may modify.
    Quantifier,
    /// Anything else.
    Other,
}

fn prev_of(token: &Token) -> Prev {
    match *token {
        Token::Literal(_)
        | Token::Class { .. }
        | Token::Group { .. }
        | Token::Atomic { .. }
        | Token::Reference(_)
        | Token::Subroutine(_) => Prev::Repeatable,
        Token::Range { .. } => Prev::Quantifier,
        _ => Prev::Other,
    }
}

struct Parser<'p> {
    pattern: &'p str,
    names: HashMap<String, u32>,
    next_group: u32,
}

impl<'p> Parser<'p> {
    fn bytes(&self) -> &'p [u8] {
        self.pattern.as_bytes()
    }

    /// Parse the pattern text in `start..end` into a token list. `end` is
    /// the position of the enclosing group's `)`, or the end of the
    /// pattern at top level.
    fn parse_expr(&mut self, start: usize, end: usize) -> Result<TokenStream, Error> {
        let p = self.bytes();
        let mut list = TokenStream::new();

        // The empty pattern matches everything.
        if start == end {
            list.push_back(Token::Empty);
            return Ok(list);
        }

        // A leading quantifier has nothing to repeat.
        match p[start] {
            b'*' | b'?' | b'+' => return Err(Error::NothingToRepeat),
            b'{' => {
                let mut probe = start;
                if !matches!(parse_quantifier(p, &mut probe), Ok(None)) {
                    return Err(Error::NothingToRepeat);
                }
            }
            _ => {}
        }

        let mut prev = Prev::Start;
        let mut i = start;
        while i != end {
            let token = match p[i] {
                b'|' => {
                    i += 1;
                    Token::Alternator
                }

                b'[' => {
                    let close = find_closing(p, i, b'[', b']')
                        .ok_or(Error::UnbalancedBracket)?;
                    let (set, negated) = parse_class(p, i, close)?;
                    i = close + 1;
                    Token::Class { set, negated }
                }

                // Any character except a line terminator. The class also
                // holds NUL so that `.` refuses the end of the input.
                b'.' => {
                    i += 1;
                    Token::Class { set: line_terminators(), negated: true }
                }

                b'^' => {
                    i += 1;
                    Token::StartAnchor
                }

                b'$' => {
                    i += 1;
                    Token::EdgeAnchor
                }

                // A closing paren before any opening one.
                b')' => return Err(Error::UnbalancedParen),

                b'(' => {
                    let close = find_closing(p, i, b'(', b')')
                        .ok_or(Error::UnbalancedParen)?;
                    if close == end {
                        return Err(Error::UnbalancedParen);
                    }
                    let token = self.parse_group(i, close)?;
                    i = close + 1;
                    token
                }

                // Either `{0,1}` or a laziness marker for the previous
                // quantifier.
                b'?' => {
                    i += 1;
                    match prev {
                        Prev::Repeatable => Token::Range { min: 0, max: Some(1) },
                        Prev::Quantifier => Token::Lazy,
                        _ => return Err(Error::NothingToRepeat),
                    }
                }

                // Either `{1,}` or a possessiveness marker.
                b'+' => {
                    i += 1;
                    match prev {
                        Prev::Repeatable => Token::Range { min: 1, max: None },
                        Prev::Quantifier => Token::Possessive,
                        _ => return Err(Error::NothingToRepeat),
                    }
                }

                b'*' => {
                    i += 1;
                    if prev != Prev::Repeatable {
                        return Err(Error::NothingToRepeat);
                    }
                    Token::Range { min: 0, max: None }
                }

                // A counted repetition, or a literal brace.
                b'{' => match parse_quantifier(p, &mut i)? {
                    None => {
                        let (cp, n) = utf8::decode(&p[i..]);
                        i += n;
                        Token::Literal(cp)
                    }
                    Some((min, max)) => {
                        if prev != Prev::Repeatable {
                            return Err(Error::NothingToRepeat);
                        }
                        if max.map_or(false, |max| min > max) {
                            return Err(Error::BadQuantifier);
                        }
                        Token::Range { min, max }
                    }
                },

                b'\\' => {
                    if i + 1 >= end {
                        return Err(Error::BogusEscape);
                    }
                    match self.parse_backslash(&mut i, end)? {
                        Some(token) => token,
                        // An empty `\Q\E` block produces nothing.
                        None => continue,
                    }
                }

                _ => {
                    let (cp, n) = utf8::decode(&p[i..]);
                    i += n;
                    Token::Literal(cp)
                }
            };
            prev = prev_of(&token);
            list.push_back(token);
        }

        Ok(weedeat(list))
    }

    /// Parse a parenthesized form. `open` and `close` are the positions
    /// of `(` and its matching `)`.
    fn parse_group(&mut self, open: usize, close: usize) -> Result<Token, Error> {
        let p = self.bytes();

        // A plain capturing group.
        if p[open + 1] != b'?' {
            let index = self.next_group;
            self.next_group += 1;
            let tokens = self.parse_expr(open + 1, close)?;
            return Ok(Token::Group { tokens, index: Some(index) });
        }

        // `(?...)` syntax. A bare number is a subroutine call.
        let q = open + 1;
        if let Some(target) = parse_decimal(p, q + 1, close)? {
            return Ok(Token::Subroutine(target));
        }
        let mut j = q + 1;
        if j >= close {
            return Err(Error::QuestionParen);
        }
        match p[j] {
            // Lookahead assertions.
            b'=' => {
                let tokens = self.parse_expr(j + 1, close)?;
                Ok(Token::Look { tokens, negated: false })
            }
            b'!' => {
                let tokens = self.parse_expr(j + 1, close)?;
                Ok(Token::Look { tokens, negated: true })
            }

            // Atomic group.
            b'>' => {
                let tokens = self.parse_expr(j + 1, close)?;
                Ok(Token::Atomic { tokens })
            }

            // Non-capturing group.
            b':' => {
                let tokens = self.parse_expr(j + 1, close)?;
                Ok(Token::Group { tokens, index: None })
            }

            // Subroutine call to a named group; resolved after parsing.
            b'&' => {
                let name = self.pattern[j + 1..close].to_string();
                Ok(Token::Name { name, call: true })
            }

            // Whole-pattern recursion.
            b'R' => {
                if j + 1 != close {
                    return Err(Error::QuestionParen);
                }
                Ok(Token::Subroutine(0))
            }

            // Named capturing group: `(?<name>`, `(?'name'` or the
            // Python-style `(?P<name>`.
            b'P' | b'<' | b'\'' => {
                if p[j] == b'P' {
                    j += 1;
                    if j >= close || (p[j] != b'<' && p[j] != b'\'') {
                        return Err(Error::QuestionParen);
                    }
                }
                let closer = if p[j] == b'<' { b'>' } else { b'\'' };
                j += 1;
                if j < close && p[j].is_ascii_digit() {
                    return Err(Error::GroupDigit);
                }
                let bracket = match memchr(closer, &p[j..]) {
                    Some(k) if j + k < close => j + k,
                    _ => return Err(Error::QuestionParen),
                };
                let name = self.pattern[j..bracket].to_string();
                if self.names.contains_key(&name) {
                    return Err(Error::NameExists);
                }
                let index = self.next_group;
                self.names.insert(name, index);
                self.next_group += 1;
                let tokens = self.parse_expr(bracket + 1, close)?;
                Ok(Token::Group { tokens, index: Some(index) })
            }

            _ => Err(Error::QuestionParen),
        }
    }

    /// Parse the text after a backslash. `*i` points at the backslash
    /// and is left one past whatever was consumed. `Ok(None)` is an
    /// empty `\Q\E` block.
    fn parse_backslash(&mut self, i: &mut usize, end: usize) -> Result<Option<Token>, Error> {
        let p = self.bytes();
        let j = *i + 1;
        let token = match p[j] {
            // Word anchors.
            b'b' => {
                *i = j + 1;
                Token::WordAnchor { negated: false }
            }
            b'B' => {
                *i = j + 1;
                Token::WordAnchor { negated: true }
            }

            // `\0` anchors to the end of the string.
            b'0' => {
                *i = j + 1;
                Token::EdgeAnchor
            }

            // `\N`: anything but a line terminator, like `.`.
            b'N' => {
                *i = j + 1;
                Token::Class { set: line_terminators(), negated: true }
            }

            // `\g` / `\k` backreference syntax.
            b'g' | b'k' => {
                let closer = match p.get(j + 1) {
                    Some(&b'<') => Some(b'>'),
                    Some(&b'\'') => Some(b'\''),
                    _ => None,
                };
                let bracket = closer
                    .and_then(|c| memchr(c, &p[j + 2..]))
                    .map(|k| j + 2 + k);
                match bracket {
                    // No closing bracket: the `g`/`k` itself is a
                    // literal.
                    None => {
                        *i = j + 1;
                        Token::Literal(u32::from(p[j]))
                    }
                    Some(b) => {
                        *i = b + 1;
                        match parse_decimal(p, j + 2, b)? {
                            Some(n) => Token::Reference(n),
                            None => Token::Name {
                                name: self.pattern[j + 2..b].to_string(),
                                call: false,
                            },
                        }
                    }
                }
            }

            // `\Q...\E` literal block.
            b'Q' => {
                let begin = j + 1;
                if p[begin..end.min(p.len())].starts_with(b"\\E") {
                    *i = begin + 2;
                    return Ok(None);
                }
                let mut k = begin;
                while k < end && !(p[k] == b'\\' && k + 1 < end && p[k + 1] == b'E') {
                    k += 1;
                }
                let bytes = p[begin..k].to_vec();
                *i = if k < end { k + 2 } else { k };
                Token::Str(bytes)
            }

            _ => {
                // Character escapes, octal and hex escapes.
                let mut k = j;
                if let Some(value) = parse_escape(p, &mut k)? {
                    *i = k;
                    Token::Literal(value)
                } else if let Some((set, negated)) = shorthand_class(p[j]) {
                    *i = j + 1;
                    Token::Class { set, negated }
                } else if p[j].is_ascii_digit() {
                    // Single-digit backreference. (A three-digit octal
                    // escape was already taken above.)
                    *i = j + 1;
                    Token::Reference(u32::from(p[j] - b'0'))
                } else {
                    // Escaped literal.
                    let (cp, n) = utf8::decode(&p[j..]);
                    *i = j + n;
                    Token::Literal(cp)
                }
            }
        };
        Ok(Some(token))
    }
}

/// The class `.` and `\N` are built from; it holds NUL so that the
/// negation refuses the end of the input.
fn line_terminators() -> CharClass {
    let mut set = CharClass::new();
    set.insert_codepoint(0);
    set.insert_codepoint(u32::from(b'\r'));
    set.insert_codepoint(u32::from(b'\n'));
    set.insert_codepoint(0x0C); // form feed
    set.insert_codepoint(0x0B); // vertical tab
    set
}

/// Find the character closing the bracket or paren at `from`.
///
/// Escaped characters never close anything, a nested opener is skipped to
/// its own closer, and for parens a complete `[...]` is skipped since its
/// contents are literal. If the construct is unbalanced, the closer of the
/// last complete nested construct is returned if there was one.
fn find_closing(p: &[u8], from: usize, open: u8, close: u8) -> Option<usize> {
    let mut prev = None;
    let mut i = from + 1;
    while i < p.len() {
        let b = p[i];
        if b == close {
            return Some(i);
        } else if b == open {
            prev = find_closing(p, i, open, close);
            match prev {
                None => return None,
                Some(j) => i = j + 1,
            }
        } else if b == b'[' {
            match find_closing(p, i, b'[', b']') {
                Some(j) => i = j + 1,
                None => i += 1,
            }
        } else if b == b'\\' {
            i += if i + 1 < p.len() { 2 } else { 1 };
        } else {
            i += 1;
        }
    }
    prev
}

fn is_octal(b: u8) -> bool {
    (b'0'..=b'7').contains(&b)
}

fn hex_value(b: u8) -> Option<u32> {
    match b {
        b'0'..=b'9' => Some(u32::from(b - b'0')),
        b'a'..=b'f' => Some(u32::from(b - b'a') + 10),
        b'A'..=b'F' => Some(u32::from(b - b'A') + 10),
        _ => None,
    }
}

/// If the text at `*pos` (just after a backslash) is a character escape,
/// consume it and return its value. Three octal digits win over anything
/// else, so `\123` is a codepoint, not a backreference.
fn parse_escape(p: &[u8], pos: &mut usize) -> Result<Option<u32>, Error> {
    let i = *pos;
    if i + 2 < p.len() && is_octal(p[i]) && is_octal(p[i + 1]) && is_octal(p[i + 2]) {
        *pos = i + 3;
        let value = u32::from(p[i] - b'0') * 64
            + u32::from(p[i + 1] - b'0') * 8
            + u32::from(p[i + 2] - b'0');
        return Ok(Some(value));
    }
    let value = match p[i] {
        b'0' => 0x00,
        b'a' => 0x07,
        b'b' => 0x08,
        b't' => 0x09,
        b'n' => 0x0A,
        b'v' => 0x0B,
        b'f' => 0x0C,
        b'r' => 0x0D,
        b'x' => {
            // Exactly two hex digits.
            let hi = p.get(i + 1).copied().and_then(hex_value);
            let lo = p.get(i + 2).copied().and_then(hex_value);
            match (hi, lo) {
                (Some(hi), Some(lo)) => {
                    *pos = i + 3;
                    return Ok(Some(hi * 16 + lo));
                }
                _ => return Err(Error::HexEscape),
            }
        }
        _ => return Ok(None),
    };
    *pos = i + 1;
    Ok(Some(value))
}

fn is_shorthand(b: u8) -> bool {
    matches!(b, b'd' | b'D' | b'w' | b'W' | b's' | b'S' | b'h' | b'H')
}

/// The class a shorthand escape stands for, or `None` if `b` is not a
/// shorthand. Built by running the class parser over the equivalent
/// spelled-out class.
fn shorthand_class(b: u8) -> Option<(CharClass, bool)> {
    let src: &[u8] = match b {
        b'd' => b"[0-9]",
        b'D' => b"[^0-9]",
        b'w' => b"[a-zA-Z0-9_]",
        b'W' => b"[^a-zA-Z0-9_]",
        b's' => b"[ \t\r\n\x0C]",
        b'S' => b"[^ \t\r\n\x0C]",
        b'h' => b"[a-fA-F0-9]",
        b'H' => b"[^a-fA-F0-9]",
        _ => return None,
    };
    let parsed = parse_class(src, 0, src.len() - 1);
    Some(parsed.expect("shorthand classes are valid"))
}

/// Parse the decimal integer spanning `from..to` exactly. `Ok(None)` if
/// the span is empty or contains a non-digit.
fn parse_decimal(p: &[u8], from: usize, to: usize) -> Result<Option<u32>, Error> {
    if from >= to || !p[from..to].iter().all(u8::is_ascii_digit) {
        return Ok(None);
    }
    if to - from > 9 {
        return Err(Error::BadInteger);
    }
    let mut n = 0u32;
    for &d in &p[from..to] {
        n = n * 10 + u32::from(d - b'0');
    }
    Ok(Some(n))
}

/// Parse `{a}`, `{a,}` or `{a,b}` with `*pos` at the opening brace,
/// advancing past the closing brace on success. `Ok(None)` means the
/// brace does not open a quantifier and should be treated as a literal;
/// `*pos` is left alone in that case.
fn parse_quantifier(p: &[u8], pos: &mut usize) -> Result<Option<(u32, Option<u32>)>, Error> {
    debug_assert_eq!(b'{', p[*pos]);
    let open = *pos;
    let close = match memchr(b'}', &p[open..]) {
        None => return Ok(None),
        Some(k) => open + k,
    };
    let comma = memchr(b',', &p[open..close]).map(|k| open + k);
    if comma == Some(open + 1) {
        return Ok(None);
    }
    match comma {
        None => {
            // `{a}`: exactly a matches.
            match parse_decimal(p, open + 1, close)? {
                None => Ok(None),
                Some(a) => {
                    *pos = close + 1;
                    Ok(Some((a, Some(a))))
                }
            }
        }
        Some(comma) => {
            let a = match parse_decimal(p, open + 1, comma)? {
                None => return Ok(None),
                Some(a) => a,
            };
            if comma + 1 == close {
                // `{a,}`: unbounded.
                *pos = close + 1;
                return Ok(Some((a, None)));
            }
            match parse_decimal(p, comma + 1, close)? {
                None => Ok(None),
                Some(b) => {
                    *pos = close + 1;
                    Ok(Some((a, Some(b))))
                }
            }
        }
    }
}

/*
 * Class parsing.
 */

/// Parse the class between `begin` (the `[`) and `end` (its `]`),
/// returning the accumulated class and whether it is negated.
fn parse_class(p: &[u8], begin: usize, end: usize) -> Result<(CharClass, bool), Error> {
    debug_assert_eq!(b'[', p[begin]);
    let mut begin = begin;
    let mut i = begin + 1;
    let mut negate = false;
    if p[i] == b'^' {
        begin += 1;
        i += 1;
        negate = true;
    }
    if i == end {
        return Err(Error::EmptyClass);
    }

    let mut class = CharClass::new();
    let mut intersection = false;
    let mut difference = false;
    // The last single codepoint added, used as the low end of a range.
    let mut last_cp: Option<u32> = None;

    while i != end {
        match p[i] {
            // `&&` introduces class intersection when it sits before a
            // nested class or shorthand; otherwise `&` is a literal.
            b'&' => {
                last_cp = None;
                if is_intersection_op(p, i, begin, end) {
                    i += 2;
                    intersection = true;
                } else {
                    class.insert_codepoint(u32::from(b'&'));
                    i += 1;
                }
            }

            // A character range, the difference operator, or a literal
            // dash at either edge of the class.
            b'-' => {
                if i - 1 == begin || i + 1 == end {
                    class.insert_codepoint(u32::from(b'-'));
                    last_cp = None;
                    i += 1;
                } else if is_difference_op(p, i, end) {
                    difference = true;
                    last_cp = None;
                    i += 1;
                } else {
                    let lo = last_cp.take().unwrap_or(u32::from(p[i - 1]));
                    let hi = if p[i + 1] == b'\\' {
                        let mut k = i + 2;
                        match parse_escape(p, &mut k)? {
                            Some(value) => {
                                i = k;
                                value
                            }
                            None => {
                                let (cp, n) = utf8::decode(&p[i + 2..]);
                                i = i + 2 + n;
                                cp
                            }
                        }
                    } else {
                        let (cp, n) = utf8::decode(&p[i + 1..]);
                        i = i + 1 + n;
                        cp
                    };
                    if lo > hi {
                        return Err(Error::BadRange);
                    }
                    class.insert_range(lo, hi);
                    last_cp = Some(hi);
                }
            }

            // A nested class, or a literal bracket when unmatched or at
            // the very beginning.
            b'[' => {
                last_cp = None;
                let nested = if i - 1 == begin {
                    None
                } else {
                    find_closing(p, i, b'[', b']').filter(|&k| k != end)
                };
                match nested {
                    None => {
                        class.insert_codepoint(u32::from(b'['));
                        i += 1;
                    }
                    Some(nest_end) => {
                        let (nest_class, nest_negate) = parse_class(p, i, nest_end)?;
                        combine_nested(
                            &mut class,
                            &nest_class,
                            nest_negate,
                            &mut negate,
                            &mut intersection,
                            &mut difference,
                        );
                        i = nest_end + 1;
                    }
                }
            }

            b'\\' => {
                let mut k = i + 1;
                if let Some(value) = parse_escape(p, &mut k)? {
                    class.insert_codepoint(value);
                    last_cp = Some(value);
                    i = k;
                } else if let Some((set, set_negate)) = shorthand_class(p[i + 1]) {
                    combine_nested(
                        &mut class,
                        &set,
                        set_negate,
                        &mut negate,
                        &mut intersection,
                        &mut difference,
                    );
                    last_cp = None;
                    i += 2;
                } else {
                    // Escaped literal, e.g. `\]`.
                    let (cp, n) = utf8::decode(&p[i + 1..]);
                    class.insert_codepoint(cp);
                    last_cp = Some(cp);
                    i = i + 1 + n;
                }
            }

            _ => {
                let (cp, n) = utf8::decode(&p[i..]);
                class.insert_codepoint(cp);
                last_cp = Some(cp);
                i += n;
            }
        }
    }
    Ok((class, negate))
}

/// Whether `p[i]` starts an `&&` intersection operator: it must not be
/// the first class character and must be followed by a nested class or a
/// shorthand.
fn is_intersection_op(p: &[u8], i: usize, begin: usize, end: usize) -> bool {
    if p.get(i + 1) != Some(&b'&') || i - 1 == begin {
        return false;
    }
    match p.get(i + 2) {
        Some(&b'[') => find_closing(p, i + 2, b'[', b']') != Some(end),
        Some(&b'\\') => p.get(i + 3).map_or(false, |&b| is_shorthand(b)),
        _ => false,
    }
}

/// Whether `p[i]` is a `-` difference operator: it must be followed by a
/// nested class or a shorthand.
fn is_difference_op(p: &[u8], i: usize, end: usize) -> bool {
    match p.get(i + 1) {
        Some(&b'[') => find_closing(p, i + 1, b'[', b']') != Some(end),
        Some(&b'\\') => p.get(i + 2).map_or(false, |&b| is_shorthand(b)),
        _ => false,
    }
}

/// Combine a nested class into the one being built, honouring a pending
/// `&&` or `-` operator and the nested class's own negation. A bare
/// negated nested class intersects and flips the outer negation.
fn combine_nested(
    class: &mut CharClass,
    nested: &CharClass,
    nested_negate: bool,
    negate: &mut bool,
    intersection: &mut bool,
    difference: &mut bool,
) {
    debug_assert!(!(*intersection && *difference));
    if *intersection || *difference {
        if *intersection == nested_negate {
            class.difference(nested);
        } else {
            class.intersection(nested);
        }
        *intersection = false;
        *difference = false;
    } else if nested_negate {
        class.intersection(nested);
        *negate = !*negate;
    } else {
        class.union(nested);
    }
}

/*
 * The weedeat rewrite pass, applied to every finished token list.
 */

/// Rewrite a parsed token list into the form the compiler consumes:
///
/// 1. A class that could match the NUL terminator becomes a group
///    alternating the NUL-free class with the end anchor, so "matching
///    NUL" means matching the end of the input.
/// 2. Maximal runs of unquantified literals coalesce into a single
///    string token.
/// 3. A possessive marker becomes an atomic group wrapping the previous
///    atom and its quantifier.
/// 4. Remaining literals (those with a quantifier) become
///    single-codepoint classes.
///
/// Applying this twice is the same as applying it once.
pub(crate) fn weedeat(mut tokens: TokenStream) -> TokenStream {
    let mut out = TokenStream::new();
    while let Some(token) = tokens.pop_front() {
        match token {
            Token::Class { mut set, negated } => {
                let has_nul = set.contains(0);
                if negated == has_nul {
                    out.push_back(Token::Class { set, negated });
                    continue;
                }
                // `[\0...]` becomes `(?:[...]|$)`.
                if negated {
                    set.insert_codepoint(0);
                } else {
                    set.delete_codepoint(0);
                }
                let sub = vec![
                    Token::Class { set, negated },
                    Token::Alternator,
                    Token::EdgeAnchor,
                ];
                out.push_back(Token::Group { tokens: sub.into(), index: None });
            }

            Token::Literal(cp) => {
                if matches!(tokens.front(), Some(Token::Range { .. })) {
                    // A quantified literal becomes a one-codepoint class.
                    let mut set = CharClass::new();
                    set.insert_codepoint(cp);
                    out.push_back(Token::Class { set, negated: false });
                    continue;
                }
                // Coalesce the maximal run of unquantified literals.
                let mut bytes = Vec::new();
                utf8::encode(cp, &mut bytes);
                loop {
                    let part_of_string = matches!(tokens.front(), Some(Token::Literal(_)))
                        && !matches!(tokens.get(1), Some(Token::Range { .. }));
                    if !part_of_string {
                        break;
                    }
                    match tokens.pop_front() {
                        Some(Token::Literal(cp)) => {
                            utf8::encode(cp, &mut bytes);
                        }
                        _ => unreachable!("front was a literal"),
                    }
                }
                out.push_back(Token::Str(bytes));
            }

            Token::Possessive => {
                // `x*+` becomes `(?>x*)`.
                let range = out.pop_back().expect("possessive follows a quantifier");
                let piece = out.pop_back().expect("quantifier follows an atom");
                out.push_back(Token::Atomic { tokens: vec![piece, range].into() });
            }

            token => out.push_back(token),
        }
    }
    out
}

/*
 * Backreference validation.
 */

/// Walk the finished stream, resolving named references against the name
/// table and rejecting any reference or subroutine call to a group number
/// that doesn't exist.
fn check_references(
    stream: &mut TokenStream,
    groups: u32,
    names: &HashMap<String, u32>,
) -> Result<(), Error> {
    for token in stream.iter_mut() {
        match token {
            Token::Group { tokens, .. }
            | Token::Atomic { tokens }
            | Token::Look { tokens, .. } => check_references(tokens, groups, names)?,
            Token::Name { name, call } => {
                let index = *names.get(name.as_str()).ok_or(Error::BadReference)?;
                let call = *call;
                *token = if call {
                    Token::Subroutine(index)
                } else {
                    Token::Reference(index)
                };
            }
            Token::Reference(n) | Token::Subroutine(n) => {
                if *n >= groups {
                    return Err(Error::BadReference);
                }
            }
            _ => {}
        }
    }
    Ok(())
}
