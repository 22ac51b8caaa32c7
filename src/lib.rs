/*!
A backtracking regular-expression engine.

This crate compiles a pattern string into a [`Pattern`] and evaluates it
against Unicode (UTF-8) input with leftmost-first, backtracking
semantics. Beyond the usual classes, alternation and repetition it
supports capture groups (numbered and named), backreferences, lookahead
assertions, atomic groups, possessive and lazy quantifiers, and
subroutine calls — including whole-pattern recursion.

```
use shrike::Pattern;

let pattern = Pattern::new(r"(?<word>\w+)@(\w+)").unwrap();
let m = pattern.search("reach me at sam@example before noon").unwrap();
assert_eq!("sam@example", m.get());
assert_eq!(12, m.offset());
assert_eq!(Some("sam"), m.named_group("word"));
assert_eq!(Some("example"), m.group(2));
```

# Supported syntax

```text
.           any character except a line terminator
x|y         alternation; the left alternative is preferred
^  $        start and end of the input
\b \B       word boundary and its negation
\0          end of the input (the NUL terminator)

[...]       character class; classes nest, `[a-z[0-9]]` is a union,
            `[a-z&&[aeiou]]` an intersection and `[a-z-[aeiou]]` a
            difference; `^` after the opening bracket negates; a
            literal `]` must be escaped
\d \D \w \W \s \S \h \H
            shorthand classes (digits, word characters, whitespace,
            hex digits, and their negations)

x*  x+  x?  greedy repetition
x{n,m}      from n to m matches; `{n,}` is unbounded, `{n}` exact
x*?         a `?` suffix makes a quantifier lazy
x*+         a `+` suffix makes it possessive (no backtracking)

(...)       capturing group
(?<name>...)  (?'name'...)  (?P<name>...)
            named capturing group
(?:...)     non-capturing group
(?>...)     atomic group: never backtracked into
(?=...)  (?!...)
            positive and negative lookahead

\1 .. \9    backreference by number
\g<n> \g'n' \k<n> \k'n'
            backreference by number or name, any number of digits
(?n) (?R) (?&name)
            subroutine call: re-run a group's matcher (recursively if
            it calls itself); captures made inside the call are rolled
            back when it returns

\Q...\E     everything in between is literal
\xhh        hexadecimal escape
\ddd        octal escape (exactly three octal digits)
\a \t \n \v \f \r
            the usual control-character escapes
```

Matching the NUL terminator (`\0` inside a class, or a negated class
that excludes it) means matching the *end of the input*; `.` therefore
never matches at the end.

# Matching, scanning, replacing

[`Pattern::search`] finds the leftmost match; [`Pattern::entire`]
accepts only a match spanning the whole input; [`Pattern::scanner`]
iterates over every non-overlapping match, advancing past zero-length
matches so iteration terminates; [`Pattern::replace`] substitutes every
match with a template that can splice in captures via `\g<1>`,
`\k'name'` or `\g<0>`:

```
use shrike::Pattern;

let pattern = Pattern::new(r"(\w+)=(\w+)").unwrap();
assert_eq!(
    "b:a d:c",
    pattern.replace("a=b c=d", r"\g<2>:\g<1>"),
);
```

Compiling is far more expensive than matching. Callers that repeatedly
build patterns from strings can go through an [`Engine`], which caches
compiled patterns by their source string.

# Errors

Compilation returns an [`Error`] naming the syntax problem. Matching
itself never fails: a non-match is `None`, and malformed UTF-8 simply
doesn't match (each invalid position decodes to a sentinel outside the
Unicode range, which no class contains).
*/

#![deny(missing_docs)]

pub use crate::cache::Engine;
pub use crate::error::Error;
pub use crate::re::{Match, Pattern, Scanner};

mod backtrack;
mod cache;
mod class;
mod compile;
mod error;
mod expand;
mod parser;
mod program;
mod re;
mod tokens;
mod utf8;
