/// An error that occurred while compiling a regular expression.
///
/// Compilation either produces a whole pattern or one of these codes;
/// matching itself never fails (a non-match is `None`, see the crate
/// docs). Each variant corresponds to exactly one class of syntax error,
/// so the code alone identifies what went wrong.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    /// A backslash at the end of the pattern with nothing to escape.
    BogusEscape,
    /// An invalid hexadecimal (`\x`) escape.
    HexEscape,
    /// An empty character class, `[]` or `[^]`.
    EmptyClass,
    /// A character range `a-b` inside a class with `a > b`.
    BadRange,
    /// A quantifier `{a,b}` with `a > b`.
    BadQuantifier,
    /// An integer in the pattern too large to parse.
    BadInteger,
    /// A `[` with no matching `]` before the end of the pattern.
    UnbalancedBracket,
    /// Unbalanced parentheses.
    UnbalancedParen,
    /// Invalid syntax following `(?`.
    QuestionParen,
    /// A group name that was already used in this pattern.
    NameExists,
    /// A group name beginning with a digit.
    GroupDigit,
    /// A quantifier with nothing to repeat.
    NothingToRepeat,
    /// A backreference or subroutine call to a group that doesn't exist.
    BadReference,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let msg = match *self {
            Error::BogusEscape => "bogus escape (end of pattern)",
            Error::HexEscape => "invalid hexadecimal escape",
            Error::EmptyClass => "empty character class",
            Error::BadRange => "bad character range",
            Error::BadQuantifier => "bad quantifier {a,b}; a > b",
            Error::BadInteger => "integer is too large to parse",
            Error::UnbalancedBracket => {
                "expected ']' before end of regular expression"
            }
            Error::UnbalancedParen => "unbalanced parentheses",
            Error::QuestionParen => "invalid syntax following '?' in parentheses",
            Error::NameExists => "group name already exists",
            Error::GroupDigit => "group name must not begin with digit",
            Error::NothingToRepeat => "nothing to repeat",
            Error::BadReference => "reference or subroutine call to invalid group",
        };
        write!(f, "{}", msg)
    }
}
