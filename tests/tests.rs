use shrike::{Error, Pattern};

fn pattern(source: &str) -> Pattern {
    Pattern::new(source).unwrap_or_else(|err| panic!("{:?}: {}", source, err))
}

/// The byte offset of a capture inside the haystack it borrows from.
fn offset_in(haystack: &str, group: &str) -> usize {
    group.as_ptr() as usize - haystack.as_ptr() as usize
}

#[test]
fn named_group_with_backreference() {
    let p = pattern(r"(?<name>123)\g<name>");
    let m = p.search("123123").unwrap();
    assert_eq!("123123", m.get());
    assert_eq!(0, m.offset());
    assert_eq!(Some("123"), m.named_group("name"));
    assert_eq!(Some("123"), m.group(1));
}

#[test]
fn repeated_group_keeps_last_capture() {
    let p = pattern(r"a(b|c)*d");
    let m = p.search("abcbcd").unwrap();
    assert_eq!("abcbcd", m.get());
    assert_eq!(Some("c"), m.group(1));
    let haystack = "abcbcd";
    let m = p.search(haystack).unwrap();
    assert_eq!(4, offset_in(haystack, m.group(1).unwrap()));
}

#[test]
fn atomic_group_prevents_backtracking() {
    let p = pattern(r"(?>(a+)+)b");
    assert!(p.search("aaaaX").is_none());
    assert_eq!("aaaab", p.search("aaaab").unwrap().get());
}

#[test]
fn word_boundaries_scan_words() {
    let p = pattern(r"\b\w+\b");
    let mut scanner = p.scanner("hello world");
    let m = scanner.next().unwrap();
    assert_eq!(("hello", 0), (m.get(), m.offset()));
    let m = scanner.next().unwrap();
    assert_eq!(("world", 6), (m.get(), m.offset()));
    assert!(scanner.next().is_none());
}

#[test]
fn whole_pattern_recursion() {
    let p = pattern(r"(?R)?a");
    let m = p.search("aaa").unwrap();
    assert_eq!(0, m.offset());
    assert_eq!("aaa", m.get());
    assert!(p.entire("aaa").is_some());
}

#[test]
fn class_intersection_with_negation() {
    let p = pattern(r"[a-z&&[^aeiou]]+");
    let m = p.search("rhythm").unwrap();
    assert_eq!("rhythm", m.get());
    assert!(p.entire("rhythm").is_some());
    // A vowel splits the match.
    assert_eq!("rhym", p.search("rhyme").map(|m| m.get()).unwrap());
}

#[test]
fn recursion_matches_balanced_parens() {
    let p = pattern(r"\((?:[^()]|(?R))*\)");
    assert_eq!("(a(b)c)", p.search("x(a(b)c)y").unwrap().get());
    assert_eq!("(())", p.entire("(())").map(|m| m.get()).unwrap());
    assert_eq!(Some("(a)"), p.search("((a)").map(|m| m.get()));
    assert!(p.search("(((").is_none());
}

#[test]
fn search_is_leftmost_first() {
    // The first alternative wins at the leftmost matching position.
    let p = pattern(r"aa|a");
    let m = p.search("baaa").unwrap();
    assert_eq!((1, "aa"), (m.offset(), m.get()));

    // No earlier starting position admits a match.
    let p = pattern(r"\d+");
    let haystack = "abc123def456";
    let m = p.search(haystack).unwrap();
    assert_eq!(3, m.offset());
    for at in 0..m.offset() {
        assert!(p.entire(&haystack[at..at + 1]).is_none());
    }
}

#[test]
fn captures_nest_inside_the_match() {
    let haystack = "  key=value;";
    let p = pattern(r"(\w+)=(\w+)");
    let m = p.search(haystack).unwrap();
    let (start, end) = (m.start(), m.end());
    for i in 0..m.num_groups() {
        let group = match m.group(i) {
            None => continue,
            Some(g) => g,
        };
        let begin = offset_in(haystack, group);
        assert!(start <= begin && begin + group.len() <= end, "group {}", i);
    }
    assert_eq!(Some("key"), m.group(1));
    assert_eq!(Some("value"), m.group(2));
    assert_eq!(None, m.group(3));
}

#[test]
fn subroutine_calls_roll_back_captures() {
    let haystack = "abab";
    let p = pattern(r"(a(b))(?1)");
    let m = p.search(haystack).unwrap();
    assert_eq!("abab", m.get());
    // The visible captures come from the top-level match, not from the
    // re-run of group 1.
    assert_eq!(0, offset_in(haystack, m.group(1).unwrap()));
    assert_eq!(1, offset_in(haystack, m.group(2).unwrap()));
}

#[test]
fn backreferences() {
    let p = pattern(r"(\w+) \1");
    assert_eq!("hey hey", p.search("so hey hey now").unwrap().get());
    // A reference to an unset group never matches.
    let p = pattern(r"(x)?\1y");
    assert!(p.search("y").is_none());
    assert_eq!("xxy", p.search("xxy").unwrap().get());
}

#[test]
fn greedy_lazy_possessive() {
    let p = pattern(r"<(.+)>");
    assert_eq!(Some("a><b"), p.search("<a><b>").unwrap().group(1));
    let p = pattern(r"<(.+?)>");
    assert_eq!(Some("a"), p.search("<a><b>").unwrap().group(1));
    let p = pattern(r"a{2,3}");
    assert_eq!("aaa", p.search("aaaa").unwrap().get());
    let p = pattern(r"a{2,3}?");
    assert_eq!("aa", p.search("aaaa").unwrap().get());
    // Possessive repetition refuses to give anything back.
    let p = pattern(r"a*+a");
    assert!(p.search("aaa").is_none());
    let p = pattern(r"a*+b");
    assert_eq!("aaab", p.search("aaab").unwrap().get());
}

#[test]
fn lookahead() {
    let p = pattern(r"\w+(?=;)");
    assert_eq!("two", p.search("one two;").unwrap().get());
    let p = pattern(r"ab(?!c)");
    let m = p.search("abc abd").unwrap();
    assert_eq!(4, m.offset());
}

#[test]
fn anchors() {
    let p = pattern(r"^ab");
    assert!(p.search("xab").is_none());
    assert_eq!("ab", p.search("abx").unwrap().get());
    let p = pattern(r"ab$");
    assert_eq!(1, p.search("xab").unwrap().offset());
    assert!(p.search("abx").is_none());
    // `\0` anchors to the end like `$`.
    let p = pattern("abc\\0");
    assert!(p.search("abc").is_some());
    assert!(p.search("abcd").is_none());
}

#[test]
fn nul_in_class_means_end_of_input() {
    let p = pattern(r"[x\0]");
    let m = p.search("x").unwrap();
    assert_eq!((0, "x"), (m.offset(), m.get()));
    // On input without an `x`, the class matches the end, zero-width.
    let m = p.search("y").unwrap();
    assert_eq!((1, ""), (m.offset(), m.get()));
    // `.` never matches at the end of the input.
    let p = pattern(r"a.");
    assert!(p.search("a").is_none());
    assert!(p.search("a\nb").is_none());
}

#[test]
fn unicode() {
    let p = pattern(r"[α-ω]+");
    let haystack = "abc αβγ xyz";
    let m = p.search(haystack).unwrap();
    assert_eq!(("αβγ", 4), (m.get(), m.offset()));

    let p = pattern(r"a.c");
    assert_eq!("aπc", p.search("xaπc").unwrap().get());

    let p = pattern("héllo");
    assert_eq!(1, p.search(" héllo").unwrap().offset());
}

#[test]
fn entire_requires_full_coverage() {
    let p = pattern(r"\d+");
    assert!(p.entire("123").is_some());
    assert!(p.entire("123x").is_none());
    assert!(p.entire("x123").is_none());
}

#[test]
fn empty_pattern_matches_everywhere() {
    let p = pattern("");
    let m = p.search("abc").unwrap();
    assert_eq!((0, ""), (m.offset(), m.get()));
    assert!(p.entire("").is_some());
}

#[test]
fn scanner_read_head() {
    let p = pattern("ab");
    let mut scanner = p.scanner("abxab");
    assert_eq!(0, scanner.tell());
    assert_eq!("ab", scanner.next_match().unwrap().get());
    assert_eq!(2, scanner.tell());
    // `x` sits at the read head: an anchored try fails and doesn't move.
    assert!(scanner.try_match().is_none());
    assert_eq!(2, scanner.tell());
    scanner.seek(3);
    assert!(scanner.try_match().is_some());
    assert_eq!(3, scanner.tell());
    scanner.increment();
    assert_eq!(4, scanner.tell());
    assert!(scanner.next_match().is_none());
    // Seeking past the end clamps.
    scanner.seek(100);
    assert_eq!(5, scanner.tell());
}

#[test]
fn scanner_advances_over_zero_length_matches() {
    let p = pattern("x*");
    let matches: Vec<(usize, String)> =
        p.scanner("axxb").map(|m| (m.offset(), m.get().to_string())).collect();
    assert_eq!(
        vec![
            (0, String::new()),
            (1, "xx".to_string()),
            (3, String::new()),
            (4, String::new()),
        ],
        matches,
    );
}

#[test]
fn replace_with_templates() {
    let p = pattern(r"(\w+)=(\w+)");
    assert_eq!("b:a d:c", p.replace("a=b c=d", r"\g<2>:\g<1>"));

    let p = pattern(r"(?<key>\w+)");
    assert_eq!("[ab] [cd]", p.replace("ab cd", r"[\k<key>]"));

    let p = pattern("a+");
    assert_eq!("c(aa)t", p.replace("caat", r"(\g<0>)"));

    // Unmatched input comes through untouched, as does a template
    // backslash that doesn't form a reference.
    let p = pattern("z");
    assert_eq!("abc", p.replace("abc", "!"));
    let p = pattern("b");
    assert_eq!(r"a\qc", p.replace("abc", r"\q"));

    // Zero-length matches substitute between characters.
    let p = pattern("x*");
    assert_eq!("-a-b-", p.replace("ab", "-"));
}

#[test]
fn pattern_introspection() {
    let p = pattern(r"(a)(?<x>b)(?:c)");
    assert_eq!(r"(a)(?<x>b)(?:c)", p.expression());
    assert_eq!(3, p.num_groups());
    assert_eq!(Some(2), p.group_index("x"));
    assert_eq!(None, p.group_index("y"));
    let m = p.search("abc").unwrap();
    assert_eq!(3, m.num_groups());
}

#[test]
fn patterns_parse_from_str() {
    let p: Pattern = "a+b".parse().unwrap();
    assert!(p.is_match("xaab"));
    let err = "a{3,1}".parse::<Pattern>().unwrap_err();
    assert_eq!(Error::BadQuantifier, err);
}

#[test]
fn compile_errors_are_reported() {
    assert_eq!(Error::UnbalancedParen, Pattern::new("(a|b").unwrap_err());
    assert_eq!(Error::NothingToRepeat, Pattern::new("*a").unwrap_err());
    assert_eq!(Error::BadReference, Pattern::new(r"(a)\2").unwrap_err());
    assert_eq!(
        "unbalanced parentheses",
        Pattern::new("(a|b").unwrap_err().to_string()
    );
}
