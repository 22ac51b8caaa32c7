/*!
Replacement-template expansion.

Templates use the backreference syntax of the pattern language itself:
`\g<1>`, `\g'1'`, `\k<name>` and so on, with `\g<0>` standing for the
whole match. Anything that doesn't form a well-formed reference is copied
through literally.
*/

use memchr::memchr;

use crate::re::Match;

/// Expand `template` for one match, appending to `dst`. Unset or unknown
/// groups expand to the empty string.
pub(crate) fn expand(m: &Match<'_, '_>, mut template: &str, dst: &mut String) {
    while !template.is_empty() {
        match memchr(b'\\', template.as_bytes()) {
            None => break,
            Some(i) => {
                dst.push_str(&template[..i]);
                template = &template[i..];
            }
        }
        match find_group_ref(template) {
            None => {
                dst.push('\\');
                template = &template[1..];
            }
            Some((group, rest)) => {
                let text = match group {
                    Ref::Number(n) => m.group(n),
                    Ref::Named(name) => m.named_group(name),
                };
                dst.push_str(text.unwrap_or(""));
                template = rest;
            }
        }
    }
    dst.push_str(template);
}

enum Ref<'t> {
    Number(usize),
    Named(&'t str),
}

/// Parse a `\g<...>`-style reference at the front of `template` (which
/// starts with a backslash), returning the reference and the rest of the
/// template.
fn find_group_ref(template: &str) -> Option<(Ref<'_>, &str)> {
    let bytes = template.as_bytes();
    debug_assert_eq!(Some(&b'\\'), bytes.first());
    if !matches!(bytes.get(1), Some(b'g') | Some(b'k')) {
        return None;
    }
    let closer = match *bytes.get(2)? {
        b'<' => b'>',
        b'\'' => b'\'',
        _ => return None,
    };
    let end = 3 + memchr(closer, &bytes[3..])?;
    let name = &template[3..end];
    let group = match name.parse::<usize>() {
        Ok(n) => Ref::Number(n),
        Err(_) => Ref::Named(name),
    };
    Some((group, &template[end + 1..]))
}
