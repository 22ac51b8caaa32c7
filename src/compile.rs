/*!
Lowers a token stream into the matcher graph.

The compiler walks each stream front to back, appending an atom to the
current branch for each token (or starting a new branch at an
alternator). Quantifier tokens modify the most recently added atom.
Group-like tokens recurse to build a nested core. A subroutine call may
name a group that appears later in the pattern, so those atoms are
recorded unresolved and wired up once every core exists.
*/

use crate::program::{Atom, AtomKind, Branch, Core, CoreId, Program, MAX_REPS};
use crate::tokens::{Token, TokenStream};

/// Lower a validated token stream. `groups` is the total number of
/// capture slots, counting slot 0.
pub(crate) fn compile(tokens: TokenStream, groups: u32) -> Program {
    let mut compiler = Compiler { cores: Vec::new(), pending: Vec::new() };
    let root = compiler.build_core(tokens, Some(0));

    // Wire up subroutine calls now that every core exists. Reference
    // validation already rejected calls to groups that don't exist.
    for (core, branch, atom, target) in compiler.pending {
        let found = compiler
            .cores
            .iter()
            .position(|c| c.index == Some(target))
            .expect("validated subroutine target exists");
        match compiler.cores[core].branches[branch].atoms[atom].kind {
            AtomKind::Subroutine(ref mut id) => *id = found,
            _ => unreachable!("pending entries point at subroutine atoms"),
        }
    }

    log::debug!(
        "lowered pattern into {} core(s), {} capture slot(s)",
        compiler.cores.len(),
        groups,
    );
    Program::new(compiler.cores, root, groups as usize)
}

struct Compiler {
    cores: Vec<Core>,
    /// Unresolved subroutine atoms: `(core, branch, atom, target group)`.
    pending: Vec<(CoreId, usize, usize, u32)>,
}

impl Compiler {
    fn build_core(&mut self, mut tokens: TokenStream, index: Option<u32>) -> CoreId {
        debug_assert!(!tokens.is_empty());
        let id = self.cores.len();
        self.cores.push(Core { index, branches: Vec::new() });

        let mut branches = vec![Branch::default()];
        while let Some(token) = tokens.pop_front() {
            match token {
                // The empty pattern matches everything: an empty branch.
                Token::Empty => {}

                Token::Alternator => branches.push(Branch::default()),

                Token::Str(bytes) => {
                    push(&mut branches, Atom::new(AtomKind::Str(bytes)));
                }

                Token::Class { set, negated } => {
                    let mut atom = Atom::new(AtomKind::Class(set));
                    atom.invert = negated;
                    push(&mut branches, atom);
                }

                Token::Range { min, max } => {
                    let atom = last_atom(&mut branches);
                    atom.min = min;
                    atom.max = max.unwrap_or(MAX_REPS);
                }

                Token::Lazy => last_atom(&mut branches).greedy = false,

                Token::Group { tokens, index } => {
                    let sub = self.build_core(tokens, index);
                    push(&mut branches, Atom::new(AtomKind::Group(sub)));
                }

                Token::Atomic { tokens } => {
                    let sub = self.build_core(tokens, None);
                    push(&mut branches, Atom::new(AtomKind::Atomic(sub)));
                }

                Token::Look { tokens, negated } => {
                    let sub = self.build_core(tokens, None);
                    let mut atom = Atom::new(AtomKind::Look(sub));
                    atom.invert = negated;
                    push(&mut branches, atom);
                }

                Token::Reference(group) => {
                    push(&mut branches, Atom::new(AtomKind::Backref(group)));
                }

                Token::Subroutine(target) => {
                    let branch = branches.len() - 1;
                    let atom = branches[branch].atoms.len();
                    push(&mut branches, Atom::new(AtomKind::Subroutine(CoreId::MAX)));
                    self.pending.push((id, branch, atom, target));
                }

                Token::WordAnchor { negated } => {
                    let mut atom = Atom::new(AtomKind::WordAnchor);
                    atom.invert = negated;
                    push(&mut branches, atom);
                }

                // `^` is the edge anchor inverted; `$` is the plain one.
                Token::StartAnchor => {
                    let mut atom = Atom::new(AtomKind::EdgeAnchor);
                    atom.invert = true;
                    push(&mut branches, atom);
                }

                Token::EdgeAnchor => {
                    push(&mut branches, Atom::new(AtomKind::EdgeAnchor));
                }

                Token::Literal(_) | Token::Name { .. } | Token::Possessive => {
                    unreachable!("rewritten before lowering")
                }
            }
        }

        self.cores[id].branches = branches;
        id
    }
}

fn push(branches: &mut [Branch], atom: Atom) {
    branches.last_mut().expect("at least one branch").atoms.push(atom);
}

fn last_atom(branches: &mut [Branch]) -> &mut Atom {
    branches
        .last_mut()
        .expect("at least one branch")
        .atoms
        .last_mut()
        .expect("quantifier follows an atom")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use crate::program::AtomKind;

    fn program(pattern: &str) -> Program {
        let parsed = parser::parse(pattern).unwrap();
        compile(parsed.tokens, parsed.groups)
    }

    #[test]
    fn branches_split_on_alternator() {
        let prog = program("ab|cd|ef");
        let root = prog.core(prog.root());
        assert_eq!(Some(0), root.index);
        assert_eq!(3, root.branches.len());
        for branch in &root.branches {
            assert_eq!(1, branch.atoms.len());
        }
    }

    #[test]
    fn quantifiers_attach_to_last_atom() {
        let prog = program("ab{2,5}?");
        let root = prog.core(prog.root());
        let atoms = &root.branches[0].atoms;
        assert_eq!(2, atoms.len());
        assert!(matches!(atoms[0].kind, AtomKind::Str(_)));
        assert!(matches!(atoms[1].kind, AtomKind::Class(_)));
        assert_eq!((2, 5), (atoms[1].min, atoms[1].max));
        assert!(!atoms[1].greedy);
        assert!(atoms[0].greedy);
        assert_eq!((1, 1), (atoms[0].min, atoms[0].max));
    }

    #[test]
    fn unbounded_repetition_uses_sentinel() {
        let prog = program("a*");
        let atom = &prog.core(prog.root()).branches[0].atoms[0];
        assert_eq!((0, MAX_REPS), (atom.min, atom.max));
    }

    #[test]
    fn subroutine_resolves_forward_reference() {
        // The call comes before the group it targets.
        let prog = program("(?2)(a)(b)");
        let root = prog.core(prog.root());
        let atom = &root.branches[0].atoms[0];
        let target = match atom.kind {
            AtomKind::Subroutine(id) => id,
            ref other => panic!("expected subroutine, got {:?}", other),
        };
        assert_eq!(Some(2), prog.core(target).index);
    }

    #[test]
    fn recursion_targets_root() {
        let prog = program("(?R)?a");
        let root = prog.core(prog.root());
        let atom = &root.branches[0].atoms[0];
        match atom.kind {
            AtomKind::Subroutine(id) => assert_eq!(id, prog.root()),
            ref other => panic!("expected subroutine, got {:?}", other),
        }
        assert_eq!((0, 1), (atom.min, atom.max));
    }

    #[test]
    fn groups_capture_slots() {
        let prog = program("(a)(?:b)(?<n>c)");
        assert_eq!(3, prog.slots());
    }
}
