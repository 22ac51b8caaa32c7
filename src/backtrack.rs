/*!
The backtracking execution engine.

The engine interprets a [`Program`] against a haystack. Instead of using
the call stack for backtracking, every pending decision lives on an
explicit stack of [`Frame`]s: the next move is always determined by the
top frame. Entering a nested core is a normal recursive call, but when a
nested core succeeds while holding untried alternatives, its whole stack
is preserved inside a *re-entry* frame on the caller's stack, so
backtracking can resume the nested match exactly where it left off —
including the greedy/lazy decisions made inside it.

Positions are byte offsets into the haystack; "the end of the input" is
`haystack.len()`.
*/

use crate::class::{self, CharClass};
use crate::program::{Atom, AtomKind, Branch, CoreId, Program};
use crate::utf8;

/// Capture slots: `(begin, end)` byte offsets per group, slot 0 for the
/// overall match.
pub(crate) type Slots = Vec<Option<(usize, usize)>>;

/// One unit of pending work or backtracking state.
#[derive(Debug)]
struct Frame {
    /// The index of the atom to run next.
    index: usize,
    /// The input position to run it at.
    at: usize,
    /// Starting value of the repetition counter.
    matches: u32,
    /// Set on re-entry frames recorded when a nested core matched.
    recursive: bool,
    /// The nested core's preserved stack, when it still held
    /// alternatives.
    inner: Option<Box<BackStack>>,
    /// Capture snapshot for resuming a subroutine call.
    nest: Option<Box<Slots>>,
    /// The branch number to resume the nested core at.
    branch: usize,
}

impl Frame {
    /// An ordinary frame: run atom `index` at position `at`.
    fn step(index: usize, at: usize) -> Frame {
        Frame {
            index,
            at,
            matches: 0,
            recursive: false,
            inner: None,
            nest: None,
            branch: 0,
        }
    }

    fn seed(at: usize) -> Frame {
        Frame::step(0, at)
    }
}

/// The explicit stack of matcher state. Frames own their nested stacks
/// and snapshots, so dropping the stack releases everything it holds.
#[derive(Debug, Default)]
struct BackStack {
    frames: Vec<Frame>,
}

impl BackStack {
    fn new() -> BackStack {
        BackStack::default()
    }

    fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    fn pop(&mut self) -> Frame {
        self.frames.pop().expect("pop on empty backtrack stack")
    }

    fn top(&self) -> &Frame {
        self.frames.last().expect("top on empty backtrack stack")
    }

    /// Overwrite the top frame's atom index, repetition count and
    /// capture snapshot. Used when returning from a nested core, which
    /// doesn't know the index of the atom that holds it.
    fn set_top(&mut self, index: usize, matches: u32, nest: Option<Box<Slots>>) {
        let top = self.frames.last_mut().expect("set_top on empty backtrack stack");
        top.index = index;
        top.matches = matches;
        top.nest = nest;
    }

    fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// A single match attempt's state: the program, the haystack and the
/// capture slots. All per-match allocation lives here, so a compiled
/// pattern stays read-only during matching.
pub(crate) struct Matcher<'r, 'h> {
    prog: &'r Program,
    haystack: &'h [u8],
    slots: Slots,
    /// In-flight subroutine calls as `(core, position)`, for bounding
    /// left recursion.
    calls: Vec<(CoreId, usize)>,
}

impl<'r, 'h> Matcher<'r, 'h> {
    pub(crate) fn new(prog: &'r Program, haystack: &'h [u8]) -> Matcher<'r, 'h> {
        let slots = vec![None; prog.slots()];
        Matcher { prog, haystack, slots, calls: Vec::new() }
    }

    /// Run one anchored attempt at `at`. On success, returns the end of
    /// the match and leaves the captures in the slots.
    pub(crate) fn try_at(&mut self, at: usize) -> Option<usize> {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.core_match(self.prog.root(), at, None, None, 0)
    }

    pub(crate) fn slots(&self) -> &[Option<(usize, usize)>] {
        &self.slots
    }

    /// Match one core at `at`, starting from branch `branch_num`, with
    /// `inner` as a preserved stack to resume from (a fresh one is
    /// seeded otherwise). When `outer` is given, a re-entry frame is
    /// recorded on it after success so the caller can backtrack into
    /// this core.
    fn core_match(
        &mut self,
        id: CoreId,
        at: usize,
        outer: Option<&mut BackStack>,
        inner: Option<Box<BackStack>>,
        branch_num: usize,
    ) -> Option<usize> {
        let prog = self.prog;
        let core = prog.core(id);

        // A failed attempt must not leak a previous capture.
        if let Some(group) = core.index {
            self.slots[group as usize] = None;
        }

        let mut stack = match inner {
            Some(stack) => *stack,
            None => {
                let mut stack = BackStack::new();
                stack.push(Frame::seed(at));
                stack
            }
        };

        let mut cur = branch_num;
        let end = loop {
            if let Some(end) = self.branch_match(&core.branches[cur], &mut stack) {
                break end;
            }
            if cur + 1 < core.branches.len() {
                cur += 1;
                stack.push(Frame::seed(at));
            } else {
                return None;
            }
        };

        if let Some(group) = core.index {
            self.slots[group as usize] = Some((at, end));
        }
        if let Some(outer) = outer {
            // Record how to backtrack into this core. If the local stack
            // still holds alternatives, preserve it; if other branches
            // remain, preserve a fresh seed for the next branch; either
            // way the caller fixes up the atom index via `set_top`.
            let mut frame = Frame::seed(at);
            frame.recursive = true;
            if !stack.is_empty() {
                frame.inner = Some(Box::new(stack));
                frame.branch = cur;
            } else if cur + 1 < core.branches.len() {
                stack.push(Frame::seed(at));
                frame.inner = Some(Box::new(stack));
                frame.branch = cur + 1;
            }
            outer.push(frame);
        }
        Some(end)
    }

    /// Run atoms off the top of the stack until the branch is consumed
    /// (success) or the stack empties (exhausted).
    fn branch_match(&mut self, branch: &Branch, stack: &mut BackStack) -> Option<usize> {
        while !stack.is_empty() {
            let index = stack.top().index;
            if index == branch.atoms.len() {
                let at = stack.top().at;
                stack.pop();
                return Some(at);
            }
            self.atom_match(&branch.atoms[index], index, stack);
        }
        None
    }

    /// Run one atom. The atom updates the stack itself: it may push
    /// successor frames, leave backtrack points, or consume the top
    /// frame entirely.
    fn atom_match(&mut self, atom: &Atom, index: usize, stack: &mut BackStack) {
        if !atom.is_repeating() {
            let frame = stack.pop();
            let end = match atom.kind {
                AtomKind::Str(ref bytes) => self.match_str(bytes, frame.at),
                AtomKind::Look(id) => self.match_look(id, atom.invert, frame.at),
                AtomKind::WordAnchor => self.match_word_anchor(atom.invert, frame.at),
                AtomKind::EdgeAnchor => self.match_edge_anchor(atom.invert, frame.at),
                _ => unreachable!("repeating atom kinds handled below"),
            };
            if let Some(end) = end {
                stack.push(Frame::step(index + 1, end));
            }
            return;
        }
        if atom.greedy {
            self.greedy_match(atom, index, stack);
        } else {
            self.lazy_match(atom, index, stack);
        }
    }

    /// Do as many matches as possible, leaving a resumption frame for
    /// every acceptable length so failure further down backtracks to the
    /// next-longest attempt.
    fn greedy_match(&mut self, atom: &Atom, index: usize, stack: &mut BackStack) {
        let frame = stack.pop();
        debug_assert!(frame.recursive || frame.inner.is_none());
        let mut at = frame.at;
        let mut matches = frame.matches;
        let mut inner = frame.inner;
        let mut nest = frame.nest;
        let mut branch = frame.branch;
        loop {
            if matches >= atom.min && matches <= atom.max {
                stack.push(Frame::step(index + 1, at));
            }
            if matches >= atom.max {
                break;
            }
            let end = match self.do_match(
                atom,
                index,
                matches,
                at,
                stack,
                inner.take(),
                std::mem::take(&mut branch),
                nest.take(),
            ) {
                None => break,
                Some(end) => end,
            };
            matches += 1;
            if end == at {
                // A zero-width match would repeat forever; one more
                // resumption frame covers every further repetition.
                if matches >= atom.min && matches <= atom.max {
                    stack.push(Frame::step(index + 1, at));
                }
                break;
            }
            at = end;
        }
    }

    /// Do as few matches as possible: at each acceptable length, push
    /// the advance attempt below the successor so the successor is tried
    /// first.
    fn lazy_match(&mut self, atom: &Atom, index: usize, stack: &mut BackStack) {
        let frame = stack.pop();
        debug_assert!(frame.recursive || frame.inner.is_none());
        let mut at = frame.at;
        let mut matches = frame.matches;
        let mut inner = frame.inner;
        let mut nest = frame.nest;
        let mut branch = frame.branch;
        loop {
            if matches > atom.max {
                break;
            }
            let here = at;
            let mut advanced = None;
            if matches != atom.max {
                advanced = self.do_match(
                    atom,
                    index,
                    matches,
                    at,
                    stack,
                    inner.take(),
                    std::mem::take(&mut branch),
                    nest.take(),
                );
            }
            if let Some(end) = advanced {
                if matches >= atom.min && matches < atom.max && end != here {
                    stack.push(Frame { matches: matches + 1, ..Frame::step(index, end) });
                }
            }
            if matches >= atom.min && matches <= atom.max {
                stack.push(Frame::step(index + 1, here));
                break;
            }
            match advanced {
                None => break,
                Some(end) => {
                    at = end;
                    matches += 1;
                }
            }
        }
    }

    /// One match of a repeating atom's primitive.
    #[allow(clippy::too_many_arguments)]
    fn do_match(
        &mut self,
        atom: &Atom,
        index: usize,
        matches: u32,
        at: usize,
        stack: &mut BackStack,
        inner: Option<Box<BackStack>>,
        branch: usize,
        nest: Option<Box<Slots>>,
    ) -> Option<usize> {
        match atom.kind {
            AtomKind::Class(ref set) => self.match_class(set, atom.invert, at),
            AtomKind::Backref(group) => self.match_backref(group, at),
            AtomKind::Group(id) => {
                self.match_group(id, index, matches, at, stack, inner, branch)
            }
            AtomKind::Atomic(id) => self.match_atomic(id, at),
            AtomKind::Subroutine(id) => {
                self.match_subroutine(id, index, matches, at, stack, inner, branch, nest)
            }
            _ => unreachable!("non-repeating atom kinds handled in atom_match"),
        }
    }

    /// Decode one codepoint and test it against the class. There is
    /// nothing to decode at the end of the input; classes that should
    /// match there were rewritten into an end-anchor alternation.
    fn match_class(&self, set: &CharClass, invert: bool, at: usize) -> Option<usize> {
        if at == self.haystack.len() {
            return None;
        }
        let (cp, n) = utf8::decode(&self.haystack[at..]);
        if set.contains(cp) != invert {
            Some(at + n)
        } else {
            None
        }
    }

    fn match_str(&self, bytes: &[u8], at: usize) -> Option<usize> {
        if self.haystack[at..].starts_with(bytes) {
            Some(at + bytes.len())
        } else {
            None
        }
    }

    /// Consume the same bytes the referenced group captured. A reference
    /// to an unset group fails.
    fn match_backref(&self, group: u32, at: usize) -> Option<usize> {
        let (begin, end) = self.slots[group as usize]?;
        let len = end - begin;
        if self.haystack.len() - at >= len
            && self.haystack[at..at + len] == self.haystack[begin..end]
        {
            Some(at + len)
        } else {
            None
        }
    }

    /// Match the nested core without consuming input.
    fn match_look(&mut self, id: CoreId, invert: bool, at: usize) -> Option<usize> {
        let matched = self.core_match(id, at, None, None, 0).is_some();
        if matched != invert {
            Some(at)
        } else {
            None
        }
    }

    /// Zero-width match between a word character and a non-word
    /// character, or at an input edge when exactly the inner side is a
    /// word character.
    fn match_word_anchor(&self, invert: bool, at: usize) -> Option<usize> {
        let word = class::word_characters();
        let len = self.haystack.len();
        let curr_is_word = at < len && word.contains(u32::from(self.haystack[at]));
        let prev_is_word = at > 0 && word.contains(u32::from(self.haystack[at - 1]));
        let boundary = if at == 0 && len == 0 {
            false
        } else if at == 0 {
            curr_is_word
        } else if at == len {
            prev_is_word
        } else {
            curr_is_word != prev_is_word
        };
        if boundary != invert {
            Some(at)
        } else {
            None
        }
    }

    /// `$`, or `^` when inverted.
    fn match_edge_anchor(&self, invert: bool, at: usize) -> Option<usize> {
        let ok = if invert { at == 0 } else { at == self.haystack.len() };
        if ok {
            Some(at)
        } else {
            None
        }
    }

    /// Enter a nested group, then fix up the re-entry frame it recorded:
    /// a trivial one (no alternatives kept) is consumed immediately.
    fn match_group(
        &mut self,
        id: CoreId,
        index: usize,
        matches: u32,
        at: usize,
        stack: &mut BackStack,
        inner: Option<Box<BackStack>>,
        branch: usize,
    ) -> Option<usize> {
        let end = self.core_match(id, at, Some(stack), inner, branch)?;
        if stack.top().inner.is_none() {
            stack.pop();
        } else {
            stack.set_top(index, matches, None);
        }
        Some(end)
    }

    /// Enter a group with no backtracking frame recorded: once it has
    /// matched, its decisions are final.
    fn match_atomic(&mut self, id: CoreId, at: usize) -> Option<usize> {
        self.core_match(id, at, None, None, 0)
    }

    /// Call another group's matcher against a snapshot of the captures,
    /// so the captures it records roll back when the call returns. The
    /// snapshot is kept on the re-entry frame so backtracking into the
    /// call resumes with the captures it had.
    #[allow(clippy::too_many_arguments)]
    fn match_subroutine(
        &mut self,
        id: CoreId,
        index: usize,
        matches: u32,
        at: usize,
        stack: &mut BackStack,
        inner: Option<Box<BackStack>>,
        branch: usize,
        nest: Option<Box<Slots>>,
    ) -> Option<usize> {
        // A call re-entering the same core at the same position more
        // times than there are bytes left can never contribute a new
        // match; refusing it bounds left recursion like `(?R)?a`.
        let active = self.calls.iter().filter(|&&call| call == (id, at)).count();
        if active > self.haystack.len() - at {
            return None;
        }
        self.calls.push((id, at));
        let mut saved = match nest {
            Some(snapshot) => *snapshot,
            None => self.slots.clone(),
        };
        std::mem::swap(&mut self.slots, &mut saved);
        let end = self.core_match(id, at, Some(stack), inner, branch);
        std::mem::swap(&mut self.slots, &mut saved);
        self.calls.pop();
        let end = end?;
        if stack.top().inner.is_none() {
            stack.pop();
        } else {
            stack.set_top(index, matches, Some(Box::new(saved)));
        }
        Some(end)
    }
}
