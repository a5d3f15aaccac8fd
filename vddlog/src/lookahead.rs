//! One-line lookahead over a line source.
//!
//! Two slots: `current` holds the line last handed to the caller, `next` holds
//! the following line, fetched one step early. End of input is detected by a
//! failed pre-fetch and is sticky: once seen, the source is never polled
//! again and every further [`Lookahead::advance`] reports exhaustion.

/// Contents of the pre-fetch slot.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Line(String),
    EndOfInput,
}

/// Two-slot lookahead buffer over any iterator of lines.
#[derive(Debug)]
pub struct Lookahead<I> {
    source: I,
    current: Option<String>,
    next: Slot,
}

impl<I> Lookahead<I>
where
    I: Iterator<Item = String>,
{
    /// Wrap `source`, pre-fetching its first line.
    pub fn new(mut source: I) -> Self {
        let next = fetch(&mut source);
        Self {
            source,
            current: None,
            next,
        }
    }

    /// Move to the next line. Returns `false` once the input is exhausted.
    pub fn advance(&mut self) -> bool {
        match std::mem::replace(&mut self.next, Slot::EndOfInput) {
            Slot::Line(line) => {
                self.current = Some(line);
                self.next = fetch(&mut self.source);
                true
            }
            Slot::EndOfInput => {
                self.current = None;
                false
            }
        }
    }

    /// The line most recently returned by [`advance`](Self::advance).
    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// The line after the current one, without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<&str> {
        match &self.next {
            Slot::Line(line) => Some(line),
            Slot::EndOfInput => None,
        }
    }

    /// Whether no line is left after the current one.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.next == Slot::EndOfInput
    }
}

fn fetch<I: Iterator<Item = String>>(source: &mut I) -> Slot {
    source.next().map_or(Slot::EndOfInput, Slot::Line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> std::vec::IntoIter<String> {
        items
            .iter()
            .map(|s| (*s).to_owned())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn test_peek_before_first_advance() {
        let la = Lookahead::new(lines(&["a", "b"]));
        assert_eq!(la.current(), None);
        assert_eq!(la.peek(), Some("a"));
    }

    #[test]
    fn test_advance_and_peek() {
        let mut la = Lookahead::new(lines(&["a", "b", "c"]));
        assert!(la.advance());
        assert_eq!(la.current(), Some("a"));
        assert_eq!(la.peek(), Some("b"));
        assert!(la.advance());
        assert!(la.advance());
        assert_eq!(la.current(), Some("c"));
        assert_eq!(la.peek(), None);
        assert!(la.is_exhausted());
        assert!(!la.advance());
        assert_eq!(la.current(), None);
    }

    #[test]
    fn test_empty_source() {
        let mut la = Lookahead::new(lines(&[]));
        assert!(la.is_exhausted());
        assert!(!la.advance());
        assert!(!la.advance());
    }

    /// Yields `None` once, then lines again.
    struct Flaky {
        calls: usize,
    }

    impl Iterator for Flaky {
        type Item = String;

        fn next(&mut self) -> Option<String> {
            self.calls += 1;
            match self.calls {
                1 => Some("first".to_owned()),
                2 => None,
                _ => Some("after end".to_owned()),
            }
        }
    }

    #[test]
    fn test_end_of_input_is_sticky() {
        let mut la = Lookahead::new(Flaky { calls: 0 });
        assert!(la.advance());
        assert_eq!(la.current(), Some("first"));
        assert!(!la.advance());
        assert!(!la.advance());
        assert_eq!(la.peek(), None);
        assert_eq!(la.source.calls, 2);
    }
}
