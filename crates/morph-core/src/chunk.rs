//! Arity chunking
//!
//! The combinator and the registration entry accept at most
//! [`ARITY_LIMIT`] arguments. Longer argument lists are split into ordered
//! chunks and re-emitted as staged calls; flattening the chunks always
//! yields the original list, each argument once, in order.

/// Maximum arguments per staged call
pub const ARITY_LIMIT: usize = 10;

/// A maximal run of at most [`ARITY_LIMIT`] consecutive arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentChunk {
    /// Argument source texts in order
    pub arguments: Vec<String>,
}

impl ArgumentChunk {
    fn render(&self) -> String {
        self.arguments.join(", ")
    }
}

/// Split arguments into consecutive chunks of at most [`ARITY_LIMIT`]
#[must_use]
pub fn chunk_arguments(arguments: &[String]) -> Vec<ArgumentChunk> {
    arguments
        .chunks(ARITY_LIMIT)
        .map(|chunk| ArgumentChunk {
            arguments: chunk.to_vec(),
        })
        .collect()
}

/// How the chunks of a call are staged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStyle {
    /// Method callee: `x.pipe(c1).pipe(c2)`
    Chained,
    /// Bare function: `pipe(pipe(c1), pipe(c2))`
    Composed,
}

impl StageStyle {
    /// Style for a callee's source text
    #[must_use]
    pub fn for_callee(callee: &str) -> Self {
        if callee.contains('.') {
            Self::Chained
        } else {
            Self::Composed
        }
    }
}

/// A call re-emitted as stages of bounded arity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedCall {
    /// Callee text, e.g. `this.actions$.pipe` or `pipe`
    pub callee: String,
    /// Staging style
    pub style: StageStyle,
    /// Chunks in order
    pub chunks: Vec<ArgumentChunk>,
}

impl StagedCall {
    /// Stage a call's arguments
    #[must_use]
    pub fn new(callee: impl Into<String>, arguments: &[String]) -> Self {
        let callee = callee.into();
        Self {
            style: StageStyle::for_callee(&callee),
            chunks: chunk_arguments(arguments),
            callee,
        }
    }

    /// Whether staging changes anything
    #[inline]
    #[must_use]
    pub fn is_staged(&self) -> bool {
        self.chunks.len() > 1
    }

    /// All arguments in original order
    #[must_use]
    pub fn flatten(&self) -> Vec<String> {
        self.chunks
            .iter()
            .flat_map(|chunk| chunk.arguments.iter().cloned())
            .collect()
    }

    /// Source text of the staged call
    #[must_use]
    pub fn render(&self) -> String {
        match self.style {
            StageStyle::Chained => {
                let method = self.callee.rsplit('.').next().unwrap_or(&self.callee);
                let mut out = String::new();
                for (i, chunk) in self.chunks.iter().enumerate() {
                    if i == 0 {
                        out.push_str(&format!("{}({})", self.callee, chunk.render()));
                    } else {
                        out.push_str(&format!(".{method}({})", chunk.render()));
                    }
                }
                if self.chunks.is_empty() {
                    out = format!("{}()", self.callee);
                }
                out
            }
            StageStyle::Composed => compose(&self.callee, self.flatten()),
        }
    }
}

fn compose(callee: &str, arguments: Vec<String>) -> String {
    if arguments.len() <= ARITY_LIMIT {
        return format!("{callee}({})", arguments.join(", "));
    }
    let stages = chunk_arguments(&arguments)
        .iter()
        .map(|chunk| format!("{callee}({})", chunk.render()))
        .collect();
    compose(callee, stages)
}

/// Group a clause's own label with its buffered fallthrough labels
///
/// While more than nine buffered labels remain, ten of them are split off
/// into a group of their own. The final group holds the own label followed
/// by the remaining buffered labels, so no group exceeds [`ARITY_LIMIT`].
#[must_use]
pub fn chunk_labels(own: &str, preceding: &[String]) -> Vec<Vec<String>> {
    let mut groups = Vec::new();
    let mut rest = preceding;
    while rest.len() > ARITY_LIMIT - 1 {
        let (head, tail) = rest.split_at(ARITY_LIMIT);
        groups.push(head.to_vec());
        rest = tail;
    }
    let mut last = Vec::with_capacity(rest.len() + 1);
    last.push(own.to_string());
    last.extend(rest.iter().cloned());
    groups.push(last);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn args(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("op{i}()")).collect()
    }

    #[test]
    fn short_lists_are_untouched() {
        let staged = StagedCall::new("this.actions$.pipe", &args(3));
        assert!(!staged.is_staged());
        assert_eq!(staged.render(), "this.actions$.pipe(op0(), op1(), op2())");
    }

    #[test]
    fn chained_style_for_method_callee() {
        let staged = StagedCall::new("x.pipe", &args(12));
        assert_eq!(staged.style, StageStyle::Chained);
        assert_eq!(
            staged.render(),
            "x.pipe(op0(), op1(), op2(), op3(), op4(), op5(), op6(), op7(), op8(), op9()).pipe(op10(), op11())"
        );
    }

    #[test]
    fn composed_style_for_bare_callee() {
        let staged = StagedCall::new("pipe", &args(11));
        assert_eq!(staged.style, StageStyle::Composed);
        assert_eq!(
            staged.render(),
            "pipe(pipe(op0(), op1(), op2(), op3(), op4(), op5(), op6(), op7(), op8(), op9()), pipe(op10()))"
        );
    }

    #[test]
    fn composed_nests_again_past_limit() {
        let rendered = StagedCall::new("pipe", &args(101)).render();
        assert!(rendered.starts_with("pipe(pipe(pipe(op0()"));
    }

    #[test]
    fn label_groups() {
        let preceding: Vec<String> = (0..12).map(|i| format!("p{i}")).collect();
        let groups = chunk_labels("own", &preceding);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], preceding[..10].to_vec());
        assert_eq!(groups[1], vec!["own", "p10", "p11"]);

        let groups = chunk_labels("own", &preceding[..9]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 10);
    }

    proptest! {
        #[test]
        fn prop_chunks_flatten_to_original(n in 0..64usize) {
            let original = args(n);
            let staged = StagedCall::new("a.pipe", &original);
            prop_assert_eq!(staged.flatten(), original);
            prop_assert!(staged.chunks.iter().all(|c| !c.arguments.is_empty() && c.arguments.len() <= ARITY_LIMIT));
        }

        #[test]
        fn prop_label_groups_cover_each_label_once(n in 0..48usize) {
            let preceding: Vec<String> = (0..n).map(|i| format!("l{i}")).collect();
            let groups = chunk_labels("own", &preceding);
            prop_assert!(groups.iter().all(|g| !g.is_empty() && g.len() <= ARITY_LIMIT));
            let flat: Vec<String> = groups.concat();
            prop_assert_eq!(flat.len(), n + 1);
            prop_assert_eq!(flat.iter().filter(|l| *l == "own").count(), 1);
            let last = groups.last().unwrap();
            prop_assert_eq!(last[0].as_str(), "own");
            let mut without_own: Vec<String> = flat.into_iter().filter(|l| l != "own").collect();
            without_own.sort_by_key(|l| l[1..].parse::<usize>().unwrap());
            prop_assert_eq!(without_own, preceding);
        }
    }
}
