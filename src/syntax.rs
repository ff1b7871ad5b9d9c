//! Syntax tree representation and the parser boundary.
//!
//! The crate never parses source text itself; an external parser sits
//! behind the [`SourceParser`] trait and either returns a [`SyntaxNode`]
//! tree or fails. A failed sample is excluded from the corpus, never
//! fatal to the whole run.
//!
//! Before reaching the parser, raw C function bodies go through
//! [`clean_source`]: comments stripped, preprocessor directives removed,
//! platform-specific macros normalized, and a small typedef prelude
//! prepended so Windows-flavored test-suite code parses as plain C.

use regex::Regex;

use crate::error::Result;

/// A node in a parsed syntax tree.
///
/// Exposes a kind identifier (string tag, e.g. `"FuncDef"`, `"BinaryOp"`)
/// and an ordered sequence of children. Trees are built by the parser and
/// treated as immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxNode {
    /// Kind tag identifying the grammatical construct
    kind: String,
    /// Child nodes in source order
    children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    /// Create a new leaf node with the given kind tag.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            children: Vec::new(),
        }
    }

    /// Builder-style child attachment.
    #[must_use]
    pub fn with_child(mut self, child: SyntaxNode) -> Self {
        self.children.push(child);
        self
    }

    /// Add a child node.
    pub fn add_child(&mut self, child: SyntaxNode) {
        self.children.push(child);
    }

    /// Get the kind tag.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Get the children of this node.
    #[must_use]
    pub fn children(&self) -> &[SyntaxNode] {
        &self.children
    }

    /// Check if this is a leaf node.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Count all nodes in the subtree (including self).
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(SyntaxNode::node_count)
            .sum::<usize>()
    }

    /// Get the depth of the tree.
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(SyntaxNode::depth)
            .max()
            .unwrap_or(0)
    }
}

/// Boundary trait for the external syntax-tree parser.
///
/// Implementations receive cleaned source text and return a tree of typed
/// nodes, or fail with a [`crate::error::CentinelaError::ParseFailure`].
pub trait SourceParser {
    /// Parse cleaned source text into a syntax tree.
    ///
    /// # Errors
    ///
    /// Returns `ParseFailure` when the text is not parseable.
    fn parse(&self, source: &str) -> Result<SyntaxNode>;
}

/// Typedef prelude prepended to every cleaned sample so that test-suite
/// sources referencing these opaque types parse as plain C.
const TYPEDEF_PRELUDE: &str = "typedef unsigned int size_t;\n\
typedef struct _FILE FILE;\n\
typedef struct _HANDLE HANDLE;\n\
typedef struct _HWINSTA HWINSTA;\n\
typedef int BOOL;\n";

/// Rewrite the first function definition to a generic name.
///
/// Function names in labeled corpora leak the label (`..._bad`,
/// `..._good`); renaming removes that shortcut before parsing.
#[must_use]
pub fn normalize_function_name(source: &str) -> String {
    let re = Regex::new(r"void\s+\w+\s*\(").expect("function-name pattern is valid");
    re.replacen(source, 1, "void function(").into_owned()
}

/// Clean raw source text for the parser.
///
/// Strips comments, normalizes platform-specific macros to plain C,
/// drops preprocessor lines, and prepends the typedef prelude.
#[must_use]
pub fn clean_source(source: &str) -> String {
    let block_comments = Regex::new(r"(?s)/\*.*?\*/").expect("block-comment pattern is valid");
    let line_comments = Regex::new(r"(?m)//.*$").expect("line-comment pattern is valid");
    let struct_decl = Regex::new(r"(?m)^.*CWE.* myStruct;$").expect("struct pattern is valid");
    let union_decl = Regex::new(r"(?m)^.*CWE.* myUnion;$").expect("union pattern is valid");

    let mut text = block_comments.replace_all(source, "").into_owned();
    text = line_comments.replace_all(&text, "").into_owned();

    // Windows/test-suite idioms rewritten to plain C equivalents.
    text = text.replace("WSADATA", "struct WSADATA");
    text = text.replace("INVALID_SOCKET", "-1");
    text = text.replace("SOCKET", "int");
    text = text.replace("wchar_t", "char");
    text = text.replace("int64_t", "int");
    text = text.replace("twoIntsStruct", "struct");
    text = text.replace("structSigAtomic", "struct");
    text = struct_decl.replace_all(&text, "struct myStruct;").into_owned();
    text = union_decl.replace_all(&text, "union myUnion;").into_owned();

    let without_directives: String = text
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");

    format!("{TYPEDEF_PRELUDE}{without_directives}")
}

/// A parsed corpus: surviving labeled trees plus the count of samples
/// excluded because the parser rejected them.
#[derive(Debug)]
pub struct ParsedCorpus {
    /// Trees that parsed, paired with their 0/1 labels
    pub trees: Vec<(SyntaxNode, usize)>,
    /// Number of samples dropped due to parse failures
    pub dropped: usize,
}

/// Clean and parse labeled source samples, excluding failures.
///
/// Each sample is renamed, cleaned, and handed to `parser`. Samples the
/// parser rejects are dropped and counted; they never abort the corpus.
pub fn parse_samples<P: SourceParser>(parser: &P, samples: &[(String, usize)]) -> ParsedCorpus {
    let mut trees = Vec::with_capacity(samples.len());
    let mut dropped = 0;

    for (source, label) in samples {
        let cleaned = clean_source(&normalize_function_name(source));
        match parser.parse(&cleaned) {
            Ok(tree) => trees.push((tree, *label)),
            Err(_) => dropped += 1,
        }
    }

    if dropped > 0 {
        println!("Excluded {dropped} sample(s) that failed to parse");
    }

    ParsedCorpus { trees, dropped }
}

impl ParsedCorpus {
    /// Number of surviving samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    /// Check whether no sample survived parsing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CentinelaError;

    struct KindCountingParser;

    impl SourceParser for KindCountingParser {
        fn parse(&self, source: &str) -> Result<SyntaxNode> {
            if source.contains("!!") {
                return Err(CentinelaError::parse_failure("bad token"));
            }
            Ok(SyntaxNode::new("FileAST"))
        }
    }

    #[test]
    fn test_syntax_node_creation() {
        let node = SyntaxNode::new("FuncDef");
        assert_eq!(node.kind(), "FuncDef");
        assert!(node.children().is_empty());
        assert!(node.is_leaf());
    }

    #[test]
    fn test_syntax_node_with_children() {
        let mut func = SyntaxNode::new("FuncDef");
        func.add_child(SyntaxNode::new("Decl"));
        func.add_child(SyntaxNode::new("Compound"));

        assert_eq!(func.children().len(), 2);
        assert!(!func.is_leaf());
        assert_eq!(func.node_count(), 3);
        assert_eq!(func.depth(), 2);
    }

    #[test]
    fn test_deep_tree() {
        let root = SyntaxNode::new("FileAST").with_child(
            SyntaxNode::new("FuncDef")
                .with_child(SyntaxNode::new("Compound").with_child(SyntaxNode::new("Return"))),
        );

        assert_eq!(root.depth(), 4);
        assert_eq!(root.node_count(), 4);
    }

    #[test]
    fn test_normalize_function_name() {
        let src = "void CWE121_bad_func ( int x ) { }";
        let out = normalize_function_name(src);
        assert!(out.starts_with("void function("));
        assert!(!out.contains("CWE121"));
    }

    #[test]
    fn test_normalize_only_first_definition() {
        let src = "void alpha() { } void beta() { }";
        let out = normalize_function_name(src);
        assert!(out.contains("void function()"));
        assert!(out.contains("void beta()"));
    }

    #[test]
    fn test_clean_source_strips_comments() {
        let src = "int x; // trailing\n/* block\ncomment */int y;";
        let out = clean_source(src);
        assert!(!out.contains("trailing"));
        assert!(!out.contains("comment"));
        assert!(out.contains("int x;"));
        assert!(out.contains("int y;"));
    }

    #[test]
    fn test_clean_source_drops_preprocessor_lines() {
        let src = "#include <stdio.h>\nint x;\n  #define FOO 1\nint y;";
        let out = clean_source(src);
        assert!(!out.contains("#include"));
        assert!(!out.contains("#define"));
        assert!(out.contains("int x;"));
        assert!(out.contains("int y;"));
    }

    #[test]
    fn test_clean_source_normalizes_platform_types() {
        let src = "SOCKET s = INVALID_SOCKET; wchar_t c; int64_t big;";
        let out = clean_source(src);
        assert!(out.contains("int s = -1;"));
        assert!(out.contains("char c;"));
        assert!(out.contains("int big;"));
    }

    #[test]
    fn test_clean_source_prepends_typedefs() {
        let out = clean_source("int x;");
        assert!(out.starts_with("typedef unsigned int size_t;"));
        assert!(out.contains("typedef int BOOL;"));
    }

    #[test]
    fn test_parse_samples_excludes_failures() {
        let samples = vec![
            ("void f() { }".to_string(), 0),
            ("void g() { !! }".to_string(), 1),
            ("void h() { }".to_string(), 1),
        ];

        let corpus = parse_samples(&KindCountingParser, &samples);
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.dropped, 1);
        assert_eq!(corpus.trees[0].1, 0);
        assert_eq!(corpus.trees[1].1, 1);
    }
}
