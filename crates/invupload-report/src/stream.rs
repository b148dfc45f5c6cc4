//! Incremental JSON emission
//!
//! `JsonStream` writes a JSON document as an ordered sequence of text
//! fragments without building a document tree. Open objects and arrays are
//! tracked on a scope stack; each scope remembers whether it already holds a
//! member, so separators are placed by the stream and never by callers.

use std::io::{self, Write};

use serde_json::Value;

/// Destination for emitted fragments
pub trait FragmentSink {
    /// Append one fragment to the document
    fn push(&mut self, fragment: String);
}

impl FragmentSink for Vec<String> {
    fn push(&mut self, fragment: String) {
        Vec::push(self, fragment);
    }
}

/// Sink that writes fragments straight to an `io::Write`
///
/// The first write error is kept and every later fragment is discarded, so a
/// failing writer cannot leave a half-written document looking complete.
/// Call [`WriterSink::finish`] to flush and surface the error.
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    writer: W,
    error: Option<io::Error>,
    bytes_written: u64,
}

impl<W: Write> WriterSink<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            error: None,
            bytes_written: 0,
        }
    }

    /// Number of bytes successfully written so far
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flush the writer and hand it back
    ///
    /// # Errors
    /// Returns the first error hit while writing fragments, or the flush error.
    pub fn finish(mut self) -> io::Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> FragmentSink for WriterSink<W> {
    fn push(&mut self, fragment: String) {
        if self.error.is_some() {
            return;
        }
        match self.writer.write_all(fragment.as_bytes()) {
            Ok(()) => self.bytes_written += fragment.len() as u64,
            Err(e) => self.error = Some(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Object,
    Array,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    has_members: bool,
}

/// Streaming JSON writer over a [`FragmentSink`]
///
/// Misuse (a field outside an object, an element outside an array, closing
/// the wrong scope, a second top-level value) is a bug in the calling code
/// and panics immediately.
#[derive(Debug)]
pub struct JsonStream<S: FragmentSink = Vec<String>> {
    sink: S,
    scopes: Vec<Scope>,
    finished_root: bool,
}

impl JsonStream<Vec<String>> {
    /// Stream into a fresh in-memory fragment list
    #[must_use]
    pub fn new() -> Self {
        Self::with_sink(Vec::new())
    }
}

impl Default for JsonStream<Vec<String>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: FragmentSink> JsonStream<S> {
    /// Stream into the given sink
    pub fn with_sink(sink: S) -> Self {
        Self {
            sink,
            scopes: Vec::new(),
            finished_root: false,
        }
    }

    /// Give the sink back once the document is complete
    ///
    /// # Panics
    /// If any object or array is still open.
    pub fn into_sink(self) -> S {
        assert!(
            self.scopes.is_empty(),
            "json stream taken with {} unclosed scope(s)",
            self.scopes.len()
        );
        self.sink
    }

    /// Emit an object as the document root or as an array element
    pub fn object<F>(&mut self, body: F)
    where
        F: FnOnce(&mut Self),
    {
        self.begin_value();
        self.open(ScopeKind::Object, "{");
        body(self);
        self.close(ScopeKind::Object, "}");
    }

    /// Emit `"name":{...}` inside the current object
    pub fn object_field<F>(&mut self, name: &str, body: F)
    where
        F: FnOnce(&mut Self),
    {
        self.begin_field(name);
        self.open(ScopeKind::Object, "{");
        body(self);
        self.close(ScopeKind::Object, "}");
    }

    /// Emit `"name":value` inside the current object
    pub fn field(&mut self, name: &str, value: impl Into<Value>) {
        self.begin_field(name);
        self.sink.push(value.into().to_string());
    }

    /// Emit `"name":[...]` whose elements are streamed by `body`
    ///
    /// Use this when the element count is not known up front or the list is
    /// too large to join in memory.
    pub fn array_field<F>(&mut self, name: &str, body: F)
    where
        F: FnOnce(&mut Self),
    {
        self.begin_field(name);
        self.open(ScopeKind::Array, "[");
        body(self);
        self.close(ScopeKind::Array, "]");
    }

    /// Emit `"name":[...]` from already rendered JSON elements
    ///
    /// The elements are joined eagerly and wrapped in brackets verbatim.
    pub fn joined_array_field<I>(&mut self, name: &str, elements: I)
    where
        I: IntoIterator<Item = String>,
    {
        let joined = elements.into_iter().collect::<Vec<_>>().join(", ");
        self.begin_field(name);
        self.sink.push(format!("[{joined}]"));
    }

    /// Emit a scalar element inside the current array
    pub fn element(&mut self, value: impl Into<Value>) {
        self.begin_element();
        self.sink.push(value.into().to_string());
    }

    /// Emit pre-rendered JSON as an element of the current array
    pub fn raw_element(&mut self, json: impl Into<String>) {
        self.begin_element();
        self.sink.push(json.into());
    }

    /// Inject already valid JSON text verbatim
    ///
    /// No separator is added and no scope bookkeeping happens; the caller
    /// is responsible for the text fitting where it lands.
    pub fn raw(&mut self, text: impl Into<String>) {
        self.sink.push(text.into());
    }

    fn open(&mut self, kind: ScopeKind, token: &str) {
        self.sink.push(token.to_string());
        self.scopes.push(Scope {
            kind,
            has_members: false,
        });
    }

    fn close(&mut self, kind: ScopeKind, token: &str) {
        match self.scopes.pop() {
            Some(scope) if scope.kind == kind => {}
            Some(scope) => panic!("closing {kind:?} while {:?} is open", scope.kind),
            None => panic!("closing {kind:?} with no open scope"),
        }
        self.sink.push(token.to_string());
        if self.scopes.is_empty() {
            self.finished_root = true;
        }
    }

    /// Separator bookkeeping for a new member of the innermost scope
    fn next_member(&mut self, expected: ScopeKind) {
        let scope = match self.scopes.last_mut() {
            Some(scope) => scope,
            None => panic!("{expected:?} member emitted outside of any scope"),
        };
        assert!(
            scope.kind == expected,
            "{expected:?} member emitted inside {:?}",
            scope.kind
        );
        if scope.has_members {
            self.sink.push(",".to_string());
        } else {
            scope.has_members = true;
        }
    }

    fn begin_field(&mut self, name: &str) {
        self.next_member(ScopeKind::Object);
        self.sink.push(format!("{}:", Value::from(name)));
    }

    fn begin_element(&mut self) {
        self.next_member(ScopeKind::Array);
    }

    fn begin_value(&mut self) {
        if self.scopes.is_empty() {
            assert!(!self.finished_root, "second top-level value in json stream");
        } else {
            self.begin_element();
        }
    }
}
