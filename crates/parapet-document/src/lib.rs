//! AsyncAPI document model for Parapet.
//!
//! Reads YAML or JSON text into a typed object graph, binds `$ref` pointers
//! in a second pass (within a document or across a [`Workspace`]), and writes
//! the graph back out without looping on recursive schemas.
//!
//! ```
//! use parapet_document::{DocumentReader, DocumentWriter};
//!
//! let result = DocumentReader::default()
//!     .read("asyncapi: 2.6.0\ninfo: { title: Demo, version: 1.0.0 }")
//!     .unwrap();
//! assert!(result.diagnostic.is_valid());
//!
//! let yaml = DocumentWriter::default().write(&result.document, None).unwrap();
//! assert!(yaml.contains("title: Demo"));
//! ```

pub mod any;
pub mod context;
pub mod dispatch;
pub mod error;
mod fields;
pub mod model;
pub mod reader;
pub mod reference;
pub mod resolve;
pub mod serialize;
pub mod tree;
pub mod walker;
pub mod workspace;
pub mod writer;

pub use any::{coerce, AnyValue, Primitive};
pub use context::{AsyncApiError, Diagnostic, ParsingContext, SpecVersion};
pub use dispatch::{load, load_slot, parse_map, FieldTable, Loadable};
pub use error::{ParseError, ReadError, ReferenceError, ResolutionError, WriteError};
pub use model::*;
pub use reader::{DocumentReader, ReadResult, ReaderSettings, ReferenceResolution};
pub use reference::{
    parse_reference, AsyncApiReference, ComponentKey, ReferenceKind, ResolvedReference, Slot,
};
pub use resolve::{resolve, resolve_local, resolve_references, ReferenceResolver, Resolution};
pub use serialize::{DocumentWriter, SerializeContext, WriteSpec, WriterSettings};
pub use tree::{MapNode, NodeKind, ParseNode, PointerBuf, SeqNode};
pub use walker::{collect_cyclic_schemas, Graph, LoopDetector, Node, SchemaCollector, Visitor, Walker};
pub use workspace::{InMemoryWorkspace, Workspace};
pub use writer::{OutputFormat, SpecWriter, ValueWriter};
