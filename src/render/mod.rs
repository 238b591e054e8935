// Rendering boundary
//
// `view` decides what a message shows (prose, protocol, draft, receipt);
// `markup` turns prose into blocks; `terminal` draws both for the CLI.

pub mod markup;
pub mod terminal;
pub mod view;

pub use markup::{parse_inline, Block, BlockKind, Document, Span, SpanStyle};
pub use view::{resolve, resolve_classified, DirectiveView};
