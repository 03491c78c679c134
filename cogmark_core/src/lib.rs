//! `cogmark_core` is the core library for the cogmark code generator. Source
//! files carry generation markers whose headers are templates; regenerating a
//! file renders each header and writes the result between the marker and its
//! end marker. Edit markers delimit hand-written regions that survive every
//! regeneration, even when the generated code around them changes.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Template text
//!   -> Scanner (finds generation markers, then edit markers outside their headers)
//!   -> Validator (pairs open/end markers, checks nesting and line layout, extracts bodies)
//!   -> Parser (collects generation blocks and named edit blocks)
//!   -> Generator (renders headers, re-parses the output, reinserts edit bodies)
//! ```
//!
//! ## Markers
//!
//! ```text
//! // [[[ {{ name }} = {{ value }}; ]]]
//! // [[[ end ]]]
//! // <<[ custom ]>>
//! hand-written code kept across regenerations
//! // <<[ end ]>>
//! ```
//!
//! A pair is inline when the open marker, body and end marker share a line
//! (`[[[ header ]]] body [[[ end ]]]`) and multi-line otherwise. Generated
//! multi-line bodies are indented to the column of the text preceding the
//! open marker, so `    // [[[ ... ]]]` produces lines indented by four spaces.
//!
//! ## Modules
//!
//! - [`config`] - Marker syntax, generation settings and `cogmark.toml`
//!   loading.
//!
//! ## Key Types
//!
//! - [`ParseResult`] - Markers, generation blocks and edit blocks of a text.
//! - [`Generator`] - Produces output in directive or document [`Mode`].
//! - [`Template`] - A parsed template bound to its settings, able to render
//!   into a file while keeping the edits already there.
//! - [`Renderer`] - The template engine seam, implemented by
//!   [`JinjaRenderer`] and by closures.
//! - [`CogError`] - Every failure, with line/column diagnostics and a
//!   generation trace for errors raised inside rendered headers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cogmark_core::{Context, JinjaRenderer, Mode, Settings, Template};
//!
//! let template = Template::from_file("src/lib.rs", Settings::default(), Mode::Directive).unwrap();
//! let rendered = template
//! 	.render_file(&JinjaRenderer::new(), &Context::new(), None, None)
//! 	.unwrap();
//! println!("{}  {}", rendered.status, rendered.path.display());
//! ```

pub use body::dedent;
pub use config::*;
pub use engine::*;
pub use error::*;
pub use parser::*;
pub use position::*;
pub use render::*;
pub use scanner::Marker;
pub use template::*;

mod body;
pub mod config;
mod edits;
mod engine;
#[allow(unused_assignments)]
mod error;
mod parser;
mod position;
mod render;
mod scanner;
mod template;
mod validator;
