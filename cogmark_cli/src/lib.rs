use std::path::Path;
use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use cogmark_core::AnyResult;
use cogmark_core::Context;
use cogmark_core::Mode;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Regenerate code from inline template markers without losing hand-written edits.",
	long_about = "cogmark renders the template headers of generation markers found in a source \
	              file and writes the result between each marker and its end marker.\n\nCode \
	              written between edit markers is carried over to every regenerated output.\n\n\
	              Quick start:\n  cogmark render src/lib.rs   Regenerate a file in place\n  \
	              cogmark check src/lib.rs    Verify a file is up to date\n  cogmark edits \
	              src/lib.rs    List the edit blocks of a file"
)]
pub struct CogmarkCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory. `cogmark.toml` is looked up here
	/// and relative file arguments are resolved against it.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Render a template and write the output.
	///
	/// The output defaults to the input file itself. When a separate output
	/// file already exists, the bodies of its edit markers are reinserted in
	/// the new output. The file is only written when its content changes.
	Render(RenderArgs),
	/// Check that the output of a template is up to date.
	///
	/// Renders like `render` without writing anything. Exits with a non-zero
	/// status code when the output would change, which makes it suitable for
	/// CI pipelines.
	Check {
		#[command(flatten)]
		render: RenderArgs,

		/// Show a unified diff between the current and the expected output.
		#[arg(long, default_value_t = false)]
		diff: bool,
	},
	/// List the edit blocks of a file and their bodies.
	Edits {
		/// File to read the edit blocks from.
		file: PathBuf,

		/// Output format for the edit list.
		#[arg(long, value_enum, default_value_t = EditsFormat::Text)]
		format: EditsFormat,
	},
}

/// Options shared by `render` and `check`.
#[derive(Debug, Clone, Args)]
pub struct RenderArgs {
	/// Template file containing generation and edit markers.
	pub input: PathBuf,

	/// Output file. Defaults to the input file.
	#[arg(long, short)]
	pub output: Option<PathBuf>,

	/// How the template is rendered. Overrides `mode` from `cogmark.toml`.
	#[arg(long, value_enum)]
	pub mode: Option<ModeArg>,

	/// Template variable, repeatable. Overrides values from the config and
	/// the context file.
	#[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
	pub vars: Vec<(String, String)>,

	/// JSON file holding an object of template variables.
	#[arg(long, value_name = "FILE")]
	pub context: Option<PathBuf>,

	/// Strip markers from the output. Overrides `remove_markers` from
	/// `cogmark.toml` and the `COGMARK_REMOVE_MARKERS` environment variable.
	#[arg(long, value_name = "BOOL")]
	pub remove_markers: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
	/// Render only the headers of generation markers.
	Directive,
	/// Render the whole document, then its generation markers.
	Document,
}

impl From<ModeArg> for Mode {
	fn from(mode: ModeArg) -> Self {
		match mode {
			ModeArg::Directive => Mode::Directive,
			ModeArg::Document => Mode::Document,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EditsFormat {
	/// One block per edit: its name followed by its indented body.
	Text,
	/// A JSON object mapping edit names to bodies.
	Json,
}

/// Parse a `KEY=VALUE` template variable.
pub fn parse_var(raw: &str) -> Result<(String, String), String> {
	match raw.split_once('=') {
		Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_owned(), value.to_owned())),
		_ => Err(format!("expected KEY=VALUE, got `{raw}`")),
	}
}

/// Layer the template context: `base` (from `cogmark.toml`), then the
/// object in `file`, then `vars`. Later layers win.
pub fn build_context(mut base: Context, file: Option<&Path>, vars: &[(String, String)]) -> AnyResult<Context> {
	if let Some(file) = file {
		let content = std::fs::read_to_string(file)?;
		let serde_json::Value::Object(values) = serde_json::from_str::<serde_json::Value>(&content)? else {
			return Err(format!("context file {} must hold a JSON object", file.display()).into());
		};
		base.extend(values);
	}

	base.extend(
		vars
			.iter()
			.map(|(key, value)| (key.clone(), serde_json::Value::String(value.clone()))),
	);

	Ok(base)
}

/// Make a path relative to root for display purposes.
pub fn make_relative(path: &Path, root: &Path) -> String {
	path.strip_prefix(root)
		.unwrap_or(path)
		.display()
		.to_string()
}
