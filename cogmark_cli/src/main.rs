use std::path::Path;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use cogmark_cli::Commands;
use cogmark_cli::CogmarkCli;
use cogmark_cli::EditsFormat;
use cogmark_cli::RenderArgs;
use cogmark_cli::build_context;
use cogmark_cli::make_relative;
use cogmark_core::AnyEmptyResult;
use cogmark_core::AnyResult;
use cogmark_core::CogConfig;
use cogmark_core::Context;
use cogmark_core::JinjaRenderer;
use cogmark_core::Mode;
use cogmark_core::Settings;
use cogmark_core::Template;
use cogmark_core::WriteStatus;
use cogmark_core::parse;
use owo_colors::OwoColorize;
use similar::ChangeTag;
use similar::TextDiff;
use tracing_subscriber::EnvFilter;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = CogmarkCli::parse();

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	let default_level = if args.verbose { "debug" } else { "warn" };
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.init();

	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	let result = match &args.command {
		Some(Commands::Render(render)) => run_render(&args, render),
		Some(Commands::Check { render, diff }) => run_check(&args, render, *diff),
		Some(Commands::Edits { file, format }) => run_edits(&args, file, *format),
		None => {
			eprintln!("No subcommand specified. Run `cogmark --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		match e.downcast::<cogmark_core::CogError>() {
			Ok(cog_err) => {
				let report: miette::Report = (*cog_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

fn resolve_root(args: &CogmarkCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Everything a render needs besides the template file itself.
struct Project {
	root: PathBuf,
	settings: Settings,
	mode: Mode,
	context: Context,
	renderer: JinjaRenderer,
}

fn load_project(args: &CogmarkCli, render: &RenderArgs) -> AnyResult<Project> {
	let root = resolve_root(args);
	let config = CogConfig::load(&root)?;

	let settings = config
		.as_ref()
		.map_or_else(Settings::default, |config| config.settings(&root));
	let mode = render
		.mode
		.map(Mode::from)
		.or_else(|| config.as_ref().and_then(|config| config.mode))
		.unwrap_or_default();
	let base = match &config {
		Some(config) => config.context()?,
		None => Context::new(),
	};
	let context_file = render.context.as_ref().map(|file| root.join(file));
	let context = build_context(base, context_file.as_deref(), &render.vars)?;
	let renderer = JinjaRenderer::with_template_dirs(settings.template_dirs.clone());
	tracing::debug!(root = %root.display(), %mode, variables = context.len(), "loaded project");

	if args.verbose {
		let config_path = CogConfig::resolve_path(&root)
			.map_or_else(|| "none".to_string(), |path| path.display().to_string());
		println!("Config: {config_path}");
		println!("Mode: {mode}");
	}

	Ok(Project {
		root,
		settings,
		mode,
		context,
		renderer,
	})
}

fn status_label(status: WriteStatus) -> String {
	match status {
		WriteStatus::Created => colored!(status.label(), green),
		WriteStatus::Changed => colored!(status.label(), yellow),
		WriteStatus::Unchanged => status.label().to_string(),
	}
}

fn print_summary(root: &Path, input: &Path, output: &Path, status: WriteStatus) {
	let tag = colored!("[cogmark]", bold);
	let output_rel = make_relative(output, root);
	if output == input {
		println!("{tag}  {}  {output_rel}", status_label(status));
	} else {
		println!(
			"{tag}  {}  {output_rel}  (from {})",
			status_label(status),
			make_relative(input, root)
		);
	}
}

fn run_render(args: &CogmarkCli, render: &RenderArgs) -> AnyEmptyResult {
	let project = load_project(args, render)?;
	let input = project.root.join(&render.input);
	let output = render.output.as_ref().map(|output| project.root.join(output));

	let template = Template::from_file(&input, project.settings, project.mode)?;
	let rendered = template.render_file(
		&project.renderer,
		&project.context,
		output.as_deref(),
		render.remove_markers,
	)?;

	print_summary(&project.root, &input, &rendered.path, rendered.status);
	Ok(())
}

fn run_check(args: &CogmarkCli, render: &RenderArgs, show_diff: bool) -> AnyEmptyResult {
	let project = load_project(args, render)?;
	let input = project.root.join(&render.input);
	let output = render.output.as_ref().map(|output| project.root.join(output));

	let template = Template::from_file(&input, project.settings, project.mode)?;
	let preview = template.preview_file(
		&project.renderer,
		&project.context,
		output.as_deref(),
		render.remove_markers,
	)?;
	let rel = make_relative(&preview.path, &project.root);

	match preview.status {
		WriteStatus::Unchanged => {
			println!("Check passed: {rel} is up to date.");
			Ok(())
		}
		WriteStatus::Created => {
			eprintln!("{} {rel} does not exist yet.", colored!("Check failed:", red));
			eprintln!("Run `cogmark render` to fix.");
			process::exit(1);
		}
		WriteStatus::Changed => {
			eprintln!("{} {rel} is out of date.", colored!("Check failed:", red));
			if show_diff {
				let current = std::fs::read_to_string(&preview.path)?.replace("\r\n", "\n");
				print_diff(&current, &preview.content);
			}
			eprintln!("Run `cogmark render` to fix.");
			process::exit(1);
		}
	}
}

fn run_edits(args: &CogmarkCli, file: &Path, format: EditsFormat) -> AnyEmptyResult {
	let root = resolve_root(args);
	let settings = CogConfig::load(&root)?
		.map_or_else(Settings::default, |config| config.settings(&root));
	let path = root.join(file);
	let source = std::fs::read_to_string(&path)?;
	let parsed = parse(&source, &settings)?;

	let mut blocks: Vec<_> = parsed.edit_blocks.values().collect();
	blocks.sort_by_key(|block| block.open().header_open);

	match format {
		EditsFormat::Json => {
			let edits: serde_json::Map<String, serde_json::Value> = blocks
				.iter()
				.map(|block| {
					let body = block
						.body()
						.map_or(serde_json::Value::Null, |body| serde_json::Value::String(body.to_owned()));
					(block.name().to_owned(), body)
				})
				.collect();
			println!("{}", serde_json::Value::Object(edits));
		}
		EditsFormat::Text => {
			if blocks.is_empty() {
				println!("No edit blocks found in {}.", make_relative(&path, &root));
				return Ok(());
			}
			for block in blocks {
				let line = block.open().open_location().line;
				println!("{} (line {line})", colored!(block.name(), bold));
				match block.body() {
					Some(body) => {
						for body_line in body.lines() {
							println!("    {body_line}");
						}
					}
					None => println!("    {}", colored!("(empty)", yellow)),
				}
			}
		}
	}

	Ok(())
}

/// Print a unified diff between two strings, colorized.
fn print_diff(current: &str, expected: &str) {
	let diff = TextDiff::from_lines(current, expected);
	for change in diff.iter_all_changes() {
		match change.tag() {
			ChangeTag::Delete => {
				eprint!("  {}", colored!(format!("-{change}"), red));
			}
			ChangeTag::Insert => {
				eprint!("  {}", colored!(format!("+{change}"), green));
			}
			ChangeTag::Equal => {
				eprint!("   {change}");
			}
		}
	}
}
