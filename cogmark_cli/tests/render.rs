mod common;

use cogmark_core::AnyEmptyResult;

#[test]
fn render_updates_file_in_place() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("gen.rs"), "// [[[ {{ name }} ]]]\n// [[[ end ]]]\n")?;

	common::cogmark_cmd()
		.arg("render")
		.arg("gen.rs")
		.arg("--var")
		.arg("name=value")
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("[cogmark]  changed  gen.rs"));

	let content = std::fs::read_to_string(tmp.path().join("gen.rs"))?;
	assert_eq!(content, "// [[[ {{ name }} ]]]\nvalue\n// [[[ end ]]]\n");

	Ok(())
}

#[test]
fn render_twice_reports_unchanged() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("gen.rs"), "[[[ {{ 6 * 7 }} ]]] [[[ end ]]]\n")?;

	for expected in ["changed", "-------"] {
		common::cogmark_cmd()
			.arg("render")
			.arg("gen.rs")
			.arg("--path")
			.arg(tmp.path())
			.assert()
			.success()
			.stdout(predicates::str::contains(format!("[cogmark]  {expected}  gen.rs")));
	}

	let content = std::fs::read_to_string(tmp.path().join("gen.rs"))?;
	assert_eq!(content, "[[[ {{ 6 * 7 }} ]]] 42 [[[ end ]]]\n");

	Ok(())
}

#[test]
fn render_to_output_keeps_existing_edits() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(
		tmp.path().join("greeting.rs.in"),
		"// [[[ fn {{ name }}() {} ]]]\n// [[[ end ]]]\n// <<[ custom ]>>\n// <<[ end ]>>\n",
	)?;

	common::cogmark_cmd()
		.args(["render", "greeting.rs.in", "-o", "greeting.rs", "--var", "name=hello"])
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("new    greeting.rs  (from greeting.rs.in)"));

	let output = tmp.path().join("greeting.rs");
	let generated = std::fs::read_to_string(&output)?;
	assert_eq!(
		generated,
		"// [[[ fn {{ name }}() {} ]]]\nfn hello() {}\n// [[[ end ]]]\n// <<[ custom ]>>\n// <<[ end ]>>\n"
	);

	let edited = generated.replace("// <<[ custom ]>>\n", "// <<[ custom ]>>\nfn kept() {}\n");
	std::fs::write(&output, &edited)?;

	common::cogmark_cmd()
		.args(["render", "greeting.rs.in", "-o", "greeting.rs", "--var", "name=world"])
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("changed  greeting.rs"));

	assert_eq!(
		std::fs::read_to_string(&output)?,
		"// [[[ fn {{ name }}() {} ]]]\nfn world() {}\n// [[[ end ]]]\n// <<[ custom ]>>\nfn kept() {}\n// <<[ end ]>>\n"
	);

	Ok(())
}

#[test]
fn render_reads_config_and_context_file() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(
		tmp.path().join("cogmark.toml"),
		"remove_markers = true\n\n[context]\ngreeting = \"hi\"\ncount = 1\n",
	)?;
	std::fs::write(tmp.path().join("values.json"), r#"{ "count": 3 }"#)?;
	std::fs::write(
		tmp.path().join("gen.txt"),
		"[[[ {{ greeting }} ]]] [[[ end ]]]\n[[[ {{ count * 2 }} ]]] [[[ end ]]]\n",
	)?;

	common::cogmark_cmd()
		.args(["render", "gen.txt", "-o", "out.txt", "--context", "values.json"])
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();

	assert_eq!(std::fs::read_to_string(tmp.path().join("out.txt"))?, "hi\n6\n");

	Ok(())
}

#[test]
fn remove_markers_flag_overrides_config() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("cogmark.toml"), "remove_markers = true\n")?;
	std::fs::write(tmp.path().join("gen.txt"), "[[[ a ]]] [[[ end ]]]\n")?;

	common::cogmark_cmd()
		.args(["render", "gen.txt", "-o", "out.txt", "--remove-markers", "false"])
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();

	assert_eq!(
		std::fs::read_to_string(tmp.path().join("out.txt"))?,
		"[[[ a ]]] a [[[ end ]]]\n"
	);

	Ok(())
}

#[test]
fn render_document_mode_renders_whole_file() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(
		tmp.path().join("doc.md.in"),
		"# {{ title }}\n[[[ {{ title }} ]]] [[[ end ]]]\n",
	)?;

	common::cogmark_cmd()
		.args(["render", "doc.md.in", "-o", "doc.md", "--mode", "document", "--var", "title=Guide"])
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();

	assert_eq!(
		std::fs::read_to_string(tmp.path().join("doc.md"))?,
		"# Guide\n[[[ {{ title }} ]]] Guide [[[ end ]]]\n"
	);

	Ok(())
}

#[test]
fn render_reports_marker_errors() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("broken.rs"), "// [[[ abc\n")?;

	common::cogmark_cmd()
		.args(["render", "broken.rs"])
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(2)
		.stderr(predicates::str::contains("couldn't find corresponding close marker"));

	assert_eq!(std::fs::read_to_string(tmp.path().join("broken.rs"))?, "// [[[ abc\n");

	Ok(())
}

#[test]
fn render_rejects_malformed_variables() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	common::cogmark_cmd()
		.args(["render", "gen.rs", "--var", "novalue"])
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.failure()
		.stderr(predicates::str::contains("expected KEY=VALUE"));

	Ok(())
}
