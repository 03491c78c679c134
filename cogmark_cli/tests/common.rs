use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

pub fn cogmark_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("cogmark"));
	cmd.env("NO_COLOR", "1").env_remove("COGMARK_REMOVE_MARKERS");
	cmd
}
