// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("goblin")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Goblin Contributors")
        .about("Install prebuilt binaries from a manifest and keep them in sync")
        .subcommand_required(false)
        .arg(
            Arg::new("home")
                .long("home")
                .value_name("DIR")
                .global(true)
                .help("Goblin home directory (default: $GOBLIN_HOME or ~/.goblin)"),
        )
        .arg(
            Arg::new("manifest")
                .short('m')
                .long("manifest")
                .value_name("PATH")
                .global(true)
                .help("Use this manifest file instead of the downloaded one"),
        )
        .arg(
            Arg::new("os")
                .long("os")
                .global(true)
                .help("Override the detected operating system"),
        )
        .arg(
            Arg::new("arch")
                .long("arch")
                .global(true)
                .help("Override the detected architecture"),
        )
        .subcommand(
            Command::new("install")
                .about("Install a package declared in the manifest")
                .arg(Arg::new("name").required(true).help("Package name"))
                .arg(
                    Arg::new("build")
                        .long("build")
                        .action(ArgAction::SetTrue)
                        .help("Build from source (not supported, prebuilt artifacts are used)"),
                ),
        )
        .subcommand(
            Command::new("update")
                .about("Update one package, or every installed package when no name is given")
                .arg(Arg::new("name").help("Package name (updates all if omitted)"))
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Reinstall even when the installed version is current"),
                )
                .arg(
                    Arg::new("dry_run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Show what would happen without changing anything"),
                )
                .arg(
                    Arg::new("offline")
                        .long("offline")
                        .action(ArgAction::SetTrue)
                        .help("Do not refresh the manifest before updating"),
                ),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove an installed package")
                .arg(Arg::new("name").required(true).help("Package name")),
        )
        .subcommand(
            Command::new("sync").about("Reinstall packages whose binaries are missing from disk"),
        )
        .subcommand(Command::new("list").about("List installed packages"))
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Man page goes to OUT_DIR so the source tree stays untouched
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    fs::write(man_dir.join("goblin.1"), buffer).expect("Failed to write man page");
}
