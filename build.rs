// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn store_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("bucket")
            .long("bucket")
            .env("S3_BUCKET_NAME")
            .help("Bucket name; without it no object store is used"),
    )
    .arg(
        Arg::new("endpoint")
            .long("endpoint")
            .env("S3_ENDPOINT_URL")
            .help("Custom S3-compatible endpoint URL"),
    )
    .arg(
        Arg::new("access_key")
            .long("access-key")
            .env("S3_ACCESS_KEY_ID")
            .hide_env_values(true),
    )
    .arg(
        Arg::new("secret_key")
            .long("secret-key")
            .env("S3_SECRET_ACCESS_KEY")
            .hide_env_values(true),
    )
    .arg(
        Arg::new("region")
            .long("region")
            .env("S3_REGION")
            .default_value("us-east-1"),
    )
    .arg(
        Arg::new("root_path")
            .long("root-path")
            .env("dest_path")
            .default_value("")
            .help("Key prefix inside the bucket"),
    )
    .arg(
        Arg::new("private")
            .long("private")
            .action(ArgAction::SetTrue)
            .help("Upload objects without the public-read ACL"),
    )
    .arg(
        Arg::new("store_dir")
            .long("store-dir")
            .value_name("DIR")
            .help("Use a local directory as the bucket; takes precedence over S3"),
    )
}

fn transfer_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("chunk_size")
            .long("chunk-size")
            .value_name("MIB")
            .default_value("10")
            .help("Multipart chunk size and single-upload threshold, in MiB"),
    )
    .arg(
        Arg::new("concurrency")
            .long("concurrency")
            .default_value("4")
            .help("Concurrent file transfers, and concurrent parts per file"),
    )
}

fn repo_name() -> Arg {
    Arg::new("repo_name")
        .long("repo-name")
        .env("repo_name")
        .required(true)
        .help("Repository name (database is <name>.db.tar.gz)")
}

fn build_cli() -> Command {
    Command::new("pkgsync")
        .version(env!("CARGO_PKG_VERSION"))
        .author("pkgsync Contributors")
        .about("Reconcile package repositories and publish them to object storage")
        .subcommand_required(true)
        .arg(
            Arg::new("dry_run")
                .long("dry-run")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print the plan without transferring anything"),
        )
        .arg(
            Arg::new("report")
                .long("report")
                .global(true)
                .value_name("PATH")
                .help("Write a JSON summary of the run to this path"),
        )
        .subcommand(transfer_args(store_args(
            Command::new("promote")
                .about("Assemble the next repository state from freshly built packages")
                .arg(repo_name())
                .arg(
                    Arg::new("src_repo_path")
                        .long("src-repo-path")
                        .env("src_repo_path")
                        .default_value("./src_repo"),
                )
                .arg(
                    Arg::new("dest_repo_path")
                        .long("dest-repo-path")
                        .env("dest_repo_path")
                        .default_value("./dest_repo"),
                )
                .arg(
                    Arg::new("output_path")
                        .long("output-path")
                        .env("output_path")
                        .default_value("./new_packages"),
                ),
        )))
        .subcommand(transfer_args(store_args(
            Command::new("mirror")
                .about("Sync a local mirror with the repository published in the bucket")
                .arg(repo_name())
                .arg(Arg::new("local_dir").long("local-dir").default_value(".")),
        )))
        .subcommand(transfer_args(store_args(
            Command::new("upload")
                .about("Upload a repository directory to the bucket")
                .arg(
                    Arg::new("output_dir")
                        .long("output-dir")
                        .env("output_path")
                        .default_value("."),
                ),
        )))
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

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("pkgsync.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
