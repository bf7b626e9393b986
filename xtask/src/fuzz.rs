use clap::Subcommand;
use duct::cmd;

#[derive(Subcommand)]
pub enum Fuzz {
    /// Run btrfs subvolume list parser
    Subvolumes,

    /// Run snapper list parser
    Snapper,

    /// Run shell configuration parser
    Config,
}

pub fn fuzz_parsers(command: Fuzz) -> anyhow::Result<()> {
    let mut args = vec!["fuzz", "run"];
    match command {
        Fuzz::Subvolumes => args.push("subvolumes"),
        Fuzz::Snapper => args.push("snapper"),
        Fuzz::Config => args.push("config"),
    }

    cmd!("cargo", "install", "cargo-fuzz").run()?; // will not install if its already installed
    cmd("cargo", args).run()?;
    Ok(())
}
