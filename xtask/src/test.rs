use duct::cmd;

pub fn test_on_host(lib: bool) -> anyhow::Result<()> {
    cmd!("cargo", "clippy", "--all-targets").run()?;
    if lib {
        cmd!("cargo", "test", "-p", "snapmenu-rs-core", "--lib").run()?;
    } else {
        cmd!("cargo", "test").run()?;
    }
    Ok(())
}
