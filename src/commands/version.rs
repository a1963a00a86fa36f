pub fn run() -> anyhow::Result<()> {
    println!("grc-e2e {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
